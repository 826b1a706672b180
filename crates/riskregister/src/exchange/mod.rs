//! Project import and export.
//!
//! Three file formats are supported: JSON project documents, CSV risk tables
//! and XLSX workbooks with `Meta` and `Risks` sheets. Exports are lossless.
//! Imports are row based and lenient: every missing or unreadable field falls
//! back to a default rather than rejecting the file.

pub mod csv;
pub mod json;
pub mod xlsx;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::dates::{format_date, format_opt_date, parse_date, parse_timestamp};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectMeta};
use crate::risk::{is_valid_level, Risk, StatusChange, MIN_LEVEL};

pub use self::csv::CsvFormat;
pub use self::json::JsonFormat;
pub use self::xlsx::XlsxFormat;

/// Column headers of a risk table, in export order.
pub const RISK_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "category",
    "probability",
    "impact",
    "score",
    "owner",
    "mitigation",
    "priority",
    "response",
    "status",
    "dateIdentified",
    "dateResolved",
    "lastReviewed",
    "statusHistory",
];

/// Column headers of a project meta table, in export order.
pub const META_COLUMNS: &[&str] = &[
    "projectName",
    "projectManager",
    "sponsor",
    "startDate",
    "endDate",
    "riskPlan",
];

/// A loosely typed record: column header to cell text.
pub type Row = BTreeMap<String, String>;

/// Supported exchange file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON project document.
    Json,
    /// Comma separated risk table.
    Csv,
    /// Excel workbook.
    Xlsx,
}

impl Format {
    /// Determine the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .ok_or_else(|| Error::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// The exporter for this format.
    #[must_use]
    pub fn exporter(self) -> Box<dyn Exporter> {
        match self {
            Self::Json => Box::new(JsonFormat::new()),
            Self::Csv => Box::new(CsvFormat::new()),
            Self::Xlsx => Box::new(XlsxFormat::new()),
        }
    }

    /// The importer for this format.
    #[must_use]
    pub fn importer(self) -> Box<dyn Importer> {
        match self {
            Self::Json => Box::new(JsonFormat::new()),
            Self::Csv => Box::new(CsvFormat::new()),
            Self::Xlsx => Box::new(XlsxFormat::new()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(Error::UnsupportedFormat { path: s.into() }),
        }
    }
}

/// Serializes a project into a file format.
pub trait Exporter {
    /// Encode the project.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    fn export(&self, project: &Project) -> Result<Vec<u8>>;
}

/// Reads risks (and possibly metadata) from a file format.
pub trait Importer {
    /// Decode the file contents. `now` stands in for missing timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not readable as this format at all.
    fn import(&self, data: &[u8], now: DateTime<Utc>) -> Result<ImportBundle>;
}

/// Everything read from an import file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBundle {
    /// Project metadata, when the file carried any.
    pub meta: Option<ProjectMeta>,
    /// Imported risks. A blank id means one must be assigned.
    pub risks: Vec<Risk>,
    /// Categories listed by the file.
    pub categories: Vec<String>,
}

/// Encode a project in the given format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn export(project: &Project, format: Format) -> Result<Vec<u8>> {
    let data = format.exporter().export(project)?;
    debug!(
        project = %project.id,
        %format,
        bytes = data.len(),
        "Exported project"
    );
    Ok(data)
}

/// Decode an import file in the given format.
///
/// # Errors
///
/// Returns an error if the data is unreadable as that format.
pub fn import(data: &[u8], format: Format, now: DateTime<Utc>) -> Result<ImportBundle> {
    let bundle = format.importer().import(data, now)?;
    debug!(
        %format,
        risks = bundle.risks.len(),
        has_meta = bundle.meta.is_some(),
        "Decoded import file"
    );
    Ok(bundle)
}

/// Build a row from header and cell sequences. Blank headers are dropped.
pub fn zip_row<H, C>(headers: H, cells: C) -> Row
where
    H: IntoIterator,
    H::Item: AsRef<str>,
    C: IntoIterator,
    C::Item: Into<String>,
{
    headers
        .into_iter()
        .zip(cells)
        .filter_map(|(header, cell)| {
            let header = header.as_ref().trim();
            (!header.is_empty()).then(|| (header.to_string(), cell.into()))
        })
        .collect()
}

/// Whether every cell of a row is blank.
#[must_use]
pub fn is_blank_row(row: &Row) -> bool {
    row.values().all(|v| v.trim().is_empty())
}

fn field<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn text(row: &Row, name: &str) -> String {
    row.get(name).cloned().unwrap_or_default()
}

fn level(row: &Row, name: &str) -> u8 {
    let Some(raw) = field(row, name) else {
        return MIN_LEVEL;
    };
    let parsed = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= 255.0)
        .map(|v| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = v as u8;
            level
        })
        .filter(|v| is_valid_level(*v));
    parsed.unwrap_or_else(|| {
        warn!(column = name, value = raw, "Level out of range, using {MIN_LEVEL}");
        MIN_LEVEL
    })
}

fn label<T>(row: &Row, name: &str) -> T
where
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    match field(row, name).map(str::parse::<T>) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            warn!(column = name, "{e}; using default");
            T::default()
        }
        None => T::default(),
    }
}

fn status_history(row: &Row) -> Vec<StatusChange> {
    let Some(raw) = field(row, "statusHistory") else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Ignoring unreadable status history: {e}");
        Vec::new()
    })
}

/// Read a risk from a row, filling every gap with its default.
///
/// The identification date falls back to a `startDate` column and then to
/// the day of `now`.
#[must_use]
pub fn risk_from_row(row: &Row, now: DateTime<Utc>) -> Risk {
    let date_identified = field(row, "dateIdentified")
        .and_then(parse_date)
        .or_else(|| field(row, "startDate").and_then(parse_date))
        .unwrap_or_else(|| now.date_naive());

    Risk {
        id: field(row, "id").unwrap_or_default().to_string(),
        title: text(row, "title"),
        description: text(row, "description"),
        category: text(row, "category"),
        probability: level(row, "probability"),
        impact: level(row, "impact"),
        owner: text(row, "owner"),
        mitigation: text(row, "mitigation"),
        priority: label(row, "priority"),
        response: label(row, "response"),
        status: label(row, "status"),
        status_history: status_history(row),
        date_identified,
        date_resolved: opt_date(row, "dateResolved"),
        last_reviewed: field(row, "lastReviewed")
            .and_then(parse_timestamp)
            .unwrap_or(now),
    }
}

/// Cells of a risk in `RISK_COLUMNS` order.
///
/// # Errors
///
/// Returns an error if the status history cannot be serialized.
pub fn risk_to_row(risk: &Risk) -> Result<Vec<String>> {
    Ok(vec![
        risk.id.clone(),
        risk.title.clone(),
        risk.description.clone(),
        risk.category.clone(),
        risk.probability.to_string(),
        risk.impact.to_string(),
        risk.score().to_string(),
        risk.owner.clone(),
        risk.mitigation.clone(),
        risk.priority.to_string(),
        risk.response.to_string(),
        risk.status.to_string(),
        format_date(risk.date_identified),
        format_opt_date(risk.date_resolved),
        risk.last_reviewed.to_rfc3339_opts(SecondsFormat::Millis, true),
        serde_json::to_string(&risk.status_history)?,
    ])
}

fn opt_date(row: &Row, name: &str) -> Option<NaiveDate> {
    let raw = field(row, name)?;
    let date = parse_date(raw);
    if date.is_none() {
        warn!(column = name, value = raw, "Ignoring unreadable date");
    }
    date
}

/// Read project metadata from a row; missing fields are left empty.
#[must_use]
pub fn meta_from_row(row: &Row) -> ProjectMeta {
    ProjectMeta {
        project_name: text(row, "projectName"),
        project_manager: text(row, "projectManager"),
        sponsor: text(row, "sponsor"),
        start_date: opt_date(row, "startDate"),
        end_date: opt_date(row, "endDate"),
        risk_plan: text(row, "riskPlan"),
    }
}

/// Cells of project metadata in `META_COLUMNS` order.
#[must_use]
pub fn meta_to_row(meta: &ProjectMeta) -> Vec<String> {
    vec![
        meta.project_name.clone(),
        meta.project_manager.clone(),
        meta.sponsor.clone(),
        format_opt_date(meta.start_date),
        format_opt_date(meta.end_date),
        meta.risk_plan.clone(),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::risk::{Priority, RiskInput, RiskResponse, RiskStatus};
    use chrono::TimeZone;
    use std::path::PathBuf;

    pub(crate) fn sample_project() -> Project {
        let mut project = Project::new(
            "1700000000000",
            ProjectMeta {
                project_name: "Bridge, \"north\" span".to_string(),
                project_manager: "Dana".to_string(),
                sponsor: "City".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
                risk_plan: "Review monthly".to_string(),
            },
        );
        project.add_category("Technical");
        let input = RiskInput {
            title: "Steel delivery late".to_string(),
            description: "Supplier backlog,\nsecond line".to_string(),
            category: "Technical".to_string(),
            probability: 4,
            impact: 3,
            owner: "Sam".to_string(),
            mitigation: "Second supplier".to_string(),
            priority: Priority::High,
            status: RiskStatus::InProgress,
            date_identified: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            ..RiskInput::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        project
            .risks
            .push(Risk::create("1700000000001".to_string(), input, "raised", now));
        project
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("risks.CSV")).unwrap(), Format::Csv);
        assert_eq!(Format::from_path(Path::new("x.xlsx")).unwrap(), Format::Xlsx);
        assert!(matches!(
            Format::from_path(Path::new("x.ods")),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(Format::from_path(&PathBuf::from("noext")).is_err());
    }

    #[test]
    fn test_risk_from_empty_row_uses_defaults() {
        let risk = risk_from_row(&Row::new(), now());

        assert!(risk.id.is_empty());
        assert!(risk.title.is_empty());
        assert_eq!(risk.probability, 1);
        assert_eq!(risk.impact, 1);
        assert_eq!(risk.response, RiskResponse::Mitigate);
        assert_eq!(risk.status, RiskStatus::Open);
        assert_eq!(risk.priority, Priority::Medium);
        assert_eq!(risk.date_identified, now().date_naive());
        assert!(risk.date_resolved.is_none());
        assert_eq!(risk.last_reviewed, now());
        assert!(risk.status_history.is_empty());
    }

    #[test]
    fn test_risk_from_row_levels() {
        let r = risk_from_row(&row(&[("probability", "4"), ("impact", "5.0")]), now());
        assert_eq!((r.probability, r.impact), (4, 5));

        for bad in ["0", "6", "abc", "2.5", "-3"] {
            let r = risk_from_row(&row(&[("probability", bad)]), now());
            assert_eq!(r.probability, 1, "input {bad}");
        }
    }

    #[test]
    fn test_risk_from_row_labels() {
        let r = risk_from_row(
            &row(&[
                ("status", "in progress"),
                ("response", "Transfer"),
                ("priority", "bogus"),
            ]),
            now(),
        );
        assert_eq!(r.status, RiskStatus::InProgress);
        assert_eq!(r.response, RiskResponse::Transfer);
        assert_eq!(r.priority, Priority::Medium);
    }

    #[test]
    fn test_date_identified_fallbacks() {
        let r = risk_from_row(&row(&[("startDate", "2024-03-01")]), now());
        assert_eq!(r.date_identified, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let r = risk_from_row(
            &row(&[("dateIdentified", "2024-02-01T10:00:00.000Z"), ("startDate", "2024-03-01")]),
            now(),
        );
        assert_eq!(r.date_identified, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_date_resolved_parsed_or_dropped() {
        let r = risk_from_row(&row(&[("dateResolved", "2024-05-02")]), now());
        assert_eq!(r.date_resolved, NaiveDate::from_ymd_opt(2024, 5, 2));

        let r = risk_from_row(&row(&[("dateResolved", "2024-05-02T08:00:00.000Z")]), now());
        assert_eq!(r.date_resolved, NaiveDate::from_ymd_opt(2024, 5, 2));

        for raw in ["soon", "2024-13-40", "   "] {
            let r = risk_from_row(&row(&[("dateResolved", raw)]), now());
            assert!(r.date_resolved.is_none(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn test_row_roundtrip_preserves_risk() {
        let project = sample_project();
        let risk = &project.risks[0];
        let cells = risk_to_row(risk).unwrap();
        assert_eq!(cells.len(), RISK_COLUMNS.len());
        assert_eq!(cells[6], "12");

        let back = risk_from_row(&zip_row(RISK_COLUMNS, cells), now());
        assert_eq!(&back, risk);
    }

    #[test]
    fn test_bad_status_history_is_dropped() {
        let r = risk_from_row(&row(&[("statusHistory", "not json")]), now());
        assert!(r.status_history.is_empty());
    }

    #[test]
    fn test_meta_row() {
        let meta = sample_project().meta;
        let cells = meta_to_row(&meta);
        assert_eq!(meta_from_row(&zip_row(META_COLUMNS, cells)), meta);

        let partial = meta_from_row(&row(&[("projectName", "X"), ("endDate", "garbage")]));
        assert_eq!(partial.project_name, "X");
        assert!(partial.end_date.is_none());
        assert!(partial.sponsor.is_empty());
    }

    #[test]
    fn test_zip_row_skips_blank_headers() {
        let r = zip_row(["id", " ", "title"], ["1", "x", "t"]);
        assert_eq!(r.len(), 2);
        assert_eq!(r["title"], "t");
        assert!(!is_blank_row(&r));
        assert!(is_blank_row(&zip_row(["id"], [" "])));
    }
}
