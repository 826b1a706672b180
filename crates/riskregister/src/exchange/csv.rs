//! CSV risk tables.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim, Writer};

use super::{
    is_blank_row, risk_from_row, risk_to_row, zip_row, Exporter, ImportBundle, Importer,
    RISK_COLUMNS,
};
use crate::error::{Error, Result};
use crate::project::Project;

/// CSV exporter and importer. Only risks are carried; metadata is not.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl CsvFormat {
    /// Create a CSV exporter/importer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for CsvFormat {
    fn export(&self, project: &Project) -> Result<Vec<u8>> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record(RISK_COLUMNS)?;
        for risk in &project.risks {
            wtr.write_record(risk_to_row(risk)?)?;
        }

        wtr.into_inner()
            .map_err(|e| Error::export(format!("CSV writer error: {e}")))
    }
}

impl Importer for CsvFormat {
    fn import(&self, data: &[u8], now: DateTime<Utc>) -> Result<ImportBundle> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(data);

        let headers = rdr.headers()?.clone();
        let mut risks = Vec::new();
        for record in rdr.records() {
            let row = zip_row(&headers, &record?);
            if !is_blank_row(&row) {
                risks.push(risk_from_row(&row, now));
            }
        }

        Ok(ImportBundle {
            risks,
            ..ImportBundle::default()
        })
    }
}
