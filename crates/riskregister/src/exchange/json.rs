//! JSON project documents.
//!
//! Exports are the full project document. Imports also accept a bare array
//! of risks, the layout of older single-project `risks.json` files.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{is_blank_row, meta_from_row, risk_from_row, Exporter, ImportBundle, Importer, Row};
use crate::error::{Error, Result};
use crate::project::Project;

/// JSON exporter and importer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    /// Create a JSON exporter/importer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for JsonFormat {
    fn export(&self, project: &Project) -> Result<Vec<u8>> {
        let mut data = serde_json::to_vec_pretty(project)?;
        data.push(b'\n');
        Ok(data)
    }
}

impl Importer for JsonFormat {
    fn import(&self, data: &[u8], now: DateTime<Utc>) -> Result<ImportBundle> {
        let value: Value = serde_json::from_slice(data)?;
        match value {
            Value::Array(items) => Ok(ImportBundle {
                risks: risks_from_values(&items, now)?,
                ..ImportBundle::default()
            }),
            Value::Object(doc) if doc.contains_key("risks") || doc.contains_key("meta") => {
                let risks = match doc.get("risks") {
                    Some(Value::Array(items)) => risks_from_values(items, now)?,
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => return Err(Error::import("\"risks\" must be an array")),
                };
                let meta = match doc.get("meta") {
                    Some(Value::Object(fields)) => Some(meta_from_row(&object_to_row(fields))),
                    _ => None,
                };
                let categories = match doc.get("categories") {
                    Some(Value::Array(names)) => names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(ImportBundle {
                    meta,
                    risks,
                    categories,
                })
            }
            _ => Err(Error::import(
                "expected a project document or an array of risks",
            )),
        }
    }
}

fn risks_from_values(items: &[Value], now: DateTime<Utc>) -> Result<Vec<crate::risk::Risk>> {
    let mut risks = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(Error::import(format!("risk #{} is not an object", index + 1)));
        };
        let row = object_to_row(fields);
        if !is_blank_row(&row) {
            risks.push(risk_from_row(&row, now));
        }
    }
    Ok(risks)
}

/// Flatten a JSON object into a row. Nested values become JSON text.
fn object_to_row(fields: &Map<String, Value>) -> Row {
    fields
        .iter()
        .map(|(key, value)| {
            let cell = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), cell)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::tests::sample_project;
    use crate::risk::RiskStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_export_is_camel_case_document() {
        let data = JsonFormat::new().export(&sample_project()).unwrap();
        let text = String::from_utf8(data).unwrap();

        assert!(text.contains("\"projectName\""));
        assert!(text.contains("\"statusHistory\""));
        assert!(text.contains("\"In-Progress\""));
        assert!(text.contains("\"categories\""));
    }

    #[test]
    fn test_import_own_export() {
        let project = sample_project();
        let data = JsonFormat::new().export(&project).unwrap();
        let bundle = JsonFormat::new().import(&data, now()).unwrap();

        assert_eq!(bundle.meta.as_ref(), Some(&project.meta));
        assert_eq!(bundle.risks, project.risks);
        assert_eq!(bundle.categories, project.categories);
    }

    #[test]
    fn test_import_bare_risk_array() {
        let data = br#"[
            {"id": "1", "title": "Flood", "probability": 5, "impact": "4",
             "status": "Mitigated", "dateResolved": "", "statusHistory": []},
            {"description": "no id"}
        ]"#;
        let bundle = JsonFormat::new().import(data, now()).unwrap();

        assert!(bundle.meta.is_none());
        assert_eq!(bundle.risks.len(), 2);
        assert_eq!(bundle.risks[0].score(), 20);
        assert_eq!(bundle.risks[0].status, RiskStatus::Mitigated);
        assert!(bundle.risks[1].id.is_empty());
        assert_eq!(bundle.risks[1].probability, 1);
    }

    #[test]
    fn test_import_rejects_other_shapes() {
        assert!(JsonFormat::new().import(b"42", now()).is_err());
        assert!(JsonFormat::new()
            .import(br#"{"projectName": "x"}"#, now())
            .is_err());
        assert!(JsonFormat::new().import(b"[1, 2]", now()).is_err());
        assert!(JsonFormat::new().import(b"{not json", now()).is_err());
    }
}
