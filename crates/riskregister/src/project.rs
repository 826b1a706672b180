//! Projects: descriptive metadata, risk categories and the risks themselves.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::matrix;
use crate::risk::Risk;
use crate::validation::{is_blank, ValidationErrors};

/// Name shown for projects that have not been named yet.
pub const UNTITLED_PROJECT: &str = "Untitled Project";

/// Descriptive fields of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMeta {
    /// Project name.
    pub project_name: String,
    /// Project manager.
    pub project_manager: String,
    /// Sponsor.
    pub sponsor: String,
    /// Planned start.
    #[serde(with = "dates::opt_date")]
    pub start_date: Option<NaiveDate>,
    /// Planned end.
    #[serde(with = "dates::opt_date")]
    pub end_date: Option<NaiveDate>,
    /// Risk management plan (free text).
    pub risk_plan: String,
}

impl ProjectMeta {
    /// Validate the metadata before it is saved.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the name or dates are missing, or the end
    /// date precedes the start date.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.project_name) {
            errors.push("projectName", "Title is required");
        }
        if self.start_date.is_none() {
            errors.push("startDate", "Start date is required");
        }
        match (self.start_date, self.end_date) {
            (_, None) => errors.push("endDate", "End date is required"),
            (Some(start), Some(end)) if start > end => {
                errors.push("endDate", "End date must be after start date");
            }
            _ => {}
        }
        errors.into_result()
    }
}

/// A project and everything tracked in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Identifier.
    pub id: String,
    /// Descriptive metadata.
    #[serde(default)]
    pub meta: ProjectMeta,
    /// Tracked risks, in insertion order.
    #[serde(default)]
    pub risks: Vec<Risk>,
    /// Risk categories offered when editing risks.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Project {
    /// Create an empty project.
    #[must_use]
    pub fn new(id: impl Into<String>, meta: ProjectMeta) -> Self {
        Self {
            id: id.into(),
            meta,
            risks: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// The project name, or a placeholder when unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(&self.meta)
    }

    /// Add a category. Blank names and duplicates are ignored.
    ///
    /// Returns whether the category list changed.
    pub fn add_category(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() || self.categories.iter().any(|c| c == trimmed) {
            return false;
        }
        self.categories.push(trimmed.to_string());
        true
    }

    /// Remove a category. Returns whether it was present.
    pub fn remove_category(&mut self, name: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c != name.trim());
        self.categories.len() != before
    }

    /// Look up a risk by id.
    #[must_use]
    pub fn risk(&self, id: &str) -> Option<&Risk> {
        self.risks.iter().find(|r| r.id == id)
    }

    /// Mean score over all risks, 0 when there are none.
    #[must_use]
    pub fn aggregated_score(&self) -> f64 {
        matrix::aggregated_score(&self.risks)
    }
}

/// The project name from metadata, or a placeholder when unnamed.
#[must_use]
pub fn display_name(meta: &ProjectMeta) -> &str {
    if is_blank(&meta.project_name) {
        UNTITLED_PROJECT
    } else {
        &meta.project_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valid_meta() -> ProjectMeta {
        ProjectMeta {
            project_name: "Data centre move".to_string(),
            project_manager: "Sam".to_string(),
            sponsor: "CIO".to_string(),
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(date(2024, 6, 30)),
            risk_plan: "Weekly review".to_string(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_meta().validate().is_ok());
    }

    #[test]
    fn test_validate_blank_meta() {
        let errors = ProjectMeta::default().validate().unwrap_err();
        assert_eq!(errors.get("projectName"), Some("Title is required"));
        assert_eq!(errors.get("startDate"), Some("Start date is required"));
        assert_eq!(errors.get("endDate"), Some("End date is required"));
    }

    #[test]
    fn test_validate_end_before_start() {
        let meta = ProjectMeta {
            end_date: Some(date(2023, 12, 31)),
            ..valid_meta()
        };
        let errors = meta.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("endDate"),
            Some("End date must be after start date")
        );
    }

    #[test]
    fn test_same_start_and_end_is_valid() {
        let meta = ProjectMeta {
            end_date: Some(date(2024, 1, 1)),
            ..valid_meta()
        };
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_display_name() {
        let project = Project::new("1", ProjectMeta::default());
        assert_eq!(project.display_name(), UNTITLED_PROJECT);

        let project = Project::new("2", valid_meta());
        assert_eq!(project.display_name(), "Data centre move");
    }

    #[test]
    fn test_categories() {
        let mut project = Project::new("1", valid_meta());

        assert!(project.add_category("  Technical "));
        assert!(project.add_category("Schedule"));
        assert!(!project.add_category("Technical"));
        assert!(!project.add_category("   "));
        assert_eq!(project.categories, vec!["Technical", "Schedule"]);

        assert!(project.remove_category("Technical"));
        assert!(!project.remove_category("Budget"));
        assert_eq!(project.categories, vec!["Schedule"]);
    }

    #[test]
    fn test_meta_json_round_trip_shape() {
        let json = serde_json::to_value(valid_meta()).unwrap();
        assert_eq!(json["projectName"], "Data centre move");
        assert_eq!(json["startDate"], "2024-01-01");

        let blank: ProjectMeta = serde_json::from_str(
            r#"{"projectName":"","projectManager":"","sponsor":"","startDate":"","endDate":"","riskPlan":""}"#,
        )
        .unwrap();
        assert_eq!(blank, ProjectMeta::default());
    }

    #[test]
    fn test_empty_project_score() {
        let project = Project::new("1", valid_meta());
        assert!(project.aggregated_score().abs() < f64::EPSILON);
        assert!(project.risk("missing").is_none());
    }
}
