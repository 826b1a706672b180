//! Core risk types for riskregister.
//!
//! A risk is scored as probability × impact on two 1–5 scales. Every status
//! transition is appended to the risk's status history, which is never
//! rewritten.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::validation::{is_blank, ValidationErrors};

/// Lowest value on the probability and impact scales.
pub const MIN_LEVEL: u8 = 1;

/// Highest value on the probability and impact scales.
pub const MAX_LEVEL: u8 = 5;

/// Highest possible score (`MAX_LEVEL * MAX_LEVEL`).
pub const MAX_SCORE: u8 = MAX_LEVEL * MAX_LEVEL;

/// Whether a probability or impact value is on the 1–5 scale.
#[must_use]
pub fn is_valid_level(level: u8) -> bool {
    (MIN_LEVEL..=MAX_LEVEL).contains(&level)
}

/// Lowercase a label and drop separators so `In-Progress`, `in progress`
/// and `IN_PROGRESS` compare equal.
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Error returned when a label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    /// What kind of value was being parsed.
    pub kind: &'static str,
    /// The label that failed to parse.
    pub label: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.label)
    }
}

impl std::error::Error for UnknownLabel {}

macro_rules! labelled_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants in display order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The canonical label.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize_label(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize_label(v.as_str()) == wanted)
                    .ok_or_else(|| UnknownLabel {
                        kind: $kind,
                        label: s.to_string(),
                    })
            }
        }
    };
}

/// Lifecycle status of a risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskStatus {
    /// Identified, no action yet.
    #[default]
    Open,
    /// Mitigation under way.
    #[serde(rename = "In-Progress")]
    InProgress,
    /// Mitigation complete.
    Mitigated,
    /// Consciously accepted.
    Accepted,
}

labelled_enum!(RiskStatus, "status", {
    Open => "Open",
    InProgress => "In-Progress",
    Mitigated => "Mitigated",
    Accepted => "Accepted",
});

/// Planned response strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskResponse {
    /// Remove the cause.
    Avoid,
    /// Reduce probability or impact.
    #[default]
    Mitigate,
    /// Shift the risk to a third party.
    Transfer,
    /// Live with it.
    Accept,
}

labelled_enum!(RiskResponse, "response", {
    Avoid => "Avoid",
    Mitigate => "Mitigate",
    Transfer => "Transfer",
    Accept => "Accept",
});

/// Handling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Handle first.
    High,
    /// Normal priority.
    #[default]
    Medium,
    /// Handle when convenient.
    Low,
}

labelled_enum!(Priority, "priority", {
    High => "High",
    Medium => "Medium",
    Low => "Low",
});

/// Severity band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Below the moderate threshold.
    Low,
    /// Between the moderate and high thresholds.
    Moderate,
    /// At or above the high threshold.
    High,
}

impl Severity {
    /// Classify a score (individual or aggregated).
    #[must_use]
    pub fn classify(score: f64, thresholds: &SeverityThresholds) -> Self {
        if score >= f64::from(thresholds.high) {
            Self::High
        } else if score >= f64::from(thresholds.moderate) {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Display colour used by charts and reports.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "#86efac",
            Self::Moderate => "#fde047",
            Self::High => "#ef4444",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Moderate => write!(f, "Moderate"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Score boundaries between severity bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityThresholds {
    /// Scores at or above this are at least moderate.
    pub moderate: u8,
    /// Scores at or above this are high.
    pub high: u8,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate: 5,
            high: 15,
        }
    }
}

/// One entry in a risk's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// When the change was recorded.
    #[serde(with = "dates::timestamp")]
    pub date: DateTime<Utc>,
    /// Status after the change.
    pub status: RiskStatus,
    /// Free-text note, possibly empty.
    #[serde(default)]
    pub note: String,
}

/// The editable fields of a risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInput {
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Category, usually one of the project's categories.
    pub category: String,
    /// Probability on the 1–5 scale.
    pub probability: u8,
    /// Impact on the 1–5 scale.
    pub impact: u8,
    /// Responsible person.
    pub owner: String,
    /// Mitigation plan.
    pub mitigation: String,
    /// Handling priority.
    pub priority: Priority,
    /// Planned response.
    pub response: RiskResponse,
    /// Current status.
    pub status: RiskStatus,
    /// Date the risk was identified.
    #[serde(with = "dates::date")]
    pub date_identified: NaiveDate,
    /// Date the risk was resolved, if it was.
    #[serde(with = "dates::opt_date", default)]
    pub date_resolved: Option<NaiveDate>,
}

impl Default for RiskInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            probability: MIN_LEVEL,
            impact: MIN_LEVEL,
            owner: String::new(),
            mitigation: String::new(),
            priority: Priority::default(),
            response: RiskResponse::default(),
            status: RiskStatus::default(),
            date_identified: Utc::now().date_naive(),
            date_resolved: None,
        }
    }
}

impl RiskInput {
    /// Validate the fields, collecting every failure.
    ///
    /// # Errors
    ///
    /// Returns the field errors when any field is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.title) {
            errors.push("title", "Title is required");
        }
        if is_blank(&self.description) {
            errors.push("description", "Description is required");
        }
        if is_blank(&self.category) {
            errors.push("category", "Category is required");
        }
        if is_blank(&self.owner) {
            errors.push("owner", "Owner is required");
        }
        if is_blank(&self.mitigation) {
            errors.push("mitigation", "Mitigation is required");
        }
        if !is_valid_level(self.probability) {
            errors.push("probability", "Probability must be 1-5");
        }
        if !is_valid_level(self.impact) {
            errors.push("impact", "Impact must be 1-5");
        }
        if let Some(resolved) = self.date_resolved {
            if resolved < self.date_identified {
                errors.push(
                    "dateResolved",
                    "Date Resolved must be after Date Identified",
                );
            }
        }
        errors.into_result()
    }

    /// Probability × impact.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.probability.saturating_mul(self.impact)
    }
}

/// Partial update of a risk; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New probability.
    pub probability: Option<u8>,
    /// New impact.
    pub impact: Option<u8>,
    /// New owner.
    pub owner: Option<String>,
    /// New mitigation plan.
    pub mitigation: Option<String>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New response.
    pub response: Option<RiskResponse>,
    /// New status.
    pub status: Option<RiskStatus>,
    /// New identification date.
    pub date_identified: Option<NaiveDate>,
    /// New resolution date; `Some(None)` clears it.
    pub date_resolved: Option<Option<NaiveDate>>,
}

impl RiskPatch {
    /// Merge this patch over the risk's current fields.
    #[must_use]
    pub fn apply_to(&self, risk: &Risk) -> RiskInput {
        let current = risk.to_input();
        RiskInput {
            title: self.title.clone().unwrap_or(current.title),
            description: self.description.clone().unwrap_or(current.description),
            category: self.category.clone().unwrap_or(current.category),
            probability: self.probability.unwrap_or(current.probability),
            impact: self.impact.unwrap_or(current.impact),
            owner: self.owner.clone().unwrap_or(current.owner),
            mitigation: self.mitigation.clone().unwrap_or(current.mitigation),
            priority: self.priority.unwrap_or(current.priority),
            response: self.response.unwrap_or(current.response),
            status: self.status.unwrap_or(current.status),
            date_identified: self.date_identified.unwrap_or(current.date_identified),
            date_resolved: self.date_resolved.unwrap_or(current.date_resolved),
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A tracked risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    /// Identifier, unique within its project.
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Category.
    #[serde(default)]
    pub category: String,
    /// Probability on the 1–5 scale.
    pub probability: u8,
    /// Impact on the 1–5 scale.
    pub impact: u8,
    /// Responsible person.
    #[serde(default)]
    pub owner: String,
    /// Mitigation plan.
    #[serde(default)]
    pub mitigation: String,
    /// Handling priority.
    #[serde(default)]
    pub priority: Priority,
    /// Planned response.
    #[serde(default)]
    pub response: RiskResponse,
    /// Current status.
    pub status: RiskStatus,
    /// Append-only log of status transitions.
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    /// Date the risk was identified.
    #[serde(with = "dates::date")]
    pub date_identified: NaiveDate,
    /// Date the risk was resolved, if it was.
    #[serde(with = "dates::opt_date", default)]
    pub date_resolved: Option<NaiveDate>,
    /// Last time the risk was saved.
    #[serde(with = "dates::timestamp")]
    pub last_reviewed: DateTime<Utc>,
}

impl Risk {
    /// Create a new risk with an initial history entry for its status.
    #[must_use]
    pub fn create(id: String, input: RiskInput, note: &str, now: DateTime<Utc>) -> Self {
        let initial = StatusChange {
            date: now,
            status: input.status,
            note: note.to_string(),
        };
        Self {
            id,
            title: input.title,
            description: input.description,
            category: input.category,
            probability: input.probability,
            impact: input.impact,
            owner: input.owner,
            mitigation: input.mitigation,
            priority: input.priority,
            response: input.response,
            status: input.status,
            status_history: vec![initial],
            date_identified: input.date_identified,
            date_resolved: input.date_resolved,
            last_reviewed: now,
        }
    }

    /// Replace the editable fields and mark the risk reviewed.
    ///
    /// A history entry is appended when the status changes or a non-blank
    /// note is given. Returns whether an entry was appended.
    pub fn apply(&mut self, input: RiskInput, note: &str, now: DateTime<Utc>) -> bool {
        let record = self.status != input.status || !is_blank(note);
        if record {
            self.status_history.push(StatusChange {
                date: now,
                status: input.status,
                note: note.to_string(),
            });
        }

        self.title = input.title;
        self.description = input.description;
        self.category = input.category;
        self.probability = input.probability;
        self.impact = input.impact;
        self.owner = input.owner;
        self.mitigation = input.mitigation;
        self.priority = input.priority;
        self.response = input.response;
        self.status = input.status;
        self.date_identified = input.date_identified;
        self.date_resolved = input.date_resolved;
        self.last_reviewed = now;
        record
    }

    /// The editable fields of this risk.
    #[must_use]
    pub fn to_input(&self) -> RiskInput {
        RiskInput {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            probability: self.probability,
            impact: self.impact,
            owner: self.owner.clone(),
            mitigation: self.mitigation.clone(),
            priority: self.priority,
            response: self.response,
            status: self.status,
            date_identified: self.date_identified,
            date_resolved: self.date_resolved,
        }
    }

    /// Probability × impact.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.probability.saturating_mul(self.impact)
    }

    /// Severity band of this risk's score.
    #[must_use]
    pub fn severity(&self, thresholds: &SeverityThresholds) -> Severity {
        Severity::classify(f64::from(self.score()), thresholds)
    }

    /// Whether the risk was open (identified and not yet resolved) on `date`.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.date_identified <= date && self.date_resolved.map_or(true, |r| r >= date)
    }

    /// The status in force at the end of `date`, rebuilt from the history.
    ///
    /// Uses the latest entry recorded on or before `date`. When every entry is
    /// later, the earliest entry's status is used; with no history at all the
    /// current status is returned.
    #[must_use]
    pub fn status_on(&self, date: NaiveDate) -> RiskStatus {
        let mut in_force: Option<&StatusChange> = None;
        for change in &self.status_history {
            if change.date.date_naive() > date {
                continue;
            }
            if in_force.map_or(true, |c| change.date >= c.date) {
                in_force = Some(change);
            }
        }

        in_force
            .or_else(|| self.status_history.iter().min_by_key(|c| c.date))
            .map_or(self.status, |c| c.status)
    }

    /// Note of the latest history entry, or an empty string.
    #[must_use]
    pub fn last_note(&self) -> &str {
        self.status_history
            .last()
            .map_or("", |change| change.note.as_str())
    }
}
