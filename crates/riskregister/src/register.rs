//! The risk register: validated operations over stored projects and risks.
//!
//! `Register` is the layer the command line talks to. It validates input,
//! assigns identifiers, applies the status history rules and turns missing
//! rows into `ProjectNotFound`/`RiskNotFound` errors.

use std::collections::HashSet;

use chrono::{SubsecRound, Utc};
use regex::{Regex, RegexBuilder};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::exchange::{self, Format, ImportBundle};
use crate::matrix::Cell;
use crate::project::{Project, ProjectMeta};
use crate::risk::{Risk, RiskInput, RiskPatch, RiskStatus};
use crate::storage::{ProjectSummary, Storage};

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Risks appended to the project.
    pub risks_added: usize,
    /// Imported ids that were blank or already taken and got replaced.
    pub ids_assigned: usize,
    /// Whether the project metadata was replaced.
    pub meta_replaced: bool,
    /// Categories added to the project's list.
    pub categories_added: usize,
}

/// Filters for the risk table. Unset filters match every risk.
#[derive(Debug, Clone, Default)]
pub struct RiskQuery {
    /// Only risks in this matrix cell.
    pub cell: Option<Cell>,
    /// Only risks with this current status.
    pub status: Option<RiskStatus>,
    /// Only risks whose title or description matches.
    pub search: Option<Regex>,
}

impl RiskQuery {
    /// Set the search pattern, matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn with_search(mut self, pattern: &str) -> Result<Self> {
        self.search = Some(RegexBuilder::new(pattern).case_insensitive(true).build()?);
        Ok(self)
    }

    /// Whether a risk passes every filter.
    #[must_use]
    pub fn matches(&self, risk: &Risk) -> bool {
        self.cell.map_or(true, |cell| cell.contains(risk))
            && self.status.map_or(true, |status| risk.status == status)
            && self.search.as_ref().map_or(true, |re| {
                re.is_match(&risk.title) || re.is_match(&risk.description)
            })
    }

    /// The matching risks, in their original order.
    #[must_use]
    pub fn apply<'a>(&self, risks: &'a [Risk]) -> Vec<&'a Risk> {
        risks.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Validated access to the risk register.
#[derive(Debug)]
pub struct Register {
    storage: Storage,
}

impl Register {
    /// Wrap an open storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // === Projects ===

    /// Create a project. The metadata is not validated, so a blank project
    /// can be created and filled in later.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create_project(&self, meta: ProjectMeta) -> Result<Project> {
        let project = Project::new(self.storage.generate_id()?, meta);
        self.storage.insert_project(&project)?;
        info!(project = %project.id, name = project.display_name(), "Created project");
        Ok(project)
    }

    /// Replace a project's metadata after validating it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid metadata, `ProjectNotFound` if the
    /// project does not exist, or a database error.
    pub fn save_meta(&self, id: &str, meta: &ProjectMeta) -> Result<()> {
        meta.validate()?;
        if !self.storage.update_meta(id, meta)? {
            return Err(Error::project_not_found(id));
        }
        info!(project = %id, "Saved project details");
        Ok(())
    }

    /// Add a category to a project. Returns `false` when the name is blank
    /// or already listed.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or a database error.
    pub fn add_category(&self, id: &str, name: &str) -> Result<bool> {
        let mut project = Project {
            categories: self.categories(id)?,
            ..Project::default()
        };
        if !project.add_category(name) {
            return Ok(false);
        }
        self.storage.set_categories(id, &project.categories)?;
        Ok(true)
    }

    /// Remove a category from a project. Returns `false` when it was not listed.
    ///
    /// Risks already filed under the category keep it.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or a database error.
    pub fn remove_category(&self, id: &str, name: &str) -> Result<bool> {
        let mut project = Project {
            categories: self.categories(id)?,
            ..Project::default()
        };
        if !project.remove_category(name) {
            return Ok(false);
        }
        self.storage.set_categories(id, &project.categories)?;
        Ok(true)
    }

    fn categories(&self, id: &str) -> Result<Vec<String>> {
        self.ensure_project(id)?;
        self.storage.categories(id)
    }

    /// Delete a project and everything in it.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or a database error.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        if !self.storage.delete_project(id)? {
            return Err(Error::project_not_found(id));
        }
        Ok(())
    }

    /// Load a project with its risks and categories.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or a database error.
    pub fn project(&self, id: &str) -> Result<Project> {
        self.storage
            .get_project(id)?
            .ok_or_else(|| Error::project_not_found(id))
    }

    /// Summaries of all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn projects(&self) -> Result<Vec<ProjectSummary>> {
        self.storage.list_projects()
    }

    fn ensure_project(&self, id: &str) -> Result<()> {
        if self.storage.project_exists(id)? {
            Ok(())
        } else {
            Err(Error::project_not_found(id))
        }
    }

    // === Risks ===

    /// Validate and add a risk, recording its initial status with `note`.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `ProjectNotFound` or a database error.
    pub fn add_risk(&self, project: &str, input: RiskInput, note: &str) -> Result<Risk> {
        input.validate()?;
        let categories = self.categories(project)?;
        warn_unlisted_category(&categories, &input.category);

        let now = Utc::now().trunc_subsecs(3);
        let risk = Risk::create(self.storage.generate_id()?, input, note, now);
        self.storage.insert_risk(project, &risk)?;
        info!(project = %project, risk = %risk.id, score = risk.score(), "Added risk");
        Ok(risk)
    }

    /// Apply a patch to a risk.
    ///
    /// The patched fields are validated as a whole. A history entry is
    /// appended when the status changes or `note` is not blank.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `ProjectNotFound`, `RiskNotFound` or a database error.
    pub fn update_risk(
        &self,
        project: &str,
        id: &str,
        patch: &RiskPatch,
        note: &str,
    ) -> Result<Risk> {
        let mut risk = self.risk(project, id)?;
        let input = patch.apply_to(&risk);
        input.validate()?;
        if patch.category.is_some() {
            warn_unlisted_category(&self.storage.categories(project)?, &input.category);
        }

        let previous = risk.status;
        let recorded = risk.apply(input, note, Utc::now().trunc_subsecs(3));
        if !self.storage.update_risk(project, &risk)? {
            return Err(Error::risk_not_found(project, id));
        }

        if previous == risk.status {
            info!(project = %project, risk = %id, noted = recorded, "Updated risk");
        } else {
            info!(
                project = %project,
                risk = %id,
                from = %previous,
                to = %risk.status,
                "Risk status changed"
            );
        }
        Ok(risk)
    }

    /// Delete a risk.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, `RiskNotFound` or a database error.
    pub fn delete_risk(&self, project: &str, id: &str) -> Result<()> {
        self.ensure_project(project)?;
        if !self.storage.delete_risk(project, id)? {
            return Err(Error::risk_not_found(project, id));
        }
        info!(project = %project, risk = %id, "Deleted risk");
        Ok(())
    }

    /// Load one risk.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, `RiskNotFound` or a database error.
    pub fn risk(&self, project: &str, id: &str) -> Result<Risk> {
        self.ensure_project(project)?;
        self.storage
            .get_risk(project, id)?
            .ok_or_else(|| Error::risk_not_found(project, id))
    }

    // === Exchange ===

    /// Merge an import into a project.
    ///
    /// Risks are appended without validation. Blank or taken ids are
    /// replaced with fresh ones. Imported metadata replaces the project's,
    /// and imported categories are added to its list. Everything is written
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or a database error.
    pub fn import(&self, project: &str, bundle: ImportBundle) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut listed = Project {
            categories: self.categories(project)?,
            ..Project::default()
        };

        let mut seen = HashSet::new();
        let mut risks = bundle.risks;
        for risk in &mut risks {
            let taken = risk.id.is_empty()
                || seen.contains(&risk.id)
                || self.storage.risk_exists(project, &risk.id)?;
            if taken {
                let fresh = self.storage.generate_id()?;
                if !risk.id.is_empty() {
                    warn!(old = %risk.id, new = %fresh, "Imported risk id already taken; reassigned");
                }
                risk.id = fresh;
                summary.ids_assigned += 1;
            }
            seen.insert(risk.id.clone());
        }
        summary.risks_added = risks.len();
        summary.meta_replaced = bundle.meta.is_some();

        for name in &bundle.categories {
            if listed.add_category(name) {
                summary.categories_added += 1;
            }
        }
        let categories = (summary.categories_added > 0).then_some(listed.categories.as_slice());
        self.storage
            .import_into(project, &risks, bundle.meta.as_ref(), categories)?;

        info!(
            project = %project,
            risks = summary.risks_added,
            reassigned = summary.ids_assigned,
            meta = summary.meta_replaced,
            "Imported into project"
        );
        Ok(summary)
    }

    /// Encode a project in the given format.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, a database error or an encoding error.
    pub fn export(&self, project: &str, format: Format) -> Result<Vec<u8>> {
        exchange::export(&self.project(project)?, format)
    }
}

fn warn_unlisted_category(categories: &[String], category: &str) {
    let category = category.trim();
    if !categories.is_empty() && !categories.iter().any(|c| c == category) {
        warn!(category, "Category is not in the project's category list");
    }
}
