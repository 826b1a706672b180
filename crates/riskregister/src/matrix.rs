//! The 5×5 risk matrix.
//!
//! Risks are bucketed by their (probability, impact) pair. Rows are shown with
//! the highest impact first and columns with the lowest probability first.

use serde::Serialize;
use tracing::warn;

use crate::risk::{is_valid_level, Risk, Severity, SeverityThresholds, MAX_LEVEL, MIN_LEVEL};

const SIZE: usize = MAX_LEVEL as usize;

/// A matrix cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cell {
    /// Probability (column), 1–5.
    pub probability: u8,
    /// Impact (row), 1–5.
    pub impact: u8,
}

impl Cell {
    /// Create a cell address, or `None` when either level is off the scale.
    #[must_use]
    pub fn new(probability: u8, impact: u8) -> Option<Self> {
        (is_valid_level(probability) && is_valid_level(impact)).then_some(Self {
            probability,
            impact,
        })
    }

    /// Probability × impact for any risk in this cell.
    #[must_use]
    pub fn score(self) -> u8 {
        self.probability * self.impact
    }

    /// Severity band of this cell.
    #[must_use]
    pub fn severity(self, thresholds: &SeverityThresholds) -> Severity {
        Severity::classify(f64::from(self.score()), thresholds)
    }

    /// Whether a risk falls in this cell.
    #[must_use]
    pub fn contains(self, risk: &Risk) -> bool {
        risk.probability == self.probability && risk.impact == self.impact
    }
}

/// Risks bucketed by probability and impact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskMatrix {
    // cells[probability - 1][impact - 1] holds risk ids in input order
    cells: [[Vec<String>; SIZE]; SIZE],
}

impl RiskMatrix {
    /// Bucket the given risks. Risks with levels off the 1–5 scale are skipped.
    #[must_use]
    pub fn build<'a>(risks: impl IntoIterator<Item = &'a Risk>) -> Self {
        let mut matrix = Self::default();
        for risk in risks {
            match Cell::new(risk.probability, risk.impact) {
                Some(cell) => matrix.slot_mut(cell).push(risk.id.clone()),
                None => warn!(
                    risk = %risk.id,
                    probability = risk.probability,
                    impact = risk.impact,
                    "Risk is outside the matrix, skipping"
                ),
            }
        }
        matrix
    }

    fn slot(&self, cell: Cell) -> &Vec<String> {
        &self.cells[usize::from(cell.probability - 1)][usize::from(cell.impact - 1)]
    }

    fn slot_mut(&mut self, cell: Cell) -> &mut Vec<String> {
        &mut self.cells[usize::from(cell.probability - 1)][usize::from(cell.impact - 1)]
    }

    /// Ids of the risks in a cell.
    #[must_use]
    pub fn risks_in(&self, cell: Cell) -> &[String] {
        self.slot(cell)
    }

    /// Number of risks in a cell.
    #[must_use]
    pub fn count(&self, cell: Cell) -> usize {
        self.slot(cell).len()
    }

    /// Number of risks placed in the matrix.
    #[must_use]
    pub fn total(&self) -> usize {
        self.cells.iter().flatten().map(Vec::len).sum()
    }

    /// Rows in display order: impact 5 down to 1, each with probability 1 to 5.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        (MIN_LEVEL..=MAX_LEVEL)
            .rev()
            .map(|impact| {
                (MIN_LEVEL..=MAX_LEVEL)
                    .map(|probability| Cell {
                        probability,
                        impact,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Toggleable cell selection used to filter the risk table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFilter {
    selected: Option<Cell>,
}

impl CellFilter {
    /// Select `cell`, or clear the selection when it is already selected.
    pub fn toggle(&mut self, cell: Cell) {
        self.selected = if self.selected == Some(cell) {
            None
        } else {
            Some(cell)
        };
    }

    /// Clear the selection.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// The selected cell, if any.
    #[must_use]
    pub fn selected(&self) -> Option<Cell> {
        self.selected
    }

    /// Risks passing the filter; all risks when nothing is selected.
    #[must_use]
    pub fn apply<'a>(&self, risks: &'a [Risk]) -> Vec<&'a Risk> {
        match self.selected {
            Some(cell) => filter(risks, cell),
            None => risks.iter().collect(),
        }
    }
}

/// Risks falling in one cell, in input order.
#[must_use]
pub fn filter(risks: &[Risk], cell: Cell) -> Vec<&Risk> {
    risks.iter().filter(|r| cell.contains(r)).collect()
}

/// Mean score of the given risks, 0 when there are none.
#[must_use]
pub fn aggregated_score<'a>(risks: impl IntoIterator<Item = &'a Risk>) -> f64 {
    let (sum, count) = risks
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), r| {
            (sum + u32::from(r.score()), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        f64::from(sum) / f64::from(count)
    }
}
