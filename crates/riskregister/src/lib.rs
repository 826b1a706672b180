//! `riskregister` - A project risk register
//!
//! This library tracks project risks scored by probability × impact, buckets
//! them into the 5×5 risk matrix, keeps an append-only status history per
//! risk, reconstructs a score timeline from that history and exchanges
//! projects as JSON, CSV and XLSX.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod chart;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod matrix;
pub mod project;
pub mod register;
pub mod report;
pub mod risk;
pub mod storage;
pub mod timeline;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use matrix::RiskMatrix;
pub use project::{Project, ProjectMeta};
pub use register::{ImportSummary, Register, RiskQuery};
pub use risk::{Risk, RiskInput, RiskPatch, RiskStatus, Severity};
pub use storage::{ProjectSummary, Storage, StorageStats};
pub use timeline::Timeline;
