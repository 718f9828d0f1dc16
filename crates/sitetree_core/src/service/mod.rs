//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce hierarchy invariants the schema cannot express (acyclicity).
//! - Classify failures into the caller-facing [`ErrorKind`] taxonomy.
//!
//! # Invariants
//! - Every failing call logs exactly one `status=error` event and returns
//!   the error to the caller.

pub mod building_service;
pub mod location_service;

use log::{error, warn};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Caller-facing failure category shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced building, location, or parent location does not exist.
    NotFound,
    /// Well-formed request that would break an invariant.
    InvalidArgument,
    /// Persistence failure; propagated unchanged.
    StoreFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::StoreFailure => "store_failure",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn log_failure(
    event: &'static str,
    module: &'static str,
    subject: &dyn Display,
    kind: ErrorKind,
    err: &dyn Display,
) {
    match kind {
        ErrorKind::StoreFailure => error!(
            "event={event} module={module} status=error subject={subject} error_kind={kind} error={err}"
        ),
        ErrorKind::NotFound | ErrorKind::InvalidArgument => warn!(
            "event={event} module={module} status=error subject={subject} error_kind={kind} error={err}"
        ),
    }
}
