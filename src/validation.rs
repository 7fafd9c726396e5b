//! Validation issues
//!
//! Query parameters are validated eagerly, before anything touches the
//! database. Every problem found in a request is recorded as a
//! [`ValidationIssue`] and the whole set is reported at once, so a client
//! sending `sort_order=ASC&from_date=yesterday` learns about both mistakes
//! in a single 400 response.
//!
//! ```rust,ignore
//! use querycrate::validation::{ValidationIssue, ValidationIssues};
//!
//! let mut issues = ValidationIssues::new();
//! issues.add(ValidationIssue::invalid_enum(&["sort_order"], "Expected 'asc' or 'desc'"));
//! issues.result()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// A single problem with a request parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationIssue {
    /// Machine-readable issue kind (e.g. `invalid_type`, `invalid_date`)
    pub code: String,
    /// Location of the offending parameter, outermost first
    pub path: Vec<String>,
    /// Human-readable description
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(code: impl Into<String>, path: &[&str], message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path: path.iter().map(|segment| (*segment).to_string()).collect(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_type(path: &[&str], message: impl Into<String>) -> Self {
        Self::new("invalid_type", path, message)
    }

    #[must_use]
    pub fn invalid_enum(path: &[&str], message: impl Into<String>) -> Self {
        Self::new("invalid_enum_value", path, message)
    }

    #[must_use]
    pub fn invalid_date(path: &[&str], message: impl Into<String>) -> Self {
        Self::new("invalid_date", path, message)
    }

    #[must_use]
    pub fn unrecognized_key(path: &[&str], message: impl Into<String>) -> Self {
        Self::new("unrecognized_keys", path, message)
    }

    /// Dotted path, e.g. `filter.status.in`
    #[must_use]
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.dotted_path(), self.message)
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// Accumulated validation issues for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationIssues {
    issues: Vec<ValidationIssue>,
}

impl ValidationIssues {
    #[must_use]
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    /// `Ok(())` when nothing was recorded
    ///
    /// # Errors
    ///
    /// Returns the collection itself when at least one issue was added.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationIssue> for ValidationIssues {
    fn from(issue: ValidationIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

impl fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} issue(s):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationIssues {}
