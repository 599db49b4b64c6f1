use serde::Serialize;
use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn error(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }

    pub fn warning(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            ..Self::error(code, path, message, hint)
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => self.errors.push(issue),
            IssueSeverity::Warning => self.warnings.push(issue),
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    fn single(code: &str, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.push(ValidationIssue::error(code, "/", message, None));
        report
    }
}

impl From<PlanError> for ValidationReport {
    fn from(err: PlanError) -> Self {
        let code = match &err {
            PlanError::Json(_) => "invalid_plan_json",
            PlanError::Toml(_) => "invalid_plan_toml",
            PlanError::Schema(_) => "schema_validation_error",
            PlanError::Io(_) => "plan_io_error",
        };
        Self::single(code, err.to_string())
    }
}

/// Plan errors that are not structural issues.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
