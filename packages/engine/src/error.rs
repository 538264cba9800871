#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SourceUnavailable,
    CatalogUnavailable,
    StatusUnavailable,
    Expansion,
    InvalidHint,
    InvalidQuery,
    InvalidConfig,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "ACCEL_ERROR_SOURCE_UNAVAILABLE",
            Self::CatalogUnavailable => "ACCEL_ERROR_CATALOG_UNAVAILABLE",
            Self::StatusUnavailable => "ACCEL_ERROR_STATUS_UNAVAILABLE",
            Self::Expansion => "ACCEL_ERROR_EXPANSION",
            Self::InvalidHint => "ACCEL_ERROR_INVALID_HINT",
            Self::InvalidQuery => "ACCEL_ERROR_INVALID_QUERY",
            Self::InvalidConfig => "ACCEL_ERROR_INVALID_CONFIG",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::SourceUnavailable,
            Self::CatalogUnavailable,
            Self::StatusUnavailable,
            Self::Expansion,
            Self::InvalidHint,
            Self::InvalidQuery,
            Self::InvalidConfig,
        ]
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {description}")]
pub struct AccelError {
    pub code: ErrorCode,
    pub description: String,
}

impl AccelError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn source_unavailable(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceUnavailable, description)
    }

    pub fn catalog_unavailable(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::CatalogUnavailable, description)
    }

    pub fn status_unavailable(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::StatusUnavailable, description)
    }

    /// Expansion failures never escape `refresh`; they are counted and the
    /// entry is dropped from the published mapping.
    pub fn expansion(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::Expansion, description)
    }

    pub fn invalid_hint(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidHint, description)
    }

    pub fn invalid_query(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidQuery, description)
    }

    pub fn invalid_config(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, description)
    }

    pub fn is_expansion(&self) -> bool {
        self.code == ErrorCode::Expansion
    }
}
