use anyhow::anyhow;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Forbidden,
    InvalidInput,
    /// No representation of a report matches the request's `Accept` header.
    NotAcceptable,
    NotFound,
    Unknown,
}

impl ErrorKind {
    const fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Database => "database_error",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotAcceptable => "not_acceptable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

/// Library error. `public` is safe to show to console users; `source` is for logs.
#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub source: anyhow::Error,
}

impl LibError {
    fn with_kind(kind: ErrorKind, public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind,
            code: kind.default_code(),
            public,
            source,
        }
    }

    pub fn database(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::Database, public, source)
    }

    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::InvalidInput, public, source)
    }

    /// Validation failure with a field-specific code, e.g. `quiet_time_too_short`.
    pub fn invalid_with_code(
        code: &'static str,
        public: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self {
            code,
            ..Self::invalid(public, source)
        }
    }

    pub fn forbidden(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::Forbidden, public, source)
    }

    pub fn not_acceptable(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::NotAcceptable, public, source)
    }

    pub fn not_found(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::NotFound, public, source)
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self::with_kind(ErrorKind::Unknown, public, source)
    }

    /// An error whose public text is all there is to say.
    pub fn message(public: &'static str) -> Self {
        Self::unknown(public, anyhow!(public))
    }

    /// Not-found lookups are surfaced as warnings rather than failures.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.public, self.code, self.source)
    }
}

impl std::error::Error for LibError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source: &(dyn std::error::Error + 'static) = self.source.as_ref();
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pick_kind_and_code() {
        let err = LibError::not_acceptable("No CSV", anyhow!("accept: image/png"));
        assert_eq!(err.kind, ErrorKind::NotAcceptable);
        assert_eq!(err.code, "not_acceptable");

        let err = LibError::invalid_with_code("proxy_port_range", "Bad port", anyhow!("70000"));
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.code, "proxy_port_range");
    }

    #[test]
    fn display_keeps_public_text_first() {
        let err = LibError::not_found("Resource not found", anyhow!("resource 7"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Resource not found (not_found): resource 7");
    }
}
