//! Error types for the service directory.

use thiserror::Error;

use crate::coverage::CoverageError;

/// Result type alias using DirectoryError.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Primary error type for directory and resolver operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Unknown product type: {0}")]
    UnknownProduct(String),

    #[error("Unknown service type: {0}")]
    UnknownServiceType(String),

    #[error("SERVICE parameter '{requested}' does not match endpoint service '{expected}'")]
    ServiceMismatch { requested: String, expected: String },

    // === Directory Errors ===
    #[error("Malformed coverage: {0}")]
    MalformedCoverage(#[from] CoverageError),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No matching service: {0}")]
    NoMatchingService(String),

    // === Collaborator Errors ===
    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    Timeout,
}

impl DirectoryError {
    /// Stable wire code placed in `{"error":{"code":..}}` and `X-Error-Code`.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::MissingParameter(_) => "MISSING_PARAMETERS",
            DirectoryError::InvalidParameter { .. } => "INVALID_PARAMETERS",
            DirectoryError::InvalidBbox(_) => "INVALID_BBOX",
            DirectoryError::InvalidDimensions(_) => "INVALID_DIMENSIONS",
            DirectoryError::UnknownProduct(_) => "INVALID_PRODUCT",
            DirectoryError::UnknownServiceType(_) => "INVALID_SERVICE_TYPE",
            DirectoryError::ServiceMismatch { .. } => "SERVICE_MISMATCH",
            DirectoryError::MalformedCoverage(_) => "MALFORMED_COVERAGE",
            DirectoryError::NodeNotFound(_) => "NODE_NOT_FOUND",
            DirectoryError::NoMatchingService(_) => "PRODUCT_NOT_SUPPORTED",
            DirectoryError::RegistryError(_) => "REGISTRY_ERROR",
            DirectoryError::RenderError(_) => "RENDER_ERROR",
            DirectoryError::InternalError(_) => "INTERNAL_ERROR",
            DirectoryError::ServiceUnavailable(_) | DirectoryError::Timeout => {
                "SERVICE_UNAVAILABLE"
            }
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            DirectoryError::MissingParameter(_)
            | DirectoryError::InvalidParameter { .. }
            | DirectoryError::InvalidBbox(_)
            | DirectoryError::InvalidDimensions(_)
            | DirectoryError::UnknownProduct(_)
            | DirectoryError::UnknownServiceType(_)
            | DirectoryError::ServiceMismatch { .. } => 400,

            DirectoryError::NodeNotFound(_) | DirectoryError::NoMatchingService(_) => 404,

            DirectoryError::MalformedCoverage(_) => 422,

            DirectoryError::RegistryError(_) | DirectoryError::RenderError(_) => 502,

            DirectoryError::ServiceUnavailable(_) | DirectoryError::Timeout => 503,

            DirectoryError::InternalError(_) => 500,
        }
    }

    /// Client-side input problems; never worth retrying.
    pub fn is_client_error(&self) -> bool {
        self.http_status_code() / 100 == 4
    }
}

impl From<crate::bbox::BboxParseError> for DirectoryError {
    fn from(err: crate::bbox::BboxParseError) -> Self {
        DirectoryError::InvalidBbox(err.to_string())
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DirectoryError::InvalidBbox("x".into()).http_status_code(), 400);
        assert_eq!(DirectoryError::Timeout.http_status_code(), 503);
        assert_eq!(DirectoryError::Timeout.error_code(), "SERVICE_UNAVAILABLE");
        assert_eq!(DirectoryError::NodeNotFound("n".into()).http_status_code(), 404);
        assert!(DirectoryError::MissingParameter("bbox".into()).is_client_error());
        assert!(!DirectoryError::ServiceUnavailable("none".into()).is_client_error());
    }

    #[test]
    fn test_bbox_error_conversion() {
        let err: DirectoryError = crate::bbox::BoundingBox::from_wms_string("1,2,3")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "INVALID_BBOX");
    }
}
