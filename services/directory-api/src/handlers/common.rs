//! Shared helpers for JSON handlers.

use axum::{
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::str::FromStr;

use s100_common::{BoundingBox, DirectoryError, DirectoryResult};

pub const X_ERROR_CODE: HeaderName = HeaderName::from_static("x-error-code");

/// JSON error envelope: `{"error":{"code","message","details"}}`.
pub fn json_error(status: StatusCode, code: &str, message: &str, details: Value) -> Response {
    (
        status,
        [(X_ERROR_CODE, code.to_string())],
        Json(json!({
            "error": {
                "code": code,
                "message": message,
                "details": details,
            }
        })),
    )
        .into_response()
}

/// Directory errors rendered as JSON with their mapped status.
#[derive(Debug)]
pub struct ApiError(pub DirectoryError);

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        json_error(status, self.0.error_code(), &self.0.to_string(), details(&self.0))
    }
}

fn details(err: &DirectoryError) -> Value {
    match err {
        DirectoryError::MissingParameter(param) => json!({ "parameter": param }),
        DirectoryError::InvalidParameter { param, .. } => json!({ "parameter": param }),
        DirectoryError::ServiceMismatch {
            requested,
            expected,
        } => json!({ "requested": requested, "expected": expected }),
        DirectoryError::UnknownProduct(value) | DirectoryError::UnknownServiceType(value) => {
            json!({ "value": value })
        }
        _ => Value::Null,
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// 415 for POST bodies that are not XML.
pub fn unsupported_media_type(content_type: Option<&str>) -> Response {
    json_error(
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        "UNSUPPORTED_MEDIA_TYPE",
        "POST requests must carry an XML body",
        json!({ "contentType": content_type }),
    )
}

/// Whether a Content-Type header names an XML body.
pub fn is_xml(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return false;
    };
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/xml" || mime == "text/xml"
}

pub fn content_type(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

pub fn require_bbox(raw: Option<&str>) -> DirectoryResult<BoundingBox> {
    let raw = raw
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DirectoryError::MissingParameter("bbox".to_string()))?;
    Ok(BoundingBox::from_wms_string(raw)?)
}

/// Parse an optional comma-separated list. Blank input means "any".
pub fn parse_list<T>(raw: Option<&str>) -> DirectoryResult<Option<Vec<T>>>
where
    T: FromStr<Err = DirectoryError>,
{
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(T::from_str)
        .collect::<DirectoryResult<Vec<T>>>()
        .map(Some)
}

/// Parse an optional scalar parameter.
pub fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> DirectoryResult<Option<T>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| DirectoryError::InvalidParameter {
                param: name.to_string(),
                message: format!("cannot parse '{}'", value),
            }),
    }
}

pub fn parse_confidence(raw: Option<&str>) -> DirectoryResult<Option<f64>> {
    let value = parse_param::<f64>("minConfidence", raw)?;
    match value {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(DirectoryError::InvalidParameter {
            param: "minConfidence".to_string(),
            message: format!("{} is outside [0, 1]", c),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s100_common::ProductType;

    #[test]
    fn test_is_xml() {
        assert!(is_xml(Some("application/xml")));
        assert!(is_xml(Some("text/xml; charset=utf-8")));
        assert!(!is_xml(Some("application/json")));
        assert!(!is_xml(None));
    }

    #[test]
    fn test_parse_list() {
        let products = parse_list::<ProductType>(Some("S101, s-102")).unwrap();
        assert_eq!(products, Some(vec![ProductType::S101, ProductType::S102]));
        assert_eq!(parse_list::<ProductType>(Some(" ")).unwrap(), None);
        assert!(parse_list::<ProductType>(Some("S101,S999")).is_err());
    }

    #[test]
    fn test_parse_confidence() {
        assert_eq!(parse_confidence(Some("0.7")).unwrap(), Some(0.7));
        assert_eq!(parse_confidence(None).unwrap(), None);
        assert!(parse_confidence(Some("1.5")).is_err());
        assert!(parse_confidence(Some("high")).is_err());
    }
}
