//! Bridge protocol types for NDJSON communication over UNIX socket.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use serde::{Deserialize, Serialize};

use super::error::GatewayError;

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: u8 = 1;

/// NDJSON request from daemon to bridge.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID (UUID)
    pub id: String,
    /// Protocol version (currently 1)
    pub v: u8,
    /// Method name (e.g., "authorize", "contacts", "send_text")
    pub method: String,
    /// Method parameters
    pub params: serde_json::Value,
}

/// NDJSON response from bridge to daemon.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    /// Request ID (matches request)
    pub id: String,
    /// Success flag
    pub ok: bool,
    /// Result data (if successful)
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (if failed)
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    /// Response metadata
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

/// Error details in response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (e.g., "AUTH_FAILED", "FLOOD_WAIT")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Response metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Bridge execution time in milliseconds
    pub server_ms: f64,
    /// Protocol version
    pub protocol_v: u8,
}

impl Request {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            v: PROTOCOL_VERSION,
            method: method.into(),
            params,
        }
    }

    /// Serialize request to NDJSON line.
    pub fn to_ndjson_line(&self) -> Result<String, GatewayError> {
        let json = serde_json::to_string(self).map_err(GatewayError::Protocol)?;
        Ok(format!("{}\n", json))
    }
}

impl Response {
    /// Parse response from NDJSON line.
    pub fn from_ndjson_line(line: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(line).map_err(GatewayError::Protocol)
    }

    /// Unwrap the result payload or convert the error into a `GatewayError`.
    pub fn into_result(self) -> Result<serde_json::Value, GatewayError> {
        if self.ok {
            return Ok(self.result.unwrap_or(serde_json::Value::Null));
        }

        let info = self.error.unwrap_or_else(|| ErrorInfo {
            code: "ERROR".to_string(),
            message: "unknown error".to_string(),
            details: None,
        });
        Err(info.into())
    }
}

impl From<ErrorInfo> for GatewayError {
    fn from(info: ErrorInfo) -> Self {
        match info.code.as_str() {
            "AUTH_FAILED" | "UNAUTHORIZED" => GatewayError::Auth(info.message),
            "FLOOD_WAIT" => {
                let retry_after_secs = info
                    .details
                    .as_ref()
                    .and_then(|d| d.get("retry_after"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                GatewayError::RateLimited { retry_after_secs }
            }
            _ => GatewayError::Remote {
                code: info.code,
                message: info.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failed(code: &str, details: Option<serde_json::Value>) -> Response {
        Response {
            id: "1".to_string(),
            ok: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: "nope".to_string(),
                details,
            }),
            meta: None,
        }
    }

    #[test]
    fn test_request_line_is_newline_terminated() {
        let line = Request::new("contacts", json!({"hash": 0}))
            .to_ndjson_line()
            .unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed["v"], 1);
        assert_eq!(parsed["method"], "contacts");
    }

    #[test]
    fn test_success_without_result_is_null() {
        let response = Response::from_ndjson_line(r#"{"id":"a","ok":true}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_error_code_mapping() {
        assert!(matches!(
            failed("AUTH_FAILED", None).into_result(),
            Err(GatewayError::Auth(_))
        ));
        assert!(matches!(
            failed("FLOOD_WAIT", Some(json!({"retry_after": 42}))).into_result(),
            Err(GatewayError::RateLimited { retry_after_secs: 42 })
        ));
        match failed("PEER_ID_INVALID", None).into_result() {
            Err(GatewayError::Remote { code, .. }) => assert_eq!(code, "PEER_ID_INVALID"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            Response::from_ndjson_line("not json"),
            Err(GatewayError::Protocol(_))
        ));
    }
}
