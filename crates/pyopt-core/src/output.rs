//! JSON output envelope for CLI responses.
//!
//! Every structured response carries `status` first and a `schema_version`,
//! followed by the command-specific payload. Output is deterministic: the same
//! input produces the same bytes (field order is declaration order, arrays are
//! emitted in the order the analysis produced them).

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, PyoptError};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Success Envelope
// ============================================================================

/// A successful response wrapping a command payload.
///
/// The payload is flattened so its fields sit next to `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Response {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            payload,
        }
    }
}

// ============================================================================
// Error Envelope
// ============================================================================

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (also the process exit code).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// File the error refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-indexed line, for parse errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-indexed column, for parse errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl ErrorInfo {
    /// Create from a PyoptError.
    pub fn from_error(err: &PyoptError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let mut info = ErrorInfo {
            code,
            message: err.to_string(),
            file: None,
            line: None,
            column: None,
        };
        match err {
            PyoptError::Parse {
                file,
                line,
                column,
                message,
            } => {
                info.message = message.clone();
                info.file = file.clone();
                info.line = Some(*line);
                info.column = Some(*column);
            }
            PyoptError::FileNotFound { path } => info.file = Some(path.clone()),
            PyoptError::ApplyError { file, .. } => info.file = file.clone(),
            PyoptError::InvalidArguments { .. } | PyoptError::InternalError { .. } => {}
        }
        info
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a PyoptError.
    pub fn from_error(err: &PyoptError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct Payload {
        files: Vec<String>,
    }

    mod envelope_tests {
        use super::*;

        #[test]
        fn ok_response_flattens_payload_after_status() {
            let response = Response::ok(Payload {
                files: vec!["a.py".to_string()],
            });
            let json = serde_json::to_string(&response).unwrap();
            assert!(json.starts_with(r#"{"status":"ok","schema_version":"1","files""#));
        }

        #[test]
        fn parse_error_carries_position() {
            let err = PyoptError::Parse {
                file: Some("bad.py".to_string()),
                line: 2,
                column: 9,
                message: "expected ':'".to_string(),
            };
            let response = ErrorResponse::from_error(&err);
            let json = serde_json::to_string(&response).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

            assert_eq!(parsed["status"], "error");
            assert_eq!(parsed["error"]["code"], 6);
            assert_eq!(parsed["error"]["line"], 2);
            assert_eq!(parsed["error"]["column"], 9);
            assert_eq!(parsed["error"]["file"], "bad.py");
            assert_eq!(parsed["error"]["message"], "expected ':'");
        }

        #[test]
        fn absent_fields_are_omitted() {
            let response = ErrorResponse::from_error(&PyoptError::internal("boom"));
            let json = serde_json::to_string(&response).unwrap();
            assert!(!json.contains("line"));
            assert!(!json.contains("file"));
        }
    }

    mod emit_tests {
        use super::*;

        #[test]
        fn emit_response_produces_valid_json() {
            let response = ErrorResponse::from_error(&PyoptError::file_not_found("x.py"));
            let mut output = Vec::new();
            emit_response(&response, &mut output).unwrap();

            let json_str = String::from_utf8(output).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
            assert_eq!(parsed["error"]["code"], 3);
        }

        #[test]
        fn emit_response_is_deterministic() {
            let response = Response::ok(Payload {
                files: vec!["b.py".to_string(), "a.py".to_string()],
            });
            let mut first = Vec::new();
            let mut second = Vec::new();
            emit_response(&response, &mut first).unwrap();
            emit_response(&response, &mut second).unwrap();
            assert_eq!(first, second);
        }
    }
}
