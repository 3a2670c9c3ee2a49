// Wire envelope: one UTF-8 JSON document per message, no length prefix.
// An envelope is exactly one of request/push (has a method), success
// response (has a result), or error response (has an error object).

pub mod params;

pub use params::{ParamError, Params};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed error-code taxonomy. The numeric values are part of the wire
/// contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    /// Unclassified failure. Avoid where a more specific code applies.
    GeneralFailure,
    /// Licensing restrictions prevent satisfying the request.
    Restricted,
    Timeout,
    InvalidState,

    // Pre-defined JSON-RPC codes (http://www.jsonrpc.org/specification#error_object).
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::GeneralFailure => -1,
            ErrorCode::Restricted => 100,
            ErrorCode::Timeout => 110,
            ErrorCode::InvalidState => 120,
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        let code = match code {
            0 => ErrorCode::Success,
            -1 => ErrorCode::GeneralFailure,
            100 => ErrorCode::Restricted,
            110 => ErrorCode::Timeout,
            120 => ErrorCode::InvalidState,
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            _ => return None,
        };
        Some(code)
    }
}

/// Error object carried by an error response. Codes outside the known
/// taxonomy stay representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl WireError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }
}

/// One message on a connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Envelope {
    /// Request with a parameter bag. Anything but a JSON object yields a
    /// bare request, so parameterless requests omit `params` entirely.
    pub fn request(id: i64, method: &str, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => Some(Params::from_map(map)),
            _ => None,
        };
        Self {
            id,
            method: Some(method.to_string()),
            params,
            result: None,
            error: None,
        }
    }

    /// Request without parameters.
    pub fn bare(id: i64, method: &str) -> Self {
        Self::request(id, method, Value::Null)
    }

    pub fn success(id: i64, result: Value) -> Self {
        Self {
            id,
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Success with the canonical empty payload.
    pub fn ok(id: i64) -> Self {
        Self::success(id, Value::String("OK".into()))
    }

    pub fn failure(id: i64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            method: None,
            params: None,
            result: None,
            error: Some(WireError::new(code, message)),
        }
    }

    /// Success is solely the absence of an error object.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Result payload of a success response; a missing `result` is the
    /// canonical `"OK"`.
    pub fn result_or_ok(&self) -> Value {
        self.result
            .clone()
            .unwrap_or_else(|| Value::String("OK".into()))
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameterless_request_omits_params() {
        let text = Envelope::bare(3, "busy_state_begin").encode().unwrap();
        assert_eq!(text, r#"{"id":3,"method":"busy_state_begin"}"#);
    }

    #[test]
    fn request_carries_parameter_bag() {
        let env = Envelope::request(1, "get_setting", json!({"name": "active_player"}));
        let text = env.encode().unwrap();
        assert_eq!(
            text,
            r#"{"id":1,"method":"get_setting","params":{"name":"active_player"}}"#
        );
    }

    #[test]
    fn response_without_result_or_error_is_ok_success() {
        let env = Envelope::decode(r#"{"id":7}"#).unwrap();
        assert!(env.is_success());
        assert_eq!(env.result_or_ok(), Value::String("OK".into()));
    }

    #[test]
    fn error_response_decodes_without_touching_result() {
        let env = Envelope::decode(r#"{"id":1,"error":{"code":-32601,"message":"x"}}"#).unwrap();
        assert!(!env.is_success());
        let err = env.error.unwrap();
        assert_eq!(err.code, ErrorCode::MethodNotFound.code());
        assert_eq!(err.message, "x");
        assert!(env.result.is_none());
    }

    #[test]
    fn unknown_error_codes_survive_decoding() {
        let env = Envelope::decode(r#"{"id":1,"error":{"code":42}}"#).unwrap();
        let err = env.error.unwrap();
        assert_eq!(err.code, 42);
        assert_eq!(err.message, "");
        assert!(ErrorCode::from_code(42).is_none());
    }

    #[test]
    fn taxonomy_round_trips() {
        for code in [
            ErrorCode::Success,
            ErrorCode::GeneralFailure,
            ErrorCode::Restricted,
            ErrorCode::Timeout,
            ErrorCode::InvalidState,
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::ParseError.code(), -32700);
    }
}
