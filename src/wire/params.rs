use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// String-keyed bag of heterogeneous values. Accessors are typed and fail
/// explicitly, naming the offending parameter; the tracker stringifies some
/// numbers and booleans, so the numeric and boolean accessors accept both
/// encodings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

/// A required parameter is absent or has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError {
    name: String,
}

impl ParamError {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid or missing {} parameter", self.name)
    }
}

impl std::error::Error for ParamError {}

impl Params {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Required string parameter.
    pub fn str_of(&self, name: &str) -> Result<&str, ParamError> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ParamError::new(name))
    }

    /// Required integer parameter; numeric strings are accepted.
    pub fn i64_of(&self, name: &str) -> Result<i64, ParamError> {
        match self.0.get(name) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| ParamError::new(name)),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| ParamError::new(name)),
            _ => Err(ParamError::new(name)),
        }
    }

    /// Required boolean parameter; "true"/"false" strings are accepted.
    pub fn bool_of(&self, name: &str) -> Result<bool, ParamError> {
        match self.0.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ParamError::new(name)),
            },
            _ => Err(ParamError::new(name)),
        }
    }

    /// Required array parameter.
    pub fn array_of(&self, name: &str) -> Result<&Vec<Value>, ParamError> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| ParamError::new(name))
    }

    /// Required parameter of any shape, rendered as text. Identifiers like
    /// hand numbers arrive either quoted or bare.
    pub fn text_of(&self, name: &str) -> Result<String, ParamError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(ParamError::new(name)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Params {
        match value {
            Value::Object(map) => Params::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn typed_accessors_accept_stringified_values() {
        let params = bag(json!({"site_id": "5", "anon": "True", "wait": 10}));
        assert_eq!(params.i64_of("site_id").unwrap(), 5);
        assert!(params.bool_of("anon").unwrap());
        assert_eq!(params.i64_of("wait").unwrap(), 10);
    }

    #[test]
    fn accessor_mismatch_names_the_parameter() {
        let params = bag(json!({"menu_item": 4}));
        let err = params.str_of("menu_item").unwrap_err();
        assert_eq!(err.to_string(), "invalid or missing menu_item parameter");
        assert!(params.str_of("absent").is_err());
        assert!(params.bool_of("menu_item").is_err());
    }

    #[test]
    fn text_of_renders_bare_and_quoted_identifiers() {
        let params = bag(json!({"hand_no": 123456, "note_id": "n-9"}));
        assert_eq!(params.text_of("hand_no").unwrap(), "123456");
        assert_eq!(params.text_of("note_id").unwrap(), "n-9");
        assert!(params.text_of("missing").is_err());
    }
}
