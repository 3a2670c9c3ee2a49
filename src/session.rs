// Per-connection handshake: register to obtain a salt, then verify with the
// application's hash of it. Every pipe, inbound and outbound, handshakes
// independently before any listener starts.

use crate::connection::Connection;
use crate::error::{AdapterError, Result};
use crate::requests;
use crate::types::{ConnectionInfo, Restriction};
use serde_json::Value;

/// Transient state carried from register into verify.
pub(crate) struct HandshakeState {
    pub salt: String,
    pub tracker_version: String,
    /// Version the tracker negotiated; feeds later registers and the
    /// connection info.
    pub api_version: String,
}

/// Role string sent in the verify request. Inbound pipes verify as the
/// server side (they receive pushes), the outbound pipe as the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VerifyMode {
    Client,
    Server,
}

impl VerifyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VerifyMode::Client => "client",
            VerifyMode::Server => "server",
        }
    }
}

pub(crate) fn register(
    conn: &mut Connection,
    id: i64,
    app_name: &str,
    app_version: &str,
    requested_api_version: &str,
) -> Result<HandshakeState> {
    let response = conn.call(&requests::register(
        id,
        app_name,
        app_version,
        requested_api_version,
    ))?;
    if let Some(err) = response.error {
        return Err(AdapterError::Handshake(format!(
            "{} register rejected: {} ({})",
            conn.role(),
            err.message,
            err.code
        )));
    }

    let result = response.result.unwrap_or(Value::Null);
    Ok(HandshakeState {
        salt: field(&result, "salt"),
        tracker_version: field(&result, "tracker_version"),
        api_version: field(&result, "api_version"),
    })
}

/// Returns the verify result payload; only the outbound connection's carries
/// connection metadata.
pub(crate) fn verify(
    conn: &mut Connection,
    id: i64,
    hash: &str,
    mode: VerifyMode,
) -> Result<Option<Value>> {
    let response = conn.call(&requests::verify(id, hash, mode.as_str()))?;
    if let Some(err) = response.error {
        return Err(AdapterError::Handshake(format!(
            "{} verify rejected: {} ({})",
            conn.role(),
            err.message,
            err.code
        )));
    }
    Ok(response.result)
}

pub(crate) fn decode_connection_info(
    result: &Value,
    tracker_version: &str,
    api_version: &str,
) -> ConnectionInfo {
    let restrictions = result
        .get("restrictions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| Restriction {
                    name: field(entry, "name"),
                    kind: field(entry, "type"),
                    units: field(entry, "units"),
                    value: field(entry, "value"),
                })
                .collect()
        })
        .unwrap_or_default();

    ConnectionInfo {
        root_directory: field(result, "root_directory"),
        data_directory: field(result, "data_directory"),
        log_directory: field(result, "log_directory"),
        restrictions,
        trial: flag(result, "trial"),
        expires: field(result, "expires"),
        is_sleeping: flag(result, "is_sleeping"),
        email: field(result, "email"),
        tracker_version: tracker_version.to_string(),
        api_version: api_version.to_string(),
    }
}

// Missing fields decode to their defaults; trackers differ in how much of
// the metadata they send.
fn field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_info_decodes_metadata_and_restrictions() {
        let result = json!({
            "root_directory": "C:\\PT4",
            "data_directory": "C:\\PT4\\data",
            "log_directory": "C:\\PT4\\log",
            "trial": true,
            "expires": "2026-12-31",
            "is_sleeping": false,
            "email": "user@example.com",
            "restrictions": [
                {"name": "hands", "type": "limit", "units": "count", "value": "1000"}
            ]
        });

        let info = decode_connection_info(&result, "4.17.3", "1.4");
        assert_eq!(info.root_directory, "C:\\PT4");
        assert!(info.trial);
        assert_eq!(info.restrictions.len(), 1);
        assert_eq!(info.restrictions[0].kind, "limit");
        assert_eq!(info.restrictions[0].value, "1000");
        assert_eq!(info.tracker_version, "4.17.3");
        assert_eq!(info.api_version, "1.4");
    }

    #[test]
    fn connection_info_tolerates_an_empty_result() {
        let info = decode_connection_info(&Value::Null, "", "");
        assert_eq!(info, ConnectionInfo::default());
    }
}
