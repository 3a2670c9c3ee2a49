// Listener pool: one thread per inbound pipe, reading tracker pushes until
// disconnect. Each message is sanitized, parsed, dispatched by method name,
// and answered on the same pipe.

pub(crate) mod events;
pub(crate) mod results;

use crate::adapter::Shared;
use crate::connection::Connection;
use crate::wire::{Envelope, ErrorCode, ParamError};
use log::{debug, warn};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

pub(crate) fn spawn(shared: Arc<Shared>, conn: Connection) -> JoinHandle<()> {
    std::thread::spawn(move || serve(shared, conn))
}

fn serve(shared: Arc<Shared>, mut conn: Connection) {
    debug!("[SERVER] {} listener started", conn.role());

    while shared.running.load(Ordering::SeqCst) {
        let text = match conn.receive_text() {
            Ok(text) => text,
            Err(err) => {
                if shared.running.load(Ordering::SeqCst) {
                    warn!("[SERVER] {} read failed: {}", conn.role(), err);
                }
                break;
            }
        };

        let Some(text) = sanitize(text) else {
            continue;
        };
        process(&shared, &mut conn, &text);
    }

    debug!("[SERVER] {} listener stopped", conn.role());
}

/// Pre-parse hygiene, applied in order. `None` means drop the message
/// without responding: a corrupt message cannot reliably be attributed an id
/// to respond to.
fn sanitize(mut text: String) -> Option<String> {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
        debug!("[SERVER] sanitized request: removed CR+LF");
    }
    if text == "\u{feff}" {
        debug!("[SERVER] skipping bad request: lone BOM");
        return None;
    }
    if text.trim().is_empty() {
        debug!("[SERVER] skipping bad request: null or empty");
        return None;
    }
    if text.chars().count() < 5 {
        debug!("[SERVER] skipping bad request: shorter than 5 chars ({:?})", text);
        return None;
    }
    Some(text)
}

fn process(shared: &Shared, conn: &mut Connection, text: &str) {
    let started = Instant::now();

    let envelope = match Envelope::decode(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            // Deliberately no response; see sanitize.
            debug!("[SERVER] skipping unparseable request: {}", err);
            return;
        }
    };

    let method = match envelope.method.as_deref() {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => {
            respond(
                shared,
                conn,
                Envelope::failure(envelope.id, ErrorCode::InvalidRequest, "null or empty method name"),
                started,
            );
            return;
        }
    };

    debug!("[SERVER] {} push: {}", conn.role(), text);

    match method.as_str() {
        "result_callback" => results::handle(shared, conn, &envelope, started),
        other => events::dispatch(shared, conn, other, &envelope, started),
    }
}

/// Render a JSON value as bare text: strings lose their quotes, everything
/// else keeps its JSON form. Identifiers and stat cells arrive both ways.
pub(super) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(super) fn ok_value() -> Value {
    Value::String("OK".into())
}

/// A request that was understood but cannot be served; becomes an error
/// response on the same pipe.
pub(super) struct Fail {
    pub code: ErrorCode,
    pub message: String,
}

impl Fail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }
}

impl From<ParamError> for Fail {
    fn from(err: ParamError) -> Self {
        Fail::invalid(err.to_string())
    }
}

pub(super) fn respond(shared: &Shared, conn: &mut Connection, response: Envelope, started: Instant) {
    shared.server_stats.record(started.elapsed());
    if let Err(err) = conn.respond(&response) {
        warn!("[SERVER] {} failed to write response: {}", conn.role(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Role;
    use crate::profile::Profile;
    use crate::transport::memory::{pair, MemoryTransport};
    use crate::types::Tracker;

    pub(crate) fn test_shared(profile: Profile) -> Arc<Shared> {
        let shared = Shared::new(profile);
        shared.running.store(true, Ordering::SeqCst);
        Arc::new(shared)
    }

    pub(crate) fn harness() -> (Arc<Shared>, Connection, MemoryTransport) {
        let shared = test_shared(Profile::new(Tracker::PT4, "app", "1.0", "id", "1.0"));
        let (ours, theirs) = pair();
        (shared, Connection::new(Box::new(ours), Role::Inbound(0)), theirs)
    }

    fn response_of(peer: &mut MemoryTransport) -> Option<Envelope> {
        peer.try_receive()
            .map(|bytes| Envelope::decode(&String::from_utf8_lossy(&bytes)).unwrap())
    }

    #[test]
    fn sanitize_strips_a_single_trailing_crlf() {
        assert_eq!(
            sanitize("{\"id\":1}\r\n".to_string()).as_deref(),
            Some("{\"id\":1}")
        );
    }

    #[test]
    fn sanitize_drops_bom_empty_and_short_messages() {
        assert_eq!(sanitize("\u{feff}".to_string()), None);
        assert_eq!(sanitize(String::new()), None);
        assert_eq!(sanitize("   ".to_string()), None);
        assert_eq!(sanitize("{\"}".to_string()), None);
        // Five characters pass sanitization even when they are not JSON.
        assert!(sanitize("nope!".to_string()).is_some());
    }

    #[test]
    fn malformed_messages_produce_no_response() {
        let (shared, mut conn, mut peer) = harness();

        for bad in ["\u{feff}", "", "  ", "{\"i}", "not valid json"] {
            if let Some(text) = sanitize(bad.to_string()) {
                process(&shared, &mut conn, &text);
            }
            assert!(response_of(&mut peer).is_none(), "responded to {:?}", bad);
        }
    }

    #[test]
    fn missing_method_gets_an_invalid_request_response() {
        let (shared, mut conn, mut peer) = harness();

        process(&shared, &mut conn, r#"{"id":9,"params":{}}"#);

        let response = response_of(&mut peer).unwrap();
        assert_eq!(response.id, 9);
        assert_eq!(
            response.error.unwrap().code,
            ErrorCode::InvalidRequest.code()
        );
    }

    #[test]
    fn unknown_method_gets_method_not_found() {
        let (shared, mut conn, mut peer) = harness();

        process(&shared, &mut conn, r#"{"id":2,"method":"mystery"}"#);

        let response = response_of(&mut peer).unwrap();
        assert_eq!(
            response.error.unwrap().code,
            ErrorCode::MethodNotFound.code()
        );
    }
}
