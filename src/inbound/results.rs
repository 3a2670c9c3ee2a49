// Correlation of result_callback pushes with their pending calls, and
// delivery of the decoded payload: row-list results stream row by row, with
// the consumer handed the still-open stream on the first row; scalar-list
// results arrive in one call; side-channel results are read out of band.
//
// The push itself is acknowledged after decoding, before the listener reads
// its next message, independent of whether the underlying call succeeded.

use super::{ok_value, value_text, Fail};
use crate::adapter::Shared;
use crate::blob::{split_hands, BlobSource};
use crate::connection::Connection;
use crate::pending::{Consumer, Pending, DEFERRED_METHODS};
use crate::stream::{row_channel, RowStream};
use crate::types::{HmqlValue, PlayerNote, StatValue};
use crate::wire::{Envelope, ErrorCode, Params};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

pub(crate) fn handle(
    shared: &Shared,
    conn: &mut Connection,
    envelope: &Envelope,
    started: Instant,
) {
    let empty = Params::default();
    let params = envelope.params.as_ref().unwrap_or(&empty);

    let response = resolve(shared, params);
    let response = match response {
        Ok(payload) => Envelope::success(envelope.id, payload),
        Err(fail) => Envelope::failure(envelope.id, fail.code, fail.message),
    };
    super::respond(shared, conn, response, started);
}

fn resolve(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let caller_id = params
        .i64_of("caller_id")
        .map_err(|_| Fail::invalid("invalid callback - missing caller_id"))?;
    let caller_method = params
        .str_of("caller_method")
        .map_err(|_| Fail::invalid("invalid callback - missing caller_method"))?;

    let error = params.get("error").filter(|value| !value.is_null());
    let result = params.get("result").filter(|value| !value.is_null());
    if error.is_none() && result.is_none() {
        return Err(Fail::invalid("invalid callback - missing error or result"));
    }

    if error.is_some() {
        // A pushed error is a valid, already-complete outcome: consume the
        // pending call and acknowledge without decoding further.
        if shared.pending.take(caller_method).is_some() {
            warn!(
                "[SERVER] {} (caller_id {}) resolved with a tracker-side error",
                caller_method, caller_id
            );
        }
        return Ok(ok_value());
    }

    if !DEFERRED_METHODS.contains(caller_method) {
        return Err(Fail::invalid(
            "invalid callback - unrecognized caller_method",
        ));
    }

    let Some(pending) = shared.pending.take(caller_method) else {
        // Stale or abandoned call; the single-slot policy drops its result.
        warn!(
            "[SERVER] no pending {} call for caller_id {}",
            caller_method, caller_id
        );
        return Ok(ok_value());
    };

    let result = result.cloned().unwrap_or(Value::Null);
    deliver(caller_id, pending, result).map(|()| ok_value())
}

fn deliver(caller_id: i64, pending: Pending, result: Value) -> Result<(), Fail> {
    match pending.consumer {
        Consumer::Players(callback) => {
            stream_rows(caller_id, rows_of(result), callback, |row| {
                serde_json::from_value(row).ok()
            });
            Ok(())
        }
        Consumer::Notes(callback) => {
            stream_rows(caller_id, rows_of(result), callback, decode_note);
            Ok(())
        }
        Consumer::StatRows(callback) => {
            stream_rows(caller_id, rows_of(result), callback, decode_stat_row);
            Ok(())
        }
        Consumer::Hmql(callback) => {
            deliver_hmql(caller_id, rows_of(result), callback);
            Ok(())
        }
        Consumer::Hands(callback) => {
            let hands = rows_of(result).iter().map(value_text).collect();
            callback(caller_id, hands);
            Ok(())
        }
        Consumer::HandTags(callback) => {
            let tags = rows_of(result).iter().map(tag_text).collect();
            callback(caller_id, tags);
            Ok(())
        }
        Consumer::StatNames(callback) => {
            let names = rows_of(result).iter().map(value_text).collect();
            callback(caller_id, names);
            Ok(())
        }
        Consumer::SelectStats(callback) => {
            let cancelled = cancelled_flag(&result)?;
            let selected = result.get("selected_stats").and_then(Value::as_array);
            if selected.is_none() && !cancelled {
                return Err(Fail::invalid("missing selected_stats parameter"));
            }
            let stats = selected
                .map(|entries| entries.iter().map(value_text).collect())
                .unwrap_or_default();
            callback(caller_id, cancelled, stats);
            Ok(())
        }
        Consumer::SelectFilters(callback) => {
            let cancelled = cancelled_flag(&result)?;
            let filters = result.get("filters").filter(|value| !value.is_null());
            if filters.is_none() && !cancelled {
                return Err(Fail::invalid("missing filters parameter"));
            }
            let filters = filters.map(Value::to_string).unwrap_or_default();
            callback(caller_id, cancelled, filters);
            Ok(())
        }
        Consumer::Completion(callback) => {
            callback(caller_id);
            Ok(())
        }
        Consumer::Blob { source, callback } => deliver_blob(caller_id, &result, source, callback),
    }
}

/// Row-list delivery. The consumer receives the stream handle on the first
/// decoded row and must hand it to whichever thread drains it: the remaining
/// rows are pushed after the callback returns, on this listener thread. An
/// empty result still invokes the consumer once, with a completed stream.
fn stream_rows<T, F>(
    caller_id: i64,
    rows: Vec<Value>,
    callback: Box<dyn FnOnce(i64, RowStream<T>) + Send>,
    decode: F,
) where
    F: Fn(Value) -> Option<T>,
{
    let (sink, stream) = row_channel();
    let mut delivery = Some((callback, stream));

    for row in rows {
        match decode(row) {
            Some(decoded) => {
                sink.push(decoded);
                if let Some((callback, stream)) = delivery.take() {
                    callback(caller_id, stream);
                }
            }
            None => warn!("[SERVER] skipping undecodable result row"),
        }
    }
    sink.complete();

    if let Some((callback, stream)) = delivery.take() {
        callback(caller_id, stream);
    }
}

/// The first row of an HMQL result describes the column types and is
/// consumed internally; only the data rows reach the consumer.
fn deliver_hmql(
    caller_id: i64,
    rows: Vec<Value>,
    callback: Box<dyn FnOnce(i64, RowStream<Vec<HmqlValue>>) + Send>,
) {
    let (sink, stream) = row_channel();
    let mut delivery = Some((callback, stream));
    let mut types: Vec<String> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(cells) = row.as_array() else {
            warn!("[SERVER] skipping undecodable result row");
            continue;
        };
        if index == 0 {
            types = cells.iter().map(value_text).collect();
            continue;
        }

        let decoded = cells
            .iter()
            .enumerate()
            .map(|(column, cell)| HmqlValue {
                value: value_text(cell),
                kind: types.get(column).cloned().unwrap_or_default(),
            })
            .collect();
        sink.push(decoded);
        if let Some((callback, stream)) = delivery.take() {
            callback(caller_id, stream);
        }
    }
    sink.complete();

    if let Some((callback, stream)) = delivery.take() {
        callback(caller_id, stream);
    }
}

fn deliver_blob(
    caller_id: i64,
    result: &Value,
    mut source: Box<dyn BlobSource>,
    callback: Box<dyn FnOnce(i64, Vec<String>) + Send>,
) -> Result<(), Fail> {
    // Shared-memory completions report bytes_written; the mapping has no end
    // marker of its own. File completions carry a plain byte count the file
    // itself supersedes.
    let len = result
        .get("bytes_written")
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    let bytes = source.read(len).map_err(|err| {
        Fail::new(
            ErrorCode::InternalError,
            format!("failed to read side channel: {}", err),
        )
    })?;
    callback(caller_id, split_hands(&bytes));
    Ok(())
}

fn rows_of(result: Value) -> Vec<Value> {
    match result {
        Value::Array(rows) => rows,
        other => {
            // Completion metadata for side-channel calls also lands here;
            // anything that is not an array simply has no rows.
            if !other.is_null() {
                warn!("[SERVER] expected an array result, got {}", other);
            }
            Vec::new()
        }
    }
}

fn decode_note(row: Value) -> Option<PlayerNote> {
    #[derive(Deserialize)]
    struct WireNote {
        player: String,
        color: String,
        note: String,
    }

    let note: WireNote = serde_json::from_value(row).ok()?;
    let decoded = BASE64.decode(&note.note).ok()?;
    Some(PlayerNote {
        player: note.player,
        color: note.color,
        note: String::from_utf8_lossy(&decoded).into_owned(),
    })
}

// A stat row is an array of {v, %?} cells; cells without a value are
// dropped.
fn decode_stat_row(row: Value) -> Option<Vec<StatValue>> {
    let cells = match row {
        Value::Array(cells) => cells,
        _ => return None,
    };

    let mut decoded = Vec::with_capacity(cells.len());
    for cell in &cells {
        let Some(value) = cell.get("v") else {
            warn!("[SERVER] skipping stat cell without a value");
            continue;
        };
        decoded.push(StatValue {
            value: value_text(value),
            pct_detail: cell
                .get("%")
                .filter(|detail| !detail.is_null())
                .map(value_text),
        });
    }
    Some(decoded)
}

// Hand tags arrive either as bare strings or as {tag: ...} objects.
fn tag_text(entry: &Value) -> String {
    match entry.get("tag") {
        Some(tag) => value_text(tag),
        None => value_text(entry),
    }
}

// The tracker stringifies the cancelled flag; both encodings are accepted.
fn cancelled_flag(result: &Value) -> Result<bool, Fail> {
    match result.get("cancelled") {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => {
            if text.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if text.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(Fail::invalid("invalid cancelled parameter"))
            }
        }
        Some(_) => Err(Fail::invalid("invalid cancelled parameter")),
    }
}
