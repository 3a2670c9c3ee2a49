// Tracker-initiated events: validate the parameter bag, invoke the matching
// callback, answer on the same pipe. An absent callback never fails the
// request; the event is acknowledged and forgotten.

use super::{ok_value, value_text, Fail};
use crate::adapter::Shared;
use crate::connection::Connection;
use crate::types::{Point, Table};
use crate::wire::{Envelope, ErrorCode, Params};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Instant;

pub(crate) fn dispatch(
    shared: &Shared,
    conn: &mut Connection,
    method: &str,
    envelope: &Envelope,
    started: Instant,
) {
    let empty = Params::default();
    let params = envelope.params.as_ref().unwrap_or(&empty);

    if method == "quit" {
        // The response must reach the tracker before the quit callback runs;
        // the callback may tear the process down.
        super::respond(shared, conn, Envelope::ok(envelope.id), started);
        if let Some(callback) = &shared.profile.quit {
            callback();
        }
        return;
    }

    let outcome = match method {
        "menu_selected" => menu_selected(shared, params),
        "note_tab_value" => note_tab_value(shared, params),
        "hands" => hands(shared, params),
        "hands_selected" => hands_selected(shared, params),
        "note_hands" => note_hands(shared, params),
        "tables" => tables(shared, params),
        "import_started" => import_started(shared, params),
        "import_stopped" => import_stopped(shared),
        "stat_value" => stat_value(shared, params),
        "settings_changed" => settings_changed(shared, params),
        "stats_changed" => stats_changed(shared),
        "replay_hand" => replay_hand(shared, params),
        "noop" => noop(shared, params),
        "has_unsaved_changes" => has_unsaved_changes(shared),
        "sleep_begin" => sleep(&shared.profile.sleep_begin),
        "sleep_end" => sleep(&shared.profile.sleep_end),
        other => Err(Fail::new(
            ErrorCode::MethodNotFound,
            format!("invalid method name: {}", other),
        )),
    };

    let response = match outcome {
        Ok(payload) => Envelope::success(envelope.id, payload),
        Err(fail) => Envelope::failure(envelope.id, fail.code, fail.message),
    };
    super::respond(shared, conn, response, started);
}

fn menu_selected(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let menu_item = params.str_of("menu_item")?;
    if let Some(callback) = &shared.profile.menu_selected {
        callback(menu_item);
    }
    Ok(ok_value())
}

fn note_tab_value(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let tab_name = params.str_of("tab_name")?;
    let player_name = params.str_of("player_name")?;
    let site_id = params.i64_of("site_id")?;
    let last_hand_no = params.text_of("last_hand_no")?;

    let Some(callback) = &shared.profile.note_tab_value else {
        return Ok(ok_value());
    };

    let json_text = callback(tab_name, player_name, site_id, &last_hand_no);
    serde_json::from_str(&json_text).map_err(|_| {
        Fail::new(
            ErrorCode::InternalError,
            "note_tab_value callback produced invalid JSON",
        )
    })
}

fn hands(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let encoded = params.str_of("hand")?;
    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| Fail::invalid("invalid or missing hand parameter"))?;
    let hand = String::from_utf8_lossy(&decoded).into_owned();

    if let Some(callback) = &shared.profile.hand {
        callback(&hand);
    }
    Ok(ok_value())
}

fn hands_selected(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let entries = params.array_of("hands")?;

    let menu_item = match params.get("menu_item") {
        None => "",
        Some(Value::String(item)) => item.as_str(),
        Some(_) => return Err(Fail::invalid("invalid menu_item parameter")),
    };

    let mut hands = Vec::with_capacity(entries.len());
    for entry in entries {
        let decoded = BASE64
            .decode(value_text(entry))
            .map_err(|_| Fail::invalid("invalid or missing hands parameter"))?;
        hands.push(String::from_utf8_lossy(&decoded).into_owned());
    }

    if let Some(callback) = &shared.profile.hands_selected {
        callback(&hands, menu_item);
    }
    Ok(ok_value())
}

fn note_hands(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let note_id = params.str_of("note_id")?;

    let hand_ids = match &shared.profile.note_hands {
        Some(callback) => callback(note_id),
        None => Vec::new(),
    };

    serde_json::to_value(hand_ids)
        .map_err(|_| Fail::new(ErrorCode::InternalError, "failed to encode hand identifiers"))
}

fn tables(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let entries = params.array_of("tables")?;
    let tables: Vec<Table> = serde_json::from_value(Value::Array(entries.clone()))
        .map_err(|_| Fail::invalid("invalid or missing tables parameter"))?;

    if let Some(callback) = &shared.profile.tables {
        callback(&tables);
    }
    Ok(ok_value())
}

fn import_started(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let import_type = params.text_of("import_type")?;

    if let Some(callback) = &shared.profile.import_started {
        if !callback(&import_type) {
            return Err(Fail::new(
                ErrorCode::GeneralFailure,
                "callback returned false",
            ));
        }
    }
    Ok(ok_value())
}

fn import_stopped(shared: &Shared) -> Result<Value, Fail> {
    if let Some(callback) = &shared.profile.import_stopped {
        callback();
    }
    Ok(ok_value())
}

fn stat_value(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let player = params.str_of("player")?;
    let site_id = params.i64_of("site_id")?;
    let table_type = params.str_of("table_type")?;
    let stats = params.array_of("stats")?;

    let Some(callback) = &shared.profile.stat_value else {
        return Err(Fail::new(
            ErrorCode::GeneralFailure,
            "no stat_value callback registered",
        ));
    };

    let table_type = if table_type == "cash" { 1 } else { 2 };
    let mut values = Vec::with_capacity(stats.len());
    let mut all_computed = true;
    for stat in stats {
        match callback(&value_text(stat), table_type, site_id, player, "") {
            Some(value) => values.push(value),
            None => {
                all_computed = false;
                values.push(String::new());
            }
        }
    }

    if all_computed {
        Ok(json!(values))
    } else {
        Err(Fail::new(
            ErrorCode::GeneralFailure,
            "stat_value callback error",
        ))
    }
}

fn settings_changed(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let setting = params.text_of("setting")?;
    let new_value = params.text_of("new_value")?;

    if let Some(callback) = &shared.profile.settings_changed {
        callback(&setting, &new_value);
    }
    Ok(ok_value())
}

fn stats_changed(shared: &Shared) -> Result<Value, Fail> {
    if let Some(callback) = &shared.profile.stats_changed {
        callback();
    }
    Ok(ok_value())
}

fn replay_hand(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let hand = params.text_of("hand")?;
    let hwnd = params.i64_of("hwnd")?;
    let entries = params.array_of("center_points")?;

    // Points arrive as "x,y" strings; anything else in the array is skipped.
    let mut center_points = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = value_text(entry);
        let mut coords = text.split(',');
        if let (Some(x), Some(y), None) = (coords.next(), coords.next(), coords.next()) {
            if let (Ok(x), Ok(y)) = (x.trim().parse(), y.trim().parse()) {
                center_points.push(Point { x, y });
            }
        }
    }

    if let Some(callback) = &shared.profile.replay_hand {
        callback(&hand, hwnd, &center_points);
    }
    Ok(ok_value())
}

fn noop(shared: &Shared, params: &Params) -> Result<Value, Fail> {
    let wait = params.i64_of("wait")?;
    let should_fail = params.bool_of("should_fail")?;

    let succeeded = match &shared.profile.noop {
        Some(callback) => callback(wait, should_fail),
        None => false,
    };

    if succeeded {
        Ok(ok_value())
    } else {
        Err(Fail::new(ErrorCode::GeneralFailure, "fail"))
    }
}

fn has_unsaved_changes(shared: &Shared) -> Result<Value, Fail> {
    let unsaved = shared
        .profile
        .has_unsaved_changes
        .as_ref()
        .map(|callback| callback())
        .unwrap_or(false);
    Ok(json!(unsaved))
}

fn sleep(callback: &Option<crate::profile::SleepCallback>) -> Result<Value, Fail> {
    if let Some(callback) = callback {
        callback();
    }
    Ok(ok_value())
}

#[cfg(test)]
mod tests {
    use crate::connection::{Connection, Role};
    use crate::inbound::tests::test_shared;
    use crate::profile::Profile;
    use crate::transport::memory::{pair, MemoryTransport};
    use crate::types::Tracker;
    use crate::wire::{Envelope, ErrorCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn drive(profile: Profile, text: &str) -> (Option<Envelope>, MemoryTransport) {
        let shared = test_shared(profile);
        let (ours, mut theirs) = pair();
        let mut conn = Connection::new(Box::new(ours), Role::Inbound(0));
        crate::inbound::process(&shared, &mut conn, text);
        let response = theirs
            .try_receive()
            .map(|bytes| Envelope::decode(&String::from_utf8_lossy(&bytes)).unwrap());
        (response, theirs)
    }

    fn profile() -> Profile {
        Profile::new(Tracker::PT4, "app", "1.0", "id", "1.0")
    }

    #[test]
    fn menu_selected_invokes_callback_and_acks() {
        let selected = Arc::new(Mutex::new(String::new()));
        let seen = Arc::clone(&selected);
        let mut profile = profile();
        profile.menu_selected = Some(Arc::new(move |item: &str| {
            *seen.lock().unwrap() = item.to_string();
        }));

        let (response, _) = drive(
            profile,
            r#"{"id":4,"method":"menu_selected","params":{"menu_item":"Settings"}}"#,
        );

        let response = response.unwrap();
        assert!(response.is_success());
        assert_eq!(response.result, Some(json!("OK")));
        assert_eq!(*selected.lock().unwrap(), "Settings");
    }

    #[test]
    fn menu_selected_without_item_is_invalid_params() {
        let (response, _) = drive(
            profile(),
            r#"{"id":4,"method":"menu_selected","params":{}}"#,
        );
        assert_eq!(
            response.unwrap().error.unwrap().code,
            ErrorCode::InvalidParams.code()
        );
    }

    #[test]
    fn hands_decodes_base64_before_the_callback() {
        let received = Arc::new(Mutex::new(String::new()));
        let seen = Arc::clone(&received);
        let mut profile = profile();
        profile.hand = Some(Arc::new(move |hand: &str| {
            *seen.lock().unwrap() = hand.to_string();
        }));

        // "hand text" base64-encoded.
        let (response, _) = drive(
            profile,
            r#"{"id":1,"method":"hands","params":{"hand":"aGFuZCB0ZXh0"}}"#,
        );

        assert!(response.unwrap().is_success());
        assert_eq!(*received.lock().unwrap(), "hand text");
    }

    #[test]
    fn note_hands_answers_with_the_callbacks_hand_ids() {
        let mut profile = profile();
        profile.note_hands = Some(Arc::new(|_note_id: &str| {
            vec![crate::types::HandIdentifier {
                site_id: 5,
                hand_no: "77".into(),
            }]
        }));

        let (response, _) = drive(
            profile,
            r#"{"id":2,"method":"note_hands","params":{"note_id":"n1"}}"#,
        );

        assert_eq!(
            response.unwrap().result,
            Some(json!([{"site_id": 5, "hand_no": "77"}]))
        );
    }

    #[test]
    fn has_unsaved_changes_returns_the_callbacks_boolean() {
        let mut with_callback = profile();
        with_callback.has_unsaved_changes = Some(Arc::new(|| true));

        let (response, _) = drive(with_callback, r#"{"id":3,"method":"has_unsaved_changes"}"#);
        assert_eq!(response.unwrap().result, Some(json!(true)));

        // Without a callback the answer defaults to false.
        let (response, _) = drive(profile(), r#"{"id":3,"method":"has_unsaved_changes"}"#);
        assert_eq!(response.unwrap().result, Some(json!(false)));
    }

    #[test]
    fn stat_value_answers_with_one_value_per_stat() {
        let mut profile = profile();
        profile.stat_value = Some(Arc::new(
            |stat: &str, table_type: i64, site_id: i64, player: &str, _filters: &str| {
                assert_eq!(table_type, 1);
                assert_eq!(site_id, 9);
                assert_eq!(player, "hero");
                Some(format!("{}=1", stat))
            },
        ));

        let (response, _) = drive(
            profile,
            r#"{"id":6,"method":"stat_value","params":{"player":"hero","site_id":"9","table_type":"cash","stats":["vpip","pfr"]}}"#,
        );

        assert_eq!(response.unwrap().result, Some(json!(["vpip=1", "pfr=1"])));
    }

    #[test]
    fn stat_value_callback_failure_is_an_error_response() {
        let mut profile = profile();
        profile.stat_value = Some(Arc::new(|_: &str, _, _, _: &str, _: &str| None));

        let (response, _) = drive(
            profile,
            r#"{"id":6,"method":"stat_value","params":{"player":"p","site_id":1,"table_type":"cash","stats":["x"]}}"#,
        );

        let err = response.unwrap().error.unwrap();
        assert_eq!(err.code, ErrorCode::GeneralFailure.code());
        assert_eq!(err.message, "stat_value callback error");
    }

    #[test]
    fn import_started_rejection_becomes_an_error_response() {
        let mut profile = profile();
        profile.import_started = Some(Arc::new(|_: &str| false));

        let (response, _) = drive(
            profile,
            r#"{"id":8,"method":"import_started","params":{"import_type":"auto"}}"#,
        );

        assert_eq!(
            response.unwrap().error.unwrap().message,
            "callback returned false"
        );
    }

    #[test]
    fn quit_acks_before_invoking_the_callback() {
        let shared_peer: Arc<Mutex<Option<MemoryTransport>>> = Arc::new(Mutex::new(None));
        let acked_first = Arc::new(AtomicBool::new(false));

        let peer_in_callback = Arc::clone(&shared_peer);
        let observed = Arc::clone(&acked_first);
        let mut profile = profile();
        profile.quit = Some(Arc::new(move || {
            let mut guard = peer_in_callback.lock().unwrap();
            if let Some(peer) = guard.as_mut() {
                if peer.try_receive().is_some() {
                    observed.store(true, Ordering::SeqCst);
                }
            }
        }));

        let shared = test_shared(profile);
        let (ours, theirs) = pair();
        *shared_peer.lock().unwrap() = Some(theirs);
        let mut conn = Connection::new(Box::new(ours), Role::Inbound(0));

        crate::inbound::process(&shared, &mut conn, r#"{"id":10,"method":"quit"}"#);

        assert!(acked_first.load(Ordering::SeqCst));
    }

    #[test]
    fn replay_hand_parses_center_points() {
        let points = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&points);
        let mut profile = profile();
        profile.replay_hand = Some(Arc::new(
            move |_hand: &str, hwnd: i64, pts: &[crate::types::Point]| {
                assert_eq!(hwnd, 1234);
                *seen.lock().unwrap() = pts.to_vec();
            },
        ));

        let (response, _) = drive(
            profile,
            r#"{"id":11,"method":"replay_hand","params":{"hand":"aGk=","hwnd":1234,"center_points":["10,20","bad","30.5,40"]}}"#,
        );

        assert!(response.unwrap().is_success());
        let points = points.lock().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, 10.0);
        assert_eq!(points[1].y, 40.0);
    }
}
