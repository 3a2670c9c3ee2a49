// Outbound request construction, one builder per operation. Field names and
// shapes are the tracker's wire contract; builders never omit a required
// field and never send an optional one the caller left unset.

use crate::types::{HandFormat, HandIdentifier, HandSelector, PlayerQuery, Stat, TableType};
use crate::wire::Envelope;
use serde_json::{json, Map, Value};

/// Server-side execution hint embedded in every query_stats request. The
/// client does not enforce it.
const QUERY_STATS_TIMEOUT_MS: i64 = 15_000;

pub(crate) fn register(id: i64, name: &str, version: &str, requested_api_version: &str) -> Envelope {
    Envelope::request(
        id,
        "register",
        json!({
            "name": name,
            "version": version,
            "requested_api_version": requested_api_version,
        }),
    )
}

pub(crate) fn verify(id: i64, hash: &str, mode: &str) -> Envelope {
    Envelope::request(id, "verify", json!({"hash": hash, "mode": mode}))
}

pub(crate) fn register_menu(id: i64, menu_items: &[String]) -> Envelope {
    Envelope::request(id, "register_menu", json!({"menu_items": menu_items}))
}

pub(crate) fn register_note_tab(id: i64, tab_name: &str, tab_icon: &str) -> Envelope {
    Envelope::request(
        id,
        "register_note_tab",
        json!({"tab_name": tab_name, "tab_icon": tab_icon}),
    )
}

pub(crate) fn register_hands_menu(
    id: i64,
    menu_items: &[String],
    menu_icon: &str,
    format: HandFormat,
) -> Envelope {
    Envelope::request(
        id,
        "register_hands_menu",
        json!({
            "menu_items": menu_items,
            "menu_icon": menu_icon,
            "format": format.as_str(),
        }),
    )
}

// wait and should_fail are stringified on the wire.
pub(crate) fn noop(id: i64, wait: i64, should_fail: bool, extra_bytes: Option<&str>) -> Envelope {
    let mut params = Map::new();
    params.insert("wait".into(), Value::String(wait.to_string()));
    params.insert(
        "should_fail".into(),
        Value::String(should_fail.to_string()),
    );
    if let Some(extra) = extra_bytes {
        if !extra.is_empty() {
            params.insert("extra_bytes".into(), Value::String(extra.to_string()));
        }
    }
    Envelope::request(id, "noop", Value::Object(params))
}

pub(crate) fn request_hands(id: i64) -> Envelope {
    Envelope::bare(id, "request_hands")
}

pub(crate) fn request_tables(id: i64) -> Envelope {
    Envelope::bare(id, "request_tables")
}

pub(crate) fn get_stats(id: i64, table_type: TableType, full_details: bool) -> Envelope {
    Envelope::request(
        id,
        "get_stats",
        json!({"table_type": table_type.as_str(), "full_details": full_details}),
    )
}

pub(crate) fn register_stats(id: i64, stats: &[Stat]) -> Envelope {
    Envelope::request(id, "register_stats", json!({"stats": stats}))
}

pub(crate) fn remove_stats(id: i64, stats: &[Stat]) -> Envelope {
    Envelope::request(id, "remove_stats", json!({"stats": stats}))
}

pub(crate) fn register_positional_stats(
    id: i64,
    stats: &[String],
    table_type: &str,
    has_position: Option<&str>,
    position_type: Option<&str>,
) -> Envelope {
    let mut params = Map::new();
    params.insert("stats".into(), json!(stats));
    params.insert("table_type".into(), Value::String(table_type.to_string()));
    if let Some(has_position) = has_position {
        params.insert("has_position".into(), Value::String(has_position.into()));
    }
    if let Some(position_type) = position_type {
        params.insert("position_type".into(), Value::String(position_type.into()));
    }
    Envelope::request(id, "register_positional_stats", Value::Object(params))
}

pub(crate) fn select_stats(
    id: i64,
    table_type: TableType,
    included_stats: &[String],
    default_stats: &[String],
) -> Envelope {
    Envelope::request(
        id,
        "select_stats",
        json!({
            "included_stats": included_stats,
            "default_stats": default_stats,
            "table_type": table_type.as_str(),
        }),
    )
}

pub(crate) fn select_filters(id: i64, table_type: &str, filters: Value) -> Envelope {
    Envelope::request(
        id,
        "select_filters",
        json!({"filters": filters, "table_type": table_type}),
    )
}

pub(crate) fn get_hands(id: i64, hands: &[HandIdentifier], include_native: bool) -> Envelope {
    Envelope::request(
        id,
        "get_hands",
        json!({"hands": hands, "include_native": include_native}),
    )
}

pub(crate) fn get_hands_to_file(
    id: i64,
    hands: &[HandIdentifier],
    file_name: &str,
    include_native: bool,
) -> Envelope {
    Envelope::request(
        id,
        "get_hands_to_file",
        json!({
            "hands": hands,
            "file_name": file_name,
            "include_native": include_native,
        }),
    )
}

pub(crate) fn get_hands_to_shared_memory(
    id: i64,
    hands: &[HandIdentifier],
    memory_name: &str,
    memory_size: usize,
    include_native: bool,
) -> Envelope {
    Envelope::request(
        id,
        "get_hands_to_shared_memory",
        json!({
            "hands": hands,
            "memory_name": memory_name,
            "memory_size": memory_size,
            "include_native": include_native,
        }),
    )
}

pub(crate) fn get_hand_tags(id: i64, site_id: i64, hand_no: &str) -> Envelope {
    Envelope::request(
        id,
        "get_hand_tags",
        json!({"site_id": site_id, "hand_no": hand_no}),
    )
}

pub(crate) fn import_hand(id: i64, site_id: i64, encoded_hand: &str) -> Envelope {
    Envelope::request(
        id,
        "import_hand",
        json!({"hand_history": encoded_hand, "site_id": site_id}),
    )
}

pub(crate) fn change_hud_profile(
    id: i64,
    site_id: i64,
    table: &str,
    profile_name: &str,
) -> Envelope {
    Envelope::request(
        id,
        "change_hud_profile",
        json!({"table": table, "site_id": site_id, "profile_name": profile_name}),
    )
}

pub(crate) fn import_hud_profile(
    id: i64,
    file_name: &str,
    profile_name: &str,
    table_type: TableType,
) -> Envelope {
    Envelope::request(
        id,
        "import_hud_profile",
        json!({
            "table_type": table_type.as_str(),
            "file_name": file_name,
            "profile_name": profile_name,
        }),
    )
}

pub(crate) fn replay_hands(id: i64, hand_selectors: &[HandSelector]) -> Envelope {
    Envelope::request(id, "replay_hands", json!({"hand_selectors": hand_selectors}))
}

pub(crate) fn get_setting(id: i64, name: &str) -> Envelope {
    Envelope::request(id, "get_setting", json!({"name": name}))
}

pub(crate) fn busy_state_begin(id: i64) -> Envelope {
    Envelope::bare(id, "busy_state_begin")
}

pub(crate) fn busy_state_end(id: i64) -> Envelope {
    Envelope::bare(id, "busy_state_end")
}

pub(crate) fn query_players(id: i64, query: &PlayerQuery) -> Envelope {
    let mut params = Map::new();
    if let Some(site_id) = query.site_id {
        params.insert("site_id".into(), json!(site_id));
    }
    if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
        params.insert("name".into(), json!(name));
    }
    if let Some(anonymous) = query.anonymous {
        params.insert("anonymous".into(), json!(anonymous));
    }
    if let Some(game_type) = query.game_type.as_deref().filter(|g| !g.is_empty()) {
        params.insert("game_type".into(), json!(game_type));
    }

    let mut cash = Map::new();
    if let Some(min) = query.min_cash_hands {
        cash.insert("min".into(), json!(min));
    }
    if let Some(max) = query.max_cash_hands {
        cash.insert("max".into(), json!(max));
    }
    if !cash.is_empty() {
        params.insert("cash_hands".into(), Value::Object(cash));
    }

    let mut tournament = Map::new();
    if let Some(min) = query.min_tournament_hands {
        tournament.insert("min".into(), json!(min));
    }
    if let Some(max) = query.max_tournament_hands {
        tournament.insert("max".into(), json!(max));
    }
    if !tournament.is_empty() {
        params.insert("tournament_hands".into(), Value::Object(tournament));
    }

    if let Some(limit) = query.limit {
        params.insert("limit".into(), json!(limit));
    }
    if let Some(offset) = query.offset {
        params.insert("offset".into(), json!(offset));
    }

    if query.order.is_some() || !query.order_by_fields.is_empty() {
        params.insert(
            "order_by".into(),
            json!({"order": &query.order, "fields": &query.order_by_fields}),
        );
    }

    Envelope::request(id, "query_players", Value::Object(params))
}

pub(crate) fn query_notes(id: i64, site_id: i64, players: &[String]) -> Envelope {
    Envelope::request(
        id,
        "query_notes",
        json!({"site_id": site_id, "players": players}),
    )
}

pub(crate) fn hud_notes(
    id: i64,
    site_id: i64,
    player: &str,
    table_window: i64,
    pos_x: i64,
    pos_y: i64,
) -> Envelope {
    Envelope::request(
        id,
        "hud_notes",
        json!({
            "site_id": site_id,
            "player": player,
            "table_window": table_window,
            "position": format!("{},{}", pos_x, pos_y),
        }),
    )
}

pub(crate) fn query_stats(
    id: i64,
    table_type: TableType,
    site_id: i64,
    players: &[String],
    stats: &[String],
    filters: Option<Value>,
) -> Envelope {
    let mut params = Map::new();
    params.insert(
        "table_type".into(),
        Value::String(table_type.as_str().into()),
    );
    params.insert("timeout".into(), json!(QUERY_STATS_TIMEOUT_MS));
    params.insert("players".into(), json!(players));
    params.insert("stats".into(), json!(stats));
    params.insert("site_id".into(), json!(site_id));
    if let Some(filters) = filters {
        params.insert("filters".into(), filters);
    }
    Envelope::request(id, "query_stats", Value::Object(params))
}

pub(crate) fn query_hmql(id: i64, query: &str) -> Envelope {
    Envelope::request(id, "query_hmql", json!({"query": query}))
}

pub(crate) fn query_ptsql(
    id: i64,
    table_type: &str,
    stats: &[String],
    active_player: bool,
    hand_query: bool,
) -> Envelope {
    Envelope::request(
        id,
        "query_ptsql",
        json!({
            "table_type": table_type,
            "stats": stats,
            "active_player": active_player,
            "hand_query": hand_query,
        }),
    )
}

pub(crate) fn cancel_callback(id: i64, caller_id: i64) -> Envelope {
    Envelope::request(id, "cancel_callback", json!({"caller_id": caller_id}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_query_omits_unset_fields() {
        let query = PlayerQuery {
            site_id: Some(5),
            min_cash_hands: Some(100),
            ..PlayerQuery::default()
        };
        let env = query_players(1, &query);
        let params = env.params.unwrap();
        assert_eq!(params.get("site_id"), Some(&json!(5)));
        assert_eq!(params.get("cash_hands"), Some(&json!({"min": 100})));
        assert!(params.get("name").is_none());
        assert!(params.get("tournament_hands").is_none());
        assert!(params.get("order_by").is_none());
    }

    #[test]
    fn player_query_orders_when_asked() {
        let query = PlayerQuery {
            order: Some("desc".into()),
            order_by_fields: vec!["c_hands".into()],
            ..PlayerQuery::default()
        };
        let params = query_players(1, &query).params.unwrap();
        assert_eq!(
            params.get("order_by"),
            Some(&json!({"order": "desc", "fields": ["c_hands"]}))
        );
    }

    #[test]
    fn query_stats_embeds_the_timeout_hint() {
        let env = query_stats(
            2,
            TableType::Cash,
            1,
            &["hero".into()],
            &["vpip".into()],
            None,
        );
        let params = env.params.unwrap();
        assert_eq!(params.get("timeout"), Some(&json!(15000)));
        assert_eq!(params.get("table_type"), Some(&json!("cash")));
        assert!(params.get("filters").is_none());
    }

    #[test]
    fn noop_stringifies_wait_and_should_fail() {
        let env = noop(3, 250, true, None);
        let params = env.params.unwrap();
        assert_eq!(params.get("wait"), Some(&json!("250")));
        assert_eq!(params.get("should_fail"), Some(&json!("true")));
        assert!(params.get("extra_bytes").is_none());
    }

    #[test]
    fn hand_identifiers_serialize_with_wire_names() {
        let hands = vec![HandIdentifier {
            site_id: 5,
            hand_no: "123".into(),
        }];
        let env = get_hands(4, &hands, false);
        let params = env.params.unwrap();
        assert_eq!(
            params.get("hands"),
            Some(&json!([{"site_id": 5, "hand_no": "123"}]))
        );
    }
}
