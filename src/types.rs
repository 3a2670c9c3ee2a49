use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which tracker the adapter talks to; selects the API pipe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracker {
    PT4,
    HM3,
}

impl Tracker {
    /// Endpoint name of the tracker's API pipe.
    pub fn endpoint(self) -> &'static str {
        match self {
            Tracker::PT4 => "pt4_api",
            Tracker::HM3 => "hm3_api",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    Cash,
    Tournament,
}

impl TableType {
    pub fn as_str(self) -> &'static str {
        match self {
            TableType::Cash => "cash",
            TableType::Tournament => "tournament",
        }
    }
}

/// Hand-history format requested when registering the hands menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandFormat {
    Xml,
    Json,
}

impl HandFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HandFormat::Xml => "xml",
            HandFormat::Json => "json",
        }
    }
}

/// Identifies one hand in the tracker's database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandIdentifier {
    pub site_id: i64,
    pub hand_no: String,
}

/// A hand plus the street/action position to open the replayer at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandSelector {
    pub site_id: i64,
    pub hand_no: i64,
    pub street: i64,
    pub action: i64,
}

/// Row shape of query_players results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub name: String,
    pub site_id: i64,
    pub anon: bool,
    pub c_hands: i64,
    pub t_hands: i64,
}

/// Row shape of query_notes results. The note text arrives base64-encoded
/// and is decoded before delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerNote {
    pub player: String,
    pub color: String,
    pub note: String,
}

/// One cell of a query_stats / query_ptsql result row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatValue {
    pub value: String,
    pub pct_detail: Option<String>,
}

/// One cell of a query_hmql result row, typed by the query's descriptor row.
#[derive(Debug, Clone, PartialEq)]
pub struct HmqlValue {
    pub value: String,
    pub kind: String,
}

/// Stat definition pushed to the tracker via register_stats / remove_stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    pub table_type: String,
    pub value: String,
    pub description: String,
    pub detail: String,
    pub title: String,
    pub width: i64,
    pub format: String,
    pub categories: Vec<String>,
    pub flags: Vec<String>,
}

/// Stat description returned by get_stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatInfo {
    #[serde(default)]
    pub stat: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub format: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub player_pct: bool,
    #[serde(default)]
    pub hud_safe: bool,
    #[serde(default)]
    pub group_by: bool,
    #[serde(default)]
    pub app_id: i64,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// One open table reported by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub site_id: i64,
    #[serde(default, rename = "table")]
    pub name: String,
    #[serde(default)]
    pub is_tourney: bool,
    #[serde(default)]
    pub hud_showing: bool,
    #[serde(default, rename = "profile_name")]
    pub hud_profile: String,
}

/// A licensing restriction reported during the handshake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restriction {
    pub name: String,
    pub kind: String,
    pub units: String,
    pub value: String,
}

/// Connection metadata from the outbound verify response, forwarded to the
/// connect_info callback and kept readable for the life of the connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionInfo {
    pub root_directory: String,
    pub data_directory: String,
    pub log_directory: String,
    pub restrictions: Vec<Restriction>,
    pub trial: bool,
    pub expires: String,
    pub is_sleeping: bool,
    pub email: String,
    pub tracker_version: String,
    pub api_version: String,
}

/// Payload of the `active_player` setting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentPlayerInfo {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub site_id: String,
}

/// Decoded get_setting payloads for the settings with known shapes;
/// everything else is handed back raw.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    ActivePlayer(CurrentPlayerInfo),
    HudProfiles(Vec<String>),
    HandTags(Vec<Value>),
    Raw(Value),
}

/// Screen coordinate used by replay_hand pushes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Filter for query_players. Unset fields are omitted from the request.
#[derive(Debug, Clone, Default)]
pub struct PlayerQuery {
    pub site_id: Option<i64>,
    pub name: Option<String>,
    pub anonymous: Option<bool>,
    pub game_type: Option<String>,
    pub min_cash_hands: Option<i64>,
    pub max_cash_hands: Option<i64>,
    pub min_tournament_hands: Option<i64>,
    pub max_tournament_hands: Option<i64>,
    pub order_by_fields: Vec<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
