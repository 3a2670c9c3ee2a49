use crate::types::{ConnectionInfo, HandIdentifier, Point, Table, Tracker};
use std::sync::Arc;

// Connection callbacks.

/// Produces the verify hash from the salt issued by register. The keyed-hash
/// scheme is owned by the application; the adapter only forwards the result.
pub type HashCallback = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Invoked after the quit push has been acknowledged. May tear the process
/// down; nothing is sent on the connection afterwards.
pub type QuitCallback = Arc<dyn Fn() + Send + Sync>;
pub type ConnectInfoCallback = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;

// Tracker-initiated event callbacks.

pub type MenuSelectedCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// (tab_name, player_name, site_id, last_hand_no) -> JSON text used verbatim
/// as the response payload.
pub type NoteTabValueCallback = Arc<dyn Fn(&str, &str, i64, &str) -> String + Send + Sync>;
pub type HandCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type HandsSelectedCallback = Arc<dyn Fn(&[String], &str) + Send + Sync>;
pub type NoteHandsCallback = Arc<dyn Fn(&str) -> Vec<HandIdentifier> + Send + Sync>;
pub type TablesCallback = Arc<dyn Fn(&[Table]) + Send + Sync>;
/// Returns false to reject the import; the tracker sees an error response.
pub type ImportStartedCallback = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type ImportStoppedCallback = Arc<dyn Fn() + Send + Sync>;
/// (stat, table_type, site_id, player, filters) -> stat value, or None when
/// the stat cannot be computed.
pub type StatValueCallback = Arc<dyn Fn(&str, i64, i64, &str, &str) -> Option<String> + Send + Sync>;
pub type SettingsChangedCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;
pub type StatsChangedCallback = Arc<dyn Fn() + Send + Sync>;
pub type ReplayHandCallback = Arc<dyn Fn(&str, i64, &[Point]) + Send + Sync>;
pub type NoopCallback = Arc<dyn Fn(i64, bool) -> bool + Send + Sync>;
pub type HasUnsavedChangesCallback = Arc<dyn Fn() -> bool + Send + Sync>;
pub type SleepCallback = Arc<dyn Fn() + Send + Sync>;

/// Identity presented to the tracker plus the callbacks it can trigger.
///
/// Every callback is optional except `hash`, which connect requires. An
/// event arriving with no registered callback is still acknowledged.
#[derive(Clone)]
pub struct Profile {
    pub tracker: Tracker,
    /// Number of inbound pipes, each served by its own listener thread.
    pub max_inbound: usize,
    pub app_name: String,
    pub app_version: String,
    pub app_id: String,
    /// API version requested at register; the tracker may negotiate it down.
    pub api_version: String,

    pub hash: Option<HashCallback>,
    pub quit: Option<QuitCallback>,
    pub connect_info: Option<ConnectInfoCallback>,

    pub menu_selected: Option<MenuSelectedCallback>,
    pub note_tab_value: Option<NoteTabValueCallback>,
    pub hand: Option<HandCallback>,
    pub hands_selected: Option<HandsSelectedCallback>,
    pub note_hands: Option<NoteHandsCallback>,
    pub tables: Option<TablesCallback>,
    pub import_started: Option<ImportStartedCallback>,
    pub import_stopped: Option<ImportStoppedCallback>,
    pub stat_value: Option<StatValueCallback>,
    pub settings_changed: Option<SettingsChangedCallback>,
    pub stats_changed: Option<StatsChangedCallback>,
    pub replay_hand: Option<ReplayHandCallback>,
    pub noop: Option<NoopCallback>,
    pub has_unsaved_changes: Option<HasUnsavedChangesCallback>,
    pub sleep_begin: Option<SleepCallback>,
    pub sleep_end: Option<SleepCallback>,
}

impl Profile {
    pub fn new(
        tracker: Tracker,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        app_id: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            max_inbound: 2,
            app_name: app_name.into(),
            app_version: app_version.into(),
            app_id: app_id.into(),
            api_version: api_version.into(),
            hash: None,
            quit: None,
            connect_info: None,
            menu_selected: None,
            note_tab_value: None,
            hand: None,
            hands_selected: None,
            note_hands: None,
            tables: None,
            import_started: None,
            import_stopped: None,
            stat_value: None,
            settings_changed: None,
            stats_changed: None,
            replay_hand: None,
            noop: None,
            has_unsaved_changes: None,
            sleep_begin: None,
            sleep_end: None,
        }
    }
}
