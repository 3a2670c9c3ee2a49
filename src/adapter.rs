// The adapter: one outbound pipe carrying the application's calls and N
// inbound pipes carrying the tracker's pushes, each behind its own listener
// thread. Connect handshakes every pipe before any listener starts; a single
// failure aborts the whole connect.

use crate::blob::{FileBlobSource, SharedMemoryBlobSource};
use crate::connection::{Connection, Role};
use crate::error::{AdapterError, Result};
use crate::inbound;
use crate::logging::ResponseStats;
use crate::pending::{Consumer, PendingRegistry};
use crate::profile::Profile;
use crate::requests;
use crate::session::{self, VerifyMode};
use crate::stream::{row_channel, RowStream};
use crate::transport::{Connector, PipeConnector};
use crate::types::{
    HandFormat, HandIdentifier, HandSelector, HmqlValue, PlayerData, PlayerNote, PlayerQuery,
    SettingValue, Stat, StatInfo, StatValue, TableType,
};
use crate::wire::Envelope;
use arc_swap::ArcSwapOption;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::types::ConnectionInfo;

// Consumers for deferred results. Each runs at most once, on whichever
// thread decodes the matching push; row-stream consumers receive a handle
// that must be drained on another thread than the one delivering it.
pub type PlayersCallback = Box<dyn FnOnce(i64, RowStream<PlayerData>) + Send>;
pub type NotesCallback = Box<dyn FnOnce(i64, RowStream<PlayerNote>) + Send>;
pub type StatRowsCallback = Box<dyn FnOnce(i64, RowStream<Vec<StatValue>>) + Send>;
pub type HmqlCallback = Box<dyn FnOnce(i64, RowStream<Vec<HmqlValue>>) + Send>;
pub type HandsCallback = Box<dyn FnOnce(i64, Vec<String>) + Send>;
pub type HandTagsCallback = Box<dyn FnOnce(i64, Vec<String>) + Send>;
pub type StatNamesCallback = Box<dyn FnOnce(i64, Vec<String>) + Send>;
pub type SelectStatsCallback = Box<dyn FnOnce(i64, bool, Vec<String>) + Send>;
pub type SelectFiltersCallback = Box<dyn FnOnce(i64, bool, String) + Send>;
pub type CompletionCallback = Box<dyn FnOnce(i64) + Send>;
/// get_stats resolves from the ack itself; the stream fills on a decoder
/// thread while the consumer already holds the handle.
pub type StatsCallback = Box<dyn FnOnce(RowStream<StatInfo>) + Send>;

/// State shared between the calling thread and the listener pool.
pub(crate) struct Shared {
    pub profile: Profile,
    pub running: AtomicBool,
    request_id: AtomicI64,
    pub pending: PendingRegistry,
    pub info: ArcSwapOption<ConnectionInfo>,
    pub client_stats: ResponseStats,
    pub server_stats: ResponseStats,
}

impl Shared {
    pub(crate) fn new(profile: Profile) -> Self {
        Self {
            profile,
            running: AtomicBool::new(false),
            request_id: AtomicI64::new(0),
            pending: PendingRegistry::default(),
            info: ArcSwapOption::empty(),
            client_stats: ResponseStats::default(),
            server_stats: ResponseStats::default(),
        }
    }

    /// Ids are shared across handshakes and outbound calls, starting at 1.
    pub fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct TrackerAdapter {
    shared: Arc<Shared>,
    outbound: Mutex<Connection>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    shutdown_handles: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl TrackerAdapter {
    /// Connect with the platform pipe transport.
    pub fn connect(profile: Profile) -> Result<Self> {
        Self::connect_with(profile, &PipeConnector)
    }

    /// Connect through a custom transport connector.
    pub fn connect_with(profile: Profile, connector: &dyn Connector) -> Result<Self> {
        let hash = profile
            .hash
            .clone()
            .ok_or(AdapterError::Config("hash callback not set"))?;
        let endpoint = profile.tracker.endpoint();
        let max_inbound = profile.max_inbound;

        let shared = Arc::new(Shared::new(profile));

        // Register and verify every inbound pipe first, then the outbound
        // one; the tracker hands out one salt per pipe. The negotiated api
        // version feeds each subsequent register.
        let mut api_version = shared.profile.api_version.clone();
        let mut inbound_connections = Vec::with_capacity(max_inbound);
        for index in 0..max_inbound {
            let transport = connector.connect(endpoint)?;
            let mut conn = Connection::new(transport, Role::Inbound(index));
            let state = session::register(
                &mut conn,
                shared.next_request_id(),
                &shared.profile.app_name,
                &shared.profile.app_version,
                &api_version,
            )?;
            if !state.api_version.is_empty() {
                api_version = state.api_version.clone();
            }
            session::verify(
                &mut conn,
                shared.next_request_id(),
                &hash(&state.salt),
                VerifyMode::Server,
            )?;
            inbound_connections.push(conn);
        }

        let transport = connector.connect(endpoint)?;
        let mut outbound = Connection::new(transport, Role::Outbound);
        let state = session::register(
            &mut outbound,
            shared.next_request_id(),
            &shared.profile.app_name,
            &shared.profile.app_version,
            &api_version,
        )?;
        let verify_result = session::verify(
            &mut outbound,
            shared.next_request_id(),
            &hash(&state.salt),
            VerifyMode::Client,
        )?;

        let connection_info = session::decode_connection_info(
            verify_result.as_ref().unwrap_or(&Value::Null),
            &state.tracker_version,
            if state.api_version.is_empty() {
                &api_version
            } else {
                &state.api_version
            },
        );
        if let Some(callback) = shared.profile.connect_info.clone() {
            callback(&connection_info);
        }
        shared.info.store(Some(Arc::new(connection_info)));

        shared.running.store(true, Ordering::SeqCst);
        let mut listeners = Vec::with_capacity(max_inbound);
        let mut shutdown_handles = Vec::new();
        for conn in inbound_connections {
            if let Some(handle) = conn.shutdown_handle() {
                shutdown_handles.push(handle);
            }
            listeners.push(inbound::spawn(Arc::clone(&shared), conn));
        }

        info!(
            "[ADAPTER] connected to {} ({} inbound pipes)",
            endpoint, max_inbound
        );

        Ok(Self {
            shared,
            outbound: Mutex::new(outbound),
            listeners: Mutex::new(listeners),
            shutdown_handles: Mutex::new(shutdown_handles),
        })
    }

    /// Connection metadata from the outbound verify response.
    pub fn connection_info(&self) -> Option<Arc<ConnectionInfo>> {
        self.shared.info.load_full()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Average time the tracker takes to answer our requests.
    pub fn client_status(&self) -> String {
        format!(
            "Tracker's avg. response time: {:.1}ms",
            self.shared.client_stats.average_ms()
        )
    }

    /// Average time we take to answer the tracker's pushes.
    pub fn server_status(&self) -> String {
        format!(
            "App's average response time: {:.1}ms",
            self.shared.server_stats.average_ms()
        )
    }

    /// Stop the listener pool and close the pipes. Waits up to five seconds
    /// for the listener threads to observe the stop flag, then force-closes
    /// the connections regardless of thread state.
    pub fn disconnect(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let handles = std::mem::take(&mut *self.listeners.lock().unwrap());
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && handles.iter().any(|h| !h.is_finished()) {
            thread::sleep(Duration::from_millis(20));
        }

        for shutdown in self.shutdown_handles.lock().unwrap().drain(..) {
            shutdown();
        }

        for handle in handles {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Still blocked in a read the platform cannot cancel; the
                // thread exits once the pipe actually closes.
                debug!("[ADAPTER] detaching a listener still blocked in read");
            }
        }

        info!("[ADAPTER] disconnected");
    }

    // One call cycle on the outbound pipe. The mutex enforces the
    // no-pipelining rule: a second send cannot start before the paired
    // receive returns.
    fn call(&self, request: Envelope) -> Result<Envelope> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(AdapterError::NotConnected);
        }
        let started = Instant::now();
        let mut response = self.outbound.lock().unwrap().call(&request)?;
        self.shared.client_stats.record(started.elapsed());
        if let Some(err) = response.error.take() {
            return Err(err.into());
        }
        Ok(response)
    }

    fn call_ok(&self, request: Envelope) -> Result<()> {
        self.call(request).map(|_| ())
    }

    // Deferred call: claim the operation's slot before sending, release it
    // again if the send or the ack fails. Returns the caller id the later
    // push will carry.
    fn call_deferred(
        &self,
        method: &'static str,
        consumer: Consumer,
        build: impl FnOnce(i64) -> Envelope,
    ) -> Result<i64> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(AdapterError::NotConnected);
        }
        let caller_id = self.shared.next_request_id();
        self.shared.pending.begin(method, caller_id, consumer)?;
        match self.call_ok(build(caller_id)) {
            Ok(()) => Ok(caller_id),
            Err(err) => {
                self.shared.pending.abandon(method, caller_id);
                Err(err)
            }
        }
    }

    // Terminal operations.

    pub fn busy_state_begin(&self) -> Result<()> {
        self.call_ok(requests::busy_state_begin(self.shared.next_request_id()))
    }

    pub fn busy_state_end(&self) -> Result<()> {
        self.call_ok(requests::busy_state_end(self.shared.next_request_id()))
    }

    pub fn register_menu(&self, menu_items: &[String]) -> Result<()> {
        self.call_ok(requests::register_menu(
            self.shared.next_request_id(),
            menu_items,
        ))
    }

    pub fn register_note_tab(&self, tab_name: &str, tab_icon: &str) -> Result<()> {
        self.call_ok(requests::register_note_tab(
            self.shared.next_request_id(),
            tab_name,
            tab_icon,
        ))
    }

    pub fn register_hands_menu(
        &self,
        menu_items: &[String],
        menu_icon: &str,
        format: HandFormat,
    ) -> Result<()> {
        self.call_ok(requests::register_hands_menu(
            self.shared.next_request_id(),
            menu_items,
            menu_icon,
            format,
        ))
    }

    /// Returns the encoded request size, which load tests use to correlate
    /// latency with message size.
    pub fn noop(&self, wait: i64, should_fail: bool, extra_bytes: Option<&str>) -> Result<usize> {
        let request = requests::noop(self.shared.next_request_id(), wait, should_fail, extra_bytes);
        let size = request.encode()?.len();
        self.call_ok(request)?;
        Ok(size)
    }

    pub fn request_hands(&self) -> Result<()> {
        self.call_ok(requests::request_hands(self.shared.next_request_id()))
    }

    pub fn request_tables(&self) -> Result<()> {
        self.call_ok(requests::request_tables(self.shared.next_request_id()))
    }

    pub fn replay_hands(&self, hand_selectors: &[HandSelector]) -> Result<()> {
        self.call_ok(requests::replay_hands(
            self.shared.next_request_id(),
            hand_selectors,
        ))
    }

    pub fn import_hand(&self, site_id: i64, hand: &str) -> Result<()> {
        let encoded = BASE64.encode(hand.as_bytes());
        self.call_ok(requests::import_hand(
            self.shared.next_request_id(),
            site_id,
            &encoded,
        ))
    }

    pub fn change_hud_profile(
        &self,
        site_id: i64,
        table: &str,
        profile_name: &str,
    ) -> Result<()> {
        self.call_ok(requests::change_hud_profile(
            self.shared.next_request_id(),
            site_id,
            table,
            profile_name,
        ))?;
        debug!(
            "[CLIENT] table hud changed: {} [{}] -> {}",
            table, site_id, profile_name
        );
        Ok(())
    }

    pub fn hud_notes(
        &self,
        site_id: i64,
        player: &str,
        table_window: i64,
        pos_x: i64,
        pos_y: i64,
    ) -> Result<()> {
        self.call_ok(requests::hud_notes(
            self.shared.next_request_id(),
            site_id,
            player,
            table_window,
            pos_x,
            pos_y,
        ))
    }

    pub fn get_setting(&self, name: &str) -> Result<SettingValue> {
        let response = self.call(requests::get_setting(self.shared.next_request_id(), name))?;
        let value = response.result_or_ok();
        let setting = match name {
            "active_player" => SettingValue::ActivePlayer(serde_json::from_value(value)?),
            "available_hud_profiles" => SettingValue::HudProfiles(serde_json::from_value(value)?),
            "hand_tags" => SettingValue::HandTags(serde_json::from_value(value)?),
            _ => SettingValue::Raw(value),
        };
        Ok(setting)
    }

    /// Once a deferred call was issued there is no way to retract it; this
    /// only tells the tracker to stop working on it. A push may already be
    /// in flight, so the local slot stays claimed until it lands.
    pub fn cancel_callback(&self, caller_id: i64) -> Result<()> {
        self.call_ok(requests::cancel_callback(
            self.shared.next_request_id(),
            caller_id,
        ))
    }

    /// Terminal, but the payload can be large: the consumer gets the stream
    /// handle immediately and a decoder thread fills it from the ack.
    pub fn get_stats(
        &self,
        table_type: TableType,
        full_details: bool,
        callback: StatsCallback,
    ) -> Result<()> {
        let response = self.call(requests::get_stats(
            self.shared.next_request_id(),
            table_type,
            full_details,
        ))?;

        let (sink, stream) = row_channel();
        callback(stream);

        let rows = match response.result {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        };
        thread::spawn(move || {
            for row in rows {
                match serde_json::from_value::<StatInfo>(row) {
                    Ok(stat) => sink.push(stat),
                    Err(err) => warn!("[CLIENT] skipping undecodable stat row: {}", err),
                }
            }
            sink.complete();
        });
        Ok(())
    }

    // Deferred operations. Each returns the caller id its push will carry.

    pub fn select_stats(
        &self,
        table_type: TableType,
        included_stats: &[String],
        default_stats: &[String],
        callback: SelectStatsCallback,
    ) -> Result<i64> {
        self.call_deferred("select_stats", Consumer::SelectStats(callback), |id| {
            requests::select_stats(id, table_type, included_stats, default_stats)
        })
    }

    /// `filters` is the tracker's filter-expression JSON.
    pub fn select_filters(
        &self,
        table_type: &str,
        filters: &str,
        callback: SelectFiltersCallback,
    ) -> Result<i64> {
        let filters: Value = serde_json::from_str(filters)?;
        self.call_deferred("select_filters", Consumer::SelectFilters(callback), |id| {
            requests::select_filters(id, table_type, filters)
        })
    }

    pub fn get_hands(
        &self,
        hands: &[HandIdentifier],
        include_native: bool,
        callback: HandsCallback,
    ) -> Result<i64> {
        self.call_deferred("get_hands", Consumer::Hands(callback), |id| {
            requests::get_hands(id, hands, include_native)
        })
    }

    /// The tracker writes the batch to `file_name`; the push only signals
    /// completion, after which the file is read and split into hands.
    pub fn get_hands_to_file(
        &self,
        hands: &[HandIdentifier],
        include_native: bool,
        file_name: &str,
        callback: HandsCallback,
    ) -> Result<i64> {
        let consumer = Consumer::Blob {
            source: Box::new(FileBlobSource::new(file_name)),
            callback,
        };
        self.call_deferred("get_hands_to_file", consumer, |id| {
            requests::get_hands_to_file(id, hands, file_name, include_native)
        })
    }

    /// Creates the shared-memory segment up front so the tracker can open
    /// it by name; the mapping is released right after the completion push
    /// is decoded.
    pub fn get_hands_to_shared_memory(
        &self,
        hands: &[HandIdentifier],
        include_native: bool,
        memory_name: &str,
        memory_size: usize,
        callback: HandsCallback,
    ) -> Result<i64> {
        let source = SharedMemoryBlobSource::create(memory_name, memory_size)?;
        let consumer = Consumer::Blob {
            source: Box::new(source),
            callback,
        };
        self.call_deferred("get_hands_to_shared_memory", consumer, |id| {
            requests::get_hands_to_shared_memory(id, hands, memory_name, memory_size, include_native)
        })
    }

    pub fn get_hand_tags(
        &self,
        site_id: i64,
        hand_no: &str,
        callback: HandTagsCallback,
    ) -> Result<i64> {
        self.call_deferred("get_hand_tags", Consumer::HandTags(callback), |id| {
            requests::get_hand_tags(id, site_id, hand_no)
        })
    }

    pub fn register_stats(&self, stats: &[Stat], callback: CompletionCallback) -> Result<i64> {
        self.call_deferred("register_stats", Consumer::Completion(callback), |id| {
            requests::register_stats(id, stats)
        })
    }

    pub fn remove_stats(&self, stats: &[Stat], callback: CompletionCallback) -> Result<i64> {
        self.call_deferred("remove_stats", Consumer::Completion(callback), |id| {
            requests::remove_stats(id, stats)
        })
    }

    pub fn register_positional_stats(
        &self,
        stats: &[String],
        table_type: &str,
        has_position: Option<&str>,
        position_type: Option<&str>,
        callback: StatNamesCallback,
    ) -> Result<i64> {
        self.call_deferred(
            "register_positional_stats",
            Consumer::StatNames(callback),
            |id| requests::register_positional_stats(id, stats, table_type, has_position, position_type),
        )
    }

    pub fn import_hud_profile(
        &self,
        file_name: &str,
        profile_name: &str,
        table_type: TableType,
        callback: CompletionCallback,
    ) -> Result<i64> {
        self.call_deferred("import_hud_profile", Consumer::Completion(callback), |id| {
            requests::import_hud_profile(id, file_name, profile_name, table_type)
        })
    }

    pub fn query_players(&self, query: &PlayerQuery, callback: PlayersCallback) -> Result<i64> {
        self.call_deferred("query_players", Consumer::Players(callback), |id| {
            requests::query_players(id, query)
        })
    }

    pub fn query_notes(
        &self,
        site_id: i64,
        players: &[String],
        callback: NotesCallback,
    ) -> Result<i64> {
        self.call_deferred("query_notes", Consumer::Notes(callback), |id| {
            requests::query_notes(id, site_id, players)
        })
    }

    pub fn query_stats(
        &self,
        table_type: TableType,
        site_id: i64,
        players: &[String],
        stats: &[String],
        filters: Option<&str>,
        callback: StatRowsCallback,
    ) -> Result<i64> {
        let filters = match filters.filter(|f| !f.is_empty()) {
            Some(text) => Some(serde_json::from_str(text)?),
            None => None,
        };
        self.call_deferred("query_stats", Consumer::StatRows(callback), |id| {
            requests::query_stats(id, table_type, site_id, players, stats, filters)
        })
    }

    pub fn query_hmql(&self, query: &str, callback: HmqlCallback) -> Result<i64> {
        self.call_deferred("query_hmql", Consumer::Hmql(callback), |id| {
            requests::query_hmql(id, query)
        })
    }

    pub fn query_ptsql(
        &self,
        table_type: &str,
        stats: &[String],
        active_player: bool,
        hand_query: bool,
        callback: StatRowsCallback,
    ) -> Result<i64> {
        self.call_deferred("query_ptsql", Consumer::StatRows(callback), |id| {
            requests::query_ptsql(id, table_type, stats, active_player, hand_query)
        })
    }
}

impl Drop for TrackerAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TrackerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerAdapter").finish_non_exhaustive()
    }
}
