// Bookkeeping for deferred calls: operations whose ack only confirms
// acceptance, with the real result arriving later as a result_callback push
// on whichever inbound pipe the tracker picks.

use crate::adapter::{
    CompletionCallback, HandTagsCallback, HandsCallback, HmqlCallback, NotesCallback,
    PlayersCallback, SelectFiltersCallback, SelectStatsCallback, StatNamesCallback,
    StatRowsCallback,
};
use crate::blob::BlobSource;
use crate::error::AdapterError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Consumer for one deferred call, tagged by the shape its result decodes
/// into.
pub(crate) enum Consumer {
    Players(PlayersCallback),
    Notes(NotesCallback),
    StatRows(StatRowsCallback),
    Hmql(HmqlCallback),
    Hands(HandsCallback),
    HandTags(HandTagsCallback),
    StatNames(StatNamesCallback),
    SelectStats(SelectStatsCallback),
    SelectFilters(SelectFiltersCallback),
    Completion(CompletionCallback),
    /// Rows travel out of band; the push only signals completion.
    Blob {
        source: Box<dyn BlobSource>,
        callback: HandsCallback,
    },
}

pub(crate) struct Pending {
    pub caller_id: i64,
    pub consumer: Consumer,
}

/// Methods resolved by a later result_callback push.
pub(crate) static DEFERRED_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "select_stats",
        "select_filters",
        "get_hands",
        "get_hands_to_file",
        "get_hands_to_shared_memory",
        "get_hand_tags",
        "query_players",
        "query_notes",
        "query_stats",
        "query_hmql",
        "query_ptsql",
        "register_positional_stats",
        "import_hud_profile",
        "register_stats",
        "remove_stats",
    ]
    .into_iter()
    .collect()
});

/// One mutable slot per operation kind, written by the calling thread and
/// consumed by whichever listener thread receives the matching push. A
/// second call of a kind while the first is unresolved is rejected instead
/// of clobbering its consumer.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    slots: Mutex<HashMap<&'static str, Pending>>,
}

impl PendingRegistry {
    /// Claim the slot for a call about to be sent. Must happen before the
    /// request is written: the push can race the ack.
    pub fn begin(
        &self,
        method: &'static str,
        caller_id: i64,
        consumer: Consumer,
    ) -> Result<(), AdapterError> {
        let mut slots = self.slots.lock().unwrap();
        if slots.contains_key(method) {
            return Err(AdapterError::CallInFlight(method));
        }
        slots.insert(method, Pending { caller_id, consumer });
        Ok(())
    }

    /// Consume the slot for a resolved call.
    pub fn take(&self, method: &str) -> Option<Pending> {
        self.slots.lock().unwrap().remove(method)
    }

    /// Release our own registration after a failed send or ack. Guarded by
    /// caller id in case the push already resolved the slot and a newer call
    /// claimed it.
    pub fn abandon(&self, method: &str, caller_id: i64) {
        let mut slots = self.slots.lock().unwrap();
        if slots.get(method).map(|pending| pending.caller_id) == Some(caller_id) {
            slots.remove(method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_consumer() -> Consumer {
        Consumer::Completion(Box::new(|_| {}))
    }

    #[test]
    fn second_call_of_a_kind_is_rejected_while_outstanding() {
        let registry = PendingRegistry::default();
        registry
            .begin("query_players", 1, noop_consumer())
            .unwrap();

        let err = registry
            .begin("query_players", 2, noop_consumer())
            .unwrap_err();
        assert!(matches!(err, AdapterError::CallInFlight("query_players")));

        // A different kind is unaffected.
        registry.begin("query_notes", 3, noop_consumer()).unwrap();
    }

    #[test]
    fn take_consumes_the_slot() {
        let registry = PendingRegistry::default();
        registry.begin("get_hands", 5, noop_consumer()).unwrap();

        let pending = registry.take("get_hands").unwrap();
        assert_eq!(pending.caller_id, 5);
        assert!(registry.take("get_hands").is_none());

        // Kind is free again.
        registry.begin("get_hands", 6, noop_consumer()).unwrap();
    }

    #[test]
    fn abandon_only_releases_its_own_registration() {
        let registry = PendingRegistry::default();
        registry.begin("query_hmql", 7, noop_consumer()).unwrap();

        registry.abandon("query_hmql", 99);
        assert!(registry.take("query_hmql").is_some());

        registry.begin("query_hmql", 8, noop_consumer()).unwrap();
        registry.abandon("query_hmql", 8);
        assert!(registry.take("query_hmql").is_none());
    }

    #[test]
    fn deferred_method_table_matches_the_operation_set() {
        assert!(DEFERRED_METHODS.contains("query_players"));
        assert!(DEFERRED_METHODS.contains("get_hands_to_shared_memory"));
        assert!(!DEFERRED_METHODS.contains("register_menu"));
        assert_eq!(DEFERRED_METHODS.len(), 15);
    }
}
