//! In-process change notification registry.
//!
//! # Responsibility
//! - Let outer layers subscribe to "content changed" events.
//! - Deliver each event to every listener registered at emit time.
//!
//! # Invariants
//! - Listeners are called outside the registry lock, so a listener may
//!   subscribe or unsubscribe without deadlocking.
//! - Subscription ids are never reused within one registry.

use crate::model::folder::FolderId;
use crate::model::note::NoteId;
use crate::model::table::TableId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Structural mutation that just committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChange {
    FolderCreated(FolderId),
    FolderRenamed(FolderId),
    FolderMoved(FolderId),
    FolderDeleted(FolderId),
    NoteCreated(NoteId),
    NoteRenamed(NoteId),
    NoteMoved(NoteId),
    NoteUpdated(NoteId),
    NoteDeleted(NoteId),
    TableCreated(TableId),
    TableRowsChanged(TableId),
    AllReplaced,
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ContentChange) + Send + Sync>;

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Mutex<BTreeMap<SubscriptionId, Listener>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ContentChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        id
    }

    /// Returns whether the subscription was active.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn notify(&self, change: ContentChange) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeNotifier, ContentChange};
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_to_active_listeners_only() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let first = notifier.subscribe(move |change| sink.lock().unwrap().push(*change));
        let sink = Arc::clone(&seen);
        let second = notifier.subscribe(move |change| sink.lock().unwrap().push(*change));
        assert_ne!(first, second);
        assert_eq!(notifier.listener_count(), 2);

        notifier.notify(ContentChange::FolderCreated(1));
        assert!(notifier.unsubscribe(first));
        assert!(!notifier.unsubscribe(first));
        notifier.notify(ContentChange::AllReplaced);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ContentChange::FolderCreated(1),
                ContentChange::FolderCreated(1),
                ContentChange::AllReplaced,
            ]
        );
    }
}
