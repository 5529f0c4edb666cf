//! Change notification for table writes.

use std::sync::{Arc, Weak};

use tracing::debug;

/// Receives a callback after every successful write to a table.
pub trait TableListener {
    fn on_table_modified(&self, table: &str) -> anyhow::Result<()>;
}

impl<F> TableListener for F
where
    F: Fn(&str) -> anyhow::Result<()>,
{
    fn on_table_modified(&self, table: &str) -> anyhow::Result<()> {
        self(table)
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners in registration order.
///
/// Registrations are weak: the caller keeps ownership of the listener, and a
/// listener dropped by its owner is skipped and forgotten.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<(ListenerId, Weak<dyn TableListener>)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: TableListener + 'static>(&mut self, listener: &Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn TableListener> = weak;
        self.entries.push((id, weak));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Number of registered listeners that are still alive.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|(_, l)| l.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every live listener in registration order, stopping at the first
    /// failure.
    pub fn notify(&mut self, table: &str) -> anyhow::Result<()> {
        let registered = self.entries.len();
        self.entries.retain(|(_, l)| l.strong_count() > 0);
        if self.entries.len() < registered {
            debug!(
                table,
                pruned = registered - self.entries.len(),
                "dropping registrations of listeners released by their owners"
            );
        }
        let live: Vec<Arc<dyn TableListener>> =
            self.entries.iter().filter_map(|(_, l)| l.upgrade()).collect();
        debug!(table, listeners = live.len(), "notifying table listeners");
        for listener in live {
            listener.on_table_modified(table)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<impl TableListener> {
        let log = Arc::clone(log);
        Arc::new(move |table: &str| -> anyhow::Result<()> {
            log.lock().unwrap().push(format!("{tag}:{table}"));
            Ok(())
        })
    }

    #[test]
    fn notifies_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");
        let mut registry = ListenerRegistry::new();
        registry.add(&first);
        registry.add(&second);

        registry.notify("rules").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first:rules", "second:rules"]);
    }

    #[test]
    fn removed_and_dropped_listeners_are_not_called() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let kept = recorder(&log, "kept");
        let removed = recorder(&log, "removed");
        let dropped = recorder(&log, "dropped");
        let mut registry = ListenerRegistry::new();
        registry.add(&kept);
        let removed_id = registry.add(&removed);
        registry.add(&dropped);
        drop(dropped);

        assert!(registry.remove(removed_id));
        assert!(!registry.remove(removed_id));
        assert_eq!(registry.len(), 1);

        registry.notify("t").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["kept:t"]);
    }

    #[test]
    fn failing_listener_stops_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = Arc::new(|_: &str| -> anyhow::Result<()> { anyhow::bail!("listener down") });
        let after = recorder(&log, "after");
        let mut registry = ListenerRegistry::new();
        registry.add(&failing);
        registry.add(&after);

        let err = registry.notify("t").unwrap_err();
        assert_eq!(err.to_string(), "listener down");
        assert!(log.lock().unwrap().is_empty());
    }
}
