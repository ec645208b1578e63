//! Synchronous change notification.
//!
//! After a successful mutation the store publishes "data under path P
//! changed". Observers carry no payload beyond the path and are expected to
//! re-query. Delivery happens on the mutating thread before the mutating call
//! returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ResourcePath;

type Callback = Arc<dyn Fn(&ResourcePath) + Send + Sync>;

/// Handle returned by [`ChangeNotifier::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    path: ResourcePath,
    notify_for_descendants: bool,
    callback: Callback,
}

impl Observer {
    /// Exact match, any change to an enclosing path, or a change below the
    /// observed path when the observer asked for descendant changes.
    fn wants(&self, changed: &ResourcePath) -> bool {
        self.path == *changed
            || changed.is_ancestor_of(&self.path)
            || (self.notify_for_descendants && self.path.is_ancestor_of(changed))
    }
}

/// Registry of observers keyed by path.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: Mutex<Vec<Observer>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for changes at `path`.
    ///
    /// Changes at `path` or at any enclosing path are always delivered. With
    /// `notify_for_descendants`, changes below `path` are delivered too.
    pub fn register<F>(&self, path: ResourcePath, notify_for_descendants: bool, callback: F) -> ObserverId
    where
        F: Fn(&ResourcePath) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Observer {
            id,
            path,
            notify_for_descendants,
            callback: Arc::new(callback),
        });
        id
    }

    /// Returns false when the id was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|observer| observer.id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver a change for `path`; returns the number of observers called.
    pub fn notify(&self, path: &ResourcePath) -> usize {
        // Callbacks may re-enter the store or the notifier.
        let targets: Vec<Callback> = self
            .lock()
            .iter()
            .filter(|observer| observer.wants(path))
            .map(|observer| Arc::clone(&observer.callback))
            .collect();

        tracing::debug!(path = %path, observers = targets.len(), "notifying change");
        for callback in &targets {
            callback(path);
        }
        targets.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Observer>> {
        // Observers run outside the lock; a poisoned list is still consistent.
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ResourcePath {
        ResourcePath::parse(s).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&ResourcePath) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p: &ResourcePath| sink.lock().unwrap().push(p.to_string()))
    }

    #[test]
    fn exact_path_observer_is_notified() {
        let notifier = ChangeNotifier::new();
        let (seen, callback) = recorder();
        notifier.register(path("content://a/pets"), false, callback);

        assert_eq!(notifier.notify(&path("content://a/pets")), 1);
        assert_eq!(notifier.notify(&path("content://a/pets/1")), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["content://a/pets"]);
    }

    #[test]
    fn descendant_observer_sees_item_changes() {
        let notifier = ChangeNotifier::new();
        let (seen, callback) = recorder();
        notifier.register(path("content://a/pets"), true, callback);

        notifier.notify(&path("content://a/pets/7"));
        notifier.notify(&path("content://a/staff/7"));
        assert_eq!(*seen.lock().unwrap(), vec!["content://a/pets/7"]);
    }

    #[test]
    fn item_observer_sees_collection_changes_when_descendants_requested() {
        let notifier = ChangeNotifier::new();
        let (seen, callback) = recorder();
        notifier.register(path("content://a/pets/7"), true, callback);

        notifier.notify(&path("content://a/pets"));
        notifier.notify(&path("content://a/pets/8"));
        assert_eq!(*seen.lock().unwrap(), vec!["content://a/pets"]);
    }

    #[test]
    fn item_observer_sees_collection_changes_without_descendant_flag() {
        let notifier = ChangeNotifier::new();
        let (seen, callback) = recorder();
        notifier.register(path("content://a/pets/7"), false, callback);

        notifier.notify(&path("content://a/pets"));
        notifier.notify(&path("content://a/pets/8"));
        notifier.notify(&path("content://a/staff"));
        assert_eq!(*seen.lock().unwrap(), vec!["content://a/pets"]);
    }

    #[test]
    fn unregistered_observer_is_silent() {
        let notifier = ChangeNotifier::new();
        let (seen, callback) = recorder();
        let id = notifier.register(path("content://a/pets"), true, callback);

        assert!(notifier.unregister(id));
        assert!(!notifier.unregister(id));
        assert_eq!(notifier.notify(&path("content://a/pets")), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn callback_may_register_another_observer() {
        let notifier = Arc::new(ChangeNotifier::new());
        let inner = Arc::clone(&notifier);
        notifier.register(path("content://a/pets"), false, move |p| {
            inner.register(p.clone(), false, |_| {});
        });

        notifier.notify(&path("content://a/pets"));
        assert_eq!(notifier.observer_count(), 2);
    }
}
