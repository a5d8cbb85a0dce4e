//! Callback registry shared by the sync core and the connectivity observer.
//!
//! Callbacks are stored once per `Arc` (pointer identity) with a registration count, so the
//! same callback registered twice is invoked once per notification and stays registered until
//! every [`Subscription`] for it is released. Each callback runs outside the registry lock and
//! in isolation: a panicking callback is logged and the others are still invoked.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

/// Identifier of a single registration.
pub(crate) type ListenerId = u64;

pub(crate) trait Deregister: Send + Sync {
    fn deregister(&self, id: ListenerId);
}

struct Entry<F: ?Sized> {
    callback: Arc<F>,
    registrations: usize,
}

struct ListenerTable<F: ?Sized> {
    next_id: ListenerId,
    /// registration id -> callback key
    handles: HashMap<ListenerId, usize>,
    /// callback key (pointer address) -> entry
    entries: HashMap<usize, Entry<F>>,
}

pub(crate) struct ListenerSet<F: ?Sized> {
    name: &'static str,
    table: Mutex<ListenerTable<F>>,
}

fn callback_key<F: ?Sized>(callback: &Arc<F>) -> usize {
    Arc::as_ptr(callback) as *const () as usize
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<F: ?Sized> ListenerSet<F> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table: Mutex::new(ListenerTable {
                next_id: 0,
                handles: HashMap::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Register a callback, returning the id of this registration.
    pub fn register(&self, callback: Arc<F>) -> ListenerId {
        let key = callback_key(&callback);
        let mut table = lock(&self.table);

        let id = table.next_id;
        table.next_id += 1;
        table.handles.insert(id, key);
        table
            .entries
            .entry(key)
            .or_insert(Entry {
                callback,
                registrations: 0,
            })
            .registrations += 1;

        id
    }

    /// Release a registration. Unknown or already released ids are ignored.
    pub fn remove(&self, id: ListenerId) {
        let mut table = lock(&self.table);
        let Some(key) = table.handles.remove(&id) else {
            return;
        };
        if let Some(entry) = table.entries.get_mut(&key) {
            entry.registrations -= 1;
            if entry.registrations == 0 {
                table.entries.remove(&key);
            }
        }
    }

    pub fn clear(&self) {
        let mut table = lock(&self.table);
        table.handles.clear();
        table.entries.clear();
    }

    /// Number of distinct callbacks currently registered.
    pub fn len(&self) -> usize {
        lock(&self.table).entries.len()
    }

    /// Invoke every registered callback through `invoke`.
    ///
    /// A callback released while the pass is running is not invoked afterwards.
    /// Returns the number of callbacks that panicked.
    pub fn notify(&self, invoke: impl Fn(&F)) -> usize {
        let keys: Vec<usize> = lock(&self.table).entries.keys().copied().collect();
        let mut failed = 0;

        for key in keys {
            let callback = match lock(&self.table).entries.get(&key) {
                Some(entry) => entry.callback.clone(),
                None => continue,
            };

            if catch_unwind(AssertUnwindSafe(|| invoke(callback.as_ref()))).is_err() {
                failed += 1;
                error!("A {} listener panicked while being notified", self.name);
            }
        }

        failed
    }
}

impl<F: ?Sized + Send + Sync> Deregister for ListenerSet<F> {
    fn deregister(&self, id: ListenerId) {
        self.remove(id);
    }
}

/// Handle to a registered callback.
///
/// The callback is released by [`unsubscribe`](Self::unsubscribe) or when the handle is
/// dropped. Releasing more than once has no further effect.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    id: ListenerId,
    registry: Option<Weak<dyn Deregister>>,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: Weak<dyn Deregister>, id: ListenerId) -> Self {
        Self {
            id,
            registry: Some(registry),
            active: AtomicBool::new(true),
        }
    }

    /// A subscription that was never registered anywhere.
    pub(crate) fn inert() -> Self {
        Self {
            id: 0,
            registry: None,
            active: AtomicBool::new(false),
        }
    }

    /// Whether this handle still holds its registration.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Release the registration. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            registry.deregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
