use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::Mutex;

use super::{SpanStore, StoreConnector, StoreError};
use crate::types::SpanId;

/// In-memory stand-in for the span database.
///
/// Connections opened before an outage stay broken afterwards, the same way a
/// dropped TCP connection does not come back on its own.
#[derive(Clone, Default)]
pub struct MockConnector {
    shared: Arc<MockShared>,
}

#[derive(Default)]
struct MockShared {
    spans: Mutex<HashMap<i64, String>>,
    down: AtomicBool,
    epoch: AtomicU64,
    pending_connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    queries: AtomicU32,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_spans<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = (i64, &'static str)>,
    {
        let spans = spans
            .into_iter()
            .map(|(id, payload)| (id, payload.to_owned()))
            .collect();
        Self {
            shared: Arc::new(MockShared {
                spans: Mutex::new(spans),
                ..Default::default()
            }),
        }
    }

    pub async fn insert_span(&self, id: i64, hex_payload: &str) {
        self.shared
            .spans
            .lock()
            .await
            .insert(id, hex_payload.to_owned());
    }

    /// Takes the store down (breaking every open handle) or brings it back.
    pub fn set_available(&self, available: bool) {
        if !available {
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.down.store(!available, Ordering::SeqCst);
    }

    /// Breaks every open handle while leaving new connections possible.
    pub fn drop_connections(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared
            .pending_connect_failures
            .store(n, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> u32 {
        self.shared.queries.load(Ordering::SeqCst)
    }
}

fn connection_refused() -> StoreError {
    StoreError::Connection(sqlx::Error::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "mock store is down",
    )))
}

impl StoreConnector for MockConnector {
    type Store = MockStore;

    async fn connect(&self) -> Result<MockStore, StoreError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if self.shared.down.load(Ordering::SeqCst) {
            return Err(connection_refused());
        }

        let scripted_failure = self
            .shared
            .pending_connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(connection_refused());
        }

        Ok(MockStore {
            shared: Arc::clone(&self.shared),
            epoch: self.shared.epoch.load(Ordering::SeqCst),
        })
    }
}

pub struct MockStore {
    shared: Arc<MockShared>,
    epoch: u64,
}

impl SpanStore for MockStore {
    async fn fetch_span(&mut self, id: SpanId) -> Result<Option<String>, StoreError> {
        self.shared.queries.fetch_add(1, Ordering::SeqCst);

        if self.shared.down.load(Ordering::SeqCst)
            || self.epoch != self.shared.epoch.load(Ordering::SeqCst)
        {
            return Err(StoreError::Connection(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "mock connection reset",
            ))));
        }

        Ok(self.shared.spans.lock().await.get(&id.value()).cloned())
    }
}
