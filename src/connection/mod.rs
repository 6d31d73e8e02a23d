//! Lifecycle of the single shared store handle.
//!
//! The handle lives in a slot guarded by one async mutex, the coordination
//! lock. The lock is held continuously for as long as the handle is unusable:
//! whoever holds it while the slot is empty owns the right to fill it.
//!
//! Reconnection is single-flight by construction. A reconnection can only be
//! requested by handing an owned lock guard to the [`Reconnector`] task, and
//! only the current lock holder has one to hand over. At startup the cell
//! takes the lock itself; afterwards a request whose query fails passes on
//! the guard it is already holding. Requests that arrive meanwhile wait on
//! the lock and only ever see a freshly published handle.
//!
//! State machine:
//!
//! ```text
//!   start ──► Unavailable ──(connect ok, lock released)──► Available
//!                ▲   │                                        │
//!                │   └─(connect failed, back off, retry)      │
//!                └──────────(query failed, guard handed off)──┘
//! ```

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::{
    sync::{mpsc, Mutex, OwnedMutexGuard},
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::{
    db::{SpanStore, StoreConnector, StoreError},
    types::SpanId,
};

mod backoff;

pub use backoff::{Backoff, ReconnectPolicy, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF};

type Slot<S> = OwnedMutexGuard<Option<S>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Lock held, no usable handle.
    Unavailable,
    /// Lock free, handle usable.
    Available,
}

#[derive(Debug, Default)]
struct CellStatus {
    available: AtomicBool,
    publications: AtomicU64,
}

impl CellStatus {
    fn publish(&self) {
        self.publications.fetch_add(1, Ordering::SeqCst);
        self.available.store(true, Ordering::SeqCst);
    }

    fn invalidate(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}

pub struct ConnectionCell<S: SpanStore> {
    slot: Arc<Mutex<Option<S>>>,
    reconnect_tx: mpsc::UnboundedSender<Slot<S>>,
    status: Arc<CellStatus>,
}

impl<S: SpanStore> ConnectionCell<S> {
    /// Takes the lock, launches the reconnection task with it and returns
    /// without waiting for the first connection.
    pub async fn start<C>(connector: C, policy: ReconnectPolicy) -> Arc<Self>
    where
        C: StoreConnector<Store = S>,
    {
        let (reconnect_tx, requests) = mpsc::unbounded_channel();
        let status = Arc::new(CellStatus::default());
        let cell = Arc::new(Self {
            slot: Arc::new(Mutex::new(None)),
            reconnect_tx,
            status: Arc::clone(&status),
        });

        let guard = cell.acquire_for_replace().await;

        let reconnector = Reconnector {
            connector,
            policy,
            status,
        };
        tokio::spawn(reconnector.run(requests));

        hand_off(&cell.reconnect_tx, &cell.status, guard);
        cell
    }

    pub async fn acquire_for_read(&self) -> ReadGuard<S> {
        ReadGuard {
            guard: Arc::clone(&self.slot).lock_owned().await,
            reconnect_tx: self.reconnect_tx.clone(),
            status: Arc::clone(&self.status),
        }
    }

    async fn acquire_for_replace(&self) -> Slot<S> {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        self.status.invalidate();
        guard
    }

    /// Queries span `id` on the current handle.
    ///
    /// The lock is held only for the query call. On a connection error the
    /// still-held lock goes to the reconnection task and the error is
    /// returned straight away; the request is not retried.
    pub async fn fetch_span(&self, id: SpanId) -> Result<Option<String>, StoreError> {
        let mut guard = self.acquire_for_read().await;
        let result = match guard.store() {
            Some(store) => store.fetch_span(id).await,
            None => Err(StoreError::NotConnected),
        };

        match result {
            Err(err) if err.is_connection_error() => {
                warn!("Store query for span {id} failed: {err}. Triggering reconnection");
                guard.fail();
                Err(err)
            }
            other => other,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.status.available.load(Ordering::SeqCst) {
            ConnectionState::Available
        } else {
            ConnectionState::Unavailable
        }
    }

    /// Number of handles published since startup.
    pub fn publications(&self) -> u64 {
        self.status.publications.load(Ordering::SeqCst)
    }
}

/// The coordination lock held for reading the handle and dispatching a query.
pub struct ReadGuard<S: SpanStore> {
    guard: Slot<S>,
    reconnect_tx: mpsc::UnboundedSender<Slot<S>>,
    status: Arc<CellStatus>,
}

impl<S: SpanStore> ReadGuard<S> {
    pub fn store(&mut self) -> Option<&mut S> {
        self.guard.as_mut()
    }

    /// Marks the handle broken and passes the lock on to the reconnection
    /// task without releasing it.
    pub fn fail(self) {
        hand_off(&self.reconnect_tx, &self.status, self.guard);
    }
}

fn hand_off<S: SpanStore>(
    reconnect_tx: &mpsc::UnboundedSender<Slot<S>>,
    status: &CellStatus,
    mut guard: Slot<S>,
) {
    *guard = None;
    status.invalidate();

    if let Err(mpsc::error::SendError(guard)) = reconnect_tx.send(guard) {
        // Releasing leaves the slot empty; requests keep failing fast.
        error!("Reconnection task is not running, store stays unavailable");
        drop(guard);
    }
}

/// Background task that turns handed-off lock guards into published handles.
pub struct Reconnector<C: StoreConnector> {
    connector: C,
    policy: ReconnectPolicy,
    status: Arc<CellStatus>,
}

impl<C: StoreConnector> Reconnector<C> {
    async fn run(self, mut requests: mpsc::UnboundedReceiver<Slot<C::Store>>) {
        while let Some(guard) = requests.recv().await {
            self.reconnect(guard).await;
        }
        debug!("Reconnection task stopped");
    }

    async fn reconnect(&self, mut guard: Slot<C::Store>) {
        let mut backoff = self.policy.backoff();
        let mut attempts: u32 = 0;

        loop {
            info!("Connecting to store...");
            attempts += 1;

            match self.connector.connect().await {
                Ok(store) => {
                    *guard = Some(store);
                    self.status.publish();
                    info!("Store connected after {attempts} attempt(s)");
                    return;
                }
                Err(e) => {
                    if self.policy.is_exhausted(attempts) {
                        error!("Store connection failed: {e}. Giving up after {attempts} attempts");
                        return;
                    }
                    let delay = backoff.next_delay();
                    error!(
                        "Store connection failed: {e}. Retrying in {:?} (Attempt {})",
                        delay, attempts
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::test_utils::MockConnector;

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            max_attempts: None,
        }
    }

    #[tokio::test]
    async fn test_requests_wait_for_first_connection() {
        let connector = MockConnector::new_with_spans([(42, "7b7d")]);
        connector.fail_next_connects(3);

        let cell = ConnectionCell::start(connector.clone(), fast_policy()).await;
        let span = cell.fetch_span(SpanId::from_trusted(42)).await.unwrap();

        assert_eq!(span.as_deref(), Some("7b7d"));
        assert_eq!(connector.connect_attempts(), 4);
        assert_eq!(cell.publications(), 1);
        assert_eq!(cell.state(), ConnectionState::Available);
    }

    #[tokio::test]
    async fn test_missing_span_is_not_an_error() {
        let connector = MockConnector::new();
        let cell = ConnectionCell::start(connector.clone(), fast_policy()).await;

        let span = cell.fetch_span(SpanId::from_trusted(9999)).await.unwrap();

        assert!(span.is_none());
        assert_eq!(connector.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_fails_request_and_reconnects_once() {
        let connector = MockConnector::new_with_spans([(1, "00")]);
        let cell = ConnectionCell::start(connector.clone(), fast_policy()).await;
        cell.fetch_span(SpanId::from_trusted(1)).await.unwrap();

        connector.drop_connections();
        let err = cell.fetch_span(SpanId::from_trusted(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));

        let span = cell.fetch_span(SpanId::from_trusted(1)).await.unwrap();
        assert_eq!(span.as_deref(), Some("00"));
        assert_eq!(connector.connect_attempts(), 2);
        assert_eq!(cell.publications(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_block_during_outage() {
        let connector = MockConnector::new_with_spans([(7, "7b7d")]);
        let cell = ConnectionCell::start(connector.clone(), fast_policy()).await;
        cell.fetch_span(SpanId::from_trusted(7)).await.unwrap();

        connector.set_available(false);
        assert!(cell.fetch_span(SpanId::from_trusted(7)).await.is_err());
        assert_eq!(cell.state(), ConnectionState::Unavailable);

        let waiting: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.fetch_span(SpanId::from_trusted(7)).await })
            })
            .collect();

        sleep(Duration::from_millis(100)).await;
        assert!(waiting.iter().all(|handle| !handle.is_finished()));
        let queries_during_outage = connector.queries();

        connector.set_available(true);
        for result in futures::future::join_all(waiting).await {
            assert_eq!(result.unwrap().unwrap().as_deref(), Some("7b7d"));
        }

        // One publication at startup, exactly one after the outage
        assert_eq!(cell.publications(), 2);
        assert_eq!(connector.queries(), queries_during_outage + 16);
        assert_eq!(cell.state(), ConnectionState::Available);
    }

    #[tokio::test]
    async fn test_bounded_policy_releases_lock_and_recovers_on_next_request() {
        let connector = MockConnector::new_with_spans([(3, "ff")]);
        connector.set_available(false);

        let cell = ConnectionCell::start(connector.clone(), fast_policy().with_max_attempts(2)).await;

        let err = cell.fetch_span(SpanId::from_trusted(3)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConnected));
        assert_eq!(cell.publications(), 0);

        connector.set_available(true);

        // The request above handed the lock back for another bounded cycle,
        // which may still have been running while the store was down.
        let mut result = cell.fetch_span(SpanId::from_trusted(3)).await;
        if matches!(result, Err(StoreError::NotConnected)) {
            result = cell.fetch_span(SpanId::from_trusted(3)).await;
        }

        assert_eq!(result.unwrap().as_deref(), Some("ff"));
        assert_eq!(cell.publications(), 1);
    }
}
