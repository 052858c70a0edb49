//! The connect/retry state machine owning the single connection slot.
//!
//! One background task drives the loop for the lifetime of the process:
//! connect, and on success hold the handle while passively monitoring it; on
//! failure back off and try again, forever. Request handlers only ever touch
//! the slot through [`ConnectionSupervisor::current_handle`], which is a
//! non-blocking read.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use super::backoff::BackoffPolicy;
use super::connector::Connector;
use crate::metrics::MetricsRecorder;
use crate::store::Records;
use crate::utils::log_throttle::LogThrottle;

/// Repeated connect failures are summarized instead of logged one by one.
const FAILURE_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Observable state of the connection slot.
///
/// Transitions: Disconnected→Connecting, Connecting→{Connected, Failed},
/// Failed→Connecting (after backoff), Connected→Disconnected (on a detected
/// error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

struct SupervisorShared {
    state_tx: watch::Sender<ConnectionState>,
    // Written only by the supervisor task; the handle is installed before the
    // state flips to Connected, so readers never see a half-initialized slot.
    handle: RwLock<Option<Arc<dyn Records>>>,
    connection_lost: Notify,
}

/// Owner of the single backend connection slot.
pub struct ConnectionSupervisor {
    shared: Arc<SupervisorShared>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ConnectionSupervisor {
    /// Spawns the retry loop and returns the supervisor handle.
    pub fn start(
        connector: Arc<dyn Connector>,
        policy: BackoffPolicy,
        probe_interval: Duration,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let shared = Arc::new(SupervisorShared {
            state_tx,
            handle: RwLock::new(None),
            connection_lost: Notify::new(),
        });
        let task = tokio::spawn(run(
            shared.clone(),
            connector,
            policy,
            probe_interval,
            metrics,
            shutdown_rx,
        ));
        ConnectionSupervisor {
            shared,
            state_rx,
            shutdown,
            task,
        }
    }

    /// Current state of the connection slot, read without blocking.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Returns the live handle, or `None` unless the slot is Connected with a
    /// fully installed handle. Never blocks beyond a short lock read.
    pub fn current_handle(&self) -> Option<Arc<dyn Records>> {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return None;
        }
        self.shared
            .handle
            .read()
            .expect("connection slot lock poisoned")
            .clone()
    }

    /// Lets a request handler report that the handle it was using has broken.
    /// Forces Connected→Disconnected and an immediate reconnect.
    pub fn report_connection_lost(&self) {
        if *self.state_rx.borrow() == ConnectionState::Connected {
            self.shared.connection_lost.notify_one();
        }
    }

    /// Requests graceful shutdown. Unblocks an in-flight connect attempt or
    /// backoff sleep promptly.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// True once the retry loop has fully exited after [`stop`](Self::stop).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum MonitorExit {
    Lost,
    Shutdown,
}

async fn run(
    shared: Arc<SupervisorShared>,
    connector: Arc<dyn Connector>,
    policy: BackoffPolicy,
    probe_interval: Duration,
    metrics: Arc<dyn MetricsRecorder>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut attempt: u32 = 0;
    let mut failure_log = LogThrottle::new(FAILURE_LOG_INTERVAL);

    loop {
        shared.state_tx.send_replace(ConnectionState::Connecting);
        let outcome = tokio::select! {
            outcome = connector.connect() => outcome,
            _ = shutdown.recv() => break,
        };

        match outcome {
            Ok(records) => {
                // A healthy period resets the backoff to its first interval.
                attempt = 0;
                install_handle(&shared, Some(records.clone()));
                shared.state_tx.send_replace(ConnectionState::Connected);
                metrics.record_connect_success();
                info!("Successfully connected to the database");

                let exit = monitor(&shared, records, probe_interval, &mut shutdown).await;
                shared.state_tx.send_replace(ConnectionState::Disconnected);
                install_handle(&shared, None);
                if matches!(exit, MonitorExit::Shutdown) {
                    break;
                }
                warn!("Database connection lost, reconnecting");
            }
            Err(e) => {
                metrics.record_connect_failure();
                shared.state_tx.send_replace(ConnectionState::Failed);
                match failure_log.should_emit() {
                    Some(0) => {
                        warn!(error = %e, "There was a problem connecting to the database, will retry")
                    }
                    Some(suppressed) => {
                        warn!(error = %e, suppressed, "There was a problem connecting to the database, will retry")
                    }
                    None => {}
                }

                let delay = policy.delay(attempt);
                attempt = attempt.saturating_add(1);
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown.recv() => break,
                }
            }
        }
    }

    // No handle survives shutdown.
    install_handle(&shared, None);
}

/// Watches an established connection until it breaks or shutdown is
/// requested. Failure is detected by the periodic probe or reported by a
/// consumer through `report_connection_lost`.
async fn monitor(
    shared: &SupervisorShared,
    records: Arc<dyn Records>,
    probe_interval: Duration,
    shutdown: &mut broadcast::Receiver<()>,
) -> MonitorExit {
    loop {
        tokio::select! {
            _ = sleep(probe_interval) => {
                if let Err(e) = records.ping().await {
                    warn!(error = %e, "Database health probe failed");
                    return MonitorExit::Lost;
                }
            }
            _ = shared.connection_lost.notified() => return MonitorExit::Lost,
            _ = shutdown.recv() => return MonitorExit::Shutdown,
        }
    }
}

fn install_handle(shared: &SupervisorShared, records: Option<Arc<dyn Records>>) {
    *shared
        .handle
        .write()
        .expect("connection slot lock poisoned") = records;
}
