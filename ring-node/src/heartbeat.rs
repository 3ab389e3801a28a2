use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::peers::Peers;
use crate::state::NodeState;
use crate::task::{Task, TaskSender};
use crate::{HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TIMEOUT_SECS};

/// Wall-clock seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Emits heartbeats to the successor and watches for predecessor silence.
///
/// Emission failures are ignored; repair is driven by the receive side.
/// The monitor only reads `last_seen`, which the heartbeat endpoint writes
/// directly.
pub struct Monitor {
    state: Arc<Mutex<NodeState>>,
    peers: Peers,
    tx: TaskSender,
    last_seen: Arc<AtomicU64>,
    shutdown: broadcast::Receiver<()>,
}

impl Monitor {
    pub fn new(
        state: Arc<Mutex<NodeState>>,
        peers: Peers,
        tx: TaskSender,
        last_seen: Arc<AtomicU64>,
        shutdown: broadcast::Receiver<()>,
    ) -> Monitor {
        Monitor {
            state,
            peers,
            tx,
            last_seen,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut interval = time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = self.shutdown.recv() => return,
            }
        }
    }

    async fn tick(&mut self) {
        let (me, next) = {
            let state = self.state.lock().await;
            (state.addr(), state.next())
        };
        if let Err(err) = self.peers.heartbeat(next).await {
            debug!(to = %next, cause = %err, "heartbeat emission failed");
        }

        let silent_for = unix_now().saturating_sub(self.last_seen.load(Ordering::Relaxed));
        if silent_for > HEARTBEAT_TIMEOUT_SECS {
            warn!(silent_for, "predecessor went silent, announcing orphan");
            if self.tx.send(Task::Panic { orphan: me }).await.is_err() {
                return;
            }
        }
    }
}
