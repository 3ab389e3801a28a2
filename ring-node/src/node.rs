use futures::Future;
use ring_core::wire::QuitForm;
use ring_core::{NodeAddr, Result};
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::heartbeat::{self, Monitor};
use crate::input;
use crate::peers::Peers;
use crate::server::{self, AppState};
use crate::state::NodeState;
use crate::task::{self, Task, TaskSender};
use crate::worker::Worker;

/// Startup parameters for a chat node.
#[derive(Clone, Debug)]
pub struct Config {
    /// The identity this node listens on.
    pub addr: NodeAddr,
    /// A ring member to join through, if any.
    pub bootstrap: Option<NodeAddr>,
    /// Accept joins whose advertised address differs from the source.
    pub lenient_join: bool,
    /// Seconds to wait before a scheduled election enters the ring.
    pub settle_secs: u64,
}

/// Runs a node on `listener` until `shutdown` resolves, then announces an
/// orderly quit to the successor and drains the worker.
pub async fn run(listener: TcpListener, config: Config, shutdown: impl Future) -> Result<()> {
    let state = match config.bootstrap {
        Some(bootstrap) => NodeState::joining(config.addr, bootstrap),
        None => NodeState::solitary(config.addr),
    };
    let state = Arc::new(Mutex::new(state));
    let peers = Peers::new()?;
    let (tx, rx) = task::queue();
    let last_seen = Arc::new(AtomicU64::new(heartbeat::unix_now()));
    let (notify_shutdown, _) = broadcast::channel(1);

    info!(addr = %config.addr, "listening");

    let app = AppState {
        state: state.clone(),
        tx: tx.clone(),
        peers: peers.clone(),
        heartbeat: last_seen.clone(),
        lenient_join: config.lenient_join,
    };
    let router = server::router(app);
    let mut listener_shutdown = notify_shutdown.subscribe();
    tokio::spawn(async move {
        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = listener_shutdown.recv().await;
        });
        if let Err(err) = serve.await {
            error!(cause = %err, "listener failed");
        }
    });

    let worker = Worker::new(
        state.clone(),
        peers.clone(),
        rx,
        tx.clone(),
        notify_shutdown.subscribe(),
        Duration::from_secs(config.settle_secs),
    );
    let worker_handle = tokio::spawn(worker.run());

    let monitor = Monitor::new(
        state.clone(),
        peers.clone(),
        tx.clone(),
        last_seen,
        notify_shutdown.subscribe(),
    );
    tokio::spawn(monitor.run());
    input::spawn(tx.clone());

    if let Some(bootstrap) = config.bootstrap {
        bootstrap_join(&state, &peers, &tx, bootstrap, config.addr).await;
    }

    shutdown.await;
    info!("shutting down");
    quit_ring(&state, &peers).await;

    // Closing the channel stops the listener, the worker and the monitor;
    // the stdin thread ends once the queue closes behind them.
    drop(notify_shutdown);
    worker_handle.await?;
    Ok(())
}

/// Completes a bootstrap join. A refusal leaves the node out of the ring.
async fn bootstrap_join(
    state: &Arc<Mutex<NodeState>>,
    peers: &Peers,
    tx: &TaskSender,
    bootstrap: NodeAddr,
    me: NodeAddr,
) {
    match peers.join(bootstrap, me).await {
        Ok(next) => {
            state.lock().await.joined(next);
            let _ = tx.send(Task::InitElection).await;
        }
        Err(err) => {
            error!(via = %bootstrap, cause = %err, "join failed, staying out of the ring");
        }
    }
}

/// Announces departure to the successor. A singleton has no one to tell.
async fn quit_ring(state: &Arc<Mutex<NodeState>>, peers: &Peers) {
    let (me, next, singleton) = {
        let state = state.lock().await;
        (state.addr(), state.next(), state.is_singleton())
    };
    if singleton {
        return;
    }
    let form = QuitForm::new(me, next);
    if let Err(err) = peers.quit(next, &form).await {
        warn!(to = %next, cause = %err, "quit announcement lost");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::sync::oneshot;

    struct TestNode {
        addr: NodeAddr,
        stop: oneshot::Sender<()>,
    }

    /// Boots a full node on an ephemeral loopback port.
    async fn spawn_node(bootstrap: Option<NodeAddr>) -> TestNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: NodeAddr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port())
            .parse()
            .unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let config = Config {
            addr,
            bootstrap,
            lenient_join: false,
            settle_secs: 0,
        };
        tokio::spawn(async move {
            let _ = run(listener, config, async {
                let _ = stopped.await;
            })
            .await;
        });
        TestNode { addr, stop }
    }

    async fn converged(peers: &Peers, members: &[NodeAddr]) -> bool {
        let leader = members.iter().map(|addr| addr.id()).max();
        for member in members {
            match peers.snapshot(*member).await {
                Ok(snapshot) if snapshot.leader == leader => {}
                _ => return false,
            }
        }
        true
    }

    #[tokio::test]
    async fn two_nodes_form_a_ring_and_agree_on_a_leader() {
        let a = spawn_node(None).await;
        let b = spawn_node(Some(a.addr)).await;
        let peers = Peers::new().unwrap();

        let mut ok = false;
        for _ in 0..250 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if converged(&peers, &[a.addr, b.addr]).await {
                let sa = peers.snapshot(a.addr).await.unwrap();
                let sb = peers.snapshot(b.addr).await.unwrap();
                if sa.next_port == b.addr.port && sb.next_port == a.addr.port {
                    ok = true;
                    break;
                }
            }
        }
        assert!(ok, "ring never converged");

        let _ = a.stop.send(());
        let _ = b.stop.send(());
    }

    #[tokio::test]
    async fn a_quitting_member_heals_the_ring() {
        let a = spawn_node(None).await;
        let b = spawn_node(Some(a.addr)).await;
        let peers = Peers::new().unwrap();

        // Wait for the two-ring before adding the third member.
        for _ in 0..250 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if converged(&peers, &[a.addr, b.addr]).await {
                break;
            }
        }

        // C joins through A: the ring becomes A -> C -> B -> A.
        let c = spawn_node(Some(a.addr)).await;
        for _ in 0..250 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if converged(&peers, &[a.addr, b.addr, c.addr]).await {
                break;
            }
        }
        assert_eq!(
            peers.snapshot(a.addr).await.unwrap().next_port,
            c.addr.port
        );

        // C leaves; the quit walk must end with A pointing at B again.
        let _ = c.stop.send(());
        let mut healed = false;
        for _ in 0..250 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let sa = peers.snapshot(a.addr).await;
            let sb = peers.snapshot(b.addr).await;
            if let (Ok(sa), Ok(sb)) = (sa, sb) {
                if sa.next_port == b.addr.port && sb.next_port == a.addr.port {
                    healed = true;
                    break;
                }
            }
        }
        assert!(healed, "quit walk never healed the ring");

        let _ = a.stop.send(());
        let _ = b.stop.send(());
    }
}
