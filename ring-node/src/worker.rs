use ring_core::wire::{ChatForm, QuitForm};
use ring_core::NodeAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{debug, warn};

use crate::peers::Peers;
use crate::state::{BroadcastAction, NodeState, QuitAction, Token, TokenKind, UplinkAction};
use crate::task::{Task, TaskReceiver, TaskSender};

/// The single consumer of the task queue.
///
/// Every mutation of [`NodeState`] happens here, one task to completion at
/// a time. Outbound requests are awaited inline, so a slow successor stalls
/// the whole queue; that is the intended backpressure.
pub struct Worker {
    state: Arc<Mutex<NodeState>>,
    peers: Peers,
    rx: TaskReceiver,
    tx: TaskSender,
    shutdown: broadcast::Receiver<()>,
    settle: Duration,
}

impl Worker {
    pub fn new(
        state: Arc<Mutex<NodeState>>,
        peers: Peers,
        rx: TaskReceiver,
        tx: TaskSender,
        shutdown: broadcast::Receiver<()>,
        settle: Duration,
    ) -> Worker {
        Worker {
            state,
            peers,
            rx,
            tx,
            shutdown,
            settle,
        }
    }

    pub async fn run(mut self) {
        loop {
            let task = tokio::select! {
                task = self.rx.recv() => match task {
                    Some(task) => task,
                    None => return,
                },
                _ = self.shutdown.recv() => return,
            };
            debug!(?task, "executing");
            self.execute(task).await;
        }
    }

    async fn execute(&mut self, task: Task) {
        match task {
            Task::InitElection => self.init_election().await,
            Task::Token(token) => self.election_hop(token).await,
            Task::Panic { orphan } => self.panic_hop(orphan).await,
            Task::InitMessage { text } => {
                let sender = self.state.lock().await.id();
                self.uplink_hop(text, sender).await;
            }
            Task::Uplink { text, sender } => self.uplink_hop(text, sender).await,
            Task::Broadcast { text, sender } => self.broadcast_hop(text, sender, false).await,
            Task::Join { peer, reply } => {
                let old = self.state.lock().await.accept_join(peer);
                let _ = reply.send(old);
            }
            Task::Quit {
                target,
                target_next,
            } => self.quit_hop(target, target_next).await,
        }
    }

    /// Every successor-pointer change schedules a fresh election. The
    /// worker must not block on its own queue, so the trigger is dropped
    /// when the queue is full; the next membership change re-arms it.
    fn schedule_election(&self) {
        if let Err(err) = self.tx.try_send(Task::InitElection) {
            warn!(cause = %err, "election trigger dropped, queue full");
        }
    }

    async fn init_election(&mut self) {
        // Let a just-changed ring settle before the token enters it.
        time::sleep(self.settle).await;
        let (next, out) = {
            let mut state = self.state.lock().await;
            let out = state.election_step(Token {
                kind: TokenKind::Election,
                id: 0,
            });
            (state.next(), out)
        };
        if let Some(token) = out {
            self.forward_token(next, token).await;
        }
    }

    async fn election_hop(&mut self, token: Token) {
        let (next, out) = {
            let mut state = self.state.lock().await;
            let out = state.election_step(token);
            (state.next(), out)
        };
        if let Some(token) = out {
            self.forward_token(next, token).await;
        }
    }

    async fn forward_token(&self, next: NodeAddr, token: Token) {
        if let Err(err) = self.peers.forward_token(next, token).await {
            warn!(to = %next, cause = %err, "election token lost");
        }
    }

    async fn panic_hop(&mut self, orphan: NodeAddr) {
        let next = self.state.lock().await.next();
        match self.peers.panic(next, orphan).await {
            Ok(()) => {}
            Err(err) if err.is_unreachable() => {
                // The successor is the dead node; adopt the orphan.
                self.state.lock().await.repoint(orphan);
                self.schedule_election();
            }
            Err(err) => {
                warn!(to = %next, cause = %err, "orphan announcement lost");
            }
        }
    }

    async fn uplink_hop(&mut self, text: String, sender: u64) {
        let (next, action) = {
            let state = self.state.lock().await;
            (state.next(), state.uplink_step())
        };
        match action {
            UplinkAction::Broadcast => self.broadcast_hop(text, sender, true).await,
            UplinkAction::Forward => {
                let form = ChatForm {
                    message: text,
                    sender,
                };
                if let Err(err) = self.peers.uplink(next, &form).await {
                    warn!(to = %next, cause = %err, "chat message lost on uplink");
                }
            }
        }
    }

    async fn broadcast_hop(&mut self, text: String, sender: u64, initial: bool) {
        let (next, action) = {
            let state = self.state.lock().await;
            (state.next(), state.broadcast_step(initial))
        };
        match action {
            BroadcastAction::Stop => {}
            BroadcastAction::Deliver => {
                let form = ChatForm {
                    message: text,
                    sender,
                };
                if let Err(err) = self.peers.broadcast(next, &form).await {
                    warn!(to = %next, cause = %err, "chat message lost on broadcast");
                }
                // The chat line itself goes to stdout, not the log.
                println!("{}: {}", NodeAddr::from_id(sender), form.message);
            }
        }
    }

    async fn quit_hop(&mut self, target: NodeAddr, target_next: NodeAddr) {
        let (next, action) = {
            let mut state = self.state.lock().await;
            let action = state.quit_step(target, target_next);
            (state.next(), action)
        };
        match action {
            QuitAction::Repointed => self.schedule_election(),
            QuitAction::Forward => {
                let form = QuitForm::new(target, target_next);
                if let Err(err) = self.peers.quit(next, &form).await {
                    warn!(to = %next, cause = %err, "quit announcement lost");
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task;
    use tokio::net::TcpListener;
    use tokio::sync::{broadcast, oneshot};

    async fn dead_addr() -> NodeAddr {
        // Bind and immediately drop a listener; the freed port refuses
        // connections for the duration of the test.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn spawn_worker(state: Arc<Mutex<NodeState>>) -> (TaskSender, broadcast::Sender<()>) {
        let (tx, rx) = task::queue();
        let (notify, _) = broadcast::channel(1);
        let worker = Worker::new(
            state,
            Peers::new().unwrap(),
            rx,
            tx.clone(),
            notify.subscribe(),
            Duration::from_millis(1),
        );
        tokio::spawn(worker.run());
        (tx, notify)
    }

    #[tokio::test]
    async fn join_task_swaps_the_pointer_and_replies_with_the_old_one() {
        let me = dead_addr().await;
        let peer = dead_addr().await;
        let state = Arc::new(Mutex::new(NodeState::solitary(me)));
        let (tx, _notify) = spawn_worker(state.clone());

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Task::Join {
            peer,
            reply: reply_tx,
        })
        .await
        .unwrap();

        assert_eq!(reply_rx.await.unwrap(), me);
        assert_eq!(state.lock().await.next(), peer);
    }

    #[tokio::test]
    async fn panic_against_a_dead_successor_adopts_the_orphan() {
        let me = dead_addr().await;
        let dead = dead_addr().await;
        let mut solitary = NodeState::solitary(me);
        solitary.repoint(dead);
        let state = Arc::new(Mutex::new(solitary));
        let (tx, _notify) = spawn_worker(state.clone());

        tx.send(Task::Panic { orphan: me }).await.unwrap();

        for _ in 0..100 {
            if state.lock().await.next() == me {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.lock().await.next(), me);
    }
}
