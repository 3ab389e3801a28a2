use ring_core::NodeAddr;
use tokio::sync::{mpsc, oneshot};

use crate::state::Token;

/// A unit of protocol work. Everything that touches node state becomes one
/// of these and goes through the bounded queue; the worker executes them
/// one at a time, which is the only mutation discipline in the system.
#[derive(Debug)]
pub enum Task {
    /// Schedule a fresh election round after the settling delay.
    InitElection,
    /// An election or elected token received from the predecessor.
    Token(Token),
    /// An orphan announcement walking the ring.
    Panic { orphan: NodeAddr },
    /// A chat line typed locally on this node.
    InitMessage { text: String },
    /// Phase-one chat hop heading for the leader.
    Uplink { text: String, sender: u64 },
    /// Phase-two chat hop on the leader's lap.
    Broadcast { text: String, sender: u64 },
    /// A join request; the old successor pointer goes back on `reply`.
    Join {
        peer: NodeAddr,
        reply: oneshot::Sender<NodeAddr>,
    },
    /// A quit announcement for `target`, whose successor was `target_next`.
    Quit {
        target: NodeAddr,
        target_next: NodeAddr,
    },
}

pub type TaskSender = mpsc::Sender<Task>;
pub type TaskReceiver = mpsc::Receiver<Task>;

/// Builds the bounded work queue feeding the worker. Producers block once
/// the bound is reached, which is the system's backpressure.
pub fn queue() -> (TaskSender, TaskReceiver) {
    mpsc::channel(crate::TASK_QUEUE_DEPTH)
}
