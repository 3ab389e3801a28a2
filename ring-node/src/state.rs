use ring_core::wire::Snapshot;
use ring_core::NodeAddr;
use tracing::{debug, info};

/// Where a node is in its membership lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// A bootstrap successor was supplied and the join has not completed yet.
    New,
    /// The node participates in the ring.
    Ready,
}

/// The two token kinds of the ring election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Election,
    Elected,
}

impl TokenKind {
    /// The `<kind>` segment of the `/ring/le/<kind>` endpoint.
    pub fn path_segment(&self) -> &'static str {
        match self {
            TokenKind::Election => "election",
            TokenKind::Elected => "elected",
        }
    }

    pub fn from_path(segment: &str) -> Option<TokenKind> {
        match segment {
            "election" => Some(TokenKind::Election),
            "elected" => Some(TokenKind::Elected),
            _ => None,
        }
    }
}

/// An election token addressed to the successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub id: u64,
}

/// Outcome of a quit announcement at this node.
#[derive(Debug, PartialEq, Eq)]
pub enum QuitAction {
    /// We were the predecessor of the departing node; the successor pointer
    /// moved and a re-election is due.
    Repointed,
    /// Not our break; pass the announcement to the successor unchanged.
    Forward,
}

/// Phase-one decision for a chat message heading to the leader.
#[derive(Debug, PartialEq, Eq)]
pub enum UplinkAction {
    /// We hold the leadership: switch to the broadcast lap.
    Broadcast,
    /// Keep walking toward the leader.
    Forward,
}

/// Phase-two decision for a chat message on the leader's lap.
#[derive(Debug, PartialEq, Eq)]
pub enum BroadcastAction {
    /// Forward to the successor, then display the line locally.
    Deliver,
    /// The lap has returned to the leader; drop the message.
    Stop,
}

/// The protocol state of a single node.
///
/// There is exactly one writer: the worker draining the task queue. The
/// transition methods below are pure with respect to the network; each
/// returns what, if anything, the caller must send to the successor, which
/// keeps the protocol rules testable without a transport.
#[derive(Debug)]
pub struct NodeState {
    addr: NodeAddr,
    next: NodeAddr,
    status: Status,
    leader_id: Option<u64>,
    participant: bool,
}

impl NodeState {
    /// A solitary node is its own successor and its own leader.
    pub fn solitary(addr: NodeAddr) -> NodeState {
        NodeState {
            addr,
            next: addr,
            status: Status::Ready,
            leader_id: Some(addr.id()),
            participant: false,
        }
    }

    /// A joining node points at its bootstrap peer until the join completes.
    pub fn joining(addr: NodeAddr, bootstrap: NodeAddr) -> NodeState {
        NodeState {
            addr,
            next: bootstrap,
            status: Status::New,
            leader_id: None,
            participant: false,
        }
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn next(&self) -> NodeAddr {
        self.next
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn leader_id(&self) -> Option<u64> {
        self.leader_id
    }

    pub fn id(&self) -> u64 {
        self.addr.id()
    }

    pub fn is_leader(&self) -> bool {
        self.leader_id == Some(self.id())
    }

    pub fn is_singleton(&self) -> bool {
        self.next == self.addr
    }

    /// Completes a bootstrap join with the successor handed back by the
    /// acceptor. The caller must schedule an election afterwards.
    pub fn joined(&mut self, next: NodeAddr) {
        info!(next = %next, "join complete");
        self.next = next;
        self.status = Status::Ready;
    }

    /// Splices a joining peer in as the new successor and returns the old
    /// pointer for the peer to adopt.
    pub fn accept_join(&mut self, peer: NodeAddr) -> NodeAddr {
        let old = self.next;
        self.next = peer;
        info!(peer = %peer, handed_over = %old, "accepted ring join");
        old
    }

    /// Successor repair. The caller must schedule the re-election that every
    /// pointer change requires.
    pub fn repoint(&mut self, next: NodeAddr) {
        info!(old = %self.next, new = %next, "successor pointer changed");
        self.next = next;
    }

    /// One step of the ring election. Returns the token to forward to the
    /// successor, or `None` when the token is swallowed.
    ///
    /// Election tokens carry the largest id seen so far; a node already
    /// marked as participant suppresses tokens smaller than its own id.
    /// A token returning to its owner converts into the elected lap.
    pub fn election_step(&mut self, token: Token) -> Option<Token> {
        let me = self.id();
        match token.kind {
            TokenKind::Election => {
                if token.id > me {
                    self.participant = true;
                    Some(token)
                } else if token.id < me && !self.participant {
                    self.participant = true;
                    Some(Token {
                        kind: TokenKind::Election,
                        id: me,
                    })
                } else if token.id == me {
                    self.participant = false;
                    self.leader_id = Some(me);
                    info!(leader = me, "won the election");
                    Some(Token {
                        kind: TokenKind::Elected,
                        id: me,
                    })
                } else {
                    debug!(token = token.id, "suppressed election token");
                    None
                }
            }
            TokenKind::Elected => {
                if token.id == me {
                    // The elected token has lapped the ring.
                    None
                } else {
                    self.participant = false;
                    self.leader_id = Some(token.id);
                    info!(leader = token.id, "adopted ring leader");
                    Some(token)
                }
            }
        }
    }

    /// Handles a quit announcement for `target`, whose successor was
    /// `target_next`. The walk ends at the unique predecessor of `target`.
    pub fn quit_step(&mut self, target: NodeAddr, target_next: NodeAddr) -> QuitAction {
        if self.next == target {
            self.repoint(target_next);
            QuitAction::Repointed
        } else {
            QuitAction::Forward
        }
    }

    /// Phase one of message propagation: the walk toward the leader.
    pub fn uplink_step(&self) -> UplinkAction {
        if self.is_leader() {
            UplinkAction::Broadcast
        } else {
            UplinkAction::Forward
        }
    }

    /// Phase two of message propagation. `initial` marks the hop the leader
    /// itself originates; a non-initial hop arriving back at the leader ends
    /// the lap.
    pub fn broadcast_step(&self, initial: bool) -> BroadcastAction {
        if !initial && self.is_leader() {
            BroadcastAction::Stop
        } else {
            BroadcastAction::Deliver
        }
    }

    /// The node's public view for `/serialize`.
    pub fn snapshot(&self, heartbeat: u64) -> Snapshot {
        Snapshot {
            host: self.addr.host.to_string(),
            port: self.addr.port,
            next_host: self.next.host.to_string(),
            next_port: self.next.port,
            leader: self.leader_id,
            heartbeat,
        }
    }
}
