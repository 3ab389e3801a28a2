pub mod heartbeat;
pub mod input;
pub mod node;
pub mod peers;
pub mod server;
pub mod state;
pub mod task;
pub mod worker;

pub use ring_core::{Error, Result};

/// Bound on queued protocol tasks; producers block once it is reached.
pub const TASK_QUEUE_DEPTH: usize = 10;

/// Seconds between heartbeat emissions to the successor.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;

/// Predecessor silence tolerated before the orphan announcement.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 11;

/// Default delay before a freshly scheduled election enters the ring.
pub const ELECTION_SETTLE_SECS: u64 = 2;
