use std::io::BufRead;
use tracing::debug;

use crate::task::{Task, TaskSender};

/// Feeds locally typed chat lines into the task queue.
///
/// Stdin is read on a detached thread. Like every other producer it blocks
/// on a full queue; the thread ends once the queue closes.
pub fn spawn(tx: TaskSender) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    debug!(cause = %err, "stdin closed");
                    return;
                }
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let task = Task::InitMessage {
                text: text.to_string(),
            };
            if tx.blocking_send(task).is_err() {
                return;
            }
        }
    });
}
