//! What the async logger does when its queue is full

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for a full async queue
///
/// The default is [`OverflowPolicy::Block`]: a full queue is backpressure on
/// the caller, the same contract the broker client applies to its own queue.
///
/// # Example
///
/// ```
/// use rust_kafka_logger::OverflowPolicy;
/// use std::time::Duration;
///
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// assert_eq!(policy.to_string(), "BlockWithTimeout(100ms)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the worker frees a slot
    #[default]
    Block,

    /// Wait up to the timeout, then drop with an alert
    BlockWithTimeout(Duration),

    /// Drop the new entry silently, counting it in metrics
    DropNewest,

    /// Drop the new entry, warn on stderr and call the overflow callback
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Called with the running dropped count when entries are dropped
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
