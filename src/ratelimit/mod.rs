//! Fixed-window admission control and partition state management.

mod key;
mod limiter;
mod partition;
mod verdict;
mod window;

pub use key::{PartitionKey, GLOBAL_PARTITION};
pub use limiter::{AdmissionController, EvaluationMode};
pub use partition::{Partition, PartitionTable};
pub use verdict::{AdmissionVerdict, Decision, LimiterClass};
pub use window::{LimiterConfig, WindowState};
