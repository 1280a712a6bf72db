//! CLI commands for Seedbed.
//!
//! - **Queue commands**: due, learn, lessons (read-only)
//! - **Progress commands**: answer, unlock (write through the item store)
//! - **Reporting**: stats

// Queue commands
pub mod queue;

// Progress commands
pub mod answer;
pub mod unlock;

// Reporting
pub mod stats;

pub use answer::AnswerCommand;
pub use queue::{Queue, QueueCommand};
pub use stats::StatsCommand;
pub use unlock::UnlockCommand;
