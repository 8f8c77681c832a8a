pub mod executor;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{TaskExecutor, TaskOutcome};
pub use queue::{ChannelTaskQueue, TaskQueue};
pub use runner::TaskRunner;
pub use scheduler::SweepScheduler;
