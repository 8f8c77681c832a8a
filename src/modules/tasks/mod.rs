// Background work: notifications, gateway re-verification, expiry sweep.

pub mod models;
pub mod services;

pub use models::{Task, TaskEnvelope, TaskHandle};
pub use services::{ChannelTaskQueue, SweepScheduler, TaskExecutor, TaskQueue, TaskRunner};
