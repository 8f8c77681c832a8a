pub mod task;

pub use task::{Task, TaskEnvelope, TaskHandle};
