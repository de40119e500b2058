pub mod dispatch;
pub mod owner_thread;

pub use dispatch::Request;
pub use owner_thread::{Completion, Marshal, OwnerThread, Resolver, SchedulerError};
