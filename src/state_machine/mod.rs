//! # Task Lifecycle
//!
//! `created -> assigned -> in_progress -> completed`, with cancellation from any
//! live status and time-triggered archival of completed work.

pub mod events;
pub mod guards;
pub mod states;
pub mod task_state_machine;

pub use events::TaskEvent;
pub use guards::StateGuard;
pub use states::TaskStatus;
pub use task_state_machine::TaskStateMachine;
