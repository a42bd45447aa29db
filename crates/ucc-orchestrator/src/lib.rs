//! The job orchestrator (`spec.md` §4.10–§4.11, §5): the 12-segment chain,
//! `ProgressBus`, retry/backoff and cancellation. Grounded on
//! `ob-workflow::{engine,listener,task_queue}`'s poll-loop and state-machine
//! conventions, generalized from a single consumer to a worker pool.

pub mod orchestrator;
pub mod progress;
pub mod retry;

pub use orchestrator::Orchestrator;
pub use progress::{FrameType, ProgressBus, ProgressFrame};
