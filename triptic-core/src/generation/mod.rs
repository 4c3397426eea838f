//! Asynchronous image and video generation
//!
//! - `generator` - the external `Generator` capability
//! - `placeholder` - a built-in generator that renders solid colour frames
//! - `job` - job records, states and requests
//! - `queue` - `GenerationQueue`: enqueue, poll, cancel, commit

mod generator;
mod job;
mod placeholder;
mod queue;

#[cfg(test)]
mod tests;

pub use generator::Generator;
pub use job::{
    CancelReport, GenerationJob, GenerationRequest, JobKind, JobResult, JobState, JobTarget,
    MAX_CONTEXT_SCREENS,
};
pub use placeholder::{screen_colour, PlaceholderGenerator};
pub use queue::{GenerationQueue, QueueConfig};
