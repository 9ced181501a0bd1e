use rand::distr::{Alphanumeric, SampleString};

/// Reader, processor and writer abstractions.
pub mod item;

/// Bounded groups of items and their commit phases.
pub mod chunk;

/// Job runner and job execution state.
pub mod job;

/// Job lifecycle observers.
pub mod listener;

/// Chunk-oriented step execution.
pub mod step;

/// Generates a random name consisting of alphanumeric characters.
///
/// # Returns
///
/// A `String` containing the generated random name.
fn build_name() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 8)
}
