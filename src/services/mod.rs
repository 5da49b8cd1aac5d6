//! Service layer for output directory handling and progress reporting

pub mod io;
pub mod progress;

pub use io::{format_size, validate_task_name, PARTIAL_SUFFIX};
#[cfg(feature = "cli")]
pub use progress::BarProgressSink;
pub use progress::{CountingProgressSink, LogProgressSink, NoOpProgressSink, ProgressSink};
