//! Core layer: pure scheduling and path arithmetic, no I/O.

pub mod paths;
pub mod retry;
pub mod space;
pub mod wave;

pub use paths::{file_extension, offline_file_name, sanitize_component, temp_file_name};
pub use retry::RetryPolicy;
pub use space::{is_resumable, required_bytes};
pub use wave::plan_waves;
