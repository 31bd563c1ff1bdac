pub mod move_file;

pub use move_file::{FallbackStrategy, MoveOptions, copy_file, move_file};
