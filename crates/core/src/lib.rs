#![forbid(unsafe_code)]

//! Domain rules for course assessments and progress: exam authoring
//! validation, grading, chapter completion and content sequencing.

pub mod error;
pub mod grading;
pub mod model;
pub mod sequencer;
pub mod time;

pub use error::Error;
pub use time::Clock;
