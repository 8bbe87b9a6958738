//! Core installer structures shared by the worker and the front ends

mod progress;

pub use progress::{EventSink, Phase, ProgressEvent, percent_of};
