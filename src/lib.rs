pub mod algorithm;
pub mod common;
pub mod config;
pub mod map;
pub mod scenario;
pub mod stat;

pub use algorithm::{DStar, Strategy};
pub use common::{
    manhattan, Heuristic, NoopObserver, Path, Position, RecordingObserver, SearchReport,
    SearchRequest, StepObserver, TracingObserver,
};
pub use map::{Map, Role};
