mod associate;
mod bbox;
mod config;
mod correlate;
mod counter;
mod detection;
mod engine;
mod motion;
mod source;
mod track;
mod tracker;

pub use bbox::BBox;
pub use config::{CorrelationConfig, DetectionConfig, EngineConfig, TrackingConfig};
pub use correlate::{Composite, CompositeId, Correlator};
pub use counter::{BoundaryLine, CountEvent, CrossingCounter, Direction, LineTotals};
pub use detection::{Detection, DetectionFilter, ObjectClass, RawDetection};
pub use engine::{ConfigHandle, Engine, EngineStats, FrameReport, TrackView};
pub use source::{Frame, FramePublisher, frame_slot};
pub use track::{Side, Track, TrackId};
pub use tracker::CentroidTracker;

pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors surfaced by the counting engine.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("invalid configuration: {0}")]
        InvalidConfig(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}
