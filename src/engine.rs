use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::Result;
use crate::config::EngineConfig;
use crate::correlate::{Composite, CompositeId, Correlator};
use crate::counter::{BoundaryLine, CountEvent, CrossingCounter, LineTotals};
use crate::detection::{DetectionFilter, ObjectClass, RawDetection};
use crate::source::Frame;
use crate::track::TrackId;
use crate::tracker::CentroidTracker;

/// Shared handle to the engine's configuration. Updates validate first
/// and then swap the snapshot atomically; a rejected update leaves the
/// previous configuration active. The engine reads one snapshot per frame,
/// so an in-flight frame never observes a partial update.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<EngineConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    pub fn snapshot(&self) -> Arc<EngineConfig> {
        self.inner.read().clone()
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        *self.inner.write() = Arc::new(config);
        info!("configuration updated");
        Ok(())
    }
}

/// One live track as exposed to reporting and visualization.
#[derive(Clone, Debug, Serialize)]
pub struct TrackView {
    pub id: TrackId,
    pub class: ObjectClass,
    pub centroid: (f64, f64),
    pub trajectory: Vec<(f64, f64)>,
    pub composite: Option<CompositeId>,
}

/// Everything reporting needs about one processed frame.
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub tracks: Vec<TrackView>,
    pub composites: Vec<Composite>,
    pub events: Vec<CountEvent>,
    pub totals: Vec<LineTotals>,
}

/// Aggregate counters, mirroring what the dashboard polls.
#[derive(Clone, Debug, Serialize)]
pub struct EngineStats {
    pub live_tracks: usize,
    pub persons: usize,
    pub umbrellas: usize,
    pub composites: usize,
    pub totals: Vec<LineTotals>,
}

/// One tracking pipeline instance. Instances are fully independent; run
/// one per camera. All track state is confined to the instance, so no
/// locking happens inside the frame path.
pub struct Engine {
    config: ConfigHandle,
    tracker: CentroidTracker,
    correlator: Correlator,
    counter: CrossingCounter,
    active_lines: Vec<BoundaryLine>,
    stop: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self::with_handle(ConfigHandle::new(config)?))
    }

    pub fn with_handle(config: ConfigHandle) -> Self {
        Self {
            config,
            tracker: CentroidTracker::new(),
            correlator: Correlator::new(),
            counter: CrossingCounter::new(),
            active_lines: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config_handle(&self) -> ConfigHandle {
        self.config.clone()
    }

    /// Flag checked between frames by [`Engine::run`]; the frame being
    /// processed when it is raised still completes.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Processes frames from the receiver until the stop flag is raised
    /// or the producer disconnects. Each report is handed to `on_report`.
    pub fn run<F>(&mut self, frames: &Receiver<Frame>, mut on_report: F)
    where
        F: FnMut(FrameReport),
    {
        while !self.stop.load(Ordering::Acquire) {
            match frames.recv_timeout(Duration::from_millis(50)) {
                Ok(frame) => on_report(self.process_frame(frame.seq, &frame.detections)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("engine stopped");
    }

    /// Runs one frame through filter, tracker, correlator and counter
    /// against a single configuration snapshot.
    pub fn process_frame(&mut self, seq: u64, raw: &[RawDetection]) -> FrameReport {
        let config = self.config.snapshot();

        if config.lines != self.active_lines {
            // Lines changed under us; re-determine every track's side
            // without firing counts for the jump.
            for track in self.tracker.tracks_mut() {
                track.line_states.clear();
            }
            self.counter.resize(config.lines.len());
            self.active_lines = config.lines.clone();
        }

        let detections = DetectionFilter::apply(&config.detection, raw);
        let removed = self.tracker.update(&detections, &config.tracking, seq);

        self.correlator.prune(&removed, self.tracker.tracks_mut());
        if config.correlation.enabled {
            self.correlator
                .update(self.tracker.tracks_mut(), &config.correlation);
        } else {
            self.correlator.dissolve_all(self.tracker.tracks_mut());
        }

        let events = self
            .counter
            .process(self.tracker.tracks_mut(), &config.lines);

        self.report(seq, events)
    }

    /// Clears all counts and live tracks. Track ids keep increasing from
    /// where they were, so identities from before the reset stay unique.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.correlator.clear();
        self.counter.reset();
        info!("engine state reset");
    }

    pub fn stats(&self) -> EngineStats {
        let tracks = self.tracker.tracks();
        EngineStats {
            live_tracks: tracks.len(),
            persons: tracks
                .iter()
                .filter(|t| t.class == ObjectClass::Person)
                .count(),
            umbrellas: tracks
                .iter()
                .filter(|t| t.class == ObjectClass::Umbrella)
                .count(),
            composites: self.correlator.composites().len(),
            totals: self.counter.totals().to_vec(),
        }
    }

    fn report(&self, seq: u64, events: Vec<CountEvent>) -> FrameReport {
        let tracks = self
            .tracker
            .tracks()
            .iter()
            .map(|track| {
                let centroid = track.centroid();
                TrackView {
                    id: track.id,
                    class: track.class,
                    centroid: (centroid.x, centroid.y),
                    trajectory: track.history.iter().map(|p| (p.x, p.y)).collect(),
                    composite: track.composite,
                }
            })
            .collect();

        FrameReport {
            frame: seq,
            tracks,
            composites: self.correlator.composites().to_vec(),
            events,
            totals: self.counter.totals().to_vec(),
        }
    }
}
