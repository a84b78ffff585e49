//! Stream driver: feeds camera frames through the detector one at a time
//! and publishes annotated frames to a display.
//!
//! Frames arrive from a producer that runs independently of processing.
//! [`FrameWorker`] hands each frame to a dedicated thread over a rendezvous
//! channel, so a frame offered while another is in flight is dropped
//! rather than queued. Annotated frames are published through a single-slot
//! [`tokio::sync::watch`] channel; the display side only ever sees complete
//! frames.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, warn};
use tokio::sync::watch;

use crate::config::DetectorConfig;
use crate::detection::DefectDetector;
use crate::frame::{Frame, RawFrame};
use crate::models::{AnnotatedFrame, Detection};

/// Debug configuration for per-frame dumps
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

impl DebugConfig {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            output_dir,
            enabled: true,
        })
    }

    /// Save the mask and annotated frame for one processed frame
    pub fn save(&self, sequence: u64, detection: &Detection) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mask_path = self.output_dir.join(format!("{:05}_mask.png", sequence));
        detection
            .mask
            .save(&mask_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug mask: {}", e))?;

        let annotated_path = self.output_dir.join(format!("{:05}_annotated.png", sequence));
        detection
            .annotated
            .image
            .save(&annotated_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug frame: {}", e))?;
        Ok(())
    }
}

/// Admits at most one frame per `min_interval`. Time is passed in so the
/// policy is deterministic.
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl FrameGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Frame-to-display scale, fixed once the first frame size is known
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayScale {
    pub scale_x: f32,
    pub scale_y: f32,
}

impl DisplayScale {
    pub const IDENTITY: DisplayScale = DisplayScale {
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub fn compute(frame_width: u32, frame_height: u32, display: Option<(u32, u32)>) -> Self {
        match display {
            Some((w, h)) if frame_width > 0 && frame_height > 0 => Self {
                scale_x: w as f32 / frame_width as f32,
                scale_y: h as f32 / frame_height as f32,
            },
            _ => Self::IDENTITY,
        }
    }

    pub fn to_display(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale_x, y * self.scale_y)
    }
}

/// Tag for values sent on the secondary result channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Measured averages of accepted outer features
    OuterLabels,
    /// Number of accepted nested features, as a single value
    NestedCount,
}

/// Downstream consumer of per-frame numeric results
pub trait ResultSink: Send {
    fn on_result(&self, kind: ResultKind, payload: &[f32]);
}

/// Sink that ignores everything
pub struct NullSink;

impl ResultSink for NullSink {
    fn on_result(&self, _kind: ResultKind, _payload: &[f32]) {}
}

/// Counters shared between the producer side and the processing thread
#[derive(Debug, Default)]
pub struct FrameStats {
    pub processed: AtomicU64,
    pub busy: AtomicU64,
    pub throttled: AtomicU64,
    pub invalid: AtomicU64,
    pub discarded: AtomicU64,
}

impl FrameStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> [u64; 5] {
        [
            self.processed.load(Ordering::Relaxed),
            self.busy.load(Ordering::Relaxed),
            self.throttled.load(Ordering::Relaxed),
            self.invalid.load(Ordering::Relaxed),
            self.discarded.load(Ordering::Relaxed),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Annotated frame handed to the display
    Published {
        sequence: u64,
        outer: usize,
        nested: usize,
    },
    /// Another frame was in flight
    Busy,
    /// Arrived sooner than the frame gate allows
    Throttled,
    /// Empty or malformed buffer
    Invalid,
    /// Every display handle was gone
    Discarded,
    /// Handed to the processing thread
    Queued,
}

type Slot = Option<Arc<AnnotatedFrame>>;

/// Display side of the publish channel
#[derive(Clone)]
pub struct DisplayHandle {
    receiver: watch::Receiver<Slot>,
    scale: Arc<OnceLock<DisplayScale>>,
}

impl DisplayHandle {
    /// Most recently published frame
    pub fn latest(&self) -> Option<Arc<AnnotatedFrame>> {
        self.receiver.borrow().clone()
    }

    /// Wait for a frame newer than the last one seen. `None` once the
    /// processor is gone.
    pub async fn next_frame(&mut self) -> Option<Arc<AnnotatedFrame>> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }

    /// Scale transform, available after the first processed frame
    pub fn scale(&self) -> Option<DisplayScale> {
        self.scale.get().copied()
    }
}

/// Runs the detector on admitted frames and publishes the results
pub struct FrameProcessor {
    detector: DefectDetector,
    gate: FrameGate,
    publisher: watch::Sender<Slot>,
    sink: Box<dyn ResultSink>,
    debug: Option<DebugConfig>,
    display_size: Option<(u32, u32)>,
    scale: Arc<OnceLock<DisplayScale>>,
    stats: Arc<FrameStats>,
    sequence: u64,
}

impl FrameProcessor {
    pub fn new(config: &DetectorConfig) -> (Self, DisplayHandle) {
        let (publisher, receiver) = watch::channel(None);
        let scale = Arc::new(OnceLock::new());
        let stream = &config.stream;
        let display_size = stream.display_width.zip(stream.display_height);

        let processor = Self {
            detector: DefectDetector::new(config),
            gate: FrameGate::new(Duration::from_millis(stream.min_frame_interval_ms)),
            publisher,
            sink: Box::new(NullSink),
            debug: None,
            display_size,
            scale: scale.clone(),
            stats: Arc::new(FrameStats::default()),
            sequence: 0,
        };
        (processor, DisplayHandle { receiver, scale })
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_gate(mut self, gate: FrameGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn detector(&self) -> &DefectDetector {
        &self.detector
    }

    pub fn stats(&self) -> Arc<FrameStats> {
        self.stats.clone()
    }

    /// Another display handle on the same channel
    pub fn subscribe(&self) -> DisplayHandle {
        DisplayHandle {
            receiver: self.publisher.subscribe(),
            scale: self.scale.clone(),
        }
    }

    /// Copy a borrowed camera buffer and process it
    pub fn on_frame(&mut self, raw: &RawFrame<'_>, now: Instant) -> FrameOutcome {
        match Frame::from_raw(raw) {
            Ok(frame) => self.submit(frame, now),
            Err(e) => {
                warn!("Skipping frame: {}", e);
                FrameStats::bump(&self.stats.invalid);
                FrameOutcome::Invalid
            }
        }
    }

    /// Process an owned frame if the gate admits it
    pub fn submit(&mut self, frame: Frame, now: Instant) -> FrameOutcome {
        if frame.width() == 0 || frame.height() == 0 {
            warn!("Skipping empty frame");
            FrameStats::bump(&self.stats.invalid);
            return FrameOutcome::Invalid;
        }
        if !self.gate.admit(now) {
            FrameStats::bump(&self.stats.throttled);
            return FrameOutcome::Throttled;
        }
        self.process(frame)
    }

    fn process(&mut self, frame: Frame) -> FrameOutcome {
        self.sequence += 1;
        let sequence = self.sequence;
        let display_size = self.display_size;
        self.scale
            .get_or_init(|| DisplayScale::compute(frame.width(), frame.height(), display_size));

        let mut detection = self.detector.detect(frame.image());
        detection.annotated.sequence = sequence;
        FrameStats::bump(&self.stats.processed);

        if let Some(debug) = &self.debug {
            if let Err(e) = debug.save(sequence, &detection) {
                warn!("Frame {}: {}", sequence, e);
            }
        }

        let labels: Vec<f32> = detection
            .accepted_outer()
            .filter_map(|c| c.marker().and_then(|m| m.average))
            .map(|avg| avg as f32)
            .collect();
        let nested = detection.accepted_nested().count();
        self.sink.on_result(ResultKind::OuterLabels, &labels);
        self.sink.on_result(ResultKind::NestedCount, &[nested as f32]);

        if self.publisher.is_closed() {
            debug!("Frame {}: display gone, discarding annotation", sequence);
            FrameStats::bump(&self.stats.discarded);
            return FrameOutcome::Discarded;
        }
        let annotated = Arc::new(detection.annotated);
        if self.publisher.send(Some(annotated)).is_err() {
            FrameStats::bump(&self.stats.discarded);
            return FrameOutcome::Discarded;
        }

        debug!(
            "Frame {}: published with {} outer and {} nested markers",
            sequence,
            labels.len(),
            nested
        );
        FrameOutcome::Published {
            sequence,
            outer: labels.len(),
            nested,
        }
    }
}

/// Processing thread fed through a rendezvous channel
pub struct FrameWorker {
    sender: SyncSender<Frame>,
    stats: Arc<FrameStats>,
    handle: JoinHandle<FrameProcessor>,
}

impl FrameWorker {
    pub fn spawn(mut processor: FrameProcessor) -> Self {
        // Zero capacity: a send only succeeds while the worker waits in recv
        let (sender, receiver) = mpsc::sync_channel::<Frame>(0);
        let stats = processor.stats();
        let handle = std::thread::spawn(move || {
            while let Ok(frame) = receiver.recv() {
                processor.submit(frame, Instant::now());
            }
            processor
        });
        Self {
            sender,
            stats,
            handle,
        }
    }

    /// Called from the frame producer. Never blocks.
    pub fn offer(&self, raw: &RawFrame<'_>) -> FrameOutcome {
        let frame = match Frame::from_raw(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping frame: {}", e);
                FrameStats::bump(&self.stats.invalid);
                return FrameOutcome::Invalid;
            }
        };
        match self.sender.try_send(frame) {
            Ok(()) => FrameOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                FrameStats::bump(&self.stats.busy);
                FrameOutcome::Busy
            }
            Err(TrySendError::Disconnected(_)) => FrameOutcome::Discarded,
        }
    }

    pub fn stats(&self) -> Arc<FrameStats> {
        self.stats.clone()
    }

    /// Stop accepting frames and wait for the in-flight one
    pub fn shutdown(self) -> Result<FrameProcessor> {
        drop(self.sender);
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("Frame worker panicked"))
    }
}
