//! Frame processor and worker tests: drop policy, publishing, side channels.

mod common;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use defectscan::{
    DebugConfig, Frame, FrameGate, FrameOutcome, FrameProcessor, FrameWorker, PixelFormat,
    RawFrame, ResultKind, ResultSink,
};
use image::Rgb;

use common::*;

fn feature_frame() -> image::RgbImage {
    frame_with_squares(48, 48, &[(20, 20, 8)], FEATURE, BACKDROP)
}

/// Records everything sent on the secondary result channel
#[derive(Clone, Default)]
struct RecordingSink {
    results: Arc<Mutex<Vec<(ResultKind, Vec<f32>)>>>,
}

impl ResultSink for RecordingSink {
    fn on_result(&self, kind: ResultKind, payload: &[f32]) {
        self.results.lock().unwrap().push((kind, payload.to_vec()));
    }
}

/// Holds the processing thread inside `on_result` until released
struct BlockingSink {
    entered: Sender<()>,
    release: Mutex<Receiver<()>>,
}

impl ResultSink for BlockingSink {
    fn on_result(&self, kind: ResultKind, _payload: &[f32]) {
        if kind != ResultKind::OuterLabels {
            return;
        }
        let _ = self.entered.send(());
        let _ = self.release.lock().unwrap().recv();
    }
}

#[test]
fn test_raw_frame_is_processed_and_published() {
    init_logging();
    let (mut processor, display) = FrameProcessor::new(&DetectorConfig::default());
    let image = feature_frame();
    let raw = RawFrame::packed(48, 48, PixelFormat::Rgb8, image.as_raw());

    let outcome = processor.on_frame(&raw, Instant::now());
    assert_eq!(
        outcome,
        FrameOutcome::Published {
            sequence: 1,
            outer: 1,
            nested: 0
        }
    );

    let latest = display.latest().expect("frame should be published");
    assert_eq!(latest.sequence, 1);
    assert_eq!(latest.image.dimensions(), (48, 48));
    assert_eq!(display.scale(), Some(defectscan::DisplayScale::IDENTITY));
}

#[test]
fn test_bgra_buffer_matches_rgb_result() {
    let image = feature_frame();
    let bgra: Vec<u8> = image
        .pixels()
        .flat_map(|p| [p[2], p[1], p[0], 255])
        .collect();

    let (mut processor, display) = FrameProcessor::new(&DetectorConfig::default());
    let raw = RawFrame::packed(48, 48, PixelFormat::Bgra8, &bgra);
    processor.on_frame(&raw, Instant::now());

    let expected = defectscan::DefectDetector::default().detect(&image);
    assert_eq!(display.latest().unwrap().image, expected.annotated.image);
}

#[test]
fn test_malformed_frame_is_skipped() {
    let (mut processor, display) = FrameProcessor::new(&DetectorConfig::default());
    let stats = processor.stats();

    let empty = RawFrame::packed(0, 0, PixelFormat::Rgb8, &[]);
    assert_eq!(processor.on_frame(&empty, Instant::now()), FrameOutcome::Invalid);

    let short = [0u8; 10];
    let truncated = RawFrame::packed(8, 8, PixelFormat::Rgb8, &short);
    assert_eq!(processor.on_frame(&truncated, Instant::now()), FrameOutcome::Invalid);

    assert!(display.latest().is_none());
    assert_eq!(stats.snapshot(), [0, 0, 0, 2, 0]);
}

#[test]
fn test_gate_throttles_frames_inside_interval() {
    let mut config = DetectorConfig::default();
    config.stream.min_frame_interval_ms = 100;
    let (mut processor, _display) = FrameProcessor::new(&config);
    let start = Instant::now();

    let frame = Frame::new(feature_frame());
    assert!(matches!(
        processor.submit(frame.clone(), start),
        FrameOutcome::Published { .. }
    ));
    assert_eq!(
        processor.submit(frame.clone(), start + Duration::from_millis(30)),
        FrameOutcome::Throttled
    );
    assert!(matches!(
        processor.submit(frame, start + Duration::from_millis(130)),
        FrameOutcome::Published { sequence: 2, .. }
    ));
}

#[test]
fn test_annotation_discarded_when_display_is_gone() {
    let (mut processor, display) = FrameProcessor::new(&DetectorConfig::default());
    drop(display);

    let outcome = processor.submit(Frame::new(feature_frame()), Instant::now());
    assert_eq!(outcome, FrameOutcome::Discarded);
    assert_eq!(processor.stats().snapshot()[4], 1);
}

#[test]
fn test_results_reach_secondary_channel() {
    let sink = RecordingSink::default();
    let (processor, _display) = FrameProcessor::new(&DetectorConfig::default());
    let mut processor = processor.with_sink(Box::new(sink.clone()));

    processor.submit(Frame::new(feature_frame()), Instant::now());

    let results = sink.results.lock().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, ResultKind::OuterLabels);
    assert_eq!(results[0].1.len(), 1);
    assert!((results[0].1[0] - 125.0).abs() < 1e-3);
    assert_eq!(results[1], (ResultKind::NestedCount, vec![0.0]));
}

#[test]
fn test_repeated_frames_publish_identical_pixels() {
    let (processor, display) = FrameProcessor::new(&DetectorConfig::default());
    let mut processor = processor.with_gate(FrameGate::unlimited());
    let frame = Frame::new(feature_frame());

    processor.submit(frame.clone(), Instant::now());
    let first = display.latest().unwrap();
    processor.submit(frame, Instant::now());
    let second = display.latest().unwrap();

    assert_eq!(second.sequence, 2);
    assert_eq!(first.image, second.image);
    assert!(display.scale().is_some());
}

#[test]
fn test_display_scale_computed_from_first_frame() {
    let mut config = DetectorConfig::default();
    config.stream.display_width = Some(96);
    config.stream.display_height = Some(24);
    let (mut processor, display) = FrameProcessor::new(&config);
    assert_eq!(display.scale(), None);

    processor.submit(Frame::new(feature_frame()), Instant::now());
    let scale = display.scale().unwrap();
    assert_eq!((scale.scale_x, scale.scale_y), (2.0, 0.5));

    // A differently sized frame later does not change the cached transform
    processor.submit(Frame::new(flat_frame(10, 10, Rgb([0, 0, 0]))), Instant::now());
    assert_eq!(display.scale(), Some(scale));
}

#[test]
fn test_debug_dumps_mask_and_annotation() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug = DebugConfig::new(dir.path().join("dumps"))?;
    let (processor, _display) = FrameProcessor::new(&DetectorConfig::default());
    let mut processor = processor.with_debug(debug);

    processor.submit(Frame::new(feature_frame()), Instant::now());

    assert!(dir.path().join("dumps/00001_mask.png").exists());
    assert!(dir.path().join("dumps/00001_annotated.png").exists());
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("stale.txt"), "x")?;

    let result = DebugConfig::new(dir.path().to_path_buf());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not empty"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_publishes_to_waiting_display() -> anyhow::Result<()> {
    let (processor, mut display) = FrameProcessor::new(&DetectorConfig::default());
    let worker = FrameWorker::spawn(processor);
    let image = feature_frame();
    let raw = RawFrame::packed(48, 48, PixelFormat::Rgb8, image.as_raw());

    // The worker may not be waiting yet; offers are dropped until it is
    let mut queued = false;
    for _ in 0..500 {
        if worker.offer(&raw) == FrameOutcome::Queued {
            queued = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(queued, "worker never accepted a frame");

    let frame = tokio::time::timeout(Duration::from_secs(10), display.next_frame())
        .await?
        .expect("processor still alive");
    assert_eq!(frame.sequence, 1);

    let stats = worker.stats();
    let processor = worker.shutdown()?;
    assert_eq!(stats.snapshot()[0], 1);
    assert_eq!(processor.stats().snapshot()[0], 1);
    Ok(())
}

#[test]
fn test_worker_counts_invalid_offers() -> anyhow::Result<()> {
    let (processor, _display) = FrameProcessor::new(&DetectorConfig::default());
    let worker = FrameWorker::spawn(processor);

    let raw = RawFrame::packed(4, 4, PixelFormat::Gray8, &[0u8; 3]);
    assert_eq!(worker.offer(&raw), FrameOutcome::Invalid);
    assert_eq!(worker.stats().snapshot()[3], 1);

    worker.shutdown()?;
    Ok(())
}

#[test]
fn test_worker_drops_frame_offered_while_busy() -> anyhow::Result<()> {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let sink = BlockingSink {
        entered: entered_tx,
        release: Mutex::new(release_rx),
    };
    let (processor, _display) = FrameProcessor::new(&DetectorConfig::default());
    let worker = FrameWorker::spawn(processor.with_sink(Box::new(sink)));
    let image = feature_frame();
    let raw = RawFrame::packed(48, 48, PixelFormat::Rgb8, image.as_raw());

    let mut queued = false;
    for _ in 0..500 {
        if worker.offer(&raw) == FrameOutcome::Queued {
            queued = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(queued, "worker never accepted a frame");

    // The first frame is now parked inside the sink
    entered_rx.recv_timeout(Duration::from_secs(10))?;
    let busy_before = worker.stats().snapshot()[1];
    assert_eq!(worker.offer(&raw), FrameOutcome::Busy);
    assert_eq!(worker.stats().snapshot()[1], busy_before + 1);

    release_tx.send(())?;
    let processor = worker.shutdown()?;
    assert_eq!(processor.stats().snapshot()[0], 1);
    Ok(())
}
