//! Hand-off between the gesture thread and the animation loop.
//!
//! The producer overwrites, the consumer reads whatever is newest. Nothing
//! queues: a slow consumer simply skips stale values.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use morphcloud_platform::{DetectionFrame, DetectionSink, GestureSource};
use tracing::{info, warn};

use crate::gesture::{GestureSignalProcessor, GestureState};

/// Single-value, last-write-wins cell shared across threads.
#[derive(Debug)]
pub struct Slot<T> {
    inner: Arc<Mutex<T>>,
    initial: T,
}

impl<T: Clone> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            initial: self.initial.clone(),
        }
    }
}

impl<T: Clone> Slot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial.clone())),
            initial,
        }
    }

    pub fn publish(&self, value: T) {
        *self.lock() = value;
    }

    pub fn latest(&self) -> T {
        self.lock().clone()
    }

    /// Restore the value the slot was created with.
    pub fn reset(&self) {
        *self.lock() = self.initial.clone();
    }

    // A panicking writer can only leave a fully written value behind.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub type SignalSlot = Slot<GestureState>;
pub type LandmarkSlot = Slot<DetectionFrame>;

/// Runs detection frames through the processor and publishes the results.
pub struct GestureFeed {
    processor: GestureSignalProcessor,
    signal: SignalSlot,
    landmarks: Option<LandmarkSlot>,
}

impl GestureFeed {
    pub fn new(processor: GestureSignalProcessor, signal: SignalSlot) -> Self {
        Self {
            processor,
            signal,
            landmarks: None,
        }
    }

    /// Also publish raw frames, for landmark overlays.
    pub fn with_landmarks(mut self, landmarks: LandmarkSlot) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}

impl DetectionSink for GestureFeed {
    fn deliver(&mut self, frame: DetectionFrame) {
        let state = self.processor.process(&frame);
        self.signal.publish(state);
        if let Some(landmarks) = &self.landmarks {
            landmarks.publish(frame);
        }
    }

    fn unavailable(&mut self, reason: &str) {
        warn!("hand tracking unavailable: {reason}");
        self.processor.reset();
        self.signal.publish(self.processor.state());
        if let Some(landmarks) = &self.landmarks {
            landmarks.publish(DetectionFrame::empty());
        }
    }
}

/// A gesture source running on its own thread.
pub struct SourceHandle {
    stop: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl SourceHandle {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Ask the source to stop and wait for its thread.
    pub fn stop(mut self) {
        let _ = self.stop.try_send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("gesture source thread panicked");
            }
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        let _ = self.stop.try_send(());
    }
}

/// Start `source` on a background thread feeding `feed`.
///
/// A source that fails is reported through [`DetectionSink::unavailable`], so
/// the signal falls back to neutral and the animation keeps running.
pub fn spawn_gesture_source(source: Box<dyn GestureSource>, mut feed: GestureFeed) -> io::Result<SourceHandle> {
    let (stop_tx, stop_rx) = bounded(1);
    let join = thread::Builder::new()
        .name("gesture-source".into())
        .spawn(move || match source.run(&mut feed, &stop_rx) {
            Ok(()) => info!("gesture source finished"),
            Err(e) => feed.unavailable(&e.to_string()),
        })?;
    Ok(SourceHandle {
        stop: stop_tx,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::Receiver;

    use super::*;
    use crate::config::GestureConfig;
    use crate::gesture::posed_hand;

    fn feed() -> (GestureFeed, SignalSlot, LandmarkSlot) {
        let config = GestureConfig::default();
        let signal = SignalSlot::new(GestureState::neutral(&config));
        let landmarks = LandmarkSlot::new(DetectionFrame::empty());
        let feed = GestureFeed::new(GestureSignalProcessor::new(config), signal.clone())
            .with_landmarks(landmarks.clone());
        (feed, signal, landmarks)
    }

    fn wide_apart() -> DetectionFrame {
        DetectionFrame::with_hands(vec![posed_hand(0.2, 0.5, 0.1, 1.0), posed_hand(0.8, 0.5, 0.1, 1.0)])
    }

    struct Burst(usize);

    impl GestureSource for Burst {
        fn run(self: Box<Self>, sink: &mut dyn DetectionSink, _stop: &Receiver<()>) -> morphcloud_platform::Result<()> {
            for _ in 0..self.0 {
                sink.deliver(wide_apart());
            }
            Ok(())
        }
    }

    struct NoCamera;

    impl GestureSource for NoCamera {
        fn run(self: Box<Self>, _sink: &mut dyn DetectionSink, _stop: &Receiver<()>) -> morphcloud_platform::Result<()> {
            Err("camera permission denied".into())
        }
    }

    struct UntilStopped;

    impl GestureSource for UntilStopped {
        fn run(self: Box<Self>, sink: &mut dyn DetectionSink, stop: &Receiver<()>) -> morphcloud_platform::Result<()> {
            while stop.recv_timeout(Duration::from_millis(1)).is_err() {
                sink.deliver(DetectionFrame::empty());
            }
            Ok(())
        }
    }

    #[test]
    fn slot_keeps_only_the_latest_value() {
        let slot = Slot::new(0u32);
        let writer = slot.clone();
        for i in 1..=5 {
            writer.publish(i);
        }
        assert_eq!(slot.latest(), 5);
        slot.reset();
        assert_eq!(writer.latest(), 0);
    }

    #[test]
    fn slot_survives_a_poisoned_lock() {
        let slot = Slot::new(7u32);
        let inner = Arc::clone(&slot.inner);
        let _ = thread::spawn(move || {
            let _guard = inner.lock().unwrap();
            panic!("writer died");
        })
        .join();
        assert_eq!(slot.latest(), 7);
        slot.publish(8);
        assert_eq!(slot.latest(), 8);
    }

    #[test]
    fn feed_publishes_whole_states_and_frames() {
        let (feed, signal, landmarks) = feed();
        let handle = spawn_gesture_source(Box::new(Burst(50)), feed).unwrap();
        handle.stop();
        let state = signal.latest();
        assert!(state.detected);
        assert_eq!(state.hands, 2);
        assert!(state.distance > 0.99);
        assert_eq!(landmarks.latest().hands.len(), 2);
    }

    #[test]
    fn failing_source_falls_back_to_neutral() {
        let (feed, signal, landmarks) = feed();
        signal.publish(GestureState {
            distance: 1.0,
            detected: true,
            ..signal.latest()
        });
        let handle = spawn_gesture_source(Box::new(NoCamera), feed).unwrap();
        handle.stop();
        assert_eq!(signal.latest(), GestureState::neutral(&GestureConfig::default()));
        assert!(landmarks.latest().is_empty());
    }

    #[test]
    fn stop_ends_a_running_source() {
        let (feed, _signal, _landmarks) = feed();
        let handle = spawn_gesture_source(Box::new(UntilStopped), feed).unwrap();
        assert!(!handle.is_finished());
        handle.stop();
    }
}
