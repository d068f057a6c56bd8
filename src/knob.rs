//! Knob controls and the change-to-frame pipeline
//!
//! A knob is a bounded [0,127] control with a constant cc assigned at
//! construction. Each user-driven change runs the same pipeline:
//! dedupe → update stored value → transmit one frame.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::KnobConfig;
use crate::wire::CcFrame;

/// Where emitted frames go
///
/// The connection handle implements this for real use; tests implement it with
/// a recording sink. Implementations are fire-and-forget: a returned error
/// means the frame was not accepted, never that delivery failed downstream.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: CcFrame) -> Result<()>;
}

/// A single knob: label, constant cc, current value
///
/// The value state machine is deliberately trivial: one variable, one
/// transition. `update` de-duplicates, so a change event reporting the value
/// the knob already holds produces neither a state change nor a frame.
#[derive(Debug, Clone)]
pub struct KnobControl {
    label: String,
    cc: u8,
    value: u8,
}

impl KnobControl {
    pub fn new(label: impl Into<String>, cc: u8) -> Self {
        Self {
            label: label.into(),
            cc: cc & 0x7F,
            value: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cc(&self) -> u8 {
        self.cc
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Apply a change event; returns the frame to transmit, if any
    ///
    /// The underlying control enforces [0,127] already; clamping here guards
    /// against a bypassed or misbehaving source.
    pub fn update(&mut self, new_value: u8) -> Option<CcFrame> {
        let new_value = new_value.min(127);
        if new_value == self.value {
            return None;
        }
        self.value = new_value;
        Some(CcFrame::new(self.cc, new_value))
    }
}

/// A knob wired to a frame sink
pub struct KnobEmitter<S: FrameSink> {
    control: KnobControl,
    sink: S,
}

impl<S: FrameSink> KnobEmitter<S> {
    pub fn new(control: KnobControl, sink: S) -> Self {
        Self { control, sink }
    }

    pub fn control(&self) -> &KnobControl {
        &self.control
    }

    /// Handle one change event from the control surface
    ///
    /// A sink failure (connection already gone) is logged and swallowed; the
    /// interaction flow never sees an error.
    pub async fn on_change(&mut self, new_value: u8) {
        let Some(frame) = self.control.update(new_value) else {
            debug!("{}: unchanged value {}, suppressed", self.control.label, new_value);
            return;
        };

        debug!("{}: emitting {}", self.control.label, frame);
        if let Err(e) = self.sink.send(frame).await {
            warn!("{}: dropped {} ({})", self.control.label, frame, e);
        }
    }
}

/// Build the configured bank of knobs against one shared sink
pub fn build_bank<S: FrameSink + Clone>(knobs: &[KnobConfig], sink: S) -> Vec<KnobEmitter<S>> {
    knobs
        .iter()
        .map(|k| KnobEmitter::new(KnobControl::new(k.label.clone(), k.cc), sink.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every frame it accepts; optionally refuses all of them
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<CcFrame>>>,
        closed: bool,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<CcFrame> {
            self.frames.lock().clone()
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&self, frame: CcFrame) -> Result<()> {
            if self.closed {
                anyhow::bail!("connection closed");
            }
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    #[test]
    fn test_update_stores_value() {
        let mut knob = KnobControl::new("cutoff", 2);
        for v in 0..=127u8 {
            if v == knob.value() {
                assert!(knob.update(v).is_none());
            } else {
                let frame = knob.update(v).unwrap();
                assert_eq!(frame, CcFrame::new(2, v));
            }
            assert_eq!(knob.value(), v);
        }
    }

    #[test]
    fn test_unchanged_value_is_suppressed() {
        let mut knob = KnobControl::new("cutoff", 2);

        assert_eq!(knob.update(64), Some(CcFrame::new(2, 64)));
        // Same value again: no state change, no frame
        assert_eq!(knob.update(64), None);
        assert_eq!(knob.value(), 64);
    }

    #[test]
    fn test_cc_is_constant_across_updates() {
        let mut knob = KnobControl::new("cutoff", 5);
        let a = knob.update(10).unwrap();
        let b = knob.update(20).unwrap();
        assert_eq!(a.cc, 5);
        assert_eq!(b.cc, 5);
    }

    #[test]
    fn test_out_of_range_value_clamps() {
        let mut knob = KnobControl::new("cutoff", 2);
        let frame = knob.update(200).unwrap();
        assert_eq!(frame.value, 127);
        assert_eq!(knob.value(), 127);
    }

    #[tokio::test]
    async fn test_two_distinct_changes_transmit_two_frames() {
        let sink = RecordingSink::default();
        let mut emitter = KnobEmitter::new(KnobControl::new("cutoff", 2), sink.clone());

        emitter.on_change(10).await;
        emitter.on_change(20).await;

        assert_eq!(sink.sent(), vec![CcFrame::new(2, 10), CcFrame::new(2, 20)]);
    }

    #[tokio::test]
    async fn test_duplicate_change_transmits_once() {
        let sink = RecordingSink::default();
        let mut emitter = KnobEmitter::new(KnobControl::new("cutoff", 2), sink.clone());

        emitter.on_change(64).await;
        emitter.on_change(64).await;

        assert_eq!(sink.sent(), vec![CcFrame::new(2, 64)]);
    }

    #[tokio::test]
    async fn test_closed_sink_does_not_panic() {
        let sink = RecordingSink {
            closed: true,
            ..Default::default()
        };
        let mut emitter = KnobEmitter::new(KnobControl::new("cutoff", 2), sink.clone());

        // Must not propagate the failure to the caller
        emitter.on_change(64).await;
        assert!(sink.sent().is_empty());
        // State still advanced; the next distinct change goes out normally
        assert_eq!(emitter.control().value(), 64);
    }

    #[test]
    fn test_build_bank_from_config() {
        let configs = vec![
            KnobConfig { cc: 2, label: "cutoff".into() },
            KnobConfig { cc: 7, label: "volume".into() },
        ];
        let bank = build_bank(&configs, RecordingSink::default());

        assert_eq!(bank.len(), 2);
        assert_eq!(bank[0].control().cc(), 2);
        assert_eq!(bank[1].control().label(), "volume");
    }
}
