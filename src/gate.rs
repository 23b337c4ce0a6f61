//! RMS sensitivity gate
//!
//! Rejects near-silent recordings before they reach a backend, so a missed
//! hotkey press doesn't burn seconds of inference or a network round-trip
//! on nothing. Threshold 0 disables the gate entirely.

use crate::audio::AudioBuffer;

/// Outcome of gating a finalized buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Accepted,
    Rejected { rms: f32, threshold: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct SensitivityGate {
    /// Full-scale f32 RMS threshold; 0.0 = gate disabled
    threshold: f32,
}

impl SensitivityGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.max(0.0),
        }
    }

    /// Evaluate a finalized buffer. Must run before any backend call.
    pub fn evaluate(&self, buffer: &AudioBuffer) -> GateDecision {
        if self.threshold == 0.0 {
            return GateDecision::Accepted;
        }

        let rms = buffer.rms();
        if rms >= self.threshold {
            tracing::debug!(
                "Sensitivity gate passed: rms={:.4} >= threshold={:.4}",
                rms,
                self.threshold
            );
            GateDecision::Accepted
        } else {
            tracing::info!(
                "Sensitivity gate rejected recording: rms={:.4} < threshold={:.4}",
                rms,
                self.threshold
            );
            GateDecision::Rejected {
                rms,
                threshold: self.threshold,
            }
        }
    }
}
