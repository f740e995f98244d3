//! Sound level input used by the stealth mechanic.
//!
//! Capturing audio is left to the embedding application; the core only polls
//! the latest amplitude through [`SoundLevelSource`].
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tracing::warn;

use crate::error::SoundError;

/// Non-blocking access to the most recent sound amplitude.
pub trait SoundLevelSource: Send + Sync {
    fn poll_level(&self) -> Result<f64, SoundError>;
}

/// A source that never hears anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSource;

impl SoundLevelSource for SilentSource {
    fn poll_level(&self) -> Result<f64, SoundError> {
        Ok(0.0)
    }
}

/// Latest-sample cell shared between a producer (a capture thread, a key
/// binding) and the session.
#[derive(Debug, Clone, Default)]
pub struct SharedSoundLevel {
    bits: Arc<AtomicU64>,
}

impl SharedSoundLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: f64) {
        self.bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl SoundLevelSource for SharedSoundLevel {
    fn poll_level(&self) -> Result<f64, SoundError> {
        Ok(self.get())
    }
}

/// Root mean square amplitude of signed 16-bit PCM samples.
pub fn rms_level(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&sample| {
            let sample = f64::from(sample);
            sample * sample
        })
        .sum();
    (sum / samples.len() as f64).sqrt()
}

/// Decides whether pursuers are scared off for the current tick.
pub struct SoundGate {
    source: Box<dyn SoundLevelSource>,
    threshold: f64,
    last_level: f64,
}

impl SoundGate {
    pub fn new(source: Box<dyn SoundLevelSource>, threshold: f64) -> Self {
        Self {
            source,
            threshold,
            last_level: 0.0,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Level read by the most recent [`SoundGate::sample`].
    pub fn last_level(&self) -> f64 {
        self.last_level
    }

    /// Polls the source. Errors and non-finite readings count as silence.
    pub fn sample(&mut self) -> f64 {
        let level = match self.source.poll_level() {
            Ok(level) if level.is_finite() => level,
            Ok(level) => {
                warn!(level, "ignoring non-finite sound level");
                0.0
            }
            Err(err) => {
                warn!(error = %err, "sound level poll failed, treating as silence");
                0.0
            }
        };
        self.last_level = level;
        level
    }

    /// Samples the source and compares against the threshold.
    pub fn is_scared(&mut self) -> bool {
        self.sample() > self.threshold
    }
}

impl std::fmt::Debug for SoundGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundGate")
            .field("threshold", &self.threshold)
            .field("last_level", &self.last_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenMicrophone;

    impl SoundLevelSource for BrokenMicrophone {
        fn poll_level(&self) -> Result<f64, SoundError> {
            Err(SoundError::Disconnected)
        }
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert_eq!(rms_level(&[]), 0.0);
        assert_eq!(rms_level(&[300, -300, 300, -300]), 300.0);
        assert!((rms_level(&[3, 4]) - (12.5f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn gate_opens_only_above_threshold() {
        let level = SharedSoundLevel::new();
        let mut gate = SoundGate::new(Box::new(level.clone()), 100.0);
        assert!(!gate.is_scared());
        level.set(100.0);
        assert!(!gate.is_scared());
        level.set(100.5);
        assert!(gate.is_scared());
        assert_eq!(gate.last_level(), 100.5);
    }

    #[test]
    fn failures_degrade_to_silence() {
        let mut gate = SoundGate::new(Box::new(BrokenMicrophone), 0.0);
        assert!(!gate.is_scared());
        assert_eq!(gate.last_level(), 0.0);

        let level = SharedSoundLevel::new();
        level.set(f64::NAN);
        let mut gate = SoundGate::new(Box::new(level), 1.0);
        assert!(!gate.is_scared());
    }
}
