//! Playback traces: recorded or hand-written signal sequences stored as TOML.
//!
//! ```toml
//! podcast_id = "6740a1"
//!
//! [policy]
//! long_form_threshold = 30.0
//!
//! [[events]]
//! kind = "metadata_ready"
//! duration = 42.0
//!
//! [[events]]
//! kind = "playback_started"
//! position = 0.0
//!
//! [[events]]
//! kind = "sweep"
//! from = 0.0
//! to = 12.0
//! step = 0.25
//! ```
//!
//! A `sweep` stands for the position samples a player emits while playing
//! from `from` to `to`, one every `step` seconds.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    media::{MediaElement, MediaSignal},
    session::ViewPolicy,
};

const MAX_SWEEP_SAMPLES: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    MetadataReady { duration: f64 },
    PlaybackStarted { position: f64 },
    PlaybackStopped { position: f64 },
    PositionSample { position: f64 },
    Sweep { from: f64, to: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackTrace {
    pub podcast_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ViewPolicy>,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

impl PlaybackTrace {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Reading trace {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Loading trace {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let trace: PlaybackTrace = toml::from_str(content).context("parsing playback trace")?;
        if trace.podcast_id.trim().is_empty() {
            bail!("trace has an empty podcast_id");
        }
        if let Some(policy) = &trace.policy {
            policy.validate().context("trace policy")?;
        }
        for (index, event) in trace.events.iter().enumerate() {
            if let TraceEvent::Sweep { from, to, step } = *event {
                validate_sweep(from, to, step)
                    .with_context(|| format!("event #{} is not a valid sweep", index + 1))?;
            }
        }
        Ok(trace)
    }

    /// Flattens the trace into the signals a player would dispatch.
    pub fn signals(&self) -> Vec<MediaSignal> {
        let mut signals = Vec::with_capacity(self.events.len());
        for event in &self.events {
            match *event {
                TraceEvent::MetadataReady { duration } => {
                    signals.push(MediaSignal::MetadataReady { duration })
                }
                TraceEvent::PlaybackStarted { position } => {
                    signals.push(MediaSignal::PlaybackStarted { position })
                }
                TraceEvent::PlaybackStopped { position } => {
                    signals.push(MediaSignal::PlaybackStopped { position })
                }
                TraceEvent::PositionSample { position } => {
                    signals.push(MediaSignal::PositionSample { position })
                }
                TraceEvent::Sweep { from, to, step } => {
                    signals.extend(
                        sweep_positions(from, to, step)
                            .map(|position| MediaSignal::PositionSample { position }),
                    );
                }
            }
        }
        signals
    }

    /// Dispatches every signal on `element` in order. Returns the number of
    /// listener deliveries.
    pub fn replay(&self, element: &MediaElement) -> usize {
        self.signals()
            .into_iter()
            .map(|signal| element.dispatch(signal))
            .sum()
    }
}

fn validate_sweep(from: f64, to: f64, step: f64) -> Result<()> {
    if !(from.is_finite() && to.is_finite() && step.is_finite()) {
        bail!("sweep bounds must be finite");
    }
    if step <= 0.0 {
        bail!("sweep step must be positive, got {step}");
    }
    if to < from {
        bail!("sweep runs backwards ({from} -> {to})");
    }
    if (to - from) / step > MAX_SWEEP_SAMPLES {
        bail!("sweep would emit more than {MAX_SWEEP_SAMPLES} samples");
    }
    Ok(())
}

/// Positions after `from` up to and including `to`.
fn sweep_positions(from: f64, to: f64, step: f64) -> impl Iterator<Item = f64> {
    let count = ((to - from) / step).floor() as u64;
    let last_on_grid = from + count as f64 * step;
    let tail = (to - last_on_grid > 1e-9).then_some(to);
    (1..=count)
        .map(move |index| from + index as f64 * step)
        .chain(tail)
}
