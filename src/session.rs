//! View-counting state for a single playback session.
//!
//! Everything in here is pure: a [`ViewSession`] only changes when a
//! [`MediaSignal`] is applied to it, and the returned [`Directive`] tells the
//! caller what to do with its subscriptions. No listeners, no I/O, which keeps
//! the counting rules testable with synthetic signal sequences.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::media::MediaSignal;

pub const DEFAULT_SHORT_CLIP_CUTOFF: f64 = 20.0;
pub const DEFAULT_SHORT_CLIP_FRACTION: f64 = 0.5;
pub const DEFAULT_LONG_FORM_THRESHOLD: f64 = 10.0;
pub const DEFAULT_ANTI_SEEK_GUARD: f64 = 1.5;

/// Rules deciding how much watching counts as a view.
///
/// `long_form_threshold` defaults to a flat 10 seconds regardless of length.
/// That value is a placeholder the platform shipped with, so it stays a
/// field rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPolicy {
    pub short_clip_cutoff: f64,
    pub short_clip_fraction: f64,
    pub long_form_threshold: f64,
    pub anti_seek_guard: f64,
}

impl Default for ViewPolicy {
    fn default() -> Self {
        Self {
            short_clip_cutoff: DEFAULT_SHORT_CLIP_CUTOFF,
            short_clip_fraction: DEFAULT_SHORT_CLIP_FRACTION,
            long_form_threshold: DEFAULT_LONG_FORM_THRESHOLD,
            anti_seek_guard: DEFAULT_ANTI_SEEK_GUARD,
        }
    }
}

impl ViewPolicy {
    /// Seconds of continuous watching required for media of `duration`.
    ///
    /// Returns `None` when the duration is not usable yet (NaN, zero or
    /// negative). Infinite durations, as reported for live streams, fall into
    /// the long-form branch.
    pub fn threshold_for(&self, duration: f64) -> Option<f64> {
        if duration.is_nan() || duration <= 0.0 {
            return None;
        }
        if duration < self.short_clip_cutoff {
            Some(duration * self.short_clip_fraction)
        } else {
            Some(self.long_form_threshold)
        }
    }

    /// Whether the gap between two consecutive samples counts as playback.
    pub fn accepts_delta(&self, delta: f64) -> bool {
        delta >= 0.0 && delta < self.anti_seek_guard
    }

    pub fn validate(&self) -> Result<()> {
        if !self.anti_seek_guard.is_finite() || self.anti_seek_guard <= 0.0 {
            bail!(
                "anti-seek guard must be a positive number, got {}",
                self.anti_seek_guard
            );
        }
        if !self.short_clip_cutoff.is_finite() || self.short_clip_cutoff <= 0.0 {
            bail!(
                "short clip cutoff must be a positive number, got {}",
                self.short_clip_cutoff
            );
        }
        if !(self.short_clip_fraction > 0.0 && self.short_clip_fraction <= 1.0) {
            bail!(
                "short clip fraction must be in (0, 1], got {}",
                self.short_clip_fraction
            );
        }
        if !self.long_form_threshold.is_finite() || self.long_form_threshold <= 0.0 {
            bail!(
                "long-form threshold must be a positive number, got {}",
                self.long_form_threshold
            );
        }
        Ok(())
    }
}

/// What the owner of a session has to do after applying a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Start listening to position samples if not already doing so.
    ResumeSampling,
    /// Stop listening to position samples.
    SuspendSampling,
    /// Issue the one-shot view report and stop sampling.
    Report,
}

/// Accumulated watch state of one tracking session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSession {
    watch_time: f64,
    last_position: f64,
    threshold: Option<f64>,
    reported: bool,
}

impl ViewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_time(&self) -> f64 {
        self.watch_time
    }

    pub fn last_position(&self) -> f64 {
        self.last_position
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn reported(&self) -> bool {
        self.reported
    }

    pub fn apply(&mut self, signal: &MediaSignal, policy: &ViewPolicy) -> Option<Directive> {
        match *signal {
            MediaSignal::MetadataReady { duration } => {
                self.threshold = policy.threshold_for(duration);
                debug!(duration, threshold = ?self.threshold, "media metadata ready");
                None
            }
            MediaSignal::PositionSample { position } => self.sample(position, policy),
            MediaSignal::PlaybackStarted { position } => self.start(position),
            MediaSignal::PlaybackStopped { .. } => Some(Directive::SuspendSampling),
        }
    }

    fn sample(&mut self, position: f64, policy: &ViewPolicy) -> Option<Directive> {
        if !position.is_finite() {
            return None;
        }

        let delta = position - self.last_position;
        self.last_position = position;

        // Samples that arrive before the duration is known never count.
        let threshold = self.threshold?;

        if policy.accepts_delta(delta) {
            self.watch_time += delta;
        }

        if !self.reported && self.watch_time >= threshold {
            self.reported = true;
            debug!(
                watch_time = self.watch_time,
                threshold, "view threshold reached"
            );
            return Some(Directive::Report);
        }
        None
    }

    fn start(&mut self, position: f64) -> Option<Directive> {
        if position <= 0.0 {
            self.watch_time = 0.0;
            self.reported = false;
        }
        self.last_position = position;

        if self.reported {
            None
        } else {
            Some(Directive::ResumeSampling)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: f64) -> MediaSignal {
        MediaSignal::PositionSample { position }
    }

    fn ready(duration: f64) -> ViewSession {
        let mut session = ViewSession::new();
        session.apply(
            &MediaSignal::MetadataReady { duration },
            &ViewPolicy::default(),
        );
        session.apply(
            &MediaSignal::PlaybackStarted { position: 0.0 },
            &ViewPolicy::default(),
        );
        session
    }

    fn feed(session: &mut ViewSession, positions: &[f64]) -> Vec<Directive> {
        let policy = ViewPolicy::default();
        positions
            .iter()
            .filter_map(|p| session.apply(&sample(*p), &policy))
            .collect()
    }

    #[test]
    fn threshold_halves_short_clips() {
        let policy = ViewPolicy::default();
        assert_eq!(policy.threshold_for(15.0), Some(7.5));
    }

    #[test]
    fn threshold_is_fixed_for_long_media() {
        let policy = ViewPolicy::default();
        assert_eq!(policy.threshold_for(40.0), Some(10.0));
        assert_eq!(policy.threshold_for(20.0), Some(10.0));
        assert_eq!(policy.threshold_for(f64::INFINITY), Some(10.0));
    }

    #[test]
    fn threshold_unknown_for_unusable_durations() {
        let policy = ViewPolicy::default();
        assert_eq!(policy.threshold_for(f64::NAN), None);
        assert_eq!(policy.threshold_for(0.0), None);
        assert_eq!(policy.threshold_for(-3.0), None);
    }

    #[test]
    fn long_form_threshold_is_configurable() {
        let policy = ViewPolicy {
            long_form_threshold: 30.0,
            ..ViewPolicy::default()
        };
        assert_eq!(policy.threshold_for(600.0), Some(30.0));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ViewPolicy::default().validate().is_ok());
        let zero_guard = ViewPolicy {
            anti_seek_guard: 0.0,
            ..ViewPolicy::default()
        };
        assert!(zero_guard.validate().is_err());
        let big_fraction = ViewPolicy {
            short_clip_fraction: 1.5,
            ..ViewPolicy::default()
        };
        assert!(big_fraction.validate().is_err());
        let nan_threshold = ViewPolicy {
            long_form_threshold: f64::NAN,
            ..ViewPolicy::default()
        };
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn jitter_samples_accumulate() {
        let mut session = ready(40.0);
        let directives = feed(&mut session, &[0.25, 0.5, 1.0, 1.8, 3.0]);
        assert!(directives.is_empty());
        assert!((session.watch_time() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn forward_seek_is_not_counted() {
        let mut session = ready(40.0);
        feed(&mut session, &[1.0, 2.0, 7.0, 8.0]);
        // 0->1, 1->2 and 7->8 count; the 5 second jump does not.
        assert!((session.watch_time() - 3.0).abs() < 1e-9);
        assert_eq!(session.last_position(), 8.0);
    }

    #[test]
    fn backward_seek_is_not_counted() {
        let mut session = ready(40.0);
        feed(&mut session, &[1.0, 2.0, 1.5, 2.5]);
        assert!((session.watch_time() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn samples_before_metadata_do_not_accumulate() {
        let policy = ViewPolicy::default();
        let mut session = ViewSession::new();
        session.apply(&MediaSignal::PlaybackStarted { position: 0.0 }, &policy);
        let directives = feed(&mut session, &[1.0, 2.0, 3.0]);
        assert!(directives.is_empty());
        assert_eq!(session.watch_time(), 0.0);
        assert_eq!(session.last_position(), 3.0);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut session = ready(40.0);
        feed(&mut session, &[1.0, f64::NAN, 2.0]);
        assert!((session.watch_time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn report_fires_once() {
        let mut session = ready(15.0);
        let positions: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let directives = feed(&mut session, &positions);
        assert_eq!(directives, vec![Directive::Report]);
        assert!(session.reported());
    }

    #[test]
    fn pause_and_resume_keep_progress() {
        let policy = ViewPolicy::default();
        let mut session = ready(40.0);
        feed(&mut session, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let before = session.clone();

        assert_eq!(
            session.apply(&MediaSignal::PlaybackStopped { position: 9.0 }, &policy),
            Some(Directive::SuspendSampling)
        );
        assert_eq!(
            session.apply(&MediaSignal::PlaybackStarted { position: 9.0 }, &policy),
            Some(Directive::ResumeSampling)
        );
        assert_eq!(session.watch_time(), before.watch_time());
        assert!(!session.reported());
    }

    #[test]
    fn replay_from_start_resets_session() {
        let policy = ViewPolicy::default();
        let mut session = ready(15.0);
        let positions: Vec<f64> = (1..=8).map(|i| i as f64).collect();
        assert_eq!(feed(&mut session, &positions), vec![Directive::Report]);

        assert_eq!(
            session.apply(&MediaSignal::PlaybackStarted { position: 0.0 }, &policy),
            Some(Directive::ResumeSampling)
        );
        assert_eq!(session.watch_time(), 0.0);
        assert!(!session.reported());
        assert_eq!(feed(&mut session, &positions), vec![Directive::Report]);
    }

    #[test]
    fn resume_after_report_does_not_resample() {
        let policy = ViewPolicy::default();
        let mut session = ready(15.0);
        let positions: Vec<f64> = (1..=8).map(|i| i as f64).collect();
        feed(&mut session, &positions);
        assert_eq!(
            session.apply(&MediaSignal::PlaybackStarted { position: 8.0 }, &policy),
            None
        );
        assert!(session.reported());
    }

    #[test]
    fn anti_seek_guard_is_half_open() {
        let policy = ViewPolicy::default();
        assert!(policy.accepts_delta(0.0));
        assert!(policy.accepts_delta(1.49));
        assert!(!policy.accepts_delta(DEFAULT_ANTI_SEEK_GUARD));
        assert!(!policy.accepts_delta(-0.01));
    }
}
