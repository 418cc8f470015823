//! Wires a [`ViewSession`] to a [`MediaElement`] and reports the view.
//!
//! Two subscription lifetimes are kept apart on purpose:
//!
//! * the long-lived trio (metadata ready, playback started, playback stopped)
//!   is registered by [`attach`] and removed only by [`ViewTracking::detach`];
//! * the position-sample listener comes and goes with playback and is also
//!   dropped as soon as the one-shot report has been issued.
//!
//! The report itself runs on the tokio runtime that was current at attach
//! time. It is never awaited by the tracker, never retried and never
//! cancelled.

use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    media::{ListenerId, MediaElement, MediaSignal, SignalKind, WeakMediaElement},
    session::{Directive, ViewPolicy, ViewSession},
};

/// Future returned by [`ViewReporter::report_view`]; owns everything it needs.
pub type ReportFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Something that can count a view for a podcast.
pub trait ViewReporter: Send + Sync + 'static {
    fn report_view(&self, podcast_id: &str) -> ReportFuture;
}

/// Result of a spawned report task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Delivered,
    Failed(String),
}

struct TrackerCore {
    session: ViewSession,
    attached: bool,
    long_lived: Vec<ListenerId>,
    sampler: Option<ListenerId>,
    pending: Vec<JoinHandle<ReportOutcome>>,
}

struct Shared<R> {
    podcast_id: String,
    policy: ViewPolicy,
    reporter: Arc<R>,
    runtime: Handle,
    element: WeakMediaElement,
    core: Mutex<TrackerCore>,
}

/// Live tracking session returned by [`attach`]. Dropping it detaches.
pub struct ViewTracking<R: ViewReporter> {
    shared: Arc<Shared<R>>,
}

/// Starts tracking views of `podcast_id` on `element`.
///
/// Must be called from within a tokio runtime; the report task is spawned on
/// it later.
pub fn attach<R: ViewReporter>(
    element: &MediaElement,
    reporter: Arc<R>,
    podcast_id: impl Into<String>,
    policy: ViewPolicy,
) -> Result<ViewTracking<R>> {
    let runtime = Handle::try_current().context("view tracking requires a tokio runtime")?;
    let podcast_id = podcast_id.into();

    let shared = Arc::new(Shared {
        podcast_id,
        policy,
        reporter,
        runtime,
        element: element.downgrade(),
        core: Mutex::new(TrackerCore {
            session: ViewSession::new(),
            attached: true,
            long_lived: Vec::with_capacity(3),
            sampler: None,
            pending: Vec::new(),
        }),
    });

    let mut ids = Vec::with_capacity(3);
    for kind in [
        SignalKind::MetadataReady,
        SignalKind::PlaybackStarted,
        SignalKind::PlaybackStopped,
    ] {
        let handler = shared.clone();
        ids.push(element.subscribe(kind, move |signal| handle_signal(&handler, signal)));
    }
    shared.core.lock().long_lived = ids;

    debug!(podcast_id = %shared.podcast_id, "view tracking attached");
    Ok(ViewTracking { shared })
}

fn handle_signal<R: ViewReporter>(shared: &Arc<Shared<R>>, signal: &MediaSignal) {
    let mut core = shared.core.lock();
    if !core.attached {
        return;
    }

    let Some(directive) = core.session.apply(signal, &shared.policy) else {
        return;
    };

    match directive {
        Directive::ResumeSampling => {
            if core.sampler.is_some() {
                return;
            }
            if let Some(element) = shared.element.upgrade() {
                let handler = shared.clone();
                let id = element.subscribe(SignalKind::PositionSample, move |signal| {
                    handle_signal(&handler, signal)
                });
                core.sampler = Some(id);
            }
        }
        Directive::SuspendSampling => stop_sampling(shared, &mut core),
        Directive::Report => {
            stop_sampling(shared, &mut core);
            // The reporter is foreign code and may call back into the tracker.
            drop(core);
            let handle = spawn_report(shared);
            let mut core = shared.core.lock();
            core.pending.retain(|pending| !pending.is_finished());
            core.pending.push(handle);
        }
    }
}

fn stop_sampling<R>(shared: &Shared<R>, core: &mut TrackerCore) {
    if let Some(id) = core.sampler.take() {
        if let Some(element) = shared.element.upgrade() {
            element.unsubscribe(id);
        }
    }
}

fn spawn_report<R: ViewReporter>(shared: &Shared<R>) -> JoinHandle<ReportOutcome> {
    let podcast_id = shared.podcast_id.clone();
    let report = shared.reporter.report_view(&podcast_id);
    shared.runtime.spawn(async move {
        match report.await {
            Ok(()) => {
                info!(%podcast_id, "view reported");
                ReportOutcome::Delivered
            }
            Err(err) => {
                warn!(%podcast_id, error = %format!("{err:#}"), "failed to report view");
                ReportOutcome::Failed(format!("{err:#}"))
            }
        }
    })
}

impl<R: ViewReporter> ViewTracking<R> {
    pub fn podcast_id(&self) -> &str {
        &self.shared.podcast_id
    }

    pub fn policy(&self) -> &ViewPolicy {
        &self.shared.policy
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> ViewSession {
        self.shared.core.lock().session.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.shared.core.lock().attached
    }

    pub fn is_sampling(&self) -> bool {
        self.shared.core.lock().sampler.is_some()
    }

    /// Removes every subscription. Safe to call any number of times; once it
    /// returns no handler of this tracker runs again.
    pub fn detach(&self) {
        let mut core = self.shared.core.lock();
        if !core.attached {
            return;
        }
        core.attached = false;

        let sampler = core.sampler.take();
        let ids: Vec<ListenerId> = core.long_lived.drain(..).chain(sampler).collect();
        if let Some(element) = self.shared.element.upgrade() {
            for id in ids {
                element.unsubscribe(id);
            }
        }
        debug!(podcast_id = %self.shared.podcast_id, "view tracking detached");
    }

    /// Waits for the report tasks still held and returns their outcomes in
    /// the order they were issued. Reports that had already finished when a
    /// later one was issued are no longer held.
    pub async fn settle(&self) -> Vec<ReportOutcome> {
        let pending: Vec<_> = self.shared.core.lock().pending.drain(..).collect();
        let mut outcomes = Vec::with_capacity(pending.len());
        for handle in pending {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => ReportOutcome::Failed(format!("report task failed: {err}")),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl<R: ViewReporter> Drop for ViewTracking<R> {
    fn drop(&mut self) {
        self.detach();
    }
}
