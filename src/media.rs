//! Abstract playback signal surface of a media element.
//!
//! A [`MediaElement`] is the piece a player owns: it keeps a registry of
//! listeners per [`SignalKind`] and delivers every dispatched [`MediaSignal`]
//! to them in subscription order. The tracker only ever talks to this type,
//! so tests and trace replays drive it exactly like a real player would.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A single playback signal. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSignal {
    MetadataReady { duration: f64 },
    PlaybackStarted { position: f64 },
    PlaybackStopped { position: f64 },
    PositionSample { position: f64 },
}

impl MediaSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            MediaSignal::MetadataReady { .. } => SignalKind::MetadataReady,
            MediaSignal::PlaybackStarted { .. } => SignalKind::PlaybackStarted,
            MediaSignal::PlaybackStopped { .. } => SignalKind::PlaybackStopped,
            MediaSignal::PositionSample { .. } => SignalKind::PositionSample,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    MetadataReady,
    PlaybackStarted,
    PlaybackStopped,
    PositionSample,
}

/// Handle returned by [`MediaElement::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&MediaSignal) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: SignalKind,
    listener: Listener,
}

#[derive(Default)]
struct ElementInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
}

/// Cloneable handle; clones share the same listener registry.
#[derive(Clone, Default)]
pub struct MediaElement {
    inner: Arc<ElementInner>,
}

impl MediaElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: SignalKind, listener: F) -> ListenerId
    where
        F: Fn(&MediaSignal) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        match listeners.iter().position(|reg| reg.id == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().iter().any(|reg| reg.id == id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn listener_count_for(&self, kind: SignalKind) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|reg| reg.kind == kind)
            .count()
    }

    /// Delivers `signal` to every listener of its kind and returns how many
    /// were called.
    ///
    /// Listeners run without the registry lock held so they may subscribe or
    /// unsubscribe. A listener removed by an earlier one during the same
    /// dispatch is skipped.
    pub fn dispatch(&self, signal: MediaSignal) -> usize {
        let kind = signal.kind();
        let snapshot: Vec<(ListenerId, Listener)> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|reg| reg.kind == kind)
            .map(|reg| (reg.id, reg.listener.clone()))
            .collect();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            listener(&signal);
            delivered += 1;
        }
        delivered
    }

    pub(crate) fn downgrade(&self) -> WeakMediaElement {
        WeakMediaElement {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning reference held by listeners so they do not keep the element
/// alive through its own registry.
#[derive(Clone)]
pub(crate) struct WeakMediaElement {
    inner: Weak<ElementInner>,
}

impl WeakMediaElement {
    pub(crate) fn upgrade(&self) -> Option<MediaElement> {
        self.inner.upgrade().map(|inner| MediaElement { inner })
    }
}
