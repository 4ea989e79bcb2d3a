//! Cooperative cancellation shared between shard threads and dump workers
//!
//! A [`CancelSignal`] is a broadcast token. Firing it disconnects a
//! zero-capacity channel, so every blocking point can wait on
//! [`CancelSignal::listener`] inside a `crossbeam_channel::select!` next to
//! its real work (a rendezvous send, a ticker, a throttle delay).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{after, select, Receiver, Sender};
use parking_lot::Mutex;

use super::error::{Result, ToolError};

/// Cloneable cancellation token
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

struct Inner {
    fired: AtomicBool,
    /// Only sender of `listener`; dropped on cancel.
    trigger: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.trigger.lock().take();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.fire();
        }
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                listener: rx,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Derive a signal that fires with this one, but can also be fired on its own
    /// without affecting the parent.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut children = self.inner.children.lock();
        if self.is_cancelled() {
            drop(children);
            child.cancel();
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.inner.fire();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the signal has fired
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ToolError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Channel that becomes disconnected when the signal fires.
    /// Never carries a message; a `recv` on it only returns on cancellation.
    pub fn listener(&self) -> &Receiver<()> {
        &self.inner.listener
    }

    /// Sleep for `duration`, returning early with `Cancelled` if the signal fires
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        select! {
            recv(self.inner.listener) -> _ => Err(ToolError::Cancelled),
            recv(after(duration)) -> _ => Ok(()),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// First-error capture for a group of concurrent units.
///
/// The first recorded error fires the group's signal so the remaining units
/// unwind. A real error always wins over `Cancelled`, which is what the other
/// units report once they observe the signal.
pub struct FailFast {
    signal: CancelSignal,
    first: Mutex<Option<ToolError>>,
}

impl FailFast {
    pub fn new(signal: CancelSignal) -> Self {
        Self {
            signal,
            first: Mutex::new(None),
        }
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Record a unit's failure and cancel the group
    pub fn record(&self, err: ToolError) {
        {
            let mut slot = self.first.lock();
            let replace = match slot.as_ref() {
                None => true,
                Some(existing) => existing.is_cancelled() && !err.is_cancelled(),
            };
            if replace {
                *slot = Some(err);
            }
        }
        self.signal.cancel();
    }

    /// Record the error side of a unit's result
    pub fn observe(&self, result: Result<()>) {
        if let Err(e) = result {
            self.record(e);
        }
    }

    pub fn has_failed(&self) -> bool {
        self.first.lock().is_some()
    }

    /// The group outcome: the first real error if any unit failed
    pub fn finish<T>(self, value: T) -> Result<T> {
        match self.first.into_inner() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}
