//! Single-assignment result slot for asynchronous renders.

use image::RgbaImage;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce(Option<Arc<RgbaImage>>) + Send>;

#[derive(Default)]
struct Slot {
    value: Option<Option<Arc<RgbaImage>>>,
    callbacks: Vec<Callback>,
}

struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Resolves exactly once, either with a composited bitmap or with `None`
/// when the render could not be produced. Clones observe the same result.
#[derive(Clone)]
pub struct RenderFuture {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RenderFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderFuture")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl Default for RenderFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderFuture {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn resolved(value: Option<RgbaImage>) -> Self {
        let future = Self::new();
        future.set(value);
        future
    }

    /// Stores the result. Returns false if the future was already resolved,
    /// in which case `value` is dropped.
    pub fn set(&self, value: Option<RgbaImage>) -> bool {
        let value = value.map(Arc::new);
        let callbacks = {
            let Ok(mut slot) = self.shared.slot.lock() else {
                return false;
            };
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(value.clone());
            std::mem::take(&mut slot.callbacks)
        };
        self.shared.ready.notify_all();
        for callback in callbacks {
            callback(value.clone());
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.shared
            .slot
            .lock()
            .map(|slot| slot.value.is_some())
            .unwrap_or(false)
    }

    /// Non-blocking peek. The outer `None` means still pending.
    pub fn try_get(&self) -> Option<Option<Arc<RgbaImage>>> {
        self.shared
            .slot
            .lock()
            .ok()
            .and_then(|slot| slot.value.clone())
    }

    /// Blocks until resolved or until `timeout` elapses.
    ///
    /// Futures handed out by `ScribbleOverlay::render_final` only resolve
    /// when the overlay's owner calls `pump_render_results` or
    /// `wait_for_renders`. Waiting on the thread that owns the overlay
    /// without doing so always times out.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Option<Arc<RgbaImage>>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock().ok()?;
        loop {
            if let Some(value) = slot.value.clone() {
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, _) = self.shared.ready.wait_timeout(slot, deadline - now).ok()?;
            slot = next;
        }
    }

    /// Runs `callback` once the result is available; immediately if it
    /// already is. The callback runs on whichever thread resolves the future.
    ///
    /// For overlay renders that is the thread calling
    /// `ScribbleOverlay::pump_render_results` or `wait_for_renders`; nothing
    /// fires until one of them runs, or until the overlay is dropped.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Option<Arc<RgbaImage>>) + Send + 'static,
    {
        let value = {
            let Ok(mut slot) = self.shared.slot.lock() else {
                return;
            };
            match slot.value.clone() {
                Some(value) => value,
                None => {
                    slot.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn second_set_is_rejected() {
        let future = RenderFuture::new();
        assert!(future.try_get().is_none());
        assert!(future.set(Some(RgbaImage::new(2, 3))));
        assert!(!future.set(None));

        let value = future.try_get().expect("resolved").expect("bitmap");
        assert_eq!(value.dimensions(), (2, 3));
    }

    #[test]
    fn callbacks_fire_once_before_and_after_resolution() {
        let future = RenderFuture::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let early = Arc::clone(&calls);
        future.on_complete(move |value| {
            assert!(value.is_none());
            early.fetch_add(1, Ordering::SeqCst);
        });
        future.set(None);
        future.set(None);

        let late = Arc::clone(&calls);
        future.on_complete(move |_| {
            late.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wait_timeout_sees_value_from_other_thread() {
        let future = RenderFuture::new();
        let producer = future.clone();
        let handle = std::thread::spawn(move || {
            producer.set(Some(RgbaImage::new(1, 1)));
        });

        let value = future
            .wait_timeout(Duration::from_secs(5))
            .expect("resolved in time");
        assert!(value.is_some());
        handle.join().expect("producer thread");
    }

    #[test]
    fn wait_timeout_expires_when_pending() {
        let future = RenderFuture::new();
        assert!(future.wait_timeout(Duration::from_millis(10)).is_none());
    }
}
