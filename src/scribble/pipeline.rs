//! Background base-image fetch with composition on the interactive thread.
//!
//! Each request fetches on its own named worker thread. Workers never touch
//! session state; they only send the decoded bitmap back, and the owner of
//! the pipeline composites it when pumping.

use crate::scribble::future::RenderFuture;
use crate::scribble::loader::{ImageLoader, ImageRef, TargetSize};
use crate::scribble::messages::{FetchOutcome, RenderMessage, RequestId};
use image::RgbaImage;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Everything a worker needs; the only data that crosses threads.
#[derive(Clone)]
pub struct FetchRequest {
    pub loader: Arc<dyn ImageLoader>,
    pub image: ImageRef,
    pub target: TargetSize,
    pub skip_cache: bool,
    pub generation: u64,
}

struct PendingRender {
    future: RenderFuture,
    generation: u64,
}

pub struct RenderPipeline {
    tx: Sender<RenderMessage>,
    rx: Receiver<RenderMessage>,
    pending: HashMap<RequestId, PendingRender>,
    next_request: u64,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        Self {
            tx,
            rx,
            pending: HashMap::new(),
            next_request: 0,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Starts a fetch and returns the future that resolves once the result
    /// has been pumped and composited.
    pub fn submit(&mut self, request: FetchRequest) -> RenderFuture {
        self.next_request += 1;
        let request_id = RequestId(self.next_request);
        let future = RenderFuture::new();
        let generation = request.generation;
        let tx = self.tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("scribble-render-{}", request_id.0))
            .spawn(move || {
                let outcome = fetch(&request);
                let message = RenderMessage {
                    request_id,
                    generation: request.generation,
                    outcome,
                };
                if tx.send(message).is_err() {
                    tracing::debug!(request_id = request_id.0, "render pipeline dropped");
                }
            });

        match spawned {
            Ok(_) => {
                tracing::debug!(request_id = request_id.0, generation, "render requested");
                self.pending.insert(
                    request_id,
                    PendingRender {
                        future: future.clone(),
                        generation,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(?err, request_id = request_id.0, "failed to spawn render worker");
                future.set(None);
            }
        }
        future
    }

    /// Drains every result that has already arrived without blocking.
    /// `compose` draws the current session onto a fetched bitmap; it is only
    /// called for results belonging to `current_generation`.
    pub fn pump<F>(&mut self, current_generation: Option<u64>, mut compose: F) -> usize
    where
        F: FnMut(&mut RgbaImage),
    {
        let mut resolved = 0;
        loop {
            match self.rx.try_recv() {
                Ok(message) => {
                    if self.finish(message, current_generation, &mut compose) {
                        resolved += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        resolved
    }

    /// Blocks until every pending render has resolved or `timeout` elapses.
    /// Returns the number of futures resolved by this call.
    pub fn wait<F>(&mut self, timeout: Duration, current_generation: Option<u64>, mut compose: F) -> usize
    where
        F: FnMut(&mut RgbaImage),
    {
        let deadline = Instant::now() + timeout;
        let mut resolved = 0;
        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) => {
                    if self.finish(message, current_generation, &mut compose) {
                        resolved += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        resolved
    }

    fn finish<F>(
        &mut self,
        message: RenderMessage,
        current_generation: Option<u64>,
        compose: &mut F,
    ) -> bool
    where
        F: FnMut(&mut RgbaImage),
    {
        let Some(pending) = self.pending.remove(&message.request_id) else {
            tracing::debug!(request_id = message.request_id.0, "render result without request");
            return false;
        };
        debug_assert_eq!(pending.generation, message.generation);

        let result = match message.outcome.into_bitmap() {
            Some(_) if current_generation != Some(message.generation) => {
                tracing::warn!(
                    request_id = message.request_id.0,
                    generation = message.generation,
                    current = ?current_generation,
                    "dropping render for stale session"
                );
                None
            }
            Some(mut bitmap) => {
                compose(&mut bitmap);
                tracing::debug!(
                    request_id = message.request_id.0,
                    width = bitmap.width(),
                    height = bitmap.height(),
                    "render composited"
                );
                Some(bitmap)
            }
            None => None,
        };
        pending.future.set(result)
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        for (request_id, pending) in self.pending.drain() {
            tracing::debug!(request_id = request_id.0, "render abandoned with pipeline");
            pending.future.set(None);
        }
    }
}

fn fetch(request: &FetchRequest) -> FetchOutcome {
    let load = || {
        request
            .loader
            .load(&request.image, request.target, request.skip_cache)
    };
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(Ok(bitmap)) => FetchOutcome::Fetched(bitmap),
        Ok(Err(err)) => {
            tracing::warn!(error = %format!("{err:#}"), image = request.image.as_str(), "base image load failed");
            FetchOutcome::LoadFailed {
                error: format!("{err:#}"),
            }
        }
        Err(payload) => {
            let message = if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic payload".to_string()
            };
            tracing::error!(panic_message = %message, "render worker panicked");
            FetchOutcome::WorkerPanicked { message }
        }
    }
}
