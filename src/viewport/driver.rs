//! Camera driver: runs the animator on its own frame clock.
//!
//! Rendering and animation are decoupled: the render loop only sets a new
//! target, while a spawned tick task advances the animator every frame and
//! publishes the zoomed view box on a `watch` channel. At most one tick
//! task is alive; it is cancelled before a new one is scheduled and when
//! the surface is torn down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::animator::{AnimatorPhase, ViewportAnimator};
use super::zoom::UserZoom;
use crate::config::ViewportConfig;
use crate::scene::ViewportRect;

struct CameraState {
    animator: ViewportAnimator,
    zoom: UserZoom,
}

impl CameraState {
    fn view(&self) -> Option<ViewportRect> {
        self.animator.current().map(|c| self.zoom.apply(c))
    }
}

struct PendingTick {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the animated camera and its tick task.
pub struct CameraDriver {
    state: Arc<Mutex<CameraState>>,
    view_tx: watch::Sender<Option<ViewportRect>>,
    pending: Option<PendingTick>,
    frame_interval: Duration,
    min_zoom: f64,
    max_zoom: f64,
}

impl CameraDriver {
    pub fn new(config: &ViewportConfig) -> Self {
        let (view_tx, _view_rx) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(CameraState {
                animator: ViewportAnimator::from_config(config),
                zoom: UserZoom::default(),
            })),
            view_tx,
            pending: None,
            frame_interval: config.frame_interval(),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    /// Receive every published view box (render space, zoom applied).
    pub fn subscribe(&self) -> watch::Receiver<Option<ViewportRect>> {
        self.view_tx.subscribe()
    }

    /// The view box as of the last tick.
    pub fn view(&self) -> Option<ViewportRect> {
        *self.view_tx.borrow()
    }

    pub fn phase(&self) -> AnimatorPhase {
        self.with_state(|s| s.animator.phase())
    }

    pub fn zoom(&self) -> UserZoom {
        self.with_state(|s| s.zoom)
    }

    /// Whether a tick task is currently scheduled.
    pub fn is_ticking(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// Cancel any scheduled tick. Called at the start of every render cycle.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            pending.handle.abort();
        }
    }

    /// Point the camera at a render-space target and start animating.
    pub fn set_target(&mut self, target: ViewportRect) {
        self.cancel_pending();
        let phase = self.with_state(|s| {
            let phase = s.animator.set_target(target);
            s.animator.settle();
            phase
        });
        self.publish();
        if phase == AnimatorPhase::Animating {
            self.schedule();
        }
    }

    /// Apply a user zoom step on top of the animated camera.
    pub fn zoom_by(&mut self, factor: f64) {
        let (min, max) = (self.min_zoom, self.max_zoom);
        self.with_state(|s| s.zoom.zoom_by(factor, min, max));
        self.publish();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.with_state(|s| s.zoom.pan_by(dx, dy));
        self.publish();
    }

    /// Explicit user reset gesture.
    pub fn reset_zoom(&mut self) {
        self.with_state(|s| s.zoom.reset());
        self.publish();
    }

    /// Stop animating and forget the camera (surface unmounted).
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        self.with_state(|s| s.animator.reset());
        self.publish();
    }

    fn schedule(&mut self) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let state = Arc::clone(&self.state);
        let view_tx = self.view_tx.clone();
        let interval = self.frame_interval;

        let handle = tokio::spawn(async move {
            let mut frames = tokio::time::interval(interval);
            // The first interval tick completes immediately.
            frames.tick().await;
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = frames.tick() => {
                        let (more, view) = match state.lock() {
                            Ok(mut s) => {
                                let more = s.animator.tick();
                                if !more {
                                    s.animator.settle();
                                }
                                (more, s.view())
                            }
                            Err(_) => break,
                        };
                        view_tx.send_replace(view);
                        if !more {
                            break;
                        }
                    }
                }
            }
        });

        self.pending = Some(PendingTick { token, handle });
    }

    fn publish(&self) {
        let view = self.with_state(|s| s.view());
        self.view_tx.send_replace(view);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CameraState) -> R) -> R {
        // A poisoned lock only means a tick task panicked mid-update; the
        // rectangles are still plain data, so keep going with them.
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Drop for CameraDriver {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
