//! Frame-by-frame interpolation of the rendered camera toward its target.

use crate::config::ViewportConfig;
use crate::scene::ViewportRect;

/// Animator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorPhase {
    /// No target pending: none was set yet, or the last one was reached.
    Idle,
    /// Current differs from target by more than the threshold.
    Animating,
    /// Current is within the threshold of target; [`ViewportAnimator::settle`]
    /// brings it to rest.
    Converged,
}

/// Interpolates `current` toward `target` by a fixed fraction per tick.
#[derive(Debug, Clone)]
pub struct ViewportAnimator {
    current: Option<ViewportRect>,
    target: Option<ViewportRect>,
    phase: AnimatorPhase,
    lerp_factor: f64,
    threshold: f64,
}

impl ViewportAnimator {
    pub fn new(lerp_factor: f64, threshold: f64) -> Self {
        Self {
            current: None,
            target: None,
            phase: AnimatorPhase::Idle,
            lerp_factor,
            threshold,
        }
    }

    pub fn from_config(config: &ViewportConfig) -> Self {
        Self::new(config.lerp_factor, config.convergence_threshold)
    }

    pub fn phase(&self) -> AnimatorPhase {
        self.phase
    }

    pub fn current(&self) -> Option<ViewportRect> {
        self.current
    }

    pub fn target(&self) -> Option<ViewportRect> {
        self.target
    }

    /// Point the camera at a new target.
    ///
    /// The first target snaps immediately. Later targets animate from
    /// wherever the camera is now, so motion never jumps.
    pub fn set_target(&mut self, target: ViewportRect) -> AnimatorPhase {
        self.target = Some(target);
        match self.current {
            None => {
                self.current = Some(target);
                self.phase = AnimatorPhase::Converged;
            }
            Some(current) => {
                self.phase = if current.distance(&target) > self.threshold {
                    AnimatorPhase::Animating
                } else {
                    AnimatorPhase::Converged
                };
            }
        }
        self.phase
    }

    /// Advance one frame. Returns `true` if another tick is needed.
    pub fn tick(&mut self) -> bool {
        let (Some(current), Some(target)) = (self.current, self.target) else {
            return false;
        };
        let f = self.lerp_factor;
        let next = ViewportRect {
            x: current.x + (target.x - current.x) * f,
            y: current.y + (target.y - current.y) * f,
            width: current.width + (target.width - current.width) * f,
            height: current.height + (target.height - current.height) * f,
        };
        self.current = Some(next);

        if next.distance(&target) > self.threshold {
            self.phase = AnimatorPhase::Animating;
            true
        } else {
            self.phase = AnimatorPhase::Converged;
            false
        }
    }

    /// Come to rest after convergence: land exactly on the target, drop it,
    /// and return to `Idle`. Does nothing unless converged.
    pub fn settle(&mut self) -> AnimatorPhase {
        if self.phase == AnimatorPhase::Converged {
            if let Some(target) = self.target.take() {
                self.current = Some(target);
            }
            self.phase = AnimatorPhase::Idle;
        }
        self.phase
    }

    /// Forget both rectangles (surface torn down or scene reset).
    pub fn reset(&mut self) {
        self.current = None;
        self.target = None;
        self.phase = AnimatorPhase::Idle;
    }
}
