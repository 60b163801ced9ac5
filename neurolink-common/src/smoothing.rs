//! Face region smoothing
//!
//! Raw per-frame face detections jitter by a few pixels even when the subject
//! holds still. The smoother blends each new detection with the previous
//! smoothed box so the overlay drawn by the client stays stable.

use serde::{Deserialize, Serialize};

/// Default exponential blend weight applied to the newest detection
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.5;

/// Face bounding box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// True when the detector reported no usable face.
    ///
    /// A region with non-positive size, or one spanning the whole frame, is
    /// what the detector returns when it fails to localize a face.
    pub fn is_degenerate(&self, frame_width: u32, frame_height: u32) -> bool {
        if self.w <= 0 || self.h <= 0 {
            return true;
        }
        i64::from(self.w) == i64::from(frame_width) && i64::from(self.h) == i64::from(frame_height)
    }

    /// Returns `None` for degenerate detections, `Some(self)` otherwise
    pub fn filter_degenerate(self, frame_width: u32, frame_height: u32) -> Option<Self> {
        if self.is_degenerate(frame_width, frame_height) {
            None
        } else {
            Some(self)
        }
    }
}

/// Blend one coordinate. Truncates toward zero, so the result always lies
/// between `new` and `prev` inclusive.
fn blend(alpha: f64, new: i32, prev: i32) -> i32 {
    (alpha * f64::from(new) + (1.0 - alpha) * f64::from(prev)).trunc() as i32
}

/// Exponential filter over successive face regions of one stream
#[derive(Debug, Clone)]
pub struct CoordinateSmoother {
    alpha: f64,
    state: Option<FaceRegion>,
}

impl Default for CoordinateSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}

impl CoordinateSmoother {
    /// Create a smoother with the given blend weight, clamped to (0, 1]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            DEFAULT_SMOOTHING_ALPHA
        };
        Self { alpha, state: None }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Last smoothed region
    pub fn current(&self) -> Option<FaceRegion> {
        self.state
    }

    /// Forget the last region (next detection is a cold start)
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Pure smoothing step.
    ///
    /// - no previous box: the new detection is returned unchanged
    /// - no new detection: the previous box persists
    /// - otherwise each field is `alpha * new + (1 - alpha) * prev`
    pub fn smooth(&self, new: Option<FaceRegion>, prev: Option<FaceRegion>) -> Option<FaceRegion> {
        match (new, prev) {
            (new, None) => new,
            (None, prev) => prev,
            (Some(n), Some(p)) => Some(FaceRegion {
                x: blend(self.alpha, n.x, p.x),
                y: blend(self.alpha, n.y, p.y),
                w: blend(self.alpha, n.w, p.w),
                h: blend(self.alpha, n.h, p.h),
            }),
        }
    }

    /// Feed the next detection and return the updated smoothed region
    pub fn update(&mut self, new: Option<FaceRegion>) -> Option<FaceRegion> {
        self.state = self.smooth(new, self.state);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: i32, y: i32, w: i32, h: i32) -> FaceRegion {
        FaceRegion::new(x, y, w, h)
    }

    #[test]
    fn test_cold_start_returns_new_unchanged() {
        let smoother = CoordinateSmoother::default();
        let new = Some(region(10, 20, 30, 40));
        assert_eq!(smoother.smooth(new, None), new);
        assert_eq!(smoother.smooth(None, None), None);
    }

    #[test]
    fn test_missing_detection_keeps_previous() {
        let smoother = CoordinateSmoother::default();
        let prev = Some(region(5, 6, 7, 8));
        assert_eq!(smoother.smooth(None, prev), prev);
    }

    #[test]
    fn test_blend_is_half_way_and_truncates() {
        let smoother = CoordinateSmoother::default();
        let out = smoother
            .smooth(Some(region(10, 11, 50, 0)), Some(region(20, 20, 51, 3)))
            .unwrap();
        assert_eq!(out, region(15, 15, 50, 1));
    }

    #[test]
    fn test_blend_stays_within_bounds() {
        let smoother = CoordinateSmoother::default();
        let pairs = [(-3, -2), (-1, 0), (0, 100), (7, 8), (99, -99), (i32::MAX, i32::MAX - 1)];
        for (a, b) in pairs {
            let out = smoother
                .smooth(Some(region(a, a, a, a)), Some(region(b, b, b, b)))
                .unwrap();
            for field in [out.x, out.y, out.w, out.h] {
                assert!(field >= a.min(b) && field <= a.max(b), "{} not within [{}, {}]", field, a, b);
            }
        }
    }

    #[test]
    fn test_update_tracks_state() {
        let mut smoother = CoordinateSmoother::default();
        assert_eq!(smoother.update(Some(region(0, 0, 100, 100))), Some(region(0, 0, 100, 100)));
        assert_eq!(smoother.update(Some(region(10, 10, 50, 50))), Some(region(5, 5, 75, 75)));
        assert_eq!(smoother.update(None), Some(region(5, 5, 75, 75)));
        smoother.reset();
        assert_eq!(smoother.current(), None);
    }

    #[test]
    fn test_degenerate_full_frame_region() {
        assert!(region(0, 0, 200, 200).is_degenerate(200, 200));
        assert!(region(0, 0, 0, 50).is_degenerate(200, 200));
        assert!(!region(0, 0, 200, 199).is_degenerate(200, 200));
        assert_eq!(region(0, 0, 480, 360).filter_degenerate(480, 360), None);
        assert_eq!(
            region(10, 10, 50, 50).filter_degenerate(200, 200),
            Some(region(10, 10, 50, 50))
        );
    }

    #[test]
    fn test_invalid_alpha_falls_back() {
        assert_eq!(CoordinateSmoother::new(f64::NAN).alpha(), DEFAULT_SMOOTHING_ALPHA);
        assert_eq!(CoordinateSmoother::new(0.0).alpha(), DEFAULT_SMOOTHING_ALPHA);
        assert_eq!(CoordinateSmoother::new(3.0).alpha(), 1.0);
    }
}
