//! Animated camera moves.

use std::time::{Duration, Instant};

use crate::projection::GeoPos;
use crate::{lat_to_y, lon_to_x, x_to_lon, y_to_lat};

/// How long a fly animation takes.
pub const FLY_DURATION: Duration = Duration::from_millis(800);

/// A camera position: center and zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    /// Geographical center.
    pub center: GeoPos,
    /// Zoom level.
    pub zoom: u8,
}

/// An in-flight camera animation between two views.
#[derive(Clone, Debug)]
pub struct FlyTo {
    from: CameraView,
    to: CameraView,
    started: Instant,
    duration: Duration,
}

impl FlyTo {
    /// Starts a new animation at `started`.
    pub fn new(from: CameraView, to: CameraView, started: Instant) -> Self {
        Self {
            from,
            to,
            started,
            duration: FLY_DURATION,
        }
    }

    /// The view the animation ends at.
    pub fn target(&self) -> CameraView {
        self.to
    }

    /// Returns the view at `now` and whether the animation has finished.
    pub fn view_at(&self, now: Instant) -> (CameraView, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration || self.duration.is_zero() {
            return (self.to, true);
        }
        let t = ease_in_out_cubic(elapsed.as_secs_f64() / self.duration.as_secs_f64());

        // Interpolate in zoom-0 Mercator space so the path is straight on screen.
        let from_x = lon_to_x(self.from.center.lon, 0);
        let from_y = lat_to_y(self.from.center.lat, 0);
        let to_x = lon_to_x(self.to.center.lon, 0);
        let to_y = lat_to_y(self.to.center.lat, 0);

        let center = GeoPos {
            lon: x_to_lon(from_x + (to_x - from_x) * t, 0),
            lat: y_to_lat(from_y + (to_y - from_y) * t, 0),
        };
        let zoom = self.from.zoom as f64 + (self.to.zoom as f64 - self.from.zoom as f64) * t;

        (
            CameraView {
                center,
                zoom: zoom.round() as u8,
            },
            false,
        )
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
