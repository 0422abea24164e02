use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centroid(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// Finite coordinates and strictly positive size.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn centroid_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.centroid();
        let (bx, by) = other.centroid();
        (ax - bx).hypot(ay - by)
    }
}
