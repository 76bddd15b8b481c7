use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
}

impl BBox {
    pub fn new(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Self {
        if x_1 > x_2 || y_1 > y_2 {
            return BBox {
                x_1: 0.0,
                y_1: 0.0,
                x_2: 0.0,
                y_2: 0.0,
            };
        };
        BBox { x_1, y_1, x_2, y_2 }
    }

    pub fn centroid(&self) -> Vector2<f64> {
        Vector2::new((self.x_1 + self.x_2) / 2.0, (self.y_1 + self.y_2) / 2.0)
    }

    pub fn width(&self) -> f64 {
        (self.x_2 - self.x_1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_2 - self.y_1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        ((self.x_2 - self.x_1) * (self.y_2 - self.y_1)).max(0.0)
    }

    pub fn aspect_ratio(&self) -> f64 {
        let height = self.height();
        if height == 0.0 {
            return 0.0;
        }
        self.width() / height
    }

    /// True when all corners are finite and the box spans a non-empty area.
    pub fn is_valid(&self) -> bool {
        [self.x_1, self.y_1, self.x_2, self.y_2]
            .iter()
            .all(|v| v.is_finite())
            && self.x_2 > self.x_1
            && self.y_2 > self.y_1
    }

    pub fn iou(&self, other: &Self) -> f64 {
        let iwidth = (self.x_2.min(other.x_2) - self.x_1.max(other.x_1)).max(0.0);
        let iheight = (self.y_2.min(other.y_2) - self.y_1.max(other.y_1)).max(0.0);
        let iarea = iwidth * iheight;

        let union = self.area() + other.area() - iarea;

        if union == 0.0 {
            return 0.0;
        }

        iarea / union
    }
}
