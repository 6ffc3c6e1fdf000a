use serde::{Deserialize, Serialize};

/// Round to two decimals, mapping non-finite values to zero.
fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Layout box of a node in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// A copy with every coordinate rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            x: round2(self.x),
            y: round2(self.y),
            width: round2(self.width),
            height: round2(self.height),
        }
    }
}

/// Size of the document viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn rounded(&self) -> Self {
        Self {
            width: round2(self.width),
            height: round2(self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_handles_non_finite() {
        assert_eq!(round2(f64::NAN), 0.0);
        assert_eq!(round2(f64::INFINITY), 0.0);
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(1.235001), 1.24);
    }

    #[test]
    fn bounds_area() {
        let b = Bounds::new(10.0, 20.0, 300.0, 150.0);
        assert_eq!(b.area(), 45000.0);
        assert_eq!(Bounds::new(0.0, 0.0, 0.0, 10.0).area(), 0.0);
    }

    #[test]
    fn bounds_rounded() {
        let b = Bounds::new(10.004, 19.996, 300.333, 150.0).rounded();
        assert_eq!(b, Bounds::new(10.0, 20.0, 300.33, 150.0));
    }

    #[test]
    fn bounds_serialization_uses_width_height() {
        let json = serde_json::to_value(Bounds::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json["width"], 3.0);
        assert_eq!(json["height"], 4.0);
    }

    #[test]
    fn viewport_rounded() {
        assert_eq!(
            Viewport::new(1280.456, 720.0).rounded(),
            Viewport::new(1280.46, 720.0)
        );
    }
}
