//! Pixel values shared by the software backend, readback and image output

use std::ops::{Add, Mul};

/// Standard luma weights (Rec. 601), used by the grayscale pass
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Saturation weights used by the combine pass
pub const SATURATION_WEIGHTS: [f32; 3] = [0.3, 0.59, 0.11];

/// RGBA color with floating point components
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl RGBA {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        RGBA { r, g, b, a }
    }

    pub const fn black() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 1.0 }
    }

    pub const fn transparent() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    /// Opaque gray with every color channel set to `v`
    pub const fn gray(v: f32) -> Self {
        RGBA { r: v, g: v, b: v, a: 1.0 }
    }

    pub fn from_array(c: [f32; 4]) -> Self {
        RGBA::new(c[0], c[1], c[2], c[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Weighted sum of the color channels
    pub fn dot_rgb(self, weights: [f32; 3]) -> f32 {
        self.r * weights[0] + self.g * weights[1] + self.b * weights[2]
    }

    /// Linear interpolation towards `other`, like GLSL `mix`
    pub fn lerp(self, other: RGBA, t: f32) -> Self {
        RGBA::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    /// Component-wise product
    pub fn modulate(self, other: RGBA) -> Self {
        RGBA::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    pub fn max(self, other: RGBA) -> Self {
        RGBA::new(
            self.r.max(other.r),
            self.g.max(other.g),
            self.b.max(other.b),
            self.a.max(other.a),
        )
    }

    pub fn clamp01(self) -> Self {
        RGBA::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [to_byte(self.r), to_byte(self.g), to_byte(self.b), to_byte(self.a)]
    }

    pub fn from_bytes(b: [u8; 4]) -> Self {
        RGBA::new(
            b[0] as f32 / 255.0,
            b[1] as f32 / 255.0,
            b[2] as f32 / 255.0,
            b[3] as f32 / 255.0,
        )
    }

    /// Largest per-channel difference, alpha included
    pub fn max_abs_diff(self, other: RGBA) -> f32 {
        (self.r - other.r)
            .abs()
            .max((self.g - other.g).abs())
            .max((self.b - other.b).abs())
            .max((self.a - other.a).abs())
    }
}

impl Add for RGBA {
    type Output = RGBA;

    fn add(self, rhs: RGBA) -> RGBA {
        RGBA::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Mul<f32> for RGBA {
    type Output = RGBA;

    fn mul(self, rhs: f32) -> RGBA {
        RGBA::new(self.r * rhs, self.g * rhs, self.b * rhs, self.a * rhs)
    }
}

/// Convert a float value (0.0-1.0) to a byte (0-255)
#[inline]
pub fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_basics() {
        let color = RGBA::new(0.5, 0.75, 0.25, 0.9);
        assert_eq!((color.r, color.g, color.b, color.a), (0.5, 0.75, 0.25, 0.9));

        let black = RGBA::black();
        assert_eq!((black.r, black.g, black.b, black.a), (0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_lerp_endpoints() {
        let red = RGBA::new(1.0, 0.0, 0.0, 1.0);
        let blue = RGBA::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(red.lerp(blue, 0.0), red);
        assert_eq!(red.lerp(blue, 1.0), blue);
        assert_eq!(red.lerp(blue, 0.5), RGBA::new(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_byte_conversion_clamps() {
        assert_eq!(to_byte(-1.0), 0);
        assert_eq!(to_byte(2.0), 255);
        assert_eq!(RGBA::new(1.0, 0.0, 0.5, 1.0).to_bytes(), [255, 0, 128, 255]);
        let back = RGBA::from_bytes([255, 0, 128, 255]);
        assert!((back.b - 0.502).abs() < 0.01);
    }
}
