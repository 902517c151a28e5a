//! RGB Spectrum.

use crate::pbrt::{frexp, Float};
use std::ops::{Add, AddAssign, Div, Index, Mul, MulAssign};

/// Number of spectral samples in `RGBSpectrum`.
pub const RGB_SAMPLES: usize = 3;

/// RGBSpectrum represents a spectral power distribution with a weighted sum
/// of red, green and blue components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RGBSpectrum {
    /// The sampled spectral values.
    c: [Float; RGB_SAMPLES],
}

impl RGBSpectrum {
    /// Create a new `RGBSpectrum` with a constant value across all channels.
    ///
    /// * `v` - Constant value.
    pub fn new(v: Float) -> Self {
        let ret = Self {
            c: [v; RGB_SAMPLES],
        };
        debug_assert!(!ret.has_nans());
        ret
    }

    /// Create a new `RGBSpectrum` from RGB values.
    ///
    /// * `rgb` - RGB values.
    pub fn from_rgb(rgb: &[Float; 3]) -> Self {
        Self {
            c: [rgb[0], rgb[1], rgb[2]],
        }
    }

    /// Returns the RGB values.
    pub fn to_rgb(&self) -> [Float; 3] {
        self.c
    }

    /// Returns true if all channels are zero.
    pub fn is_black(&self) -> bool {
        self.c.iter().all(|v| *v == 0.0)
    }

    /// Returns true if any channel is NaN.
    pub fn has_nans(&self) -> bool {
        self.c.iter().any(|v| v.is_nan())
    }

    /// Returns the largest channel value.
    pub fn max_component_value(&self) -> Float {
        self.c[0].max(self.c[1]).max(self.c[2])
    }

    /// Compress the spectrum into Ward's shared-exponent RGBE format, one
    /// mantissa byte per channel plus one common exponent byte.
    pub fn to_rgbe(&self) -> [u8; 4] {
        let max = self.max_component_value();
        if max < 1e-32 {
            [0, 0, 0, 0]
        } else {
            let (mantissa, exponent) = frexp(max);
            let scale = mantissa * 256.0 / max;
            [
                (self.c[0] * scale) as u8,
                (self.c[1] * scale) as u8,
                (self.c[2] * scale) as u8,
                (exponent + 128) as u8,
            ]
        }
    }

    /// Expand a shared-exponent RGBE quadruple back into a spectrum.
    ///
    /// * `rgbe` - The compressed value.
    pub fn from_rgbe(rgbe: [u8; 4]) -> Self {
        if rgbe[3] == 0 {
            Self::default()
        } else {
            let f = (2.0 as Float).powi(rgbe[3] as i32 - (128 + 8));
            Self::from_rgb(&[
                rgbe[0] as Float * f,
                rgbe[1] as Float * f,
                rgbe[2] as Float * f,
            ])
        }
    }
}

impl Add for RGBSpectrum {
    type Output = Self;

    /// Adds the channels of another spectrum.
    ///
    /// * `other` - The spectrum to add.
    fn add(self, other: Self) -> Self::Output {
        Self::Output {
            c: [
                self.c[0] + other.c[0],
                self.c[1] + other.c[1],
                self.c[2] + other.c[2],
            ],
        }
    }
}

impl AddAssign for RGBSpectrum {
    /// Performs the `+=` operation.
    ///
    /// * `other` - The spectrum to add.
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Mul for RGBSpectrum {
    type Output = Self;

    /// Modulates the channels by another spectrum.
    ///
    /// * `other` - The other spectrum.
    fn mul(self, other: Self) -> Self::Output {
        Self::Output {
            c: [
                self.c[0] * other.c[0],
                self.c[1] * other.c[1],
                self.c[2] * other.c[2],
            ],
        }
    }
}

impl Mul<Float> for RGBSpectrum {
    type Output = Self;

    /// Scales the channels by a constant.
    ///
    /// * `f` - The scaling factor.
    fn mul(self, f: Float) -> Self::Output {
        Self::Output {
            c: [self.c[0] * f, self.c[1] * f, self.c[2] * f],
        }
    }
}

impl Mul<RGBSpectrum> for Float {
    type Output = RGBSpectrum;

    /// Scales the channels by a constant.
    ///
    /// * `s` - The spectrum.
    fn mul(self, s: RGBSpectrum) -> RGBSpectrum {
        s * self
    }
}

impl MulAssign<Float> for RGBSpectrum {
    /// Performs the `*=` operation with a constant.
    ///
    /// * `f` - The scaling factor.
    fn mul_assign(&mut self, f: Float) {
        *self = *self * f;
    }
}

impl Div<Float> for RGBSpectrum {
    type Output = Self;

    /// Divides the channels by a constant.
    ///
    /// * `f` - The divisor.
    fn div(self, f: Float) -> Self::Output {
        debug_assert!(f != 0.0);
        let inv = 1.0 / f;
        self * inv
    }
}

impl Index<usize> for RGBSpectrum {
    type Output = Float;

    /// Index a single channel.
    ///
    /// * `i` - The channel index.
    fn index(&self, i: usize) -> &Self::Output {
        &self.c[i]
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn black_by_default() {
        assert!(RGBSpectrum::default().is_black());
        assert!(!RGBSpectrum::new(0.1).is_black());
    }

    #[test]
    fn unit_power_round_trips_exactly() {
        let s = RGBSpectrum::new(1.0);
        let rgbe = s.to_rgbe();
        assert_eq!(rgbe, [128, 128, 128, 129]);
        assert_eq!(RGBSpectrum::from_rgbe(rgbe), s);
    }

    #[test]
    fn tiny_values_collapse_to_black() {
        let s = RGBSpectrum::new(1e-36);
        assert_eq!(s.to_rgbe(), [0, 0, 0, 0]);
        assert!(RGBSpectrum::from_rgbe([0, 0, 0, 0]).is_black());
    }

    proptest! {
        #[test]
        fn rgbe_is_a_close_approximation(
            r in 0.0f32..1000.0,
            g in 0.0f32..1000.0,
            b in 0.0f32..1000.0,
        ) {
            let s = RGBSpectrum::from_rgb(&[r, g, b]);
            let d = RGBSpectrum::from_rgbe(s.to_rgbe());

            // One mantissa byte per channel gives < 1% of the maximum
            // channel in absolute error.
            let tolerance = s.max_component_value() / 100.0 + 1e-30;
            for i in 0..RGB_SAMPLES {
                prop_assert!((s[i] - d[i]).abs() <= tolerance);
            }
        }

        #[test]
        fn arithmetic(v1 in 0.0f32..10.0, v2 in 0.0f32..10.0) {
            let a = RGBSpectrum::new(v1);
            let b = RGBSpectrum::new(v2);
            prop_assert_eq!(a + b, RGBSpectrum::new(v1 + v2));
            prop_assert_eq!(a * b, RGBSpectrum::new(v1 * v2));
            prop_assert_eq!(a * 2.0, RGBSpectrum::new(v1 * 2.0));
            prop_assert_eq!(2.0 * a, a * 2.0);
        }
    }
}
