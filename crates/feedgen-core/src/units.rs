//! Compile-time unit safety for distribution design quantities.
//!
//! Feeder synthesis juggles demand (kW), equipment ratings (kVA), voltages (kV),
//! currents (A) and lengths (m). Mixing them up is exactly the kind of mistake
//! that under-sizes a conductor, so each quantity gets its own newtype.
//!
//! # Zero Runtime Overhead
//!
//! All types use `#[repr(transparent)]` and have the same layout as `f64`.
//!
//! # Usage
//!
//! ```
//! use feedgen_core::units::{Kilowatts, KilovoltAmperes, Kilovolts};
//!
//! let demand = Kilowatts(45.0) + Kilowatts(5.0);
//! let apparent = demand.to_apparent(0.9);
//! assert!((apparent.value() - 55.5556).abs() < 1e-3);
//!
//! // Current drawn by a three-phase load at 11 kV line-to-line
//! let amps = KilovoltAmperes(500.0).three_phase_current(Kilovolts(11.0));
//! assert!((amps.value() - 26.243).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Minimum of two values
            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Maximum of two values
            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power Units
// =============================================================================

/// Active power in kilowatts (kW)
///
/// Customer demand is expressed in kW; it becomes apparent power once a power
/// factor is applied.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

/// Apparent power in kilovolt-amperes (kVA)
///
/// Transformer nameplates and the kVA-meter sizing metric are in kVA.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct KilovoltAmperes(pub f64);

impl_unit_ops!(KilovoltAmperes, "kVA");

impl Kilowatts {
    /// Apparent power drawn at the given power factor: S = P / pf
    #[inline]
    pub fn to_apparent(self, power_factor: f64) -> KilovoltAmperes {
        KilovoltAmperes(self.0 / power_factor)
    }
}

impl KilovoltAmperes {
    /// Line current of a balanced three-phase (or two-phase line-to-line) load.
    ///
    /// I = S / (√3 · V_LL)
    #[inline]
    pub fn three_phase_current(self, line_to_line: Kilovolts) -> Amperes {
        if line_to_line.0.abs() < 1e-12 {
            return Amperes(f64::INFINITY);
        }
        Amperes(self.0 / (3f64.sqrt() * line_to_line.0))
    }

    /// Current of a single-phase load connected line-to-neutral.
    ///
    /// I = S / V_LN with V_LN = V_LL / √3
    #[inline]
    pub fn single_phase_current(self, line_to_line: Kilovolts) -> Amperes {
        let line_to_neutral = line_to_line.line_to_neutral();
        if line_to_neutral.0.abs() < 1e-12 {
            return Amperes(f64::INFINITY);
        }
        Amperes(self.0 / line_to_neutral.0)
    }
}

// =============================================================================
// Voltage and Current Units
// =============================================================================

/// Voltage in kilovolts (kV), line-to-line unless stated otherwise
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl Kilovolts {
    /// Phase voltage of a wye system: V_LN = V_LL / √3
    #[inline]
    pub fn line_to_neutral(self) -> Kilovolts {
        Kilovolts(self.0 / 3f64.sqrt())
    }

    /// Value in volts
    #[inline]
    pub fn volts(self) -> f64 {
        self.0 * 1000.0
    }
}

/// Current in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

// =============================================================================
// Length Units
// =============================================================================

/// Length in meters (m)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Meters(pub f64);

impl_unit_ops!(Meters, "m");

impl Meters {
    /// Length in kilometers
    #[inline]
    pub fn kilometers(self) -> f64 {
        self.0 / 1000.0
    }

    /// Zero length
    pub const ZERO: Self = Self(0.0);
}

// =============================================================================
// Tests
// =============================================================================
