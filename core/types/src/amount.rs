// Copyright (c) 2025 The Rivulet Project

//! Fixed-point monetary amounts.
//!
//! All balances and transfers are signed 128-bit integers counting
//! micro-units: `1_000_000` micro = 1 NXF (six decimal places). Rates
//! such as transfer rates and trust-line qualities are parts-per-million
//! integers. The `f64` that appears in the wire layouts is a lossy
//! human view computed at hashing time; the integer is canonical.

use serde::{Deserialize, Serialize};

/// Micro-units per whole unit (six decimals).
pub const MICRO_PER_UNIT: i128 = 1_000_000;

/// Parts-per-million scale for rates and qualities.
pub const PPM: u64 = 1_000_000;

/// A rate of exactly 1.0 in ppm.
pub const RATE_ONE: u32 = 1_000_000;

/// Currency code for the native asset.
pub const NATIVE_CURRENCY: &str = "NXF";

/// A monetary amount: value in micro-units, a currency code of up to
/// three characters, and an issuer address (empty for native).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Amount {
    /// Value in micro-units.
    pub value: i128,
    /// Currency code, e.g. `"NXF"` or `"USD"`.
    pub currency: String,
    /// Issuer address; empty for the native asset.
    pub issuer: String,
}

impl Amount {
    /// A native amount in micro-units.
    pub fn native(value: i128) -> Self {
        Self {
            value,
            currency: NATIVE_CURRENCY.to_string(),
            issuer: String::new(),
        }
    }

    /// A native amount in whole units.
    pub fn native_units(units: i128) -> Self {
        Self::native(units * MICRO_PER_UNIT)
    }

    /// An IOU amount in micro-units.
    pub fn iou(value: i128, currency: &str, issuer: &str) -> Self {
        Self {
            value,
            currency: currency.to_string(),
            issuer: issuer.to_string(),
        }
    }

    /// Whether this is the native asset.
    pub fn is_native(&self) -> bool {
        self.currency == NATIVE_CURRENCY || self.currency.is_empty()
    }

    /// The zero native amount.
    pub fn zero() -> Self {
        Self::native(0)
    }

    /// Human view of the value, used only for wire hashing and display.
    pub fn display_value(&self) -> f64 {
        self.value as f64 / MICRO_PER_UNIT as f64
    }

    /// Parse a decimal string (up to six fractional digits) into
    /// micro-units. Returns `None` on malformed input or overflow.
    pub fn parse_units(s: &str) -> Option<i128> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if frac.len() > 6 {
            return None;
        }
        let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac_micro: i128 = 0;
        if !frac.is_empty() {
            let parsed: i128 = frac.parse().ok()?;
            frac_micro = parsed * 10i128.pow(6 - frac.len() as u32);
        }
        Some(sign * (whole.checked_mul(MICRO_PER_UNIT)? + frac_micro))
    }

    /// Encode for the signing preimage: `f64` big-endian value, 3-byte
    /// NUL-padded currency, 40-byte NUL-padded issuer.
    pub fn encode_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.display_value().to_be_bytes());
        let mut currency = [0u8; 3];
        for (i, b) in self.currency.as_bytes().iter().take(3).enumerate() {
            currency[i] = *b;
        }
        out.extend_from_slice(&currency);
        let mut issuer = [0u8; 40];
        for (i, b) in self.issuer.as_bytes().iter().take(40).enumerate() {
            issuer[i] = *b;
        }
        out.extend_from_slice(&issuer);
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_native() {
            write!(f, "{:.6} {}", self.display_value(), NATIVE_CURRENCY)
        } else {
            write!(
                f,
                "{:.6} {}/{}",
                self.display_value(),
                self.currency,
                self.issuer
            )
        }
    }
}

/// Multiply by a ppm rate, rounding toward zero (deliver side).
pub fn mul_ppm_floor(value: i128, rate_ppm: u64) -> i128 {
    value * rate_ppm as i128 / PPM as i128
}

/// Multiply by a ppm rate, rounding away from zero (debit/burn side).
pub fn mul_ppm_ceil(value: i128, rate_ppm: u64) -> i128 {
    let num = value * rate_ppm as i128;
    let den = PPM as i128;
    let q = num / den;
    if num % den != 0 {
        q + num.signum()
    } else {
        q
    }
}

/// Multiply by a bps rate (1/10_000), rounding toward zero.
pub fn mul_bps_floor(value: i128, rate_bps: u64) -> i128 {
    value * rate_bps as i128 / 10_000
}

/// `value * num / den` rounded toward zero; `den` must be non-zero.
pub fn mul_ratio_floor(value: i128, num: i128, den: i128) -> i128 {
    value * num / den
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_units_scale() {
        assert_eq!(Amount::native_units(5).value, 5_000_000);
        assert!(Amount::native_units(5).is_native());
    }

    #[test]
    fn parse_units_handles_fractions() {
        assert_eq!(Amount::parse_units("1"), Some(1_000_000));
        assert_eq!(Amount::parse_units("0.00001"), Some(10));
        assert_eq!(Amount::parse_units("100.5"), Some(100_500_000));
        assert_eq!(Amount::parse_units("-2.25"), Some(-2_250_000));
        assert_eq!(Amount::parse_units("1.0000001"), None);
        assert_eq!(Amount::parse_units("abc"), None);
    }

    #[test]
    fn wire_encoding_is_fixed_width() {
        let mut out = Vec::new();
        Amount::iou(1_500_000, "USD", "nIssuer").encode_wire(&mut out);
        assert_eq!(out.len(), 8 + 3 + 40);
        assert_eq!(&out[8..11], b"USD");
    }

    #[test]
    fn ppm_rounding_directions() {
        // 100 micro at 1.000001 rate: ceil debits 101, floor delivers 100.
        assert_eq!(mul_ppm_ceil(100, 1_000_001), 101);
        assert_eq!(mul_ppm_floor(100, 1_000_001), 100);
        assert_eq!(mul_ppm_ceil(100, 1_000_000), 100);
    }

    #[test]
    fn ppm_exact_multiples_are_unchanged() {
        assert_eq!(mul_ppm_floor(1_000_000, 1_500_000), 1_500_000);
        assert_eq!(mul_ppm_ceil(1_000_000, 1_500_000), 1_500_000);
    }
}
