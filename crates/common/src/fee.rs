//! The 8-bit fee-selector table: a fixed, non-linear mapping from the
//! selector carried on an L2 tx to the fraction of `amount` charged as fee.
//!
//! The table is generated once from a closed-form piecewise formula and
//! never recomputed at runtime, frozen by protocol consensus. Three
//! bands, matching the shape used by Hermez-style rollups: selector `0`
//! charges nothing; `1..=32` covers sub-basis-point fees in fixed steps;
//! `33..=223` interpolates exponentially up to low double-digit percentages;
//! `224..=255` covers the rare, deliberately punitive high end.

use once_cell::sync::Lazy;

const TABLE_LEN: usize = 256;

fn fee_fraction(selector: u8) -> f64 {
    match selector {
        0 => 0.0,
        1..=32 => selector as f64 * 1.0e-6,
        33..=223 => {
            let lo = 32e-6_f64;
            let hi = 0.50_f64;
            let t = (selector as f64 - 32.0) / (223.0 - 32.0);
            lo * (hi / lo).powf(t)
        }
        224..=255 => {
            let steps = selector as f64 - 223.0; // 1..=32
            0.50 + steps * 0.25
        }
    }
}

static FEE_TABLE: Lazy<[f64; TABLE_LEN]> = Lazy::new(|| {
    let mut table = [0.0f64; TABLE_LEN];
    for (selector, slot) in table.iter_mut().enumerate() {
        *slot = fee_fraction(selector as u8);
    }
    table
});

/// An 8-bit index into the frozen fee-multiplier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct FeeSelector(pub u8);

impl FeeSelector {
    pub const ZERO: FeeSelector = FeeSelector(0);

    /// The fraction of `amount` this selector charges, e.g. `0.0001` for one
    /// basis point.
    pub fn fraction(self) -> f64 {
        FEE_TABLE[self.0 as usize]
    }
}
