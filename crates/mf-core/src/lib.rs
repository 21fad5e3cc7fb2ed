//! mf-core: Shared types for MasterForge
//!
//! Sample type, the immutable [`PcmBuffer`] passed between processing stages,
//! and the decibel helpers every other crate leans on.

mod error;
mod sample;

pub use error::*;
pub use sample::*;

/// Level reported for digital silence (dBFS / LUFS floor)
pub const SILENCE_DB: f64 = -70.0;

/// Convert decibels to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to decibels, floored at [`SILENCE_DB`]
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 1e-10 {
        (20.0 * linear.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501187, epsilon = 1e-6);
        assert_relative_eq!(linear_to_db(1.0), 0.0);
        assert_relative_eq!(linear_to_db(0.5), -6.0206, epsilon = 1e-4);
    }

    #[test]
    fn test_silence_floor() {
        assert_eq!(linear_to_db(0.0), SILENCE_DB);
        assert_eq!(linear_to_db(1e-12), SILENCE_DB);
    }
}
