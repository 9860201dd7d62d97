//! Empirical volumetric-efficiency surrogate.
//!
//! A speed-dependent base curve is corrected by how far the current intake
//! timing, exhaust timing and valve overlap are from the targets for that speed.
//! The breakpoints and coefficients are those of the reference S54 calibration.

pub const MIN_EFFICIENCY: f64 = 0.60;
pub const MAX_EFFICIENCY: f64 = 0.98;

/// Base efficiency from engine speed alone [-]
pub fn base_efficiency(rpm: f64) -> f64 {
    if rpm < 1000.0 {
        0.65
    } else if rpm < 2000.0 {
        0.65 + 0.15 * (rpm - 1000.0) / 1000.0
    } else if rpm < 4000.0 {
        0.80 + 0.10 * (rpm - 2000.0) / 2000.0
    } else if rpm < 6000.0 {
        0.90 + 0.05 * (rpm - 4000.0) / 2000.0
    } else if rpm < 7000.0 {
        0.95 - 0.02 * (rpm - 6000.0) / 1000.0
    } else {
        0.93 - 0.10 * (rpm - 7000.0) / 1000.0
    }
}

/// Picks the target for the speed band: below 3000, below 5000, above
fn by_speed_band(rpm: f64, low: f64, mid: f64, high: f64) -> f64 {
    if rpm < 3000.0 {
        low
    } else if rpm < 5000.0 {
        mid
    } else {
        high
    }
}

pub fn optimal_intake(rpm: f64) -> f64 {
    by_speed_band(rpm, 110.0, 100.0, 90.0)
}

pub fn optimal_exhaust(rpm: f64) -> f64 {
    by_speed_band(rpm, 85.0, 80.0, 75.0)
}

pub fn optimal_overlap(rpm: f64) -> f64 {
    by_speed_band(rpm, 15.0, 25.0, 35.0)
}

/// Correction factors applied on top of the base curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyFactors {
    pub base: f64,
    pub intake: f64,
    pub exhaust: f64,
    pub overlap: f64,
}

impl EfficiencyFactors {
    /// `intake_angle`/`exhaust_angle` are the current VANOS angles [CA deg] and `overlap`
    /// the valve-overlap duration [CA deg].
    pub fn new(rpm: f64, intake_angle: f64, exhaust_angle: f64, overlap: f64) -> EfficiencyFactors {
        EfficiencyFactors {
            base: base_efficiency(rpm),
            intake: 1.0 - 0.001 * (intake_angle - optimal_intake(rpm)).abs(),
            exhaust: 1.0 - 0.0005 * (exhaust_angle - optimal_exhaust(rpm)).abs(),
            overlap: 1.0 - 0.002 * (overlap - optimal_overlap(rpm)).abs(),
        }
    }

    pub fn efficiency(&self) -> f64 {
        let raw = self.base * self.intake * self.exhaust * self.overlap;
        raw.max(MIN_EFFICIENCY).min(MAX_EFFICIENCY)
    }
}

/// Volumetric efficiency, always inside `[0.60, 0.98]`
pub fn volumetric_efficiency(rpm: f64, intake_angle: f64, exhaust_angle: f64, overlap: f64) -> f64 {
    EfficiencyFactors::new(rpm, intake_angle, exhaust_angle, overlap).efficiency()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn base_curve_anchors() {
        assert!(close(base_efficiency(0.0), 0.65));
        assert!(close(base_efficiency(1000.0), 0.65));
        assert!(close(base_efficiency(1500.0), 0.725));
        assert!(close(base_efficiency(2000.0), 0.80));
        assert!(close(base_efficiency(3000.0), 0.85));
        assert!(close(base_efficiency(4000.0), 0.90));
        assert!(close(base_efficiency(6000.0), 0.95));
        assert!(close(base_efficiency(7000.0), 0.93));
        assert!(close(base_efficiency(8000.0), 0.83));
    }

    #[test]
    fn speed_bands() {
        assert_eq!(optimal_intake(2999.0), 110.0);
        assert_eq!(optimal_intake(3000.0), 100.0);
        assert_eq!(optimal_exhaust(4999.0), 80.0);
        assert_eq!(optimal_exhaust(5000.0), 75.0);
        assert_eq!(optimal_overlap(1000.0), 15.0);
        assert_eq!(optimal_overlap(7000.0), 35.0);
    }

    #[test]
    fn matches_hand_calculation() {
        // 3000 rpm, intake 110°, exhaust 80°, 69° overlap
        let expected = 0.85 * (1.0 - 0.001 * 10.0) * 1.0 * (1.0 - 0.002 * 44.0);
        assert!(close(volumetric_efficiency(3000.0, 110.0, 80.0, 69.0), expected));
    }

    #[test]
    fn optimal_settings_keep_base_curve() {
        let rpm = 4500.0;
        let ve = volumetric_efficiency(
            rpm,
            optimal_intake(rpm),
            optimal_exhaust(rpm),
            optimal_overlap(rpm),
        );
        assert!(close(ve, base_efficiency(rpm)));
    }

    #[test]
    fn clamped_to_bounds() {
        assert_eq!(volumetric_efficiency(500.0, 300.0, -200.0, 400.0), MIN_EFFICIENCY);
        assert_eq!(volumetric_efficiency(12_000.0, 90.0, 75.0, 35.0), MIN_EFFICIENCY);
        // two negative factors multiply into a large positive product
        assert_eq!(volumetric_efficiency(5000.0, 4090.0, 75.0, 1000.0), MAX_EFFICIENCY);
    }

    mod proptests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn efficiency_stays_in_bounds(
                rpm in 0.0f64..10_000.0,
                intake in -2000.0f64..2000.0,
                exhaust in -2000.0f64..2000.0,
                overlap in 0.0f64..721.0,
            ) {
                let ve = volumetric_efficiency(rpm, intake, exhaust, overlap);
                prop_assert!(ve >= MIN_EFFICIENCY && ve <= MAX_EFFICIENCY);
            }
        }
    }
}
