//! Valve events and the overlap between intake and exhaust lift curves.
//!
//! Valve timing is expressed around the VANOS control angle: the valve opens
//! `duration/2` before it and closes `duration/2` after it. Intake angles are
//! measured after TDC; exhaust angles after BDC, which is folded into the lift
//! formula by evaluating the exhaust curve at the negated crank angle.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lift [mm] above which a valve counts as open for the overlap
pub const OVERLAP_LIFT_THRESHOLD: f64 = 0.1;
/// Crank-angle window sampled by the overlap calculation [CA deg]
const SAMPLE_WINDOW: (i32, i32) = (-360, 360);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveChannel {
    Intake,
    Exhaust,
}

impl ValveChannel {
    /// Crank angle as seen by the channel's lift curve
    fn adjusted(self, angle: f64) -> f64 {
        match self {
            ValveChannel::Intake => angle,
            ValveChannel::Exhaust => -angle,
        }
    }
}

impl std::fmt::Display for ValveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValveChannel::Intake => write!(f, "intake"),
            ValveChannel::Exhaust => write!(f, "exhaust"),
        }
    }
}

/// Folds `angle` into `[0, 720)`
pub fn fold_720(angle: f64) -> f64 {
    let folded = angle.rem_euclid(720.0);
    // rem_euclid may round tiny negative inputs up to 720
    if folded >= 720.0 {
        0.0
    } else {
        folded
    }
}

/// Opening and closing angles in the unbounded (non-wrapped) domain [CA deg]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValveTiming {
    pub opening: f64,
    pub closing: f64,
}

impl ValveTiming {
    pub fn from_control_angle(control_angle: f64, duration: f64) -> ValveTiming {
        ValveTiming {
            opening: control_angle - 0.5 * duration,
            closing: control_angle + 0.5 * duration,
        }
    }

    /// Angle of maximum lift
    pub fn control_angle(&self) -> f64 {
        0.5 * (self.opening + self.closing)
    }

    pub fn duration(&self) -> f64 {
        self.closing - self.opening
    }
}

/// Sinusoidal lift [mm] of a valve opened from `timing.opening` to `timing.closing`.
/// The open window repeats every 720°.
pub fn lift(channel: ValveChannel, timing: &ValveTiming, max_lift: f64, angle: f64) -> f64 {
    let duration = timing.duration();
    let phase = (channel.adjusted(angle) - timing.opening).rem_euclid(720.0);
    if phase <= duration {
        max_lift * (PI * phase / duration).sin()
    } else {
        0.0
    }
}

/// Maximum lift and opening duration of one valve
#[derive(Debug, Clone, PartialEq)]
pub struct ValveProfile {
    max_lift: f64, // [mm]
    duration: f64, // [CA deg]
}

impl ValveProfile {
    pub fn new(max_lift: f64, duration: f64) -> Result<ValveProfile, String> {
        if max_lift <= OVERLAP_LIFT_THRESHOLD {
            return Err(format!(
                "valve max lift must be greater than {} mm: {}",
                OVERLAP_LIFT_THRESHOLD, max_lift
            ));
        } else if duration <= 0.0 || duration >= 720.0 {
            return Err(format!("valve duration must be inside (0, 720) CA deg: {}", duration));
        }
        Ok(ValveProfile { max_lift, duration })
    }

    pub fn max_lift(&self) -> f64 {
        self.max_lift
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Timing of one channel as reported with the overlap.
/// Opening and closing are folded into `[0, 720)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelTiming {
    pub opening: f64,
    pub closing: f64,
    pub duration: f64,
    pub max_lift_angle: f64,
}

impl ChannelTiming {
    fn from_timing(timing: &ValveTiming) -> ChannelTiming {
        ChannelTiming {
            opening: fold_720(timing.opening),
            closing: fold_720(timing.closing),
            duration: timing.duration(),
            max_lift_angle: timing.control_angle(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValveOverlap {
    /// Crank angle with both valves open [CA deg]
    pub duration: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub intake_timing: ChannelTiming,
    pub exhaust_timing: ChannelTiming,
}

/// Intake and exhaust valves of the simulated cylinder
#[derive(Debug, Clone, PartialEq)]
pub struct ValveTrain {
    intake: ValveProfile,
    exhaust: ValveProfile,
}

impl ValveTrain {
    pub fn new(intake: ValveProfile, exhaust: ValveProfile) -> ValveTrain {
        ValveTrain { intake, exhaust }
    }

    pub fn profile(&self, channel: ValveChannel) -> &ValveProfile {
        match channel {
            ValveChannel::Intake => &self.intake,
            ValveChannel::Exhaust => &self.exhaust,
        }
    }

    /// Effective opening and closing of `channel` for a VANOS `control_angle`
    pub fn effective_timing(&self, channel: ValveChannel, control_angle: f64) -> ValveTiming {
        ValveTiming::from_control_angle(control_angle, self.profile(channel).duration())
    }

    /// Samples both lift curves every crank-angle degree over `[-360, 360]` and
    /// collects the angles where both valves are lifted above `OVERLAP_LIFT_THRESHOLD`.
    /// Inputs are unbounded angles; reported angles are folded into `[0, 720)`.
    pub fn calculate_valve_overlap(
        &self,
        intake_opening: f64,
        intake_closing: f64,
        exhaust_opening: f64,
        exhaust_closing: f64,
    ) -> ValveOverlap {
        let intake = ValveTiming {
            opening: intake_opening,
            closing: intake_closing,
        };
        let exhaust = ValveTiming {
            opening: exhaust_opening,
            closing: exhaust_closing,
        };

        let mut first: Option<i32> = None;
        let mut last = 0;
        let mut count = 0usize;
        for angle in SAMPLE_WINDOW.0..=SAMPLE_WINDOW.1 {
            let ca = angle as f64;
            let int_lift = lift(ValveChannel::Intake, &intake, self.intake.max_lift, ca);
            let exh_lift = lift(ValveChannel::Exhaust, &exhaust, self.exhaust.max_lift, ca);
            if int_lift > OVERLAP_LIFT_THRESHOLD && exh_lift > OVERLAP_LIFT_THRESHOLD {
                first.get_or_insert(angle);
                last = angle;
                count += 1;
            }
        }

        let (start_angle, end_angle) = match first {
            Some(first) => (fold_720(first as f64), fold_720(last as f64)),
            None => (0.0, 0.0),
        };

        ValveOverlap {
            duration: count as f64,
            start_angle,
            end_angle,
            intake_timing: ChannelTiming::from_timing(&intake),
            exhaust_timing: ChannelTiming::from_timing(&exhaust),
        }
    }

    /// Overlap produced by a pair of VANOS control angles
    pub fn overlap_for(&self, intake_angle: f64, exhaust_angle: f64) -> ValveOverlap {
        let intake = self.effective_timing(ValveChannel::Intake, intake_angle);
        let exhaust = self.effective_timing(ValveChannel::Exhaust, exhaust_angle);
        self.calculate_valve_overlap(
            intake.opening,
            intake.closing,
            exhaust.opening,
            exhaust.closing,
        )
    }
}
