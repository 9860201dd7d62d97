//! VANOS control maps: engine speed × load → valve control angle.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connector::valve::ValveChannel;
use crate::numerics::interpolation::{bilinear, is_strictly_ascending};

/// Rectilinear control table with the actuator authority of its camshaft
#[derive(Debug, Clone, PartialEq)]
pub struct ControlGrid {
    rpm_points: Vec<f64>,
    load_points: Vec<f64>,  // throttle [%]
    grid: Array2<f64>,      // [CA deg], indexed [[rpm, load]]
    max_advance: f64,
    max_retard: f64,
}

impl ControlGrid {
    pub fn new(
        rpm_points: Vec<f64>,
        load_points: Vec<f64>,
        grid: Array2<f64>,
        max_advance: f64,
        max_retard: f64,
    ) -> Result<ControlGrid, String> {
        if rpm_points.is_empty() || load_points.is_empty() {
            return Err("VANOS map axes must not be empty".to_string());
        }
        if !is_strictly_ascending(&rpm_points) {
            return Err(format!("VANOS `rpm_points` must be strictly ascending: {:?}", rpm_points));
        }
        if !is_strictly_ascending(&load_points) {
            return Err(format!(
                "VANOS `load_points` must be strictly ascending: {:?}",
                load_points
            ));
        }
        let expected = (rpm_points.len(), load_points.len());
        if grid.dim() != expected {
            return Err(format!(
                "VANOS map has shape {:?}, expected {:?} (rpm points × load points)",
                grid.dim(),
                expected
            ));
        }
        if grid.iter().any(|v| !v.is_finite()) {
            return Err("VANOS map contains non-finite angles".to_string());
        }
        Ok(ControlGrid {
            rpm_points,
            load_points,
            grid,
            max_advance,
            max_retard,
        })
    }

    pub fn rpm_points(&self) -> &[f64] {
        &self.rpm_points
    }

    pub fn load_points(&self) -> &[f64] {
        &self.load_points
    }

    pub fn grid(&self) -> &Array2<f64> {
        &self.grid
    }

    pub fn max_advance(&self) -> f64 {
        self.max_advance
    }

    pub fn max_retard(&self) -> f64 {
        self.max_retard
    }

    /// Lowest and highest angle the actuator can reach
    pub fn authority(&self) -> (f64, f64) {
        (
            self.max_advance.min(self.max_retard),
            self.max_advance.max(self.max_retard),
        )
    }

    pub fn lookup(&self, rpm: f64, load: f64) -> f64 {
        bilinear(&self.rpm_points, &self.load_points, &self.grid, rpm, load)
    }
}

/// Control map tagged with the direction its values are expressed in
#[derive(Debug, Clone, PartialEq)]
pub enum VanosMap {
    Advance(ControlGrid),
    Retard(ControlGrid),
}

impl VanosMap {
    pub fn grid(&self) -> &ControlGrid {
        match self {
            VanosMap::Advance(grid) | VanosMap::Retard(grid) => grid,
        }
    }

    pub fn polarity(&self) -> &'static str {
        match self {
            VanosMap::Advance(_) => "advance",
            VanosMap::Retard(_) => "retard",
        }
    }
}

/// Control angle [CA deg] at `rpm` and `load_percent`. Inputs outside the map are
/// clamped to its edges.
pub fn interpolate_control_angle(rpm: f64, load_percent: f64, map: &VanosMap) -> f64 {
    map.grid().lookup(rpm, load_percent)
}

/// VANOS angles held for a whole run [CA deg]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VanosSetting {
    pub intake: f64,
    pub exhaust: f64,
}

/// Deltas added to the mapped angles [CA deg]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VanosModification {
    pub intake: Option<f64>,
    pub exhaust: Option<f64>,
}

impl VanosModification {
    pub fn intake(delta: f64) -> VanosModification {
        VanosModification {
            intake: Some(delta),
            exhaust: None,
        }
    }

    pub fn exhaust(delta: f64) -> VanosModification {
        VanosModification {
            intake: None,
            exhaust: Some(delta),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intake.is_none() && self.exhaust.is_none()
    }
}

/// Intake and exhaust control maps of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct VanosSystem {
    intake: VanosMap,
    exhaust: VanosMap,
}

impl VanosSystem {
    pub fn new(intake: VanosMap, exhaust: VanosMap) -> VanosSystem {
        VanosSystem { intake, exhaust }
    }

    pub fn map(&self, channel: ValveChannel) -> &VanosMap {
        match channel {
            ValveChannel::Intake => &self.intake,
            ValveChannel::Exhaust => &self.exhaust,
        }
    }

    /// Mapped angles with no modification applied
    pub fn base_setting(&self, rpm: f64, load_percent: f64) -> VanosSetting {
        VanosSetting {
            intake: interpolate_control_angle(rpm, load_percent, &self.intake),
            exhaust: interpolate_control_angle(rpm, load_percent, &self.exhaust),
        }
    }

    /// Mapped angles plus the optional deltas. Angles leaving the actuator
    /// authority are kept as requested and only reported.
    pub fn setting(
        &self,
        rpm: f64,
        load_percent: f64,
        modification: Option<&VanosModification>,
    ) -> VanosSetting {
        let mut setting = self.base_setting(rpm, load_percent);
        if let Some(modification) = modification {
            setting.intake += modification.intake.unwrap_or(0.0);
            setting.exhaust += modification.exhaust.unwrap_or(0.0);
            self.check_authority(&setting);
        }
        setting
    }

    /// Returns the channels whose angle falls outside the actuator range, warning for each one
    pub fn check_authority(&self, setting: &VanosSetting) -> Vec<ValveChannel> {
        let mut outside = Vec::new();
        for (channel, angle) in [
            (ValveChannel::Intake, setting.intake),
            (ValveChannel::Exhaust, setting.exhaust),
        ] {
            let (min, max) = self.map(channel).grid().authority();
            if angle < min || angle > max {
                warn!(%channel, angle, min, max, "VANOS angle outside actuator authority");
                outside.push(channel);
            }
        }
        outside
    }
}
