use crate::connector::valve::{ValveOverlap, ValveTiming};
use crate::connector::vanos::VanosSetting;
use crate::core::traits::SaveData;
use crate::error::{SimError, SimResult};
use ndarray::{array, Array1};
use serde::Serialize;
use std::io::Write;

/// State of the cylinder at one crank angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepRecord {
    pub crank_angle: f64,           // [CA deg]
    pub pressure: f64,              // [Pa]
    pub temperature: f64,           // [K]
    pub volume: f64,                // [m³]
    pub mass: f64,                  // [kg]
    pub burned_fraction: f64,       // [-]
    pub trapped_air_mass: f64,      // [kg]
    pub volumetric_efficiency: f64, // [-]
    pub intake_vanos: f64,          // [CA deg]
    pub exhaust_vanos: f64,         // [CA deg]
    pub valve_overlap: f64,         // [CA deg]
}

impl SaveData for StepRecord {
    fn get_headers(&self) -> String {
        [
            "crank-angle [deg]",
            "pressure [bar]",
            "temperature [K]",
            "volume [cm³]",
            "mass [mg]",
            "burned fraction [-]",
            "trapped air [mg]",
            "volumetric efficiency [-]",
            "intake vanos [deg]",
            "exhaust vanos [deg]",
            "overlap [deg]",
        ]
        .join("\t")
    }
    fn num_storable_variables(&self) -> usize {
        11
    }
    fn get_storable_data(&self) -> Array1<f64> {
        array![
            self.crank_angle,
            self.pressure / 1e5,
            self.temperature,
            self.volume * 1e6,
            self.mass * 1e6,
            self.burned_fraction,
            self.trapped_air_mass * 1e6,
            self.volumetric_efficiency,
            self.intake_vanos,
            self.exhaust_vanos,
            self.valve_overlap
        ]
    }
}

/// Averages and peaks over the last simulated cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleStatistics {
    pub avg_volumetric_efficiency: f64,
    pub avg_air_mass_trapped: f64, // [kg]
    pub max_cylinder_pressure: f64, // [Pa]
    pub intake_vanos: f64,
    pub exhaust_vanos: f64,
}

/// Every step of one run, plus the run-wide VANOS and valve setup
#[derive(Debug, Clone, Serialize)]
pub struct SimulationHistory {
    rpm: f64,
    load: f64,
    vanos: VanosSetting,
    intake_timing: ValveTiming,
    exhaust_timing: ValveTiming,
    overlap: ValveOverlap,
    steps_per_cycle: usize,
    records: Vec<StepRecord>,
}

impl SimulationHistory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rpm: f64,
        load: f64,
        vanos: VanosSetting,
        intake_timing: ValveTiming,
        exhaust_timing: ValveTiming,
        overlap: ValveOverlap,
        steps_per_cycle: usize,
        capacity: usize,
    ) -> SimulationHistory {
        SimulationHistory {
            rpm,
            load,
            vanos,
            intake_timing,
            exhaust_timing,
            overlap,
            steps_per_cycle,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }
    pub fn load(&self) -> f64 {
        self.load
    }
    pub fn vanos(&self) -> &VanosSetting {
        &self.vanos
    }
    pub fn intake_timing(&self) -> &ValveTiming {
        &self.intake_timing
    }
    pub fn exhaust_timing(&self) -> &ValveTiming {
        &self.exhaust_timing
    }
    pub fn overlap(&self) -> &ValveOverlap {
        &self.overlap
    }
    pub fn steps_per_cycle(&self) -> usize {
        self.steps_per_cycle
    }

    fn column<F: Fn(&StepRecord) -> f64>(&self, field: F) -> Array1<f64> {
        self.records.iter().map(field).collect()
    }

    pub fn crank_angle(&self) -> Array1<f64> {
        self.column(|r| r.crank_angle)
    }
    pub fn pressure(&self) -> Array1<f64> {
        self.column(|r| r.pressure)
    }
    pub fn temperature(&self) -> Array1<f64> {
        self.column(|r| r.temperature)
    }
    pub fn volume(&self) -> Array1<f64> {
        self.column(|r| r.volume)
    }
    pub fn trapped_air_mass(&self) -> Array1<f64> {
        self.column(|r| r.trapped_air_mass)
    }
    pub fn volumetric_efficiency(&self) -> Array1<f64> {
        self.column(|r| r.volumetric_efficiency)
    }
    pub fn intake_vanos_angle(&self) -> Array1<f64> {
        self.column(|r| r.intake_vanos)
    }
    pub fn exhaust_vanos_angle(&self) -> Array1<f64> {
        self.column(|r| r.exhaust_vanos)
    }
    pub fn valve_overlap(&self) -> Array1<f64> {
        self.column(|r| r.valve_overlap)
    }

    /// Records of the last `steps_per_cycle` steps
    pub fn final_cycle(&self) -> &[StepRecord] {
        let first = self.records.len().saturating_sub(self.steps_per_cycle);
        &self.records[first..]
    }

    pub fn final_cycle_statistics(&self) -> SimResult<CycleStatistics> {
        let last = self.final_cycle();
        let ve: Array1<f64> = last.iter().map(|r| r.volumetric_efficiency).collect();
        let air: Array1<f64> = last.iter().map(|r| r.trapped_air_mass).collect();
        let (avg_ve, avg_air) = match (ve.mean(), air.mean()) {
            (Some(ve), Some(air)) => (ve, air),
            _ => {
                return Err(SimError::Degenerate {
                    what: "statistics of an empty history",
                })
            }
        };
        let max_press = last
            .iter()
            .map(|r| r.pressure)
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(CycleStatistics {
            avg_volumetric_efficiency: avg_ve,
            avg_air_mass_trapped: avg_air,
            max_cylinder_pressure: max_press,
            intake_vanos: self.vanos.intake,
            exhaust_vanos: self.vanos.exhaust,
        })
    }

    /// Writes the records with crank angle inside `range` [CA deg] to `file_name` as
    /// tab-separated columns. `None` writes the final cycle.
    pub fn write_to_file(&self, file_name: &str, range: Option<(f64, f64)>) -> SimResult<()> {
        let records: Vec<&StepRecord> = match range {
            Some((start, end)) => self
                .records
                .iter()
                .filter(|r| r.crank_angle >= start && r.crank_angle <= end)
                .collect(),
            None => self.final_cycle().iter().collect(),
        };
        let headers = match records.first() {
            Some(r) => r.get_headers(),
            None => return Err(SimError::invalid_arg(format!("no records inside {:?}", range))),
        };

        let mut result: Vec<String> = Vec::with_capacity(records.len() + 1);
        result.push(format!("{}\n", headers));
        for record in records {
            let row: Vec<String> = record
                .get_storable_data()
                .iter()
                .map(|v| format!("{:.6e}", v))
                .collect();
            result.push(format!("{}\n", row.join("\t")));
        }

        let io_err = |source| SimError::Io {
            path: file_name.to_string(),
            source,
        };
        let mut file = std::fs::File::create(file_name).map_err(io_err)?;
        write!(file, "{}", result.join("")).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::valve::{ValveProfile, ValveTrain};

    fn history(num_records: usize) -> SimulationHistory {
        let valves = ValveTrain::new(
            ValveProfile::new(11.8, 260.0).unwrap(),
            ValveProfile::new(11.8, 260.0).unwrap(),
        );
        let vanos = VanosSetting {
            intake: 110.0,
            exhaust: 80.0,
        };
        let overlap = valves.overlap_for(vanos.intake, vanos.exhaust);
        let mut history = SimulationHistory::new(
            3000.0,
            50.0,
            vanos,
            ValveTiming::from_control_angle(110.0, 260.0),
            ValveTiming::from_control_angle(80.0, 260.0),
            overlap,
            4,
            num_records,
        );
        for i in 0..num_records {
            history.push(StepRecord {
                crank_angle: i as f64 * 180.0,
                pressure: 1e5 * (i + 1) as f64,
                temperature: 300.0,
                volume: 5e-4,
                mass: 5e-4,
                burned_fraction: 0.0,
                trapped_air_mass: 1e-4 * (i + 1) as f64,
                volumetric_efficiency: 0.8,
                intake_vanos: 110.0,
                exhaust_vanos: 80.0,
                valve_overlap: overlap.duration,
            });
        }
        history
    }

    #[test]
    fn columns() {
        let h = history(8);
        assert_eq!(h.len(), 8);
        assert_eq!(h.crank_angle()[3], 540.0);
        assert_eq!(h.valve_overlap()[0], 69.0);
        assert_eq!(h.pressure().len(), 8);
    }

    #[test]
    fn statistics_use_the_final_cycle() {
        let stats = history(8).final_cycle_statistics().unwrap();
        assert!((stats.avg_air_mass_trapped - 6.5e-4).abs() < 1e-15);
        assert_eq!(stats.max_cylinder_pressure, 8e5);
        assert_eq!(stats.avg_volumetric_efficiency, 0.8);
        assert_eq!(stats.intake_vanos, 110.0);
    }

    #[test]
    fn empty_history_has_no_statistics() {
        assert!(history(0).final_cycle_statistics().is_err());
    }

    #[test]
    fn storable_data_matches_headers() {
        let h = history(1);
        let record = h.records()[0];
        let headers = record.get_headers();
        assert_eq!(headers.split('\t').count(), record.num_storable_variables());
        assert_eq!(record.get_storable_data().len(), record.num_storable_variables());
    }

    #[test]
    fn writes_tab_separated_file() {
        let h = history(8);
        let path = std::env::temp_dir().join("vanos_history_test.txt");
        let path = path.to_string_lossy().to_string();
        h.write_to_file(&path, Some((0.0, 360.0))).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("crank-angle [deg]"));
        std::fs::remove_file(&path).unwrap();
        assert!(h.write_to_file(&path, Some((5000.0, 6000.0))).is_err());
    }
}
