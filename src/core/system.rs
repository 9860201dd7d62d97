use crate::connector::valve::{ValveChannel, ValveOverlap};
use crate::connector::vanos::{interpolate_control_angle, VanosMap, VanosModification};
use crate::core::history::{CycleStatistics, SimulationHistory};
use crate::engine::engine::Engine;
use crate::error::{SimError, SimResult};
use crate::zero_dim::cylinder::Cylinder;
use ansi_term::{Colour, Style};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span};

/// A named set of VANOS deltas to compare against the others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VanosVariant {
    pub name: String,
    pub changes: Option<VanosModification>,
}

impl VanosVariant {
    pub fn new(name: &str, changes: Option<VanosModification>) -> VanosVariant {
        VanosVariant {
            name: name.to_string(),
            changes,
        }
    }

    /// Stock, +10° and +20° intake advance, -10° exhaust retard
    pub fn default_set() -> Vec<VanosVariant> {
        vec![
            VanosVariant::new("Stock", None),
            VanosVariant::new("+10deg Intake Advance", Some(VanosModification::intake(10.0))),
            VanosVariant::new("+20deg Intake Advance", Some(VanosModification::intake(20.0))),
            VanosVariant::new("-10deg Exhaust Retard", Some(VanosModification::exhaust(-10.0))),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub name: String,
    pub history: SimulationHistory,
    pub statistics: CycleStatistics,
}

/// Final-cycle results of one variant relative to the first (baseline) variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub name: String,
    pub volumetric_efficiency: f64,
    /// Difference to the baseline in percentage points
    pub efficiency_change_percent: f64,
    pub air_mass_trapped_grams: f64,
    pub air_mass_change_grams: f64,
}

/// Compares every result against the first one
pub fn get_performance_summary(results: &[ComparisonResult]) -> Vec<PerformanceSummary> {
    let baseline = match results.first() {
        Some(r) => r.statistics,
        None => return Vec::new(),
    };
    results
        .iter()
        .map(|r| {
            let stats = &r.statistics;
            PerformanceSummary {
                name: r.name.clone(),
                volumetric_efficiency: stats.avg_volumetric_efficiency,
                efficiency_change_percent: (stats.avg_volumetric_efficiency
                    - baseline.avg_volumetric_efficiency)
                    * 100.0,
                air_mass_trapped_grams: stats.avg_air_mass_trapped * 1e3,
                air_mass_change_grams: (stats.avg_air_mass_trapped - baseline.avg_air_mass_trapped)
                    * 1e3,
            }
        })
        .collect()
}

/// Prints the summary as a table
pub fn print_performance_summary(summary: &[PerformanceSummary]) {
    let header = format!(
        "{:<24}{:>12}{:>12}{:>14}{:>14}",
        "setting", "VE [-]", "ΔVE [%]", "air [g]", "Δair [g]"
    );
    println!("{}", Style::new().bold().paint(header));
    for s in summary {
        let change = format!("{:>+12.2}", s.efficiency_change_percent);
        let change = if s.efficiency_change_percent > 0.0 {
            Colour::Green.paint(change)
        } else if s.efficiency_change_percent < 0.0 {
            Colour::Red.paint(change)
        } else {
            Style::new().paint(change)
        };
        println!(
            "{:<24}{:>12.3}{}{:>14.4}{:>+14.4}",
            s.name,
            s.volumetric_efficiency,
            change,
            s.air_mass_trapped_grams,
            s.air_mass_change_grams
        );
    }
}

/// Parameters of an engine-speed sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpmSweepRequest {
    pub rpm_min: u32,
    pub rpm_max: u32,
    pub rpm_step: u32,
    pub load: f64,
    pub baseline_vanos: Option<VanosModification>,
    pub modified_vanos: Option<VanosModification>,
    /// Replaces `modified_vanos` at the listed speeds
    pub rpm_specific_vanos: BTreeMap<u32, VanosModification>,
}

impl Default for RpmSweepRequest {
    fn default() -> Self {
        RpmSweepRequest {
            rpm_min: 1000,
            rpm_max: 8000,
            rpm_step: 200,
            load: 50.0,
            baseline_vanos: None,
            modified_vanos: None,
            rpm_specific_vanos: BTreeMap::new(),
        }
    }
}

impl RpmSweepRequest {
    /// Speeds from `rpm_min` in `rpm_step` increments until `rpm_max` is reached
    /// or passed. The last point may lie above `rpm_max`.
    pub fn rpm_points(&self) -> SimResult<Vec<u32>> {
        if self.rpm_step == 0 || self.rpm_min == 0 || self.rpm_min > self.rpm_max {
            return Err(SimError::invalid_arg(format!(
                "invalid rpm range: {}..={} step {}",
                self.rpm_min, self.rpm_max, self.rpm_step
            )));
        }
        let end = self.rpm_max.saturating_add(self.rpm_step);
        Ok((self.rpm_min..end).step_by(self.rpm_step as usize).collect())
    }
}

/// Final-cycle values of a series of runs, one entry per speed
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSeries {
    pub rpm: Vec<f64>,
    pub volumetric_efficiency: Vec<f64>,
    pub air_mass_trapped: Vec<f64>,
    pub intake_vanos: Vec<f64>,
    pub exhaust_vanos: Vec<f64>,
    pub valve_overlap: Vec<f64>,
    pub valve_overlap_details: Vec<ValveOverlap>,
}

impl SweepSeries {
    fn push(&mut self, history: &SimulationHistory, stats: &CycleStatistics) {
        self.rpm.push(history.rpm());
        self.volumetric_efficiency.push(stats.avg_volumetric_efficiency);
        self.air_mass_trapped.push(stats.avg_air_mass_trapped);
        self.intake_vanos.push(stats.intake_vanos);
        self.exhaust_vanos.push(stats.exhaust_vanos);
        self.valve_overlap.push(history.overlap().duration);
        self.valve_overlap_details.push(*history.overlap());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpmSweep {
    pub baseline: SweepSeries,
    pub modified: SweepSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TablePoint {
    pub rpm: f64,
    pub vanos_angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlapPoint {
    pub rpm: f64,
    pub intake_vanos: f64,
    pub exhaust_vanos: f64,
    pub overlap_details: ValveOverlap,
}

/// Control angles at a fixed load along each map's own speed axis, and the
/// overlap along the union of both axes
#[derive(Debug, Clone, Serialize)]
pub struct VanosTable {
    pub load: f64,
    pub intake_table: Vec<TablePoint>,
    pub exhaust_table: Vec<TablePoint>,
    pub overlap_analysis: Vec<OverlapPoint>,
    pub all_rpm_points: Vec<f64>,
}

/// Control angle at `load_percent` for every speed of the map's own axis
fn map_table(map: &VanosMap, load_percent: f64) -> Vec<TablePoint> {
    map.grid()
        .rpm_points()
        .iter()
        .map(|&rpm| TablePoint {
            rpm,
            vanos_angle: interpolate_control_angle(rpm, load_percent, map),
        })
        .collect()
}

/// Runs the cylinder model of an `Engine`. Every run builds its own state, so a
/// `Simulator` can be shared between threads.
#[derive(Clone)]
pub struct Simulator {
    engine: Engine,
    cylinder: Cylinder,
}

impl Simulator {
    /// Simulator with combustion and heat transfer as configured in `engine`
    pub fn new(engine: Engine) -> Simulator {
        let cylinder = engine.build_cylinder(true, true);
        Simulator { engine, cylinder }
    }

    pub(crate) fn from_parts(engine: Engine, cylinder: Cylinder) -> Simulator {
        Simulator { engine, cylinder }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn cylinder(&self) -> &Cylinder {
        &self.cylinder
    }

    /// Simulates `num_cycles` engine cycles at `rpm` and `load_percent`, with the
    /// optional VANOS deltas added to the mapped angles.
    pub fn run_simulation(
        &self,
        rpm: f64,
        load_percent: f64,
        vanos_modifications: Option<&VanosModification>,
    ) -> SimResult<SimulationHistory> {
        if !rpm.is_finite() || rpm <= 0.0 {
            return Err(SimError::invalid_arg(format!("rpm must be positive and finite: {}", rpm)));
        }
        if !load_percent.is_finite() {
            return Err(SimError::invalid_arg(format!("load must be finite: {}", load_percent)));
        }
        if let Some(m) = vanos_modifications {
            let non_finite = |delta: Option<f64>| delta.map_or(false, |d| !d.is_finite());
            if non_finite(m.intake) || non_finite(m.exhaust) {
                return Err(SimError::invalid_arg(format!("VANOS deltas must be finite: {:?}", m)));
            }
        }

        let span = info_span!("run", rpm, load = load_percent);
        let _enter = span.enter();

        let settings = self.engine.settings();
        let d_angle = settings.crank_angle_step();
        let num_steps = settings.total_steps();
        let dt = d_angle / (rpm * 6.0); // [s]

        let vanos = self.engine.vanos().setting(rpm, load_percent, vanos_modifications);
        debug!(intake = vanos.intake, exhaust = vanos.exhaust, "VANOS angles");

        let mut run = self.cylinder.start_run(rpm, vanos)?;
        let valves = self.engine.valves();
        let mut history = SimulationHistory::new(
            rpm,
            load_percent,
            vanos,
            valves.effective_timing(ValveChannel::Intake, vanos.intake),
            valves.effective_timing(ValveChannel::Exhaust, vanos.exhaust),
            *run.overlap(),
            settings.steps_per_cycle(),
            num_steps,
        );

        for i in 0..num_steps {
            let angle = i as f64 * d_angle;
            let record = self.cylinder.advance(&mut run, angle, d_angle, dt, rpm)?;
            history.push(record);
        }
        debug!(
            steps = history.len(),
            overlap = run.overlap().duration,
            efficiency = run.state().volumetric_efficiency,
            "run finished"
        );
        Ok(history)
    }

    fn run_with_statistics(
        &self,
        rpm: f64,
        load_percent: f64,
        vanos_modifications: Option<&VanosModification>,
    ) -> SimResult<(SimulationHistory, CycleStatistics)> {
        let history = self.run_simulation(rpm, load_percent, vanos_modifications)?;
        let stats = history.final_cycle_statistics()?;
        Ok((history, stats))
    }

    /// Runs every variant (the default set when `variants` is `None`) in parallel.
    /// Results keep the order of the variants.
    pub fn compare_vanos_settings(
        &self,
        rpm: f64,
        load_percent: f64,
        variants: Option<&[VanosVariant]>,
    ) -> SimResult<Vec<ComparisonResult>> {
        let defaults;
        let variants = match variants {
            Some(v) => v,
            None => {
                defaults = VanosVariant::default_set();
                &defaults[..]
            }
        };
        info!(rpm, load = load_percent, variants = variants.len(), "comparing VANOS settings");

        variants
            .par_iter()
            .map(|variant| -> SimResult<ComparisonResult> {
                let (history, statistics) =
                    self.run_with_statistics(rpm, load_percent, variant.changes.as_ref())?;
                info!(
                    variant = %variant.name,
                    efficiency = statistics.avg_volumetric_efficiency,
                    max_pressure = statistics.max_cylinder_pressure,
                    "variant finished"
                );
                Ok(ComparisonResult {
                    name: variant.name.clone(),
                    history,
                    statistics,
                })
            })
            .collect()
    }

    /// Baseline and modified final-cycle results over a range of engine speeds
    pub fn rpm_sweep(&self, request: &RpmSweepRequest) -> SimResult<RpmSweep> {
        let rpm_points = request.rpm_points()?;
        info!(points = rpm_points.len(), load = request.load, "rpm sweep");

        let runs: Vec<_> = rpm_points
            .par_iter()
            .map(|&rpm| -> SimResult<_> {
                let baseline = self.run_with_statistics(
                    rpm as f64,
                    request.load,
                    request.baseline_vanos.as_ref(),
                )?;
                let modified_vanos = request
                    .rpm_specific_vanos
                    .get(&rpm)
                    .or(request.modified_vanos.as_ref());
                let modified = self.run_with_statistics(rpm as f64, request.load, modified_vanos)?;
                Ok((baseline, modified))
            })
            .collect::<SimResult<_>>()?;

        let mut sweep = RpmSweep {
            baseline: SweepSeries::default(),
            modified: SweepSeries::default(),
        };
        for ((base_hist, base_stats), (mod_hist, mod_stats)) in runs.iter() {
            sweep.baseline.push(base_hist, base_stats);
            sweep.modified.push(mod_hist, mod_stats);
        }
        Ok(sweep)
    }

    /// VANOS angles and valve overlap at `load_percent` along the map speed axes
    pub fn vanos_table(&self, load_percent: f64) -> VanosTable {
        let vanos = self.engine.vanos();
        let intake_map = vanos.map(ValveChannel::Intake);
        let exhaust_map = vanos.map(ValveChannel::Exhaust);

        let intake_table = map_table(intake_map, load_percent);
        let exhaust_table = map_table(exhaust_map, load_percent);

        let mut all_rpm_points: Vec<f64> = intake_map
            .grid()
            .rpm_points()
            .iter()
            .chain(exhaust_map.grid().rpm_points())
            .cloned()
            .collect();
        all_rpm_points.sort_by(|a, b| a.total_cmp(b));
        all_rpm_points.dedup();

        let valves = self.engine.valves();
        let overlap_analysis = all_rpm_points
            .iter()
            .map(|&rpm| {
                let setting = vanos.base_setting(rpm, load_percent);
                OverlapPoint {
                    rpm,
                    intake_vanos: setting.intake,
                    exhaust_vanos: setting.exhaust,
                    overlap_details: valves.overlap_for(setting.intake, setting.exhaust),
                }
            })
            .collect();

        VanosTable {
            load: load_percent,
            intake_table,
            exhaust_table,
            overlap_analysis,
            all_rpm_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_simulator() -> Simulator {
        let mut builder = crate::core::system_builder::SimulatorBuilder::new();
        builder.add_engine(Engine::bmw_s54().unwrap()).num_cycles(2).crank_angle_step(1.0);
        builder.build_simulator().unwrap()
    }

    #[test]
    fn sweep_points_follow_half_open_range() {
        let request = RpmSweepRequest {
            rpm_min: 1000,
            rpm_max: 1300,
            rpm_step: 200,
            ..RpmSweepRequest::default()
        };
        assert_eq!(request.rpm_points().unwrap(), vec![1000, 1200, 1400]);
        assert_eq!(RpmSweepRequest::default().rpm_points().unwrap().len(), 36);
        let bad = RpmSweepRequest {
            rpm_step: 0,
            ..RpmSweepRequest::default()
        };
        assert!(bad.rpm_points().is_err());
    }

    #[test]
    fn sweep_request_from_json() {
        let request: RpmSweepRequest = serde_json::from_str(
            r#"{"rpm_min": 2000, "rpm_max": 3000, "rpm_step": 500,
                "modified_vanos": {"intake": 10.0},
                "rpm_specific_vanos": {"2500": {"exhaust": -5.0}}}"#,
        )
        .unwrap();
        assert_eq!(request.load, 50.0);
        assert_eq!(request.rpm_specific_vanos[&2500], VanosModification::exhaust(-5.0));
    }

    #[test]
    fn rejects_invalid_speed() {
        let sim = quick_simulator();
        for rpm in [0.0, -100.0, f64::NAN, f64::INFINITY] {
            let err = sim.run_simulation(rpm, 50.0, None).unwrap_err();
            assert!(matches!(err, SimError::InvalidArg { .. }));
        }
        let nan_delta = VanosModification::intake(f64::NAN);
        assert!(sim.run_simulation(3000.0, 50.0, Some(&nan_delta)).is_err());
    }

    #[test]
    fn history_pairs_angle_with_state() {
        let sim = quick_simulator();
        let history = sim.run_simulation(3000.0, 50.0, None).unwrap();
        assert_eq!(history.len(), 1440);
        let geometry = sim.engine().geometry();
        for record in history.records().iter().step_by(97) {
            assert_eq!(record.volume, geometry.volume(record.crank_angle));
        }
        assert_eq!(history.crank_angle()[1439], 1439.0);
    }

    #[test]
    fn summary_is_relative_to_first_variant() {
        let sim = quick_simulator();
        let results = sim.compare_vanos_settings(3000.0, 50.0, None).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Stock", "+10deg Intake Advance", "+20deg Intake Advance", "-10deg Exhaust Retard"]
        );
        let summary = get_performance_summary(&results);
        assert_eq!(summary[0].efficiency_change_percent, 0.0);
        assert_eq!(summary[0].air_mass_change_grams, 0.0);
        let expected = (results[1].statistics.avg_volumetric_efficiency
            - results[0].statistics.avg_volumetric_efficiency)
            * 100.0;
        assert!((summary[1].efficiency_change_percent - expected).abs() < 1e-12);
        assert!(get_performance_summary(&[]).is_empty());
    }

    #[test]
    fn rpm_specific_override() {
        let sim = quick_simulator();
        let mut request = RpmSweepRequest {
            rpm_min: 2000,
            rpm_max: 3000,
            rpm_step: 1000,
            modified_vanos: Some(VanosModification::intake(10.0)),
            ..RpmSweepRequest::default()
        };
        request
            .rpm_specific_vanos
            .insert(3000, VanosModification::intake(-10.0));
        let sweep = sim.rpm_sweep(&request).unwrap();
        assert_eq!(sweep.baseline.rpm, vec![2000.0, 3000.0]);
        assert_eq!(sweep.modified.intake_vanos[0], sweep.baseline.intake_vanos[0] + 10.0);
        assert_eq!(sweep.modified.intake_vanos[1], sweep.baseline.intake_vanos[1] - 10.0);
        assert_eq!(sweep.modified.valve_overlap_details.len(), 2);
    }

    #[test]
    fn vanos_table_axes() {
        let sim = quick_simulator();
        let table = sim.vanos_table(50.0);
        assert_eq!(table.intake_table.len(), 16);
        assert_eq!(table.exhaust_table.len(), 16);
        assert!(table.all_rpm_points.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.overlap_analysis.len(), table.all_rpm_points.len());
        // 900 and 7800 appear on both axes
        assert!(table.all_rpm_points.len() < 32);
        assert_eq!(table.intake_table[8].rpm, 2900.0);
    }
}
