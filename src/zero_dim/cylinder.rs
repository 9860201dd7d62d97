use crate::connector::valve::{fold_720, ValveOverlap, ValveTrain};
use crate::connector::vanos::VanosSetting;
use crate::core::history::StepRecord;
use crate::engine::engine::Fuel;
use crate::error::{ensure_finite, SimError, SimResult};
use crate::reaction::combustion::Combustion;
use crate::reaction::gas::Gas;
use crate::zero_dim::heat_transfer::HeatTransfer;
use crate::zero_dim::volumetric_efficiency::volumetric_efficiency;
use ansi_term::Style;
use std::f64::consts::PI;

/// Half-width of the window around intake closing where the charge is trapped [CA deg]
const TRAPPING_WINDOW: f64 = 1.0;

/// Crank-slider geometry of a cylinder without piston pin offset. All values in SI units.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderGeometry {
    bore: f64,              // [m]
    stroke: f64,            // [m]
    conrod: f64,            // [m]
    compression_ratio: f64, // [-]
    crank: f64,             // [m]
    transverse_area: f64,   // [m²]
    displacement: f64,      // [m³]
    clearance: f64,         // [m³]
}

impl CylinderGeometry {
    /// Creates a `CylinderGeometry` object. Inputs must be in SI units
    pub fn new(
        bore: f64,
        stroke: f64,
        conrod: f64,
        compression_ratio: f64,
    ) -> Result<CylinderGeometry, String> {
        if !(bore > 0.0) {
            return Err(format!("bore must be greater than zero: {}", bore));
        } else if !(stroke > 0.0) {
            return Err(format!("stroke must be greater than zero: {}", stroke));
        } else if !(compression_ratio > 1.0) {
            return Err(format!(
                "compression ratio must be greater than one: {}",
                compression_ratio
            ));
        }
        let crank = 0.5 * stroke;
        if !(conrod > crank) {
            return Err(format!(
                "connecting rod ({} m) must be longer than the crank radius ({} m)",
                conrod, crank
            ));
        }
        let transverse_area = 0.25 * PI * bore * bore;
        let displacement = transverse_area * stroke;
        Ok(CylinderGeometry {
            bore,
            stroke,
            conrod,
            compression_ratio,
            crank,
            transverse_area,
            displacement,
            clearance: displacement / (compression_ratio - 1.0),
        })
    }

    pub fn bore(&self) -> f64 {
        self.bore
    }
    pub fn stroke(&self) -> f64 {
        self.stroke
    }
    pub fn conrod(&self) -> f64 {
        self.conrod
    }
    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }
    pub fn crank_radius(&self) -> f64 {
        self.crank
    }
    pub fn piston_area(&self) -> f64 {
        self.transverse_area
    }
    pub fn swept_volume(&self) -> f64 {
        self.displacement
    }
    pub fn clearance_volume(&self) -> f64 {
        self.clearance
    }
    pub fn total_volume(&self) -> f64 {
        self.displacement + self.clearance
    }

    /// Piston distance from TDC [m] at `angle` [CA deg]
    fn piston_position(&self, angle: f64) -> f64 {
        let (sin, cos) = angle.to_radians().sin_cos();
        let r = self.crank;
        let l = self.conrod;
        (l + r) - (r * cos + (l * l - r * r * sin * sin).sqrt())
    }

    /// Instant volume [m³] at `angle` [CA deg], TDC at 0°
    pub fn volume(&self, angle: f64) -> f64 {
        self.clearance + self.transverse_area * self.piston_position(angle)
    }

    /// Mean piston speed [m/s] at `rpm`
    pub fn mean_piston_speed(&self, rpm: f64) -> f64 {
        2.0 * self.stroke * rpm / 60.0
    }
}

impl std::fmt::Display for CylinderGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}
        bore: {:.1} [mm] \t\t stroke: {:.1} [mm] \t\t conrod: {:.1} [mm]
        displacement: {:.1} [cm³] \t clearance: {:.1} [cm³] \t compression ratio: {:.1}",
            Style::new().underline().paint("     Geometry     "),
            self.bore * 1e3,
            self.stroke * 1e3,
            self.conrod * 1e3,
            self.displacement * 1e6,
            self.clearance * 1e6,
            self.compression_ratio,
        )
    }
}

/// Thermodynamic state of the cylinder charge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderState {
    pub pressure: f64,              // [Pa]
    pub temperature: f64,           // [K]
    pub mass: f64,                  // [kg]
    pub burned_fraction: f64,       // [-]
    pub trapped_air_mass: f64,      // [kg]
    pub volumetric_efficiency: f64, // [-]
}

/// Everything that changes during one run. A fresh `RunState` is created for
/// every run, so runs never observe each other.
#[derive(Debug, Clone)]
pub struct RunState {
    state: CylinderState,
    vanos: VanosSetting,
    overlap: ValveOverlap,
    fresh_charge: f64, // [kg]
    trapped_cycle: Option<i64>,
}

impl RunState {
    pub fn state(&self) -> &CylinderState {
        &self.state
    }

    pub fn vanos(&self) -> &VanosSetting {
        &self.vanos
    }

    pub fn overlap(&self) -> &ValveOverlap {
        &self.overlap
    }

    /// Folded intake-closing angle [CA deg]
    pub fn intake_closing(&self) -> f64 {
        self.overlap.intake_timing.closing
    }
}

/// Single-zone closed-cycle cylinder. Immutable during a run; the evolving
/// state lives in `RunState`.
#[derive(Clone)]
pub struct Cylinder {
    geometry: CylinderGeometry,
    gas: Gas,
    combustion: Box<dyn Combustion>,
    fuel: Fuel,
    heat_transfer: Option<HeatTransfer>,
    valves: ValveTrain,
    ambient_pressure: f64,    // [Pa]
    ambient_temperature: f64, // [K]
}

impl Cylinder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        geometry: CylinderGeometry,
        gas: Gas,
        combustion: Box<dyn Combustion>,
        fuel: Fuel,
        heat_transfer: Option<HeatTransfer>,
        valves: ValveTrain,
        ambient_pressure: f64,
        ambient_temperature: f64,
    ) -> Cylinder {
        Cylinder {
            geometry,
            gas,
            combustion,
            fuel,
            heat_transfer,
            valves,
            ambient_pressure,
            ambient_temperature,
        }
    }

    pub fn geometry(&self) -> &CylinderGeometry {
        &self.geometry
    }
    pub fn gas(&self) -> &Gas {
        &self.gas
    }
    pub fn combustion(&self) -> &dyn Combustion {
        self.combustion.as_ref()
    }
    pub fn fuel(&self) -> &Fuel {
        &self.fuel
    }
    pub fn heat_transfer(&self) -> Option<&HeatTransfer> {
        self.heat_transfer.as_ref()
    }
    pub fn valves(&self) -> &ValveTrain {
        &self.valves
    }

    /// Ambient-density mass filling the swept volume at `efficiency` [kg]
    pub fn fresh_charge(&self, efficiency: f64) -> f64 {
        self.gas.rho(self.ambient_pressure, self.ambient_temperature)
            * self.geometry.swept_volume()
            * efficiency
    }

    /// Creates the state of a new run at TDC (0°): the clearance volume filled
    /// with gas at ambient pressure and temperature. No air is trapped until the
    /// first intake closing.
    pub fn start_run(&self, rpm: f64, vanos: VanosSetting) -> SimResult<RunState> {
        let overlap = self.valves.overlap_for(vanos.intake, vanos.exhaust);
        let efficiency = volumetric_efficiency(rpm, vanos.intake, vanos.exhaust, overlap.duration);
        let fresh_charge = self.fresh_charge(efficiency);

        let pressure = self.ambient_pressure;
        let temperature = self.ambient_temperature;
        let mass = ensure_finite(
            "initial mass",
            self.gas.rho(pressure, temperature) * self.geometry.volume(0.0),
        )?;

        Ok(RunState {
            state: CylinderState {
                pressure,
                temperature,
                mass,
                burned_fraction: 0.0,
                trapped_air_mass: 0.0,
                volumetric_efficiency: efficiency,
            },
            vanos,
            overlap,
            fresh_charge,
            trapped_cycle: None,
        })
    }

    /// Latches the fresh charge as trapped air mass once per cycle, when `angle`
    /// is within one degree of intake closing.
    fn latch_trapped_air(&self, run: &mut RunState, angle: f64) {
        let ivc = run.intake_closing();
        let distance = (fold_720(angle) - ivc).abs();
        if distance.min(720.0 - distance) > TRAPPING_WINDOW {
            return;
        }
        let cycle = ((angle - ivc) / 720.0).round() as i64;
        if run.trapped_cycle == Some(cycle) {
            return;
        }
        run.trapped_cycle = Some(cycle);
        run.state.trapped_air_mass = run.fresh_charge;
    }

    /// Records the state at `angle` [CA deg] and integrates it forward by `d_angle` [CA deg].
    /// `dt` is the step duration [s] at `rpm`.
    pub fn advance(
        &self,
        run: &mut RunState,
        angle: f64,
        d_angle: f64,
        dt: f64,
        rpm: f64,
    ) -> SimResult<StepRecord> {
        let vol_1 = self.geometry.volume(angle);
        let vol_2 = self.geometry.volume(angle + d_angle);
        self.latch_trapped_air(run, angle);

        let state = run.state;
        let record = StepRecord {
            crank_angle: angle,
            pressure: state.pressure,
            temperature: state.temperature,
            volume: vol_1,
            mass: state.mass,
            burned_fraction: state.burned_fraction,
            trapped_air_mass: state.trapped_air_mass,
            volumetric_efficiency: state.volumetric_efficiency,
            intake_vanos: run.vanos.intake,
            exhaust_vanos: run.vanos.exhaust,
            valve_overlap: run.overlap.duration,
        };

        let work = state.pressure * (vol_2 - vol_1); // [J]

        let burned_fraction = self
            .combustion
            .burned_mass_frac(angle + d_angle, state.burned_fraction);
        let heat_combustion = (burned_fraction - state.burned_fraction).max(0.0)
            * self.fuel.mass_per_cycle()
            * self.fuel.lhv(); // [J]

        let heat_loss = match &self.heat_transfer {
            Some(ht) => ht.heat_loss(
                state.pressure,
                state.temperature,
                vol_1,
                self.geometry.bore(),
                self.geometry.mean_piston_speed(rpm),
                dt,
            ),
            None => 0.0,
        }; // [J]

        let heat_capacity = state.mass * self.gas.cv(); // [J/K]
        if !(heat_capacity.abs() > 1e-12) {
            return Err(SimError::Degenerate {
                what: "cylinder heat capacity (m·Cv) is zero",
            });
        }
        let d_temp = (heat_combustion - work - heat_loss) / heat_capacity;
        let temperature = ensure_finite("cylinder temperature", state.temperature + d_temp)?;
        let pressure = ensure_finite(
            "cylinder pressure",
            state.mass * self.gas.R() * temperature / vol_2,
        )?;
        if temperature <= 0.0 {
            return Err(SimError::NonFinite {
                what: "cylinder temperature",
                value: temperature,
            });
        }

        run.state.temperature = temperature;
        run.state.pressure = pressure;
        run.state.burned_fraction = burned_fraction;
        Ok(record)
    }
}

impl std::fmt::Display for Cylinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let heat_transfer = match &self.heat_transfer {
            Some(ht) => format!("Woschni, coolant at {:.1} [K]", ht.coolant_temp()),
            None => "adiabatic".to_string(),
        };
        write!(
            f,
            "{}:
        gas: `{}`
        combustion: {}
        heat transfer: {}
        fuel: {:.1} [mg/cycle]
        {}",
            Style::new().bold().paint("cylinder"),
            self.gas.name(),
            self.combustion.model_name(),
            heat_transfer,
            self.fuel.mass_per_cycle() * 1e6,
            self.geometry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::valve::ValveProfile;
    use crate::reaction::combustion::{NoCombustion, WiebeCombustion, WiebeFunction};

    fn s54_geometry() -> CylinderGeometry {
        CylinderGeometry::new(0.087, 0.091, 0.135, 11.5).unwrap()
    }

    fn s54_cylinder(
        combustion: Box<dyn Combustion>,
        heat_transfer: Option<HeatTransfer>,
    ) -> Cylinder {
        let valves = ValveTrain::new(
            ValveProfile::new(11.8, 260.0).unwrap(),
            ValveProfile::new(11.8, 260.0).unwrap(),
        );
        Cylinder::new(
            s54_geometry(),
            Gas::air(),
            combustion,
            Fuel::new(4.0e-5, 44.0e6).unwrap(),
            heat_transfer,
            valves,
            101325.0,
            298.0,
        )
    }

    #[test]
    fn geometry_volumes() {
        let geo = s54_geometry();
        let swept = 0.25 * PI * 0.087 * 0.087 * 0.091;
        assert!((geo.swept_volume() - swept).abs() < 1e-15);
        assert!((geo.clearance_volume() - swept / 10.5).abs() < 1e-15);
        assert!((geo.volume(0.0) - geo.clearance_volume()).abs() < 1e-15);
        assert!((geo.volume(180.0) - geo.total_volume()).abs() < 1e-12);
        assert!((geo.volume(90.0) - geo.volume(450.0)).abs() < 1e-15);
        assert!((geo.volume(90.0) - geo.volume(-90.0)).abs() < 1e-15);
    }

    #[test]
    fn rejects_invalid_geometry() {
        assert!(CylinderGeometry::new(0.087, 0.091, 0.040, 11.5).is_err());
        assert!(CylinderGeometry::new(0.087, 0.091, 0.135, 1.0).is_err());
        assert!(CylinderGeometry::new(-0.087, 0.091, 0.135, 11.5).is_err());
        assert!(CylinderGeometry::new(f64::NAN, 0.091, 0.135, 11.5).is_err());
    }

    #[test]
    fn mean_piston_speed() {
        assert!((s54_geometry().mean_piston_speed(3000.0) - 9.1).abs() < 1e-12);
    }

    fn s54_vanos() -> VanosSetting {
        VanosSetting {
            intake: 110.0,
            exhaust: 80.0,
        }
    }

    #[test]
    fn run_starts_at_ambient_state() {
        let cyl = s54_cylinder(Box::new(NoCombustion::new()), None);
        let run = cyl.start_run(3000.0, s54_vanos()).unwrap();
        let state = run.state();
        assert_eq!(run.intake_closing(), 240.0);
        assert_eq!(state.pressure, 101325.0);
        assert_eq!(state.temperature, 298.0);
        assert_eq!(state.trapped_air_mass, 0.0);
        assert_eq!(state.burned_fraction, 0.0);
        let mass = 101325.0 / (287.0 * 298.0) * cyl.geometry().clearance_volume();
        assert!((state.mass - mass).abs() < 1e-12 * mass);
        assert!(state.volumetric_efficiency >= 0.60 && state.volumetric_efficiency <= 0.98);
    }

    #[test]
    fn intake_closing_only_latches_trapped_air() {
        let cyl = s54_cylinder(Box::new(NoCombustion::new()), None);
        let mut run = cyl.start_run(3000.0, s54_vanos()).unwrap();
        let dt = 0.5 / (3000.0 * 6.0);
        let mut angle = 0.0;
        while angle < 239.0 {
            let record = cyl.advance(&mut run, angle, 0.5, dt, 3000.0).unwrap();
            assert_eq!(record.trapped_air_mass, 0.0);
            angle += 0.5;
        }
        let before = *run.state();
        let record = cyl.advance(&mut run, 239.0, 0.5, dt, 3000.0).unwrap();
        let charge = cyl.fresh_charge(before.volumetric_efficiency);
        assert_eq!(record.trapped_air_mass, charge);
        assert_eq!(record.mass, before.mass);
        assert_eq!(record.temperature, before.temperature);
        assert_eq!(record.pressure, before.pressure);
        let next = cyl.advance(&mut run, 239.5, 0.5, dt, 3000.0).unwrap();
        assert_eq!(next.trapped_air_mass, charge);
    }

    #[test]
    fn no_negative_heat_release_across_cycle_reset() {
        let wiebe = WiebeCombustion::new(-10.0, &WiebeFunction::new(6.9, 2.0, 60.0)).unwrap();
        let cyl = s54_cylinder(Box::new(wiebe), None);
        let mut run = cyl.start_run(3000.0, s54_vanos()).unwrap();
        let dt = 0.5 / (3000.0 * 6.0);
        let records: Vec<StepRecord> = (0..2880)
            .map(|step| cyl.advance(&mut run, step as f64 * 0.5, 0.5, dt, 3000.0).unwrap())
            .collect();
        let cv = cyl.gas().cv();
        let mut resets = 0;
        for pair in records[1440..].windows(2) {
            let (r1, r2) = (&pair[0], &pair[1]);
            if r2.burned_fraction < r1.burned_fraction {
                resets += 1;
            }
            // adiabatic walls: the first law leaves only the combustion heat
            let heat = r1.mass * cv * (r2.temperature - r1.temperature)
                + r1.pressure * (r2.volume - r1.volume);
            assert!(heat > -1e-9, "negative heat release {} J at {}", heat, r1.crank_angle);
        }
        assert_eq!(resets, 1);
    }

    #[test]
    fn combustion_raises_pressure() {
        let wiebe = WiebeCombustion::new(-10.0, &WiebeFunction::new(6.9, 2.0, 60.0)).unwrap();
        let firing = s54_cylinder(Box::new(wiebe), Some(HeatTransfer::new(2.28, 363.0).unwrap()));
        let motored = s54_cylinder(Box::new(NoCombustion::new()), None);
        let vanos = s54_vanos();
        let dt = 0.5 / (3000.0 * 6.0);
        let mut peak = [0.0f64; 2];
        for (i, cyl) in [&firing, &motored].iter().enumerate() {
            let mut run = cyl.start_run(3000.0, vanos).unwrap();
            for step in 0..1440 {
                let record = cyl.advance(&mut run, step as f64 * 0.5, 0.5, dt, 3000.0).unwrap();
                assert!(record.pressure.is_finite() && record.pressure > 0.0);
                peak[i] = peak[i].max(record.pressure);
            }
        }
        assert!(peak[0] > 2.0 * peak[1]);
    }

    #[test]
    fn empty_cylinder_is_degenerate() {
        let cyl = s54_cylinder(Box::new(NoCombustion::new()), None);
        let mut run = cyl.start_run(3000.0, s54_vanos()).unwrap();
        run.state.mass = 0.0;
        let err = cyl.advance(&mut run, 0.0, 0.5, 1e-5, 3000.0).unwrap_err();
        assert!(matches!(err, SimError::Degenerate { .. }));
    }
}
