use crate::connector::valve::{ValveChannel, ValveProfile, ValveTrain};
use crate::connector::vanos::{ControlGrid, VanosMap, VanosSystem};
use crate::engine::json_reader::{JsonEngine, JsonVanosMap};
use crate::error::{SimError, SimResult};
use crate::reaction::combustion::{Combustion, NoCombustion, WiebeCombustion, WiebeFunction};
use crate::reaction::gas::Gas;
use crate::zero_dim::cylinder::{Cylinder, CylinderGeometry};
use crate::zero_dim::heat_transfer::HeatTransfer;
use ansi_term::Style;
use ndarray::Array2;
use std::path::Path;

const BMW_S54: &str = include_str!("../../data/bmw_s54.json");

/// Fuel injected every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Fuel {
    mass_per_cycle: f64, // [kg]
    lhv: f64,            // [J/kg]
}

impl Fuel {
    pub fn new(mass_per_cycle: f64, lhv: f64) -> Result<Fuel, String> {
        if !(mass_per_cycle >= 0.0) || !mass_per_cycle.is_finite() {
            return Err(format!("fuel mass per cycle cannot be negative: {}", mass_per_cycle));
        } else if !(lhv > 0.0) || !lhv.is_finite() {
            return Err(format!("lower heating value must be greater than zero: {}", lhv));
        }
        Ok(Fuel { mass_per_cycle, lhv })
    }

    pub fn mass_per_cycle(&self) -> f64 {
        self.mass_per_cycle
    }

    pub fn lhv(&self) -> f64 {
        self.lhv
    }
}

/// Integration settings and the ambient state the cylinder breathes from
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    num_cycles: usize,
    crank_angle_step: f64,    // [CA deg]
    ambient_pressure: f64,    // [Pa]
    ambient_temperature: f64, // [K]
}

impl SimulationSettings {
    pub fn new(
        num_cycles: usize,
        crank_angle_step: f64,
        ambient_pressure: f64,
        ambient_temperature: f64,
    ) -> Result<SimulationSettings, String> {
        if num_cycles == 0 {
            return Err("`num_cycles` must be at least one".to_string());
        }
        if !(crank_angle_step > 0.0) || !crank_angle_step.is_finite() {
            return Err(format!(
                "`crank_angle_step` must be greater than zero: {}",
                crank_angle_step
            ));
        }
        let steps = 720.0 / crank_angle_step;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(format!(
                "`crank_angle_step` must divide the 720° cycle: {}",
                crank_angle_step
            ));
        }
        if !(ambient_pressure > 0.0) || !(ambient_temperature > 0.0) {
            return Err(format!(
                "ambient state must be positive: {} [Pa], {} [K]",
                ambient_pressure, ambient_temperature
            ));
        }
        Ok(SimulationSettings {
            num_cycles,
            crank_angle_step,
            ambient_pressure,
            ambient_temperature,
        })
    }

    pub fn num_cycles(&self) -> usize {
        self.num_cycles
    }
    pub fn crank_angle_step(&self) -> f64 {
        self.crank_angle_step
    }
    pub fn ambient_pressure(&self) -> f64 {
        self.ambient_pressure
    }
    pub fn ambient_temperature(&self) -> f64 {
        self.ambient_temperature
    }

    pub fn steps_per_cycle(&self) -> usize {
        (720.0 / self.crank_angle_step).round() as usize
    }

    pub fn total_steps(&self) -> usize {
        self.num_cycles * self.steps_per_cycle()
    }
}

/// Validated engine description: everything a run needs besides speed, load and VANOS deltas
#[derive(Debug, Clone)]
pub struct Engine {
    name: String,
    geometry: CylinderGeometry,
    gas: Gas,
    combustion: Option<WiebeCombustion>,
    fuel: Fuel,
    heat_transfer: Option<HeatTransfer>,
    valves: ValveTrain,
    vanos: VanosSystem,
    settings: SimulationSettings,
}

impl Engine {
    /// Reads an engine from a `.json` file. Lengths in the file are in `mm`.
    pub fn from_file<P: AsRef<Path>>(file_name: P) -> SimResult<Engine> {
        let file_name = file_name.as_ref();
        let json_file = std::fs::read_to_string(file_name).map_err(|source| SimError::Io {
            path: file_name.display().to_string(),
            source,
        })?;
        Engine::from_json_str(&json_file)
    }

    pub fn from_json_str(json: &str) -> SimResult<Engine> {
        let data: JsonEngine = serde_json::from_str(json)?;
        Engine::from_json(&data)
    }

    /// The BMW S54 (E46 M3) engine shipped with the crate
    pub fn bmw_s54() -> SimResult<Engine> {
        Engine::from_json_str(BMW_S54)
    }

    pub fn from_json(json_engine: &JsonEngine) -> SimResult<Engine> {
        let cyl = &json_engine.cylinder;
        let geometry = CylinderGeometry::new(
            cyl.bore * 1e-3,
            cyl.stroke * 1e-3,
            cyl.conrod * 1e-3,
            cyl.compression_ratio,
        )
        .map_err(SimError::config)?;

        let combustion = match &json_engine.combustion {
            Some(comb) => {
                let w = &comb.wiebe;
                let wiebe = WiebeFunction::new(w.a, w.m, w.comb_duration);
                Some(WiebeCombustion::new(comb.start_angle, &wiebe).map_err(SimError::config)?)
            }
            None => None,
        };

        let fuel = Fuel::new(json_engine.fuel.mass_per_cycle, json_engine.fuel.lhv)
            .map_err(SimError::config)?;

        let heat_transfer = match &json_engine.heat_transfer {
            Some(ht) => Some(
                HeatTransfer::new(ht.woschni_c1, ht.coolant_temperature).map_err(SimError::config)?,
            ),
            None => None,
        };

        let valves = &json_engine.valves;
        let valves = ValveTrain::new(
            ValveProfile::new(valves.intake.max_lift, valves.intake.duration)
                .map_err(|e| SimError::config(format!("intake valve: {}", e)))?,
            ValveProfile::new(valves.exhaust.max_lift, valves.exhaust.duration)
                .map_err(|e| SimError::config(format!("exhaust valve: {}", e)))?,
        );

        let vanos = VanosSystem::new(
            Engine::vanos_map("intake", &json_engine.vanos.intake)?,
            Engine::vanos_map("exhaust", &json_engine.vanos.exhaust)?,
        );

        let sim = &json_engine.simulation;
        let settings = SimulationSettings::new(
            sim.num_cycles,
            sim.crank_angle_step,
            sim.ambient_pressure,
            sim.ambient_temperature,
        )
        .map_err(SimError::config)?;

        Ok(Engine {
            name: json_engine.name.clone(),
            geometry,
            gas: Gas::air(),
            combustion,
            fuel,
            heat_transfer,
            valves,
            vanos,
            settings,
        })
    }

    fn vanos_map(channel: &str, json_map: &JsonVanosMap) -> SimResult<VanosMap> {
        let (rows, polarity) = match (&json_map.advance_map, &json_map.retard_map) {
            (Some(rows), None) => (rows, "advance"),
            (None, Some(rows)) => (rows, "retard"),
            _ => {
                return Err(SimError::config(format!(
                    "{} VANOS needs exactly one of `advance_map` and `retard_map`",
                    channel
                )))
            }
        };
        let num_rpm = json_map.rpm_points.len();
        let num_load = json_map.load_points.len();
        if rows.len() != num_rpm || rows.iter().any(|row| row.len() != num_load) {
            return Err(SimError::config(format!(
                "{} VANOS `{}_map` must have {} rows of {} angles",
                channel, polarity, num_rpm, num_load
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
        let grid = Array2::from_shape_vec((num_rpm, num_load), flat)
            .map_err(|e| SimError::config(format!("{} VANOS map: {}", channel, e)))?;
        let grid = ControlGrid::new(
            json_map.rpm_points.clone(),
            json_map.load_points.clone(),
            grid,
            json_map.max_advance,
            json_map.max_retard,
        )
        .map_err(|e| SimError::config(format!("{} {}", channel, e)))?;
        Ok(match polarity {
            "advance" => VanosMap::Advance(grid),
            _ => VanosMap::Retard(grid),
        })
    }

    /// Creates the cylinder model. Disabled models are replaced by no combustion
    /// and adiabatic walls.
    pub fn build_cylinder(&self, use_combustion: bool, use_heat_transfer: bool) -> Cylinder {
        let combustion: Box<dyn Combustion> = match (&self.combustion, use_combustion) {
            (Some(comb), true) => Box::new(comb.clone()),
            _ => Box::new(NoCombustion::new()),
        };
        let heat_transfer = if use_heat_transfer {
            self.heat_transfer.clone()
        } else {
            None
        };
        Cylinder::new(
            self.geometry.clone(),
            self.gas.clone(),
            combustion,
            self.fuel.clone(),
            heat_transfer,
            self.valves.clone(),
            self.settings.ambient_pressure(),
            self.settings.ambient_temperature(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn geometry(&self) -> &CylinderGeometry {
        &self.geometry
    }
    pub fn combustion(&self) -> Option<&WiebeCombustion> {
        self.combustion.as_ref()
    }
    pub fn heat_transfer(&self) -> Option<&HeatTransfer> {
        self.heat_transfer.as_ref()
    }
    pub fn fuel(&self) -> &Fuel {
        &self.fuel
    }
    pub fn valves(&self) -> &ValveTrain {
        &self.valves
    }
    pub fn vanos(&self) -> &VanosSystem {
        &self.vanos
    }
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SimulationSettings) {
        self.settings = settings;
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let combustion = match &self.combustion {
            Some(comb) => format!(
                "Wiebe, start at {:.1} [CA deg], duration {:.1} [CA deg]",
                comb.ini_combustion(),
                comb.wiebe().comb_duration
            ),
            None => "none".to_string(),
        };
        write!(
            f,
            "{}:
        {}
        combustion: {}
        fuel: {:.1} [mg/cycle], LHV {:.1} [MJ/kg]
        intake VANOS: {} map \t exhaust VANOS: {} map
        cycles: {} \t step: {} [CA deg]",
            Style::new().bold().paint(&self.name),
            self.geometry,
            combustion,
            self.fuel.mass_per_cycle * 1e6,
            self.fuel.lhv * 1e-6,
            self.vanos.map(ValveChannel::Intake).polarity(),
            self.vanos.map(ValveChannel::Exhaust).polarity(),
            self.settings.num_cycles,
            self.settings.crank_angle_step,
        )
    }
}
