use super::system::Simulator;
use crate::engine::engine::{Engine, SimulationSettings};
use crate::error::{SimError, SimResult};

pub struct SimulatorBuilder {
    engine: Option<Engine>,
    combustion: bool,
    heat_transfer: bool,
    num_cycles: Option<usize>,
    crank_angle_step: Option<f64>,
}

impl SimulatorBuilder {
    /// Creates a `SimulatorBuilder`. The simulator is configured by the object methods
    /// and created with `build_simulator()`. Combustion and heat transfer are enabled
    /// by default and used whenever the engine configures them.
    pub fn new() -> SimulatorBuilder {
        SimulatorBuilder {
            engine: None,
            combustion: true,
            heat_transfer: true,
            num_cycles: None,
            crank_angle_step: None,
        }
    }

    /// Builds a `Simulator`. `SimulatorBuilder` object is consumed in the process.
    pub fn build_simulator(self) -> SimResult<Simulator> {
        let mut engine = match self.engine {
            Some(e) => e,
            None => return Err(SimError::config("no engine was added to the builder")),
        };

        if self.num_cycles.is_some() || self.crank_angle_step.is_some() {
            let current = engine.settings();
            let settings = SimulationSettings::new(
                self.num_cycles.unwrap_or_else(|| current.num_cycles()),
                self.crank_angle_step.unwrap_or_else(|| current.crank_angle_step()),
                current.ambient_pressure(),
                current.ambient_temperature(),
            )
            .map_err(SimError::config)?;
            engine.set_settings(settings);
        }

        let cylinder = engine.build_cylinder(self.combustion, self.heat_transfer);
        Ok(Simulator::from_parts(engine, cylinder))
    }

    pub fn add_engine<'a>(&'a mut self, engine: Engine) -> &'a mut Self {
        self.engine = Some(engine);
        self
    }

    /// Enables or disables the Wiebe combustion model
    pub fn combustion<'a>(&'a mut self, enabled: bool) -> &'a mut Self {
        self.combustion = enabled;
        self
    }

    /// Enables or disables the wall heat transfer
    pub fn heat_transfer<'a>(&'a mut self, enabled: bool) -> &'a mut Self {
        self.heat_transfer = enabled;
        self
    }

    pub fn num_cycles<'a>(&'a mut self, num_cycles: usize) -> &'a mut Self {
        self.num_cycles = Some(num_cycles);
        self
    }

    /// Integration step [CA deg]
    pub fn crank_angle_step<'a>(&'a mut self, step: f64) -> &'a mut Self {
        self.crank_angle_step = Some(step);
        self
    }
}

impl Default for SimulatorBuilder {
    fn default() -> Self {
        SimulatorBuilder::new()
    }
}
