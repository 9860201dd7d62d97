//! # vanos_engine_simulator
//!
//! The `vanos_engine_simulator` crate simulates the closed thermodynamic cycle of one
//! cylinder of an engine with variable valve timing (BMW VANOS). The intake and exhaust
//! camshaft angles come from speed × load control maps, shift the valve events and the
//! valve overlap, and through them the trapped air mass and volumetric efficiency.
//!
//! ```no_run
//! use vanos_engine_simulator::{Engine, Simulator, VanosModification};
//!
//! fn main() -> Result<(), vanos_engine_simulator::SimError> {
//!     let simulator = Simulator::new(Engine::bmw_s54()?);
//!     let stock = simulator.run_simulation(3000.0, 50.0, None)?;
//!     let advance = VanosModification::intake(10.0);
//!     let advanced = simulator.run_simulation(3000.0, 50.0, Some(&advance))?;
//!     println!(
//!         "VE: {:.3} -> {:.3}",
//!         stock.final_cycle_statistics()?.avg_volumetric_efficiency,
//!         advanced.final_cycle_statistics()?.avg_volumetric_efficiency
//!     );
//!     Ok(())
//! }
//! ```

pub mod connector;
pub mod core;
pub mod engine;
pub mod error;
pub mod numerics;
pub mod reaction;
pub mod zero_dim;

// Re-exporting
pub use crate::connector::valve::{ValveChannel, ValveOverlap, ValveTiming};
pub use crate::connector::vanos::{
    interpolate_control_angle, VanosMap, VanosModification, VanosSetting,
};
pub use crate::core::history::{CycleStatistics, SimulationHistory, StepRecord};
pub use crate::core::system::{
    get_performance_summary, ComparisonResult, PerformanceSummary, RpmSweep, RpmSweepRequest,
    Simulator, VanosTable, VanosVariant,
};
pub use crate::core::system_builder::SimulatorBuilder;
pub use crate::engine::engine::Engine;
pub use crate::error::{SimError, SimResult};
pub use crate::reaction::gas::Gas;
