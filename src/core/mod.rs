//! Simulation driver, its builder and the recorded history
pub mod history;
pub mod system;
pub mod system_builder;
pub mod traits;
