//! Reads the engine configuration and bundles it into a validated **Engine**
pub mod engine;
pub mod json_reader;
