use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonEngine {
    pub name: String,
    pub cylinder: JsonCylinder,
    pub combustion: Option<JsonCombustion>,
    pub fuel: JsonFuel,
    pub heat_transfer: Option<JsonHeatTransfer>,
    pub valves: JsonValves,
    pub vanos: JsonVanos,
    pub simulation: JsonSimulation,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonCylinder {
    pub bore: f64,              // [mm]
    pub stroke: f64,            // [mm]
    pub conrod: f64,            // [mm]
    pub compression_ratio: f64, // [-]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonCombustion {
    pub start_angle: f64, // [CA deg] relative to firing TDC
    pub wiebe: JsonWiebe,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonWiebe {
    pub a: f64,
    pub m: f64,
    pub comb_duration: f64, // [CA deg]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonFuel {
    pub mass_per_cycle: f64, // [kg]
    pub lhv: f64,            // [J/kg]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonHeatTransfer {
    pub woschni_c1: f64,
    pub coolant_temperature: f64, // [K]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonValves {
    pub intake: JsonValve,
    pub exhaust: JsonValve,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonValve {
    pub max_lift: f64, // [mm]
    pub duration: f64, // [CA deg]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonVanos {
    pub intake: JsonVanosMap,
    pub exhaust: JsonVanosMap,
}

/// Exactly one of `advance_map` and `retard_map` must be present. Rows follow
/// `rpm_points`, columns follow `load_points`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonVanosMap {
    pub max_advance: f64, // [CA deg]
    pub max_retard: f64,  // [CA deg]
    pub rpm_points: Vec<f64>,
    pub load_points: Vec<f64>, // throttle [%]
    pub advance_map: Option<Vec<Vec<f64>>>,
    pub retard_map: Option<Vec<Vec<f64>>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JsonSimulation {
    pub num_cycles: usize,
    pub crank_angle_step: f64,    // [CA deg]
    pub ambient_pressure: f64,    // [Pa]
    pub ambient_temperature: f64, // [K]
}
