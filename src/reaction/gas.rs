#![allow(non_snake_case)]

/// Ideal gas with constant specific heats.
#[derive(Debug, Clone, PartialEq)]
pub struct Gas {
    name: String,
    cp: f64, // J/(kg.K)
    R: f64,  // J/(kg.K)
}

impl Gas {
    /// Dry air: `cp = 1005 J/(kg.K)`, `R = 287 J/(kg.K)`
    pub fn air() -> Gas {
        Gas {
            name: "air".to_string(),
            cp: 1005.0,
            R: 287.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cp(&self) -> f64 {
        self.cp
    }

    pub fn cv(&self) -> f64 {
        self.cp - self.R
    }

    pub fn R(&self) -> f64 {
        self.R
    }

    /// cp/cv
    pub fn k(&self) -> f64 {
        self.cp / self.cv()
    }

    /// Density [kg/m³] at `press` [Pa] and `temp` [K]
    pub fn rho(&self, press: f64, temp: f64) -> f64 {
        press / (self.R * temp)
    }
}
