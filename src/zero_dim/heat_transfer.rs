use std::f64::consts::PI;

/// Woschni-type wall heat transfer
#[derive(Debug, Clone, PartialEq)]
pub struct HeatTransfer {
    woschni_c1: f64,
    coolant_temp: f64, // [K]
}

impl HeatTransfer {
    pub fn new(woschni_c1: f64, coolant_temp: f64) -> Result<HeatTransfer, String> {
        if woschni_c1 <= 0.0 {
            return Err(format!("woschni_c1 must be greater than zero: {}", woschni_c1));
        } else if coolant_temp <= 0.0 {
            return Err(format!(
                "coolant temperature must be greater than zero: {} [K]",
                coolant_temp
            ));
        }
        Ok(HeatTransfer {
            woschni_c1,
            coolant_temp,
        })
    }

    pub fn coolant_temp(&self) -> f64 {
        self.coolant_temp
    }

    /// Heat transfer coefficient [W/(m².K)]. `press` in Pa, `temp` in K, `bore` in m
    /// and `mean_piston_speed` in m/s.
    pub fn coefficient(&self, press: f64, temp: f64, bore: f64, mean_piston_speed: f64) -> f64 {
        let gas_velocity = self.woschni_c1 * mean_piston_speed;
        130.0
            * (press * 1e-5).powf(0.8)
            * temp.powf(-0.53)
            * gas_velocity.powf(0.8)
            * bore.powf(-0.2)
    }

    /// Heat lost to the walls during `dt` [J]. Positive when the gas is hotter than the coolant.
    /// `vol` is the instant volume [m³] used to estimate the exposed liner.
    pub fn heat_loss(
        &self,
        press: f64,
        temp: f64,
        vol: f64,
        bore: f64,
        mean_piston_speed: f64,
        dt: f64,
    ) -> f64 {
        let heat_trans_coeff = self.coefficient(press, temp, bore, mean_piston_speed);
        heat_trans_coeff * wall_area(bore, vol) * (temp - self.coolant_temp) * dt
    }
}

/// Head + piston crown + liner swept up to the current gas height [m²]
pub fn wall_area(bore: f64, vol: f64) -> f64 {
    let transverse_area = 0.25 * PI * bore * bore;
    let liner = PI * bore * (vol / transverse_area);
    2.0 * transverse_area + liner
}
