use super::VehicleError;

/// Battery storage of a locomotive or a battery tender. Charges are in kWh.
#[derive(Clone, Debug)]
pub struct Battery {
    max_charge: f64,
    initial_charge: f64,
    current_charge: f64,
    state_of_charge: f64,
    depth_of_discharge: f64,
    c_rate: f64,
    recharge_upper_soc: f64,
    recharge_lower_soc: f64,
    enable_recharge: bool,
    pub cum_consumed: f64,
    pub cum_regenerated: f64,
    pub cum_net_consumed: f64,
}

impl Battery {
    pub fn new(max_charge: f64,
               initial_soc: f64,
               depth_of_discharge: f64,
               c_rate: f64,
               recharge_upper_soc: f64,
               recharge_lower_soc: f64)
               -> Result<Battery, VehicleError> {
        if !(depth_of_discharge > 0.0 && depth_of_discharge <= 1.0) {
            return Err(VehicleError::InvalidDepthOfDischarge(depth_of_discharge));
        }
        let initial_charge = max_charge * initial_soc;
        let mut b = Battery {
            max_charge,
            initial_charge,
            current_charge: initial_charge,
            state_of_charge: if max_charge > 0.0 { initial_soc } else { 0.0 },
            depth_of_discharge,
            c_rate,
            recharge_upper_soc: 0.0,
            recharge_lower_soc: 0.0,
            enable_recharge: false,
            cum_consumed: 0.0,
            cum_regenerated: 0.0,
            cum_net_consumed: 0.0,
        };
        b.set_recharge_band(recharge_upper_soc, recharge_lower_soc);
        Ok(b)
    }

    /// A battery that never holds any charge.
    pub fn none() -> Battery {
        Battery {
            max_charge: 0.0,
            initial_charge: 0.0,
            current_charge: 0.0,
            state_of_charge: 0.0,
            depth_of_discharge: 1.0,
            c_rate: 0.0,
            recharge_upper_soc: 1.0,
            recharge_lower_soc: 0.0,
            enable_recharge: false,
            cum_consumed: 0.0,
            cum_regenerated: 0.0,
            cum_net_consumed: 0.0,
        }
    }

    /// Recharge thresholds are kept inside the usable window of the battery.
    pub fn set_recharge_band(&mut self, upper: f64, lower: f64) {
        let (min, max) = (1.0 - self.depth_of_discharge, self.depth_of_discharge);
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let upper = upper.max(min).min(max);
        let lower = lower.max(min).min(max).min(upper);
        self.recharge_upper_soc = upper;
        self.recharge_lower_soc = lower;
    }

    pub fn max_charge(&self) -> f64 { self.max_charge }
    pub fn initial_charge(&self) -> f64 { self.initial_charge }
    pub fn current_charge(&self) -> f64 { self.current_charge }
    pub fn state_of_charge(&self) -> f64 { self.state_of_charge }

    pub fn max_discharge(&self, time_step: f64) -> f64 {
        self.max_charge * self.c_rate * time_step / 3600.0
    }

    pub fn max_recharge(&self, time_step: f64) -> f64 {
        self.max_charge * self.c_rate * 0.5 * time_step / 3600.0
    }

    fn update_soc(&mut self) {
        self.state_of_charge = if self.max_charge > 0.0 {
            self.current_charge / self.max_charge
        } else {
            0.0
        };
    }

    fn update_recharge_flag(&mut self) {
        if self.state_of_charge >= self.recharge_upper_soc {
            self.enable_recharge = false;
        } else if self.state_of_charge <= self.recharge_lower_soc {
            self.enable_recharge = true;
        }
    }

    pub fn has_charge(&self) -> bool {
        self.max_charge > 0.0 && self.state_of_charge > 1.0 - self.depth_of_discharge
    }

    pub fn is_drainable(&mut self, requested: f64) -> bool {
        self.update_recharge_flag();
        self.max_charge > 0.0 && requested <= self.current_charge &&
            self.state_of_charge > 1.0 - self.depth_of_discharge
    }

    pub fn is_rechargeable(&mut self) -> bool {
        self.update_recharge_flag();
        self.max_charge > 0.0 && self.state_of_charge <= self.recharge_upper_soc
    }

    /// True while the charge is below the recharge band and has not yet
    /// been restored to its upper bound.
    pub fn recharge_required(&mut self) -> bool {
        self.update_recharge_flag();
        self.enable_recharge
    }

    /// Draws `requested` kWh limited by the discharge rate. Returns whether
    /// anything was drawn and the part that could not be delivered.
    pub fn consume(&mut self, time_step: f64, requested: f64) -> (bool, f64) {
        if !self.is_drainable(requested) {
            return (false, requested);
        }
        let max = self.max_discharge(time_step);
        let (used, extra) = if requested > max { (max, requested - max) } else { (requested, 0.0) };
        self.cum_consumed += used;
        self.cum_net_consumed += used;
        self.current_charge -= used;
        self.update_soc();
        (true, extra)
    }

    /// Stores braking energy, returns the kWh actually stored.
    pub fn recharge_by_regenerated(&mut self, time_step: f64, energy: f64) -> f64 {
        if !self.is_rechargeable() {
            return 0.0;
        }
        let stored = energy.min(self.max_recharge(time_step));
        self.cum_regenerated += stored;
        self.cum_net_consumed -= stored;
        self.current_charge += stored;
        self.update_soc();
        stored
    }

    /// Stores energy produced by the engine of a hybrid.
    pub fn recharge_for_hybrids(&mut self, time_step: f64, energy: f64) -> f64 {
        if !self.is_rechargeable() {
            return 0.0;
        }
        let stored = energy.min(self.max_recharge(time_step));
        self.cum_consumed -= stored;
        self.cum_net_consumed -= stored;
        self.current_charge += stored;
        self.update_soc();
        stored
    }

    pub fn reset(&mut self) {
        self.current_charge = self.initial_charge;
        self.update_soc();
        self.enable_recharge = false;
        self.cum_consumed = 0.0;
        self.cum_regenerated = 0.0;
        self.cum_net_consumed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery() -> Battery {
        Battery::new(3600.0, 0.5, 0.9, 2.0, 0.9, 0.5).unwrap()
    }

    #[test]
    fn discharge_is_rate_limited() {
        let mut b = battery();
        // 3600 kWh at 2C for one second gives 2 kWh
        let (ok, extra) = b.consume(1.0, 5.0);
        assert!(ok);
        assert!((extra - 3.0).abs() < 1e-9);
        assert!((b.current_charge() - 1798.0).abs() < 1e-9);
        assert!((b.cum_consumed - 2.0).abs() < 1e-9);
    }

    #[test]
    fn recharge_is_half_rate() {
        let mut b = battery();
        let stored = b.recharge_by_regenerated(1.0, 5.0);
        assert!((stored - 1.0).abs() < 1e-9);
        assert!((b.cum_net_consumed + 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_depth_of_discharge() {
        assert!(Battery::new(10.0, 0.5, 0.0, 2.0, 0.9, 0.5).is_err());
        assert!(Battery::new(10.0, 0.5, 1.2, 2.0, 0.9, 0.5).is_err());
    }

    #[test]
    fn recharge_band_hysteresis() {
        let mut b = Battery::new(100.0, 0.5, 0.9, 3600.0, 0.61, 0.55).unwrap();
        assert!(b.recharge_required());
        b.recharge_for_hybrids(1.0, 20.0);
        assert!(!b.recharge_required());
        assert!(!b.is_rechargeable());
    }

    #[test]
    fn empty_battery_never_drains() {
        let mut b = Battery::none();
        assert_eq!(b.consume(1.0, 1.0), (false, 1.0));
        assert!(!b.has_charge());
    }
}
