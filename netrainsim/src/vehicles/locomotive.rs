use super::component::{Component, CatenaryTally, Vehicle};
use super::battery::Battery;
use super::tank::Tank;
use super::energy::{self, *};
use super::types::PowerType;
use super::VehicleError;

#[derive(Clone, Debug)]
pub struct Locomotive {
    pub body: Component,
    /// kW.
    pub max_power: f64,
    pub transmission_efficiency: f64,
    pub power_type: PowerType,
    pub max_speed: f64,
    notches: u32,
    max_notch: u32,
    pub current_notch: u32,
    throttle_levels: Vec<f64>,
    power_reduction: f64,
    /// Set when storage only partly covered the last step; the next step
    /// runs one notch lower.
    pub energy_limited: bool,
    pub is_on: bool,
}

impl Locomotive {
    pub fn new(name: String,
               max_power: f64,
               transmission_efficiency: f64,
               length: f64,
               drag_coef: f64,
               frontal_area: f64,
               gross_weight: f64,
               axles: u32,
               power_type: PowerType)
               -> Result<Locomotive, VehicleError> {
        let empty = DEFAULT_LOCOMOTIVE_EMPTY_WEIGHT.min(gross_weight);
        let mut body = Component::new(name, length, drag_coef, frontal_area,
                                      gross_weight, empty, axles);

        if power_type.is_battery_only() {
            body.battery = Battery::new(ELECTRIC_BATTERY_CAPACITY,
                                        LOCOMOTIVE_BATTERY_INITIAL,
                                        LOCOMOTIVE_BATTERY_DOD,
                                        LOCOMOTIVE_BATTERY_CRATE,
                                        DEFAULT_RECHARGE_UPPER_SOC,
                                        DEFAULT_RECHARGE_LOWER_SOC)?;
        } else if power_type.is_tank_only() {
            body.tank = Tank::new(LOCOMOTIVE_TANK_CAPACITY, LOCOMOTIVE_TANK_INITIAL,
                                  LOCOMOTIVE_TANK_DOD);
        } else {
            body.battery = Battery::new(HYBRID_BATTERY_CAPACITY,
                                        LOCOMOTIVE_BATTERY_INITIAL,
                                        LOCOMOTIVE_BATTERY_DOD,
                                        LOCOMOTIVE_BATTERY_CRATE,
                                        HYBRID_RECHARGE_UPPER_SOC,
                                        HYBRID_RECHARGE_LOWER_SOC)?;
            body.tank = Tank::new(LOCOMOTIVE_TANK_CAPACITY, LOCOMOTIVE_TANK_INITIAL,
                                  LOCOMOTIVE_TANK_DOD);
        }

        let mut loco = Locomotive {
            body,
            max_power,
            transmission_efficiency,
            power_type,
            max_speed: DEFAULT_LOCOMOTIVE_MAX_SPEED,
            notches: 0,
            max_notch: 0,
            current_notch: 0,
            throttle_levels: Vec::new(),
            power_reduction: 1.0,
            energy_limited: false,
            is_on: true,
        };
        loco.set_notches(DEFAULT_NOTCHES, 0);
        loco.sync_fuel_weight();
        Ok(loco)
    }

    /// Fuel on board counts towards the weight of the locomotive.
    fn sync_fuel_weight(&mut self) {
        if self.power_type.is_battery_only() {
            return;
        }
        let fuel = self.body.tank.initial_capacity() * energy::density(self.power_type.fuel());
        if self.body.current_weight - self.body.empty_weight < fuel {
            self.body.current_weight = self.body.empty_weight + fuel;
        }
        self.body.initial_weight = self.body.current_weight;
    }

    /// Replaces the tank, e.g. to model a locomotive that starts nearly empty.
    pub fn set_tank(&mut self, tank: Tank) {
        self.body.tank = tank;
    }

    /// `max_notch` of zero or above `notches` means every notch is reachable.
    pub fn set_notches(&mut self, notches: u32, max_notch: u32) {
        let notches = notches.max(1);
        self.notches = notches;
        self.max_notch = if max_notch == 0 || max_notch > notches { notches } else { max_notch };
        self.throttle_levels = (1..=notches)
            .map(|n| (n as f64 / notches as f64).powi(2))
            .collect();
    }

    pub fn notches(&self) -> u32 {
        self.notches
    }

    /// Throttle fractions `(n/N)^2` for n in 1..=N.
    pub fn throttle_levels(&self) -> &[f64] {
        &self.throttle_levels
    }

    fn hyperbolic_throttle(&self, speed: f64) -> f64 {
        let dv = speed / self.max_speed;
        let lambda = 1.0 / (1.0 + (-7.82605 * (dv - 0.42606)).exp());
        lambda.max(0.0).min(1.0)
    }

    /// Notch (1-based) whose throttle level lies closest to the ideal curve.
    fn ideal_notch(&self, speed: f64) -> u32 {
        let lambda = self.hyperbolic_throttle(speed);
        let mut best = 0;
        for (i, l) in self.throttle_levels.iter().enumerate() {
            if (lambda - l).abs() < (lambda - self.throttle_levels[best]).abs() {
                best = i;
            }
        }
        (best as u32 + 1).min(self.max_notch)
    }

    pub fn throttle_level(&self, speed: f64, optimize: bool, optimum: f64) -> f64 {
        let level = self.throttle_levels[self.ideal_notch(speed) as usize - 1];
        if optimize {
            let optimum = if optimum < 0.0 { self.throttle_levels[self.throttle_levels.len() - 1] } else { optimum };
            optimum.min(level)
        } else {
            level
        }
    }

    pub fn update_notch(&mut self, speed: f64) {
        self.current_notch = if speed == 0.0 || !self.is_on { 0 } else { self.ideal_notch(speed) };
    }

    /// Temporarily limits the power, never below two notches under the current one.
    pub fn reduce_power(&mut self, factor: f64) {
        let lower = (self.current_notch as i64 - 2).max(0) as usize;
        let floor = self.throttle_levels[lower.min(self.throttle_levels.len() - 1)];
        self.power_reduction = factor.max(floor);
    }

    pub fn reset_power_restriction(&mut self) {
        if self.energy_limited {
            let lower = (self.current_notch as i64 - 2).max(0) as usize;
            self.power_reduction = self.throttle_levels[lower.min(self.throttle_levels.len() - 1)];
            self.energy_limited = false;
        } else {
            self.power_reduction = 1.0;
        }
    }

    pub fn power_reduction(&self) -> f64 {
        self.power_reduction
    }

    pub fn tractive_force(&self, friction: f64, speed: f64, optimize: bool, optimum: f64) -> f64 {
        if !self.is_on {
            return 0.0;
        }
        let adhesion = friction * self.body.current_weight * 1000.0 * GRAVITY;
        if speed == 0.0 {
            return adhesion;
        }
        let throttle = self.throttle_level(speed, optimize, optimum);
        let f = self.power_reduction * 1000.0 * self.transmission_efficiency * throttle *
                (self.max_power / speed);
        f.min(adhesion)
    }

    /// Power (W) this unit carries when it pulls `mass_share` kg against
    /// `resistance_share` N.
    pub fn shared_virtual_power(&self, speed: f64, acceleration: f64,
                                mass_share: f64, resistance_share: f64) -> f64 {
        if !self.is_on {
            return 0.0;
        }
        (mass_share * acceleration + resistance_share) * speed
    }

    pub fn regenerative_efficiency(&self, power: f64, acceleration: f64, speed: f64) -> f64 {
        if !self.power_type.is_rechargeable() {
            return 0.0;
        }
        let a = if acceleration != 0.0 {
            acceleration
        } else if speed > 0.0 {
            power / (speed * self.body.current_weight)
        } else {
            0.0
        };
        if a == 0.0 {
            0.0
        } else {
            1.0 / (REGENERATION_GAMMA / a.abs()).exp()
        }
    }

    /// Energy at the wheels and auxiliary energy for one step, in kWh.
    pub fn energy_at_wheels(&self, power: f64, acceleration: f64, speed: f64,
                            time_step: f64) -> (f64, f64) {
        if !self.is_on {
            return (0.0, 0.0);
        }
        let aux = power_to_energy_kwh(self.body.auxiliary_power * 1000.0, time_step);
        if power == 0.0 {
            (0.0, aux)
        } else if power > 0.0 {
            (power_to_energy_kwh(power, time_step), aux)
        } else {
            let eff = self.regenerative_efficiency(power, acceleration, speed);
            (power_to_energy_kwh(power, time_step) * eff, aux)
        }
    }

    pub fn max_gross_power(&self) -> f64 {
        self.max_power * self.transmission_efficiency * 1000.0
    }

    pub fn power_portion(&self, power: f64) -> f64 {
        if power <= 0.0 {
            0.0
        } else {
            (power / self.max_gross_power()).min(1.0)
        }
    }

    /// Covers `ec` kWh at the wheels from the locomotive's own storage.
    /// Returns whether any energy was supplied and the shortfall, expressed
    /// in tank-side kWh for tenders to cover (or negative when braking
    /// energy could not be stored).
    pub fn consume_fuel(&mut self, time_step: f64, speed: f64, ec: f64, power: f64,
                        catenary: Option<&mut CatenaryTally>) -> (bool, f64) {
        if ec > 0.0 {
            let portion = self.power_portion(power);
            let ec_dc = ec / wheel_to_dc_bus_efficiency(speed);
            if self.power_type.is_tank_only() {
                let ec_engine = ec_dc / dc_bus_to_tank_efficiency(self.power_type, portion);
                self.body.consume_fuel(ec_engine, self.power_type.fuel())
            } else if self.power_type.is_battery_only() {
                self.body.consume_electricity(time_step, ec_dc / BATTERY_EFFICIENCY, catenary)
            } else {
                self.consume_hybrid(time_step, ec_dc, portion)
            }
        } else if ec < 0.0 {
            let ec_battery = ec * wheel_to_dc_bus_efficiency(speed) * BATTERY_EFFICIENCY;
            let rest = self.body.refill_battery(time_step, ec_battery);
            if rest <= 1e-12 {
                (true, 0.0)
            } else {
                (false, -rest)
            }
        } else {
            (true, 0.0)
        }
    }

    fn consume_hybrid(&mut self, time_step: f64, ec_dc: f64, portion: f64) -> (bool, f64) {
        let (low, high) = hybrid_efficient_band(self.power_type);
        let recharge = self.body.battery.recharge_required();
        if (portion >= low && portion <= high) || recharge {
            return self.run_engine(time_step, ec_dc, portion, recharge);
        }
        let ec_battery = ec_dc / BATTERY_EFFICIENCY;
        if self.body.battery.is_drainable(ec_battery) {
            let (_, extra) = self.body.battery.consume(time_step, ec_battery);
            self.body.step_consumed += ec_battery - extra;
            if extra <= 0.0 {
                return (true, 0.0);
            }
            let ec_engine = extra * BATTERY_EFFICIENCY / generator_efficiency(self.power_type, portion);
            let (ok, rest) = self.body.consume_fuel(ec_engine, self.power_type.fuel());
            return if ok { (true, 0.0) } else { (true, rest) };
        }
        self.run_engine(time_step, ec_dc, portion, false)
    }

    /// Runs the engine for the traction demand and, when the battery asks
    /// for it, spends the spare engine power on recharging it.
    fn run_engine(&mut self, time_step: f64, ec_dc: f64, portion: f64,
                  recharge: bool) -> (bool, f64) {
        let fuel = self.power_type.fuel();
        let factor = conversion_factor(fuel);
        let generator = generator_efficiency(self.power_type, portion);
        let ec_engine = ec_dc / generator;
        let (_, high) = hybrid_efficient_band(self.power_type);

        let recharge_energy = if recharge {
            let spare = (high - portion).max(0.0);
            power_to_energy_kwh(self.max_gross_power() * spare, time_step)
                .min(self.body.battery.max_recharge(time_step))
        } else {
            0.0
        };
        let total = ec_engine + recharge_energy / generator;

        if recharge_energy > 0.0 && self.body.tank.is_drainable(total * factor) {
            let result = self.body.consume_fuel(total, fuel);
            self.body.battery.recharge_for_hybrids(time_step, recharge_energy * BATTERY_EFFICIENCY);
            result
        } else if self.body.tank.is_drainable(ec_engine * factor) {
            self.body.consume_fuel(ec_engine, fuel)
        } else if !recharge {
            let ec_battery = ec_dc / BATTERY_EFFICIENCY;
            let (ok, extra) = self.body.battery.consume(time_step, ec_battery);
            if !ok {
                return (false, ec_engine);
            }
            self.body.step_consumed += ec_battery - extra;
            (true, extra * BATTERY_EFFICIENCY / generator)
        } else {
            (false, ec_engine)
        }
    }

    /// Stores braking energy on the overhead line, if there is one.
    pub fn recharge_catenary(&mut self, ec: f64, catenary: Option<&mut CatenaryTally>) -> bool {
        self.body.recharge_catenary(ec, catenary)
    }

    pub fn reset(&mut self) {
        self.body.reset();
        self.current_notch = 0;
        self.power_reduction = 1.0;
        self.energy_limited = false;
        self.is_on = true;
    }
}

impl Vehicle for Locomotive {
    fn body(&self) -> &Component {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Component {
        &mut self.body
    }

    fn resistance(&self, speed: f64) -> f64 {
        let b = &self.body;
        let axle_load = b.current_weight / b.axles as f64;
        (4.44822 * 1.10231 / 1000.0) * b.current_weight *
            (1.5 + 16329.34 / axle_load + 0.0671 * speed +
             48862.37 * b.frontal_area * b.drag_coef * speed.powi(2) / b.current_weight +
             20.0 * (b.grade + 0.04 * b.curvature.abs()))
    }

    fn max_provided_energy(&self, time_step: f64, on_catenary: bool) -> f64 {
        if !self.is_on {
            return 0.0;
        }
        let b = &self.body;
        if self.power_type.is_battery_only() {
            if on_catenary {
                std::f64::INFINITY
            } else if b.battery.has_charge() {
                b.battery.max_discharge(time_step)
            } else {
                0.0
            }
        } else if self.power_type.is_tank_only() {
            if b.tank.has_fuel() {
                power_to_energy_kwh(self.max_gross_power(), time_step)
            } else {
                0.0
            }
        } else if !b.tank.has_fuel() && !b.battery.has_charge() {
            0.0
        } else {
            power_to_energy_kwh(self.max_gross_power(), time_step) +
                b.battery.max_discharge(time_step) * BATTERY_EFFICIENCY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diesel() -> Locomotive {
        Locomotive::new("loco".to_string(), 3000.0, 0.85, 22.0, 0.0055, 15.0,
                        200.0, 6, PowerType::Diesel).unwrap()
    }

    #[test]
    fn notch_follows_speed() {
        let mut l = diesel();
        l.update_notch(0.0);
        assert_eq!(l.current_notch, 0);
        l.update_notch(l.max_speed);
        assert_eq!(l.current_notch, 8);
        l.set_notches(8, 5);
        l.update_notch(l.max_speed);
        assert_eq!(l.current_notch, 5);
        assert_eq!(l.throttle_level(l.max_speed, false, -1.0), 25.0 / 64.0);
    }

    #[test]
    fn optimum_caps_throttle() {
        let l = diesel();
        assert_eq!(l.throttle_level(l.max_speed, true, 0.25), 0.25);
        assert_eq!(l.throttle_level(l.max_speed, true, -1.0), 1.0);
    }

    #[test]
    fn adhesion_limits_tractive_force() {
        let l = diesel();
        let adhesion = 0.5 * l.body.current_weight * 1000.0 * GRAVITY;
        assert_eq!(l.tractive_force(0.5, 0.0, false, -1.0), adhesion);
        assert!(l.tractive_force(0.5, 20.0, false, -1.0) < adhesion);
    }

    #[test]
    fn power_reduction_floor() {
        let mut l = diesel();
        l.current_notch = 8;
        l.reduce_power(0.01);
        assert_eq!(l.power_reduction(), 49.0 / 64.0);
        l.reset_power_restriction();
        assert_eq!(l.power_reduction(), 1.0);
    }

    #[test]
    fn diesel_cannot_regenerate() {
        let l = diesel();
        let (ec, _) = l.energy_at_wheels(-1.0e6, -0.5, 10.0, 1.0);
        assert_eq!(ec, 0.0);
    }

    #[test]
    fn out_of_fuel_after_one_step() {
        let mut l = diesel();
        let (speed, power, dt) = (10.0, 1.0e6, 1.0);
        let (ec, _) = l.energy_at_wheels(power, 0.1, speed, dt);
        let ec_engine = ec / wheel_to_dc_bus_efficiency(speed) /
            dc_bus_to_tank_efficiency(PowerType::Diesel, l.power_portion(power));
        l.set_tank(Tank::with_fuel(ec_engine * conversion_factor(l.power_type.fuel())));

        let (ok, rest) = l.consume_fuel(dt, speed, ec, power, None);
        assert!(ok);
        assert_eq!(rest, 0.0);
        assert!(l.body.tank.current_capacity().abs() < 1e-9);

        let (ok, rest) = l.consume_fuel(dt, speed, ec, power, None);
        assert!(!ok);
        assert_eq!(rest, ec_engine);
        assert_eq!(l.max_provided_energy(dt, false), 0.0);
    }

    #[test]
    fn electric_regenerates_into_battery() {
        let mut l = Locomotive::new("e".to_string(), 4000.0, 0.9, 22.0, 0.0055, 15.0,
                                    180.0, 6, PowerType::Electric).unwrap();
        let before = l.body.battery.current_charge();
        let (ec, _) = l.energy_at_wheels(-2.0e6, -0.4, 15.0, 1.0);
        assert!(ec < 0.0);
        let (ok, rest) = l.consume_fuel(1.0, 15.0, ec, -2.0e6, None);
        assert!(ok);
        assert_eq!(rest, 0.0);
        assert!(l.body.battery.current_charge() > before);
    }
}
