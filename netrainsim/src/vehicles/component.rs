use super::battery::Battery;
use super::tank::Tank;
use super::energy;
use super::types::FuelType;

/// Electricity drawn from or fed back to the overhead line of one link.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CatenaryTally {
    pub consumed: f64,
    pub regenerated: f64,
}

/// State shared by locomotives and cars: body, storage and energy counters.
#[derive(Clone, Debug)]
pub struct Component {
    pub name: String,
    pub length: f64,
    pub drag_coef: f64,
    pub frontal_area: f64,
    /// Tons.
    pub current_weight: f64,
    pub initial_weight: f64,
    pub empty_weight: f64,
    pub axles: u32,
    /// kW.
    pub auxiliary_power: f64,
    pub battery: Battery,
    pub tank: Tank,
    pub grade: f64,
    pub curvature: f64,
    /// Index of the link under the vehicle's centroid.
    pub host_link: Option<usize>,
    /// Energy of the current step, kWh.
    pub step_consumed: f64,
    pub step_regenerated: f64,
    pub total_consumed: f64,
    pub total_regenerated: f64,
    pub catenary_consumed: f64,
    pub fuel_consumed: f64,
    /// Grams.
    pub co2: f64,
}

impl Component {
    pub fn new(name: String, length: f64, drag_coef: f64, frontal_area: f64,
               current_weight: f64, empty_weight: f64, axles: u32) -> Component {
        Component {
            name,
            length,
            drag_coef,
            frontal_area,
            current_weight,
            initial_weight: current_weight,
            empty_weight,
            axles: axles.max(1),
            auxiliary_power: 0.0,
            battery: Battery::none(),
            tank: Tank::none(),
            grade: 0.0,
            curvature: 0.0,
            host_link: None,
            step_consumed: 0.0,
            step_regenerated: 0.0,
            total_consumed: 0.0,
            total_regenerated: 0.0,
            catenary_consumed: 0.0,
            fuel_consumed: 0.0,
            co2: 0.0,
        }
    }

    pub fn reset_step(&mut self) {
        self.step_consumed = 0.0;
        self.step_regenerated = 0.0;
    }

    /// Burns `ec` kWh worth of `fuel` from the tank. Weight drops with the
    /// burned fuel but never below the empty weight.
    pub fn consume_fuel(&mut self, ec: f64, fuel: FuelType) -> (bool, f64) {
        let liters = ec * energy::conversion_factor(fuel);
        if !self.tank.is_drainable(liters) {
            return (false, ec);
        }
        self.step_consumed += ec;
        self.fuel_consumed += liters;
        self.co2 += energy::emissions(fuel, liters);
        self.tank.consume(liters);
        let w = self.current_weight - liters * energy::density(fuel);
        if w > self.empty_weight {
            self.current_weight = w;
        }
        (true, 0.0)
    }

    /// Draws electricity from the catenary when the host link has one,
    /// otherwise from the battery.
    pub fn consume_electricity(&mut self, time_step: f64, ec: f64,
                               catenary: Option<&mut CatenaryTally>) -> (bool, f64) {
        match catenary {
            Some(line) => {
                line.consumed += ec;
                self.step_consumed += ec;
                self.catenary_consumed += ec;
                (true, 0.0)
            }
            None => {
                let (ok, extra) = self.battery.consume(time_step, ec);
                if ok {
                    self.step_consumed += ec - extra;
                }
                (ok, extra)
            }
        }
    }

    /// Stores braking energy into the battery, returns the part not stored.
    pub fn refill_battery(&mut self, time_step: f64, ec: f64) -> f64 {
        let stored = self.battery.recharge_by_regenerated(time_step, ec.abs());
        self.step_regenerated += stored;
        ec.abs() - stored
    }

    pub fn recharge_catenary(&mut self, ec: f64, catenary: Option<&mut CatenaryTally>) -> bool {
        match catenary {
            Some(line) => {
                line.regenerated += ec.abs();
                self.step_regenerated += ec.abs();
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.battery.reset();
        self.tank.reset();
        self.current_weight = self.initial_weight;
        self.reset_step();
        self.total_consumed = 0.0;
        self.total_regenerated = 0.0;
        self.catenary_consumed = 0.0;
        self.fuel_consumed = 0.0;
        self.co2 = 0.0;
        self.host_link = None;
    }
}

/// Physics shared by every rolling stock unit.
pub trait Vehicle {
    fn body(&self) -> &Component;
    fn body_mut(&mut self) -> &mut Component;
    /// Running resistance in N.
    fn resistance(&self, speed: f64) -> f64;
    /// Largest energy (kWh) the unit can deliver within one step.
    fn max_provided_energy(&self, time_step: f64, on_catenary: bool) -> f64;

    fn weight(&self) -> f64 {
        self.body().current_weight
    }

    fn length(&self) -> f64 {
        self.body().length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_burn_reduces_weight() {
        let mut c = Component::new("t".to_string(), 20.0, 0.0055, 10.0, 200.0, 180.0, 6);
        c.tank = Tank::new(1000.0, 1.0, 0.8);
        let (ok, rest) = c.consume_fuel(100.0, FuelType::Diesel);
        assert!(ok);
        assert_eq!(rest, 0.0);
        assert!((c.tank.current_capacity() - (1000.0 - 10.05)).abs() < 1e-9);
        assert!((c.current_weight - (200.0 - 10.05 * 0.00085)).abs() < 1e-9);
        assert!(c.co2 > 0.0);
    }

    #[test]
    fn catenary_takes_the_load() {
        let mut c = Component::new("e".to_string(), 20.0, 0.0055, 10.0, 200.0, 180.0, 6);
        let mut line = CatenaryTally::default();
        assert_eq!(c.consume_electricity(1.0, 12.0, Some(&mut line)), (true, 0.0));
        assert_eq!(line.consumed, 12.0);
        assert!(c.recharge_catenary(-3.0, Some(&mut line)));
        assert_eq!(line.regenerated, 3.0);
        assert!(!c.recharge_catenary(-3.0, None));
    }
}
