use super::component::{Component, Vehicle};
use super::battery::Battery;
use super::tank::Tank;
use super::energy::*;
use super::types::{CarType, FuelType};
use super::VehicleError;

#[derive(Clone, Debug)]
pub struct Car {
    pub body: Component,
    pub car_type: CarType,
}

impl Car {
    pub fn new(name: String,
               length: f64,
               drag_coef: f64,
               frontal_area: f64,
               gross_weight: f64,
               tare_weight: f64,
               axles: u32,
               car_type: CarType)
               -> Result<Car, VehicleError> {
        let mut body = Component::new(name, length, drag_coef, frontal_area,
                                      gross_weight, tare_weight, axles);
        match car_type.fuel() {
            None => {}
            Some(FuelType::Electricity) => {
                body.battery = Battery::new(TENDER_BATTERY_CAPACITY, TENDER_INITIAL,
                                            TENDER_BATTERY_DOD, TENDER_BATTERY_CRATE,
                                            DEFAULT_RECHARGE_UPPER_SOC,
                                            DEFAULT_RECHARGE_LOWER_SOC)?;
            }
            Some(fuel) => {
                let capacity = if fuel == FuelType::Hydrogen {
                    HYDROGEN_TENDER_TANK_CAPACITY
                } else {
                    TENDER_TANK_CAPACITY
                };
                body.tank = Tank::new(capacity, TENDER_INITIAL, TENDER_TANK_DOD);
                body.current_weight = body.empty_weight + body.tank.initial_capacity() * density(fuel);
                body.initial_weight = body.current_weight;
            }
        }
        Ok(Car { body, car_type })
    }

    pub fn cargo_net_weight(&self) -> f64 {
        if self.car_type == CarType::Cargo {
            self.body.current_weight - self.body.empty_weight
        } else {
            0.0
        }
    }

    /// Serves `ec` kWh (tank side) from the tender's storage.
    pub fn consume_fuel(&mut self, time_step: f64, ec: f64,
                        catenary: Option<&mut super::CatenaryTally>) -> (bool, f64) {
        if ec <= 0.0 {
            return (false, ec);
        }
        match self.car_type.fuel() {
            None => (false, ec),
            Some(FuelType::Electricity) => self.body.consume_electricity(time_step, ec, catenary),
            Some(fuel) => self.body.consume_fuel(ec, fuel),
        }
    }

    pub fn has_energy(&self) -> bool {
        match self.car_type.fuel() {
            None => false,
            Some(FuelType::Electricity) => self.body.battery.has_charge(),
            Some(_) => self.body.tank.has_fuel(),
        }
    }

    pub fn reset(&mut self) {
        self.body.reset();
    }
}

impl Vehicle for Car {
    fn body(&self) -> &Component {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Component {
        &mut self.body
    }

    /// Davis equation in imperial units, converted to N.
    fn resistance(&self, speed: f64) -> f64 {
        let b = &self.body;
        let mph = speed * 2.23694;
        let short_tons = b.current_weight * 1.10231;
        let mut r = 1.5 + 18.0 / (short_tons / b.axles as f64) + 0.03 * mph +
            b.frontal_area * 10.7639 * b.drag_coef * mph.powi(2) / short_tons;
        r = r * short_tons + 20.0 * short_tons * b.grade;
        r += b.curvature.abs() * 20.0 * 0.04 * short_tons;
        r * 4.44822
    }

    fn max_provided_energy(&self, time_step: f64, on_catenary: bool) -> f64 {
        match self.car_type.fuel() {
            None => 0.0,
            Some(FuelType::Electricity) => {
                if on_catenary {
                    std::f64::INFINITY
                } else if self.body.battery.has_charge() {
                    self.body.battery.max_discharge(time_step)
                } else {
                    0.0
                }
            }
            Some(_) => if self.body.tank.has_fuel() { std::f64::INFINITY } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tender_weight_includes_fuel() {
        let c = Car::new("tender".to_string(), 20.0, 0.0055, 10.0, 30.0, 30.0, 4,
                         CarType::DieselTender).unwrap();
        assert!((c.body.current_weight - (30.0 + TENDER_TANK_CAPACITY * 0.9 * 0.00085)).abs() < 1e-9);
        assert_eq!(c.cargo_net_weight(), 0.0);
        assert!(c.has_energy());
    }

    #[test]
    fn cargo_resistance_grows_with_speed_and_grade() {
        let mut c = Car::new("c".to_string(), 20.0, 0.0055, 10.0, 100.0, 25.0, 4,
                             CarType::Cargo).unwrap();
        assert_eq!(c.cargo_net_weight(), 75.0);
        let flat = c.resistance(10.0);
        assert!(c.resistance(20.0) > flat);
        c.body.grade = 0.01;
        assert!(c.resistance(10.0) > flat);
        assert_eq!(c.max_provided_energy(1.0, true), 0.0);
    }
}
