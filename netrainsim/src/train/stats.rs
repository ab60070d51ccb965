use std::collections::BTreeMap;

use super::Train;
use crate::network::Network;
use crate::vehicles::FuelType;

/// Per-train statistics, updated once per step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainStats {
    pub trip_time: f64,
    pub delay: f64,
    pub cum_delay: f64,
    pub max_delay: f64,
    pub cum_max_delay: f64,
    pub stopped: f64,
    pub cum_stopped: f64,
    pub average_speed: f64,
    pub average_acceleration: f64,
    /// Net energy of the last step, kWh.
    pub energy: f64,
    pub cum_energy: f64,
    pub total_consumed: f64,
    pub total_regenerated: f64,
    /// Grams.
    pub co2: f64,
    pub regional_energy: BTreeMap<String, f64>,
    pub cum_used_power: f64,
}

/// Running mean after `n` samples.
fn running_average(previous: f64, sample: f64, n: f64) -> f64 {
    if n <= 1.0 {
        sample
    } else {
        previous * ((n - 1.0) / n) + sample / n
    }
}

impl Train {
    /// Power, energy and delay accounting after the train has moved.
    /// `free_flow_speeds` holds the speed limit under every vehicle.
    pub fn calc_stats(&mut self, network: &mut Network, free_flow_speeds: &[f64],
                      min_free_flow: f64, time_step: f64, region: &str) {
        let (speed, acceleration, resistance) =
            (self.current_speed, self.current_acceleration, self.resistance);
        self.used_power = self.tractive_power(speed, acceleration, resistance);
        self.used_power_total = self.used_power.iter().sum();
        self.stats.cum_used_power += self.used_power_total;

        if !self.consume_energy(network, time_step) {
            self.out_of_energy = true;
        }
        self.calculate_energy_consumption(region);

        let vehicles = self.vehicle_count() as f64;
        let previous_speed = self.previous_speed;
        let stats = &mut self.stats;
        stats.trip_time += time_step;
        stats.delay = if min_free_flow > 0.0 { (1.0 - speed / min_free_flow) * time_step } else { 0.0 };
        stats.cum_delay += stats.delay;
        stats.max_delay = free_flow_speeds.iter()
            .map(|&uf| (1.0 - speed / uf) * time_step)
            .sum::<f64>() / vehicles;
        stats.cum_max_delay += stats.max_delay;
        stats.stopped = if previous_speed > speed {
            free_flow_speeds.iter()
                .map(|&uf| (previous_speed - speed) / uf)
                .sum::<f64>() / vehicles
        } else {
            0.0
        };
        stats.cum_stopped += stats.stopped;

        let n = stats.trip_time / time_step;
        stats.average_speed = running_average(stats.average_speed, speed, n);
        stats.average_acceleration = running_average(stats.average_acceleration, acceleration, n);
    }

    /// Fuel burned per fuel type, in liters (kWh for electricity drawn
    /// from batteries and catenary).
    pub fn fuel_consumed(&self) -> BTreeMap<FuelType, f64> {
        let mut fuels = BTreeMap::new();
        for l in &self.locomotives {
            if l.power_type.is_battery_only() {
                *fuels.entry(FuelType::Electricity).or_insert(0.0) += l.body.total_consumed;
            } else {
                *fuels.entry(l.power_type.fuel()).or_insert(0.0) += l.body.fuel_consumed;
            }
        }
        for c in &self.cars {
            match c.car_type.fuel() {
                Some(FuelType::Electricity) => {
                    *fuels.entry(FuelType::Electricity).or_insert(0.0) += c.body.total_consumed
                }
                Some(fuel) => *fuels.entry(fuel).or_insert(0.0) += c.body.fuel_consumed,
                None => {}
            }
        }
        fuels
    }

    pub fn average_locomotive_battery_soc(&self) -> f64 {
        average(self.locomotives.iter()
            .filter(|l| l.body.battery.max_charge() > 0.0)
            .map(|l| l.body.battery.state_of_charge()))
    }

    pub fn average_locomotive_tank_level(&self) -> f64 {
        average(self.locomotives.iter()
            .filter(|l| l.body.tank.max_capacity() > 0.0)
            .map(|l| l.body.tank.state_of_capacity()))
    }

    pub fn average_tender_tank_level(&self) -> f64 {
        average(self.cars.iter()
            .filter(|c| c.car_type.is_tender() && c.body.tank.max_capacity() > 0.0)
            .map(|c| c.body.tank.state_of_capacity()))
    }

    pub fn average_tender_battery_level(&self) -> f64 {
        average(self.cars.iter()
            .filter(|c| c.car_type.is_tender() && c.body.battery.max_charge() > 0.0)
            .map(|c| c.body.battery.state_of_charge()))
    }

    /// Battery energy drawn and stored over the run, kWh.
    pub fn battery_energy(&self) -> (f64, f64) {
        self.locomotives.iter().map(|l| &l.body)
            .chain(self.cars.iter().map(|c| &c.body))
            .fold((0.0, 0.0), |(c, r), b| (c + b.battery.cum_consumed, r + b.battery.cum_regenerated))
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{diesel_locomotive, line_network, train_on};

    #[test]
    fn running_average_of_constant_is_constant() {
        let mut avg = 0.0;
        for n in 1..10 {
            avg = running_average(avg, 4.0, n as f64);
        }
        assert!((avg - 4.0).abs() < 1e-12);
        assert_eq!(average(vec![1.0, 2.0, 3.0].into_iter()), 2.0);
        assert_eq!(average(Vec::new().into_iter()), 0.0);
    }

    #[test]
    fn slowing_down_counts_as_stopping() {
        let (mut ctx, mut network) = line_network(&[1000.0], 20.0);
        let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
        train.previous_speed = 10.0;
        train.current_speed = 5.0;
        train.current_acceleration = -5.0;
        train.calc_stats(&mut network, &[20.0], 20.0, 1.0, "r");

        assert_eq!(train.stats.trip_time, 1.0);
        assert!((train.stats.stopped - 0.25).abs() < 1e-12);
        assert!((train.stats.delay - 0.75).abs() < 1e-12);
        assert_eq!(train.stats.average_speed, 5.0);
    }
}
