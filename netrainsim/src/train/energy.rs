//! Energy bookkeeping of a train: tractive power per locomotive, the
//! locomotive to tender fallback and the recharge overflow chain.

use std::collections::BTreeSet;

use super::Train;
use crate::network::Network;
use crate::output::history::SimulationEvent;
use crate::vehicles::{CarType, CatenaryTally, PowerType, Vehicle};

fn catenary_of(network: &mut Network, link: Option<usize>) -> Option<&mut CatenaryTally> {
    match link {
        Some(l) => network.links[l].catenary.as_mut(),
        None => None,
    }
}

impl Train {
    /// Power (W) each active locomotive must deliver for the given motion.
    /// Empty when the train stands still.
    pub fn tractive_power(&mut self, speed: f64, acceleration: f64, resistance: f64) -> Vec<f64> {
        if speed == 0.0 && acceleration == 0.0 {
            return Vec::new();
        }
        let mass = self.mass();
        let active = self.active_locomotives().to_vec();
        if active.is_empty() {
            return Vec::new();
        }
        let n = active.len() as f64;
        active.iter()
            .map(|&i| self.locomotives[i].shared_virtual_power(speed, acceleration, mass / n, resistance / n))
            .collect()
    }

    /// Energy at the wheels (kWh) for the given per-locomotive powers.
    pub fn total_energy_consumption(&self, time_step: f64, speed: f64, acceleration: f64,
                                    powers: &[f64]) -> f64 {
        self.active_locos.iter().zip(powers)
            .map(|(&i, &p)| self.locomotives[i].energy_at_wheels(p, acceleration, speed, time_step).0)
            .sum()
    }

    /// Upper bound of the energy (kWh) the train's storage can release in
    /// one step.
    pub fn max_provided_energy(&self, network: &Network, time_step: f64) -> f64 {
        let mut total = 0.0;
        let mut types = BTreeSet::new();
        for &i in &self.active_locos {
            let loco = &self.locomotives[i];
            let on_catenary = loco.body.host_link
                .map(|l| network.links[l].has_catenary())
                .unwrap_or(false);
            total += loco.max_provided_energy(time_step, on_catenary);
            types.insert(loco.power_type.tender());
        }
        for tender in types {
            if let Some(cars) = self.active_tenders.get(&tender) {
                total += cars.iter()
                    .map(|&c| self.cars[c].max_provided_energy(time_step, false))
                    .sum::<f64>();
            }
        }
        total
    }

    pub fn reduce_power(&mut self, factor: f64) {
        for &i in &self.active_locos {
            self.locomotives[i].reduce_power(factor);
        }
    }

    pub fn reset_power_restriction(&mut self) {
        for &i in &self.active_locos {
            self.locomotives[i].reset_power_restriction();
        }
    }

    /// Draws this step's energy from locomotives, then tenders. Returns
    /// false once every locomotive is switched off.
    pub fn consume_energy(&mut self, network: &mut Network, time_step: f64) -> bool {
        for l in &mut self.locomotives {
            l.body.reset_step();
        }
        for c in &mut self.cars {
            c.body.reset_step();
        }
        if self.out_of_energy {
            return false;
        }
        if self.used_power.is_empty() {
            return true;
        }

        let speed = self.current_speed;
        let average_speed = (self.current_speed + self.previous_speed) / 2.0;
        let acceleration = self.current_acceleration;
        let powers = self.used_power.clone();
        for (k, i) in self.active_locos.clone().into_iter().enumerate() {
            if !self.locomotives[i].is_on {
                continue;
            }
            let power = powers.get(k).cloned().unwrap_or(0.0);
            let loco = &mut self.locomotives[i];
            let ec = loco.energy_at_wheels(power, acceleration, average_speed, time_step).0;
            let catenary = catenary_of(network, loco.body.host_link);
            let (supplied, rest) = loco.consume_fuel(time_step, speed, ec, power, catenary);
            let power_type = loco.power_type;

            if rest > 0.0 {
                let (from_tenders, missing) = self.consume_tenders(time_step, rest, power_type);
                if !from_tenders && !supplied {
                    self.switch_off(i);
                } else if missing > 0.0 {
                    self.locomotives[i].energy_limited = true;
                }
            } else if rest < 0.0 {
                self.recharge_cars_batteries(network, time_step, -rest, i);
            }
        }
        self.locomotives.iter().any(|l| l.is_on)
    }

    fn switch_off(&mut self, loco: usize) {
        let l = &mut self.locomotives[loco];
        l.is_on = false;
        l.update_notch(0.0);
        warn!("Train {}: locomotive {} ran out of energy", self.name, l.body.name);
        self.events.push(SimulationEvent::LocomotiveOff {
            train: self.name.clone(),
            locomotive: l.body.name.clone(),
        });
    }

    /// Splits `ec` evenly over the active tenders feeding `power_type`.
    /// Empty tenders drop out of the active list. Returns whether any
    /// energy was served and what is still missing.
    pub fn consume_tenders(&mut self, time_step: f64, ec: f64, power_type: PowerType) -> (bool, f64) {
        let tender = power_type.tender();
        let active = match self.active_tenders.get(&tender) {
            Some(cars) if !cars.is_empty() => cars.clone(),
            _ => return (false, ec),
        };
        let share = ec / active.len() as f64;
        let mut missing = 0.0;
        let mut still_active = Vec::with_capacity(active.len());
        for c in active {
            let car = &mut self.cars[c];
            if car.has_energy() {
                missing += car.consume_fuel(time_step, share, None).1;
                still_active.push(c);
            } else {
                missing += share;
            }
        }
        self.active_tenders.insert(tender, still_active);
        (ec != missing, missing)
    }

    /// Stores braking energy the locomotive could not keep: battery tenders
    /// first, then the catenary under the locomotive.
    pub fn recharge_cars_batteries(&mut self, network: &mut Network, time_step: f64, ec: f64,
                                   loco: usize) -> bool {
        let host = self.locomotives[loco].body.host_link;
        let tenders: Vec<usize> = self.cars.iter().enumerate()
            .filter(|(_, c)| c.car_type == CarType::BatteryTender)
            .map(|(i, _)| i)
            .collect();
        if tenders.is_empty() {
            return self.locomotives[loco].recharge_catenary(ec, catenary_of(network, host));
        }
        let share = ec / tenders.len() as f64;
        let mut overflow = 0.0;
        for c in tenders {
            overflow += self.cars[c].body.refill_battery(time_step, share);
        }
        if overflow > 0.0 {
            return self.locomotives[loco].recharge_catenary(overflow, catenary_of(network, host));
        }
        true
    }

    /// Folds the step's consumption into the train statistics.
    pub fn calculate_energy_consumption(&mut self, region: &str) {
        let mut consumed = 0.0;
        let mut regenerated = 0.0;
        let mut co2 = 0.0;
        for body in self.locomotives.iter_mut().map(|l| &mut l.body)
            .chain(self.cars.iter_mut().map(|c| &mut c.body)) {
            body.total_consumed += body.step_consumed;
            body.total_regenerated += body.step_regenerated.abs();
            consumed += body.step_consumed;
            regenerated += body.step_regenerated.abs();
            co2 += body.co2;
        }
        let stats = &mut self.stats;
        stats.energy = consumed - regenerated;
        stats.cum_energy += stats.energy;
        stats.total_consumed += consumed;
        stats.total_regenerated += regenerated;
        stats.co2 = co2;
        *stats.regional_energy.entry(region.to_string()).or_insert(0.0) += stats.energy;
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{diesel_locomotive, line_network, train_on};
    use crate::vehicles::{Car, CarType, Vehicle};

    #[test]
    fn standing_train_needs_no_power() {
        let (mut ctx, network) = line_network(&[1000.0], 20.0);
        let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
        assert!(train.tractive_power(0.0, 0.0, 1000.0).is_empty());
        let p = train.tractive_power(10.0, 0.5, 1000.0);
        assert_eq!(p.len(), 1);
        assert!((p[0] - (train.mass() * 0.5 + 1000.0) * 10.0).abs() < 1e-6);
    }

    #[test]
    fn shortfall_moves_to_tenders() {
        let (mut ctx, network) = line_network(&[1000.0], 20.0);
        let tender = Car::new("t".to_string(), 20.0, 0.0055, 10.0, 30.0, 30.0, 4,
                              CarType::DieselTender).unwrap();
        let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![tender]);
        let before = train.cars[0].body.tank.current_capacity();
        let (served, missing) = train.consume_tenders(1.0, 10.0, crate::vehicles::PowerType::Diesel);
        assert!(served);
        assert_eq!(missing, 0.0);
        assert!(train.cars[0].body.tank.current_capacity() < before);
        assert!(train.max_provided_energy(&network, 1.0) > 0.0);
        assert!(train.cars[0].max_provided_energy(1.0, false) > 0.0);
    }

    #[test]
    fn no_tender_means_nothing_served() {
        let (mut ctx, network) = line_network(&[1000.0], 20.0);
        let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
        assert_eq!(train.consume_tenders(1.0, 10.0, crate::vehicles::PowerType::Diesel), (false, 10.0));
    }
}
