//! Look-ahead throttle search. For every throttle level that still beats
//! the resistance, the step is simulated and its projected energy over the
//! distance to the next stop weighed against the speed it reaches.

use super::{CriticalPoint, Train};
use super::dynamics::speed_up_down;

/// Outcome of one virtual step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VirtualStep {
    pub speed: f64,
    pub acceleration: f64,
    pub throttle: f64,
}

fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max != min {
        0.1 + 0.9 * (value - min) / (max - min)
    } else {
        0.5
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((std::f64::INFINITY, std::f64::NEG_INFINITY),
                       |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

impl Train {
    /// Throttle fractions searched by the optimizer, `(n/N)^2` for n in 0..=N.
    pub fn optimization_levels(&self) -> &[f64] {
        &self.optimization_levels
    }

    /// Energy (kWh) needed to cover `distance` at the step's speed, used to
    /// rank throttle levels.
    pub fn heuristic_energy(&mut self, distance: f64, acceleration: f64, step_speed: f64,
                            time_step: f64, resistance: f64, speed: f64) -> f64 {
        let distance = if distance == 0.0 {
            self.driver.lookahead_steps as f64 * time_step * speed
        } else {
            distance
        };
        let interval = distance / step_speed.max(1e-4);
        let powers = self.tractive_power(step_speed, acceleration, resistance);
        self.total_energy_consumption(interval, step_speed, acceleration, &powers)
    }

    /// Picks the throttle level with the best energy/speed trade-off for one
    /// virtual step. Falls back to the current state when no level differs.
    pub fn astar_optimization(&mut self, previous_speed: f64, speed: f64, acceleration: f64,
                              previous_throttle: f64, grades: &[f64], curvatures: &[f64],
                              free_flow_speed: f64, time_step: f64, points: &[CriticalPoint])
                              -> Result<VirtualStep, super::TrainError> {
        self.update_grades_curvatures(grades, curvatures)?;
        let resistance = self.total_resistance(speed);
        let fallback = VirtualStep { speed, acceleration, throttle: previous_throttle };

        let levels = self.optimization_levels.clone();
        let last = levels.last().cloned().unwrap_or(1.0);
        let mut candidates: Vec<(VirtualStep, f64)> = Vec::new();
        for level in levels {
            if !(resistance < self.total_tractive_force(speed, true, level) || level == last) {
                continue;
            }
            let a = if points.is_empty() {
                self.accelerate(std::f64::INFINITY, 0.0, speed, 0.0, free_flow_speed,
                                time_step, true, Some(level))
            } else {
                let mut best = std::f64::INFINITY;
                for p in points {
                    best = best.min(self.accelerate(p.gap, 0.0, speed, p.leader_speed,
                                                    free_flow_speed, time_step, true, Some(level)));
                }
                best
            };
            let step_speed = speed_up_down(previous_speed, a, time_step, free_flow_speed);
            let distance = points.last().map(|p| p.gap).unwrap_or(0.0);
            let energy = self.heuristic_energy(distance, a, step_speed, time_step, resistance, speed);
            candidates.push((VirtualStep { speed: step_speed, acceleration: a, throttle: level }, energy));
        }
        if candidates.is_empty() {
            return Ok(fallback);
        }

        let energies: Vec<f64> = candidates.iter().map(|c| c.1).collect();
        let speeds: Vec<f64> = candidates.iter().map(|c| c.0.speed).collect();
        let (min_e, max_e) = min_max(&energies);
        if min_e == max_e {
            return Ok(fallback);
        }
        let (min_s, max_s) = min_max(&speeds);
        let k = self.driver.optimization_speed_weight;

        let mut best = 0;
        let mut best_score = std::f64::INFINITY;
        for (i, (e, s)) in energies.iter().zip(&speeds).enumerate() {
            let score = (1.0 - k) * normalize(*e, min_e, max_e) -
                        k * (normalize(*s, min_s, max_s) + 1e-6).ln();
            if score < best_score {
                best_score = score;
                best = i;
            }
        }
        Ok(candidates[best].0)
    }

    /// Queues the throttle ceilings found for the coming steps.
    pub fn set_optimum_throttle_levels(&mut self, levels: Vec<f64>) {
        self.optimum_throttle_levels = levels.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_maps_into_upper_band() {
        assert_eq!(normalize(5.0, 5.0, 5.0), 0.5);
        assert_eq!(normalize(0.0, 0.0, 10.0), 0.1);
        assert!((normalize(10.0, 0.0, 10.0) - 1.0).abs() < 1e-12);
        assert_eq!(min_max(&[3.0, -1.0, 2.0]), (-1.0, 3.0));
    }
}
