//! Car-following acceleration law and the kinematic update of a train.

use super::{Train, TrainError};
use crate::output::history::SimulationEvent;
use crate::vehicles::{Vehicle, GRAVITY};

/// Slow/stopped warnings reported per train before going quiet.
const MAX_SLOW_WARNINGS: u32 = 5;
/// Gap beyond which a stopped train is considered stuck rather than waiting.
const STUCK_GAP: f64 = 50.0;
const JERK_TOLERANCE: f64 = 1e-6;

/// Something ahead of the train that bounds its speed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CriticalPoint {
    pub gap: f64,
    pub leader_speed: f64,
    /// Leading trains are kept at the following gap; speed changes and stops
    /// may be approached to zero distance.
    pub is_train: bool,
}

impl CriticalPoint {
    pub fn stop(gap: f64) -> CriticalPoint {
        CriticalPoint { gap, leader_speed: 0.0, is_train: false }
    }

    pub fn speed_change(gap: f64, speed: f64) -> CriticalPoint {
        CriticalPoint { gap, leader_speed: speed, is_train: false }
    }

    pub fn train(gap: f64, speed: f64) -> CriticalPoint {
        CriticalPoint { gap, leader_speed: speed, is_train: true }
    }
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Gap needed to stop comfortably from `speed` (or from the free-flow
/// speed when `estimate` is set).
pub fn safe_gap(initial_gap: f64, speed: f64, free_flow_speed: f64, t_s: f64,
                desired_deceleration: f64, estimate: bool) -> f64 {
    let x = if estimate { free_flow_speed } else { speed };
    initial_gap + t_s * x + x.powi(2) / (2.0 * desired_deceleration)
}

pub fn speed_up_down(previous_speed: f64, acceleration: f64, time_step: f64,
                     free_flow_speed: f64) -> f64 {
    (previous_speed + acceleration * time_step).max(0.0).min(free_flow_speed)
}

/// Acceleration consistent with the realized speed change.
pub fn adjust_acceleration(speed: f64, previous_speed: f64, time_step: f64) -> f64 {
    (speed - previous_speed) / time_step
}

pub fn smooth_acceleration(acceleration: f64, previous: f64, alpha: f64) -> f64 {
    alpha * acceleration + (1.0 - alpha) * previous
}

/// Keeps the change of acceleration within `max_jerk * time_step`.
pub fn limit_jerk(acceleration: f64, previous: f64, max_jerk: f64, time_step: f64) -> f64 {
    let band = max_jerk * time_step;
    acceleration.max(previous - band).min(previous + band)
}

impl Train {
    pub fn total_tractive_force(&self, speed: f64, optimize: bool, optimum: f64) -> f64 {
        self.locomotives.iter()
            .map(|l| l.tractive_force(self.friction, speed, optimize, optimum))
            .sum()
    }

    pub fn total_resistance(&self, speed: f64) -> f64 {
        self.locomotives.iter().map(|l| l.resistance(speed)).sum::<f64>() +
            self.cars.iter().map(|c| c.resistance(speed)).sum::<f64>()
    }

    fn next_step_speed(&self, gap: f64, min_gap: f64, speed: f64, free_flow_speed: f64,
                       max_acceleration: f64, time_step: f64) -> f64 {
        let mut u = ((gap - min_gap) / self.t_s).min(free_flow_speed);
        if u < speed {
            u = u.max(speed - self.friction * time_step);
        } else if u > speed && u != free_flow_speed {
            u = u.min(speed + max_acceleration * time_step);
        }
        u
    }

    /// Acceleration towards one critical point. Updates the tractive and
    /// resistance forces of the train as a side effect. A `throttle` of
    /// `None` uses the current optimum throttle.
    pub fn accelerate(&mut self, gap: f64, min_gap: f64, speed: f64, leader_speed: f64,
                      free_flow_speed: f64, time_step: f64, optimize: bool,
                      throttle: Option<f64>) -> f64 {
        let throttle = throttle.unwrap_or(self.optimum_throttle);
        self.tractive_force = self.total_tractive_force(speed, optimize, throttle);
        self.resistance = self.total_resistance(speed);
        let max_acceleration = (self.tractive_force - self.resistance) / self.mass();
        let mu_g = self.friction * GRAVITY;
        let d_des = self.driver.desired_deceleration;

        if gap > safe_gap(min_gap, speed, free_flow_speed, self.t_s, d_des, false) &&
           max_acceleration > 0.0 {
            if speed < free_flow_speed {
                return max_acceleration;
            } else if speed == free_flow_speed {
                return 0.0;
            }
        }

        let u_hat = self.next_step_speed(gap, min_gap, speed, free_flow_speed,
                                         max_acceleration, time_step);
        let ttc = ((gap - min_gap) / (speed - leader_speed).max(1e-4)).min(100.0);
        let an11 = ((u_hat - speed) / if ttc > 0.0 { ttc } else { 1e-4 }).max(-mu_g);
        let t_s = if self.t_s == 0.0 { 1e-4 } else { self.t_s };
        let an12 = ((u_hat - speed) / t_s).min(max_acceleration);
        let beta1 = if an11 > 0.0 { 1.0 } else { 0.0 };
        let an13 = (1.0 - beta1) * an11 + beta1 * an12;
        let an1 = an13;

        let gamma = if speed - leader_speed > 0.0 { 1.0 } else { 0.0 };
        let closing = (speed.powi(2) - leader_speed.powi(2)).powi(2) / (4.0 * d_des);
        let an2 = (closing / (gap - min_gap).max(1e-4).powi(2)).min(mu_g);
        an1 * (1.0 - gamma) - gamma * an2
    }

    fn min_gap_for(&self, point: &CriticalPoint) -> f64 {
        if point.is_train { self.driver.min_following_gap } else { 0.0 }
    }

    /// Binding acceleration over all critical points after smoothing and
    /// the jerk limit.
    pub fn step_acceleration(&mut self, points: &[CriticalPoint], free_flow_speed: f64,
                             time_step: f64) -> f64 {
        let speed = self.current_speed;
        let optimize = self.optimize;
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in points.iter().enumerate() {
            let min_gap = self.min_gap_for(p);
            let a = self.accelerate(p.gap, min_gap, speed, p.leader_speed, free_flow_speed,
                                    time_step, optimize, None);
            if best.map(|(_, b)| a < b).unwrap_or(true) {
                best = Some((i, a));
            }
        }
        let raw = match best {
            Some((i, a)) => {
                if points.len() > 1 {
                    let p = points[i];
                    let min_gap = self.min_gap_for(&p);
                    self.accelerate(p.gap, min_gap, speed, p.leader_speed, free_flow_speed,
                                    time_step, optimize, None);
                }
                a
            }
            None => self.accelerate(std::f64::INFINITY, 0.0, speed, 0.0, free_flow_speed,
                                    time_step, optimize, None),
        };

        let smoothed = smooth_acceleration(raw, self.current_acceleration, 1.0);
        let mut a = limit_jerk(smoothed, self.current_acceleration, self.driver.max_jerk, time_step);
        if round3(self.current_speed) == 0.0 && a < 0.0 {
            a = 0.0;
        }
        a
    }

    /// Moves the next planned throttle level into place, if optimizing.
    fn advance_optimum_throttle(&mut self) {
        if !self.optimize {
            return;
        }
        self.lookahead_counter -= 1;
        if let Some(&level) = self.optimum_throttle_levels.front() {
            self.optimum_throttle = level;
        }
        if self.optimum_throttle_levels.len() > 1 {
            self.optimum_throttle_levels.pop_front();
        }
    }

    fn report_if_stuck(&mut self, acceleration: f64, points: &[CriticalPoint]) {
        let far = points.last().map(|p| p.gap > STUCK_GAP).unwrap_or(false);
        if acceleration < 0.0 && self.current_speed <= 0.001 && far &&
           self.slow_warnings < MAX_SLOW_WARNINGS {
            let message = format!("resistance is larger than the tractive force at distance {:.1} m",
                                  self.travelled);
            warn!("Train {}: {}", self.name, message);
            self.events.push(SimulationEvent::SlowOrStopped { train: self.name.clone(), message });
            self.slow_warnings += 1;
        }
    }

    fn check_sudden_acceleration(&mut self, time_step: f64, strict: bool) -> Result<(), TrainError> {
        let jerk = (self.current_acceleration - self.previous_acceleration).abs() / time_step;
        if jerk <= self.driver.max_jerk + JERK_TOLERANCE {
            return Ok(());
        }
        if strict {
            return Err(TrainError::JerkViolation {
                train: self.name.clone(),
                jerk,
                max_jerk: self.driver.max_jerk,
            });
        }
        let message = format!("sudden acceleration change ({:.3} m/s3) at distance {:.1} m",
                              jerk, self.travelled);
        warn!("Train {}: {}", self.name, message);
        self.events.push(SimulationEvent::SuddenAcceleration { train: self.name.clone(), message });
        Ok(())
    }

    pub fn update_notches(&mut self) {
        let speed = self.current_speed;
        for l in &mut self.locomotives {
            l.update_notch(speed);
        }
    }

    /// Advances the train by one step under the binding critical point.
    pub fn move_train(&mut self, points: &[CriticalPoint], free_flow_speed: f64,
                      time_step: f64, strict_jerk: bool) -> Result<(), TrainError> {
        self.previous_acceleration = self.current_acceleration;
        self.advance_optimum_throttle();
        let a = self.step_acceleration(points, free_flow_speed, time_step);
        self.report_if_stuck(a, points);

        self.previous_speed = self.current_speed;
        self.current_speed = speed_up_down(self.previous_speed, a, time_step, free_flow_speed);
        self.current_acceleration = adjust_acceleration(self.current_speed, self.previous_speed, time_step);
        self.check_sudden_acceleration(time_step, strict_jerk)?;

        self.travelled += self.current_speed * time_step;
        self.max_speed = self.max_speed.max(self.current_speed);
        self.update_notches();
        if round3(self.total_path_length) <= round3(self.travelled) {
            self.travelled = self.total_path_length;
            self.reached_destination = true;
        }
        Ok(())
    }

    /// Halts the train within the current step, e.g. in front of a red signal.
    pub fn immediate_stop(&mut self) {
        self.previous_acceleration = self.current_acceleration;
        self.previous_speed = self.current_speed;
        self.current_speed = 0.0;
        self.current_acceleration = 0.0;
        self.update_notches();
    }

    /// Skips a stopped train over a residual distance it cannot resolve.
    pub fn kick_forward(&mut self, distance: f64) {
        self.previous_acceleration = 0.0;
        self.current_acceleration = 0.0;
        self.previous_speed = 0.0;
        self.current_speed = 0.0;
        self.travelled += distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{diesel_locomotive, line_network, train_on};

    #[test]
    fn safe_gap_grows_with_speed() {
        let g0 = safe_gap(2.0, 0.0, 20.0, 1.0, 0.2, false);
        assert_eq!(g0, 2.0);
        let g10 = safe_gap(2.0, 10.0, 20.0, 1.0, 0.2, false);
        assert!((g10 - (2.0 + 10.0 + 250.0)).abs() < 1e-9);
        assert!(safe_gap(2.0, 10.0, 20.0, 1.0, 0.2, true) > g10);
    }

    #[test]
    fn jerk_limit_is_a_band_around_previous() {
        assert_eq!(limit_jerk(5.0, 0.0, 2.0, 1.0), 2.0);
        assert_eq!(limit_jerk(-5.0, 0.5, 2.0, 1.0), -1.5);
        assert_eq!(limit_jerk(0.3, 0.0, 2.0, 1.0), 0.3);
    }

    #[test]
    fn speed_stays_between_zero_and_free_flow() {
        assert_eq!(speed_up_down(19.0, 3.0, 1.0, 20.0), 20.0);
        assert_eq!(speed_up_down(1.0, -3.0, 1.0, 20.0), 0.0);
        assert_eq!(round3(1.23456), 1.235);
    }

    #[test]
    fn no_acceleration_when_closing_in_at_safe_gap() {
        let (mut ctx, network) = line_network(&[5000.0], 20.0);
        let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
        let min_gap = train.driver.min_following_gap;
        let d_des = train.driver.desired_deceleration;
        let speed = 10.0;
        let gap = safe_gap(min_gap, speed, 20.0, train.t_s, d_des, false);

        for &leader_speed in &[0.0, 5.0, 9.9] {
            let a = train.accelerate(gap, min_gap, speed, leader_speed, 20.0, 1.0, false, None);
            assert!(a <= 0.0, "accelerated {} behind a leader at {} m/s", a, leader_speed);
            let closer = train.accelerate(0.5 * gap, min_gap, speed, leader_speed, 20.0, 1.0,
                                          false, None);
            assert!(closer <= 0.0);
        }
    }
}
