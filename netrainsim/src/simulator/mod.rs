//! Discrete time simulation of all trains on one network. Every tick each
//! train is loaded, planned against its critical points and moved; then
//! the signal groups are run and trains are checked for collisions.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use smallvec::SmallVec;

use crate::config::SimulatorConfig;
use crate::geometry;
use crate::network::{Network, NetworkError};
use crate::output::history::{log_event, SimulationEvent};
use crate::output::summary::Summary;
use crate::output::trajectory::{TrajectoryRow, TrajectoryWriter};
use crate::train::dynamics::{round3, speed_up_down};
use crate::train::{CriticalPoint, LinksData, Train, TrainError};

pub mod signals;

use self::signals::SignalGroupController;

#[derive(Debug, Fail)]
pub enum SimulationError {
    #[fail(display = "{}", _0)]
    Train(#[cause] TrainError),
    #[fail(display = "{}", _0)]
    Network(#[cause] NetworkError),
    #[fail(display = "could not write {}: {}", _0, _1)]
    Output(String, #[cause] io::Error),
    #[fail(display = "the simulation has no trains")]
    NoTrains,
}

impl From<TrainError> for SimulationError {
    fn from(e: TrainError) -> SimulationError {
        SimulationError::Train(e)
    }
}

impl From<NetworkError> for SimulationError {
    fn from(e: NetworkError) -> SimulationError {
        SimulationError::Network(e)
    }
}

fn output_error(path: &PathBuf) -> impl Fn(io::Error) -> SimulationError + '_ {
    move |e| SimulationError::Output(path.display().to_string(), e)
}

/// Everything a train needs from the network to take one step.
struct StepPlan {
    data: LinksData,
    /// Speed limit at the tip, capped by the slowest link under the train.
    free_flow_speed: f64,
    previous_node: usize,
    stop_is_signal: bool,
    points: Vec<CriticalPoint>,
}

pub struct Simulator {
    pub network: Network,
    pub trains: Vec<Train>,
    pub config: SimulatorConfig,
    /// Simulated time in seconds.
    pub time: f64,
    pub signal_groups: Vec<SignalGroupController>,
    /// Train pairs reported colliding so far.
    pub collisions: BTreeSet<(usize, usize)>,
    /// Percentage of the total path length covered, updated every tick.
    pub progress: u8,
    logger: Box<dyn Fn(SimulationEvent)>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Simulator {
    pub fn new(mut network: Network, mut trains: Vec<Train>, config: SimulatorConfig)
               -> Result<Simulator, SimulationError> {
        if trains.is_empty() {
            return Err(SimulationError::NoTrains);
        }
        for (i, t) in trains.iter_mut().enumerate() {
            t.id = i;
        }
        signals::signal_proximities(&mut network, &trains);
        let signal_groups = signals::define_signal_groups(&network, &trains)?;
        info!("Simulating {} trains on {} nodes and {} links, {} signal groups",
              trains.len(), network.nodes.len(), network.links.len(), signal_groups.len());

        Ok(Simulator {
            network,
            trains,
            config,
            time: 0.0,
            signal_groups,
            collisions: BTreeSet::new(),
            progress: 0,
            logger: Box::new(|e| log_event(&e)),
            cancel: None,
        })
    }

    pub fn set_logger(&mut self, logger: Box<dyn Fn(SimulationEvent)>) {
        self.logger = logger;
    }

    /// Flag checked once per tick; setting it ends the run early.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.load(Ordering::SeqCst)).unwrap_or(false)
    }

    /// True when every train that can still move has arrived.
    pub fn all_trains_reached(&self) -> bool {
        self.trains.iter().all(|t| t.reached_destination || t.out_of_energy)
    }

    /// Runs until every train has arrived, the end time passes or the run is
    /// cancelled. Writes the trajectory and summary files and returns the
    /// summary.
    pub fn run(&mut self) -> Result<Summary, SimulationError> {
        let trajectory_path = self.config.trajectory_path();
        let mut trajectory = match &trajectory_path {
            Some(p) => {
                if let Some(dir) = p.parent() {
                    fs::create_dir_all(dir).map_err(output_error(p))?;
                }
                Some(TrajectoryWriter::create(p).map_err(output_error(p))?)
            }
            None => None,
        };

        while self.config.end_time <= 0.0 || self.time <= self.config.end_time {
            if self.cancelled() {
                info!("Simulation cancelled at t={}", self.time);
                break;
            }
            if self.all_trains_reached() {
                break;
            }
            let rows = match self.step() {
                Ok(rows) => rows,
                Err(e) => {
                    (self.logger)(SimulationEvent::Error(e.to_string()));
                    return Err(e);
                }
            };
            if let (Some(w), Some(p)) = (trajectory.as_mut(), trajectory_path.as_ref()) {
                for r in &rows {
                    w.write(r).map_err(output_error(p))?;
                }
            }
        }

        if let (Some(w), Some(p)) = (trajectory.as_mut(), trajectory_path.as_ref()) {
            w.flush().map_err(output_error(p))?;
        }

        let summary = Summary::build(&self.network, &self.trains, self.time,
                                     self.config.export_individual_summary);
        let summary_path = self.config.summary_path();
        if let Some(dir) = summary_path.parent() {
            fs::create_dir_all(dir).map_err(output_error(&summary_path))?;
        }
        let mut file = io::BufWriter::new(
            fs::File::create(&summary_path).map_err(output_error(&summary_path))?);
        summary.write(&mut file).map_err(output_error(&summary_path))?;

        (self.logger)(SimulationEvent::Finished {
            summary: summary.pairs(),
            trajectory_file: trajectory_path,
        });
        Ok(summary)
    }

    /// Advances the whole network by one time step and returns the
    /// trajectory rows of the trains that moved.
    pub fn step(&mut self) -> Result<Vec<TrajectoryRow>, SimulationError> {
        self.fast_forward();

        let mut rows = Vec::new();
        for i in 0..self.trains.len() {
            if self.trains[i].reached_destination {
                continue;
            }
            let t = &self.trains[i];
            if t.optimize && t.loaded && t.lookahead_counter <= 0 {
                self.trains[i].reset_lookahead();
                self.optimize_throttle(i)?;
            }
            if let Some(row) = self.play_train(i)? {
                rows.push(row);
            }
            for ev in std::mem::replace(&mut self.trains[i].events, Vec::new()) {
                (self.logger)(ev);
            }
        }

        self.plot_trains();
        self.run_signals();
        self.report_progress();
        self.check_collisions();
        self.time += self.config.time_step;
        Ok(rows)
    }

    /// Jumps over idle time when no train is on the network.
    fn fast_forward(&mut self) {
        if self.trains.iter().any(|t| t.is_active()) {
            return;
        }
        let next = self.trains.iter()
            .filter(|t| !t.loaded)
            .map(|t| t.start_time)
            .fold(std::f64::INFINITY, f64::min);
        if next.is_finite() && next > self.time {
            info!("No train on the network, skipping from t={} to t={}", self.time, next);
            self.time = next;
        }
    }

    fn load_train(&mut self, i: usize) -> Result<(), SimulationError> {
        let (cum, first) = {
            let t = &self.trains[i];
            (self.network.cum_lengths(&self.trains, t)?,
             self.network.link_for_train(&self.trains, t, t.path[0], t.path[1])?)
        };
        let origin = self.network.coordinates(self.trains[i].path[0]);
        let t = &mut self.trains[i];
        t.loaded = true;
        t.total_path_length = cum[cum.len() - 1];
        t.cum_lengths = cum;
        t.previous_node = t.path[0];
        t.head = origin;
        t.tail = origin;
        t.set_current_links(&[first]);
        self.network.links[first].trains.insert(i);
        debug!("Train {} loaded at t={}", t.name, self.time);
        Ok(())
    }

    /// A train waits at its origin until the previous train from the same
    /// node has cleared its own length.
    fn origin_blocked(&self, i: usize) -> bool {
        let origin = self.trains[i].path[0];
        self.trains.iter().enumerate().any(|(j, o)| {
            j != i && o.is_active() && o.path[0] == origin && o.travelled <= o.length
        })
    }

    /// First node ahead where the train must stop: a depot or a red signal,
    /// else the end of the path.
    fn next_stop(&self, train: &Train, previous_index: usize) -> (usize, bool) {
        let path = &train.path;
        for i in previous_index + 1..path.len() {
            let node = path[i];
            if self.network.nodes[node].is_depot {
                return (node, false);
            }
            if let Some(s) = self.network.signal_into(path[i - 1], node) {
                if !self.network.signals[s].is_green {
                    return (node, true);
                }
            }
        }
        (path[path.len() - 1], false)
    }

    /// Position of a point of `other` along the path of `train`, if that
    /// point is on a link `train` will use. The flag tells whether both
    /// trains run the same way there.
    fn position_on_path(&self, train: &Train, other: &Train, d: f64)
                        -> Result<Option<(f64, bool)>, NetworkError> {
        let j = self.network.previous_node_index(other, d);
        let (a, b) = (other.path[j], other.path[j + 1]);
        let link = self.network.link_for_train(&self.trains, other, a, b)?;
        let length = other.cum_lengths[j + 1] - other.cum_lengths[j];
        let fraction = if length > 0.0 { (d - other.cum_lengths[j]) / length } else { 0.0 };

        let (pa, pb) = match (train.path_position(a), train.path_position(b)) {
            (Some(pa), Some(pb)) => (pa, pb),
            _ => return Ok(None),
        };
        let (m, same_direction) = if pb == pa + 1 {
            (pa, true)
        } else if pa == pb + 1 {
            (pb, false)
        } else {
            return Ok(None);
        };
        let mine = self.network.link_for_train(&self.trains, train, train.path[m], train.path[m + 1])?;
        if mine != link {
            return Ok(None);
        }
        let along = if same_direction { fraction } else { 1.0 - fraction };
        let start = train.cum_lengths[m];
        let span = train.cum_lengths[m + 1] - start;
        Ok(Some((start + along * span, same_direction)))
    }

    /// Nearest train ahead on the path: its gap and the speed to match.
    /// Trains running the other way are treated as standing.
    fn leader(&self, i: usize) -> Result<Option<CriticalPoint>, NetworkError> {
        let train = &self.trains[i];
        let mut best: Option<CriticalPoint> = None;
        for (j, other) in self.trains.iter().enumerate() {
            if j == i || !other.is_active() {
                continue;
            }
            let tail = (other.travelled - other.length).max(0.0);
            for &d in &[tail, other.travelled] {
                if let Some((pos, same_direction)) = self.position_on_path(train, other, d)? {
                    let gap = pos - train.travelled;
                    if gap <= 0.0 {
                        continue;
                    }
                    let speed = if same_direction { other.current_speed } else { 0.0 };
                    if best.map(|b| gap < b.gap).unwrap_or(true) {
                        best = Some(CriticalPoint::train(gap, speed));
                    }
                }
            }
        }
        Ok(best)
    }

    fn plan_step(&self, i: usize) -> Result<StepPlan, NetworkError> {
        let train = &self.trains[i];
        let d = train.travelled;
        let data = train.links_data(&self.network, &self.trains, d)?;
        let tip = self.network.link_at_distance(&self.trains, train, d)?;
        let free_flow_speed = data.free_flow_speeds.iter().cloned()
            .fold(self.network.links[tip].free_flow_speed, f64::min);
        let previous_index = self.network.previous_node_index(train, d);
        let (stop, stop_is_signal) = self.next_stop(train, previous_index);

        let mut points = Vec::new();
        for (node, speed) in train.lower_speed_nodes(&self.network, &self.trains,
                                                     train.path[previous_index], stop)? {
            if let Some(k) = train.path_position(node) {
                points.push(CriticalPoint::speed_change(
                    self.network.distance_to_node(train, k, d), speed));
            }
        }
        if let Some(leader) = self.leader(i)? {
            points.push(leader);
        }
        let stop_index = train.path_position(stop).unwrap_or(train.path.len() - 1);
        points.push(CriticalPoint::stop(self.network.distance_to_node(train, stop_index, d).max(0.0)));

        Ok(StepPlan {
            data,
            free_flow_speed,
            previous_node: train.path[previous_index],
            stop_is_signal,
            points,
        })
    }

    /// Loads, plans and moves one train. Returns its trajectory row when the
    /// train is on the network.
    fn play_train(&mut self, i: usize) -> Result<Option<TrajectoryRow>, SimulationError> {
        let time = self.time;
        let dt = self.config.time_step;
        {
            let t = &self.trains[i];
            if time >= t.start_time && !t.loaded && !self.origin_blocked(i) {
                self.load_train(i)?;
            }
        }
        if !(self.trains[i].loaded && time >= self.trains[i].start_time) {
            return Ok(None);
        }

        let plan = self.plan_step(i)?;
        let region = self.trains[i].first_link
            .map(|l| self.network.links[l].region.clone())
            .unwrap_or_default();
        let strict_jerk = self.config.strict_jerk;
        {
            let train = &mut self.trains[i];
            train.previous_node = plan.previous_node;
            let stop_gap = plan.points.last().map(|p| p.gap).unwrap_or(std::f64::INFINITY);
            let v = train.current_speed;
            let halted = (train.out_of_energy && train.driver.stop_if_no_energy) ||
                (plan.stop_is_signal &&
                 ((train.current_acceleration < 0.0 && stop_gap <= v * dt) ||
                  (v == 0.0 && stop_gap <= 1.0)));
            if halted {
                train.immediate_stop();
            } else {
                if !plan.stop_is_signal && plan.points.len() == 1 &&
                   train.current_acceleration < 0.0 &&
                   round3(train.previous_speed) == 0.0 && round3(v) == 0.0 {
                    train.kick_forward(stop_gap);
                }
                train.update_grades_curvatures(&plan.data.grades, &plan.data.curvatures)?;
                train.reset_power_restriction();

                let a = train.step_acceleration(&plan.points, plan.free_flow_speed, dt);
                let speed = speed_up_down(v, a, dt, plan.free_flow_speed);
                let resistance = train.resistance;
                let powers = train.tractive_power(speed, a, resistance);
                let step_energy = train.total_energy_consumption(dt, speed, a, &powers);
                let max_energy = train.max_provided_energy(&self.network, dt);
                if step_energy > max_energy && step_energy > 0.0 {
                    train.reduce_power(max_energy / step_energy);
                }

                train.move_train(&plan.points, plan.free_flow_speed, dt, strict_jerk)?;
                if round3(train.total_path_length) <= round3(train.travelled) {
                    train.travelled = train.total_path_length;
                    train.reached_destination = true;
                }
            }
        }

        let old_links = self.trains[i].current_links.clone();
        if self.trains[i].reached_destination {
            let (network, trains) = (&mut self.network, &mut self.trains);
            trains[i].calc_stats(network, &plan.data.free_flow_speeds, plan.free_flow_speed, dt, &region);
            let end = network.coordinates(trains[i].path[trains[i].path.len() - 1]);
            trains[i].head = end;
            for l in old_links {
                network.links[l].trains.remove(&i);
            }
            trains[i].current_links.clear();
            let name = trains[i].name.clone();
            (self.logger)(SimulationEvent::DestinationReached { train: name, time });
        } else {
            let (head, tail) = {
                let t = &self.trains[i];
                (self.network.position(t, t.travelled),
                 self.network.position(t, t.travelled - t.length))
            };
            {
                let (network, trains) = (&mut self.network, &mut self.trains);
                let t = &mut trains[i];
                t.head = head;
                t.tail = tail;
                t.calc_stats(network, &plan.data.free_flow_speeds, plan.free_flow_speed, dt, &region);
            }
            let data = {
                let t = &self.trains[i];
                t.links_data(&self.network, &self.trains, t.travelled)?
            };
            self.trains[i].set_current_links(&data.links);
            for l in old_links {
                self.network.links[l].trains.remove(&i);
            }
            for &l in &self.trains[i].current_links {
                self.network.links[l].trains.insert(i);
            }
        }

        let t = &self.trains[i];
        Ok(Some(TrajectoryRow {
            train: t.name.clone(),
            time,
            travelled: t.travelled,
            acceleration: t.current_acceleration,
            speed: t.current_speed,
            link_max_speed: plan.free_flow_speed,
            energy: t.stats.energy,
            max_delay: t.stats.max_delay,
            delay: t.stats.delay,
            stoppings: t.stats.stopped,
            tractive_force: t.tractive_force,
            resistance: t.resistance,
            used_power: t.used_power_total,
            grade: plan.data.grades.first().cloned().unwrap_or(0.0),
            curvature: plan.data.curvatures.first().cloned().unwrap_or(0.0),
            notch: t.locomotives[0].current_notch,
        }))
    }

    /// Plans the throttle ceilings for the next steps on a copy of the train.
    fn optimize_throttle(&mut self, i: usize) -> Result<(), SimulationError> {
        let dt = self.config.time_step;
        let mut shadow = self.trains[i].clone();
        let mut d = shadow.travelled;
        let mut previous_speed = shadow.previous_speed;
        let mut speed = shadow.current_speed;
        let mut acceleration = shadow.current_acceleration;
        let mut throttle = shadow.optimum_throttle;
        let mut levels = Vec::new();

        for _ in 0..shadow.driver.lookahead_steps {
            d = (d + speed * dt).min(shadow.total_path_length);
            let data = shadow.links_data(&self.network, &self.trains, d)?;
            let tip = self.network.link_at_distance(&self.trains, &shadow, d)?;
            let ffs = data.free_flow_speeds.iter().cloned()
                .fold(self.network.links[tip].free_flow_speed, f64::min);
            let previous_index = self.network.previous_node_index(&shadow, d);
            let (stop, _) = self.next_stop(&shadow, previous_index);

            let mut points = Vec::new();
            for (node, s) in shadow.lower_speed_nodes(&self.network, &self.trains,
                                                      shadow.path[previous_index], stop)? {
                if let Some(k) = shadow.path_position(node) {
                    points.push(CriticalPoint::speed_change(
                        self.network.distance_to_node(&shadow, k, d), s));
                }
            }
            let stop_index = shadow.path_position(stop).unwrap_or(shadow.path.len() - 1);
            points.push(CriticalPoint::stop(self.network.distance_to_node(&shadow, stop_index, d).max(0.0)));

            let step = shadow.astar_optimization(previous_speed, speed, acceleration, throttle,
                                                 &data.grades, &data.curvatures, ffs, dt, &points)?;
            previous_speed = speed;
            speed = step.speed;
            acceleration = step.acceleration;
            throttle = step.throttle;
            levels.push(step.throttle);
        }
        trace!("Train {} throttle plan {:?}", shadow.name, levels);
        self.trains[i].set_optimum_throttle_levels(levels);
        Ok(())
    }

    /// Closest signal ahead of the train's tip on its path.
    fn closest_signal(&self, train: &Train) -> Option<(usize, usize)> {
        let start = train.path_position(train.previous_node).unwrap_or(0) + 1;
        (start..train.path.len()).find_map(|k| {
            self.network.signal_into(train.path[k - 1], train.path[k]).map(|s| (s, k))
        })
    }

    /// Sets every signal green, then lets each signal group turn red the
    /// signals conflicting with the train currently holding it.
    pub fn run_signals(&mut self) {
        self.network.set_all_signals_green();
        let time = self.time;
        for i in 0..self.trains.len() {
            let train = &self.trains[i];
            if !train.is_active() {
                continue;
            }
            let (signal, k) = match self.closest_signal(train) {
                Some(s) => s,
                None => continue,
            };
            let node = train.path[k];
            let g = match self.signal_groups.iter().position(|g| g.nodes.contains(&node)) {
                Some(g) => g,
                None => continue,
            };

            let group = &self.signal_groups[g];
            let occupied = group.confined_links.iter()
                .any(|l| !self.network.links[*l].trains.is_empty());
            let on_group = train.current_links.iter().any(|l| group.confined_links.contains(l));
            let distance = train.cum_lengths[k] - train.travelled;
            let requesting = distance <= self.network.signals[signal].proximity || on_group;

            let same_direction: SmallVec<[usize; 4]> = if requesting {
                signals::same_direction_signals(&self.network, train, &group.signals)
            } else {
                SmallVec::new()
            };

            let group = &mut self.signal_groups[g];
            if group.confined_links.is_empty() || occupied {
                group.update_time_step(time);
            }
            if requesting {
                group.send_pass_request(signal, time, &same_direction);
                let (_, red) = group.feedback();
                for s in red {
                    self.network.signals[s].is_green = false;
                }
            }
        }
    }

    fn report_progress(&mut self) {
        let n = self.trains.len() as f64;
        let travelled: f64 = self.trains.iter().map(|t| t.travelled).sum::<f64>() / n;
        let total: f64 = self.trains.iter().map(|t| t.total_path_length).sum::<f64>() / n;
        let p = if total > 0.0 { (100.0 * travelled / total).min(100.0) as u8 } else { 0 };
        self.progress = p;
        (self.logger)(SimulationEvent::Progress(p));
    }

    fn plot_trains(&self) {
        let freq = self.config.plot_frequency;
        if freq == 0 || (self.time.round() as i64) % freq as i64 != 0 {
            return;
        }
        let coordinates = self.trains.iter()
            .filter(|t| t.is_active())
            .map(|t| (t.name.clone(), vec![t.head, t.tail]))
            .collect();
        (self.logger)(SimulationEvent::TrainsCoordinates(coordinates));
    }

    /// Reports trains whose bodies cross on a shared link, once per pair.
    fn check_collisions(&mut self) {
        let time = self.time;
        let mut found = Vec::new();
        for (i, a) in self.trains.iter().enumerate() {
            for (j, b) in self.trains.iter().enumerate().skip(i + 1) {
                if !(a.is_active() && b.is_active()) ||
                   time <= a.start_time || time <= b.start_time {
                    continue;
                }
                let shared = a.current_links.iter().any(|l| b.current_links.contains(l));
                if shared && geometry::two_lines_intersect(a.head, a.tail, b.head, b.tail) &&
                   !self.collisions.contains(&(i, j)) {
                    found.push((i, j));
                }
            }
        }
        for (i, j) in found {
            self.collisions.insert((i, j));
            let (first, second) = (self.trains[i].name.clone(), self.trains[j].name.clone());
            warn!("Trains {} and {} collide at t={}", first, second, time);
            (self.logger)(SimulationEvent::Collision { first, second, time });
        }
    }
}
