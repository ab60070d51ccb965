//! A train: its consist, fixed path, kinematic state and statistics.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::DriverParams;
use crate::context::SimContext;
use crate::geometry::Point;
use crate::input::records::TrainRecord;
use crate::network::{Network, NetworkError};
use crate::output::history::SimulationEvent;
use crate::vehicles::{Car, CarType, Locomotive, PowerType, Vehicle, VehicleError};

pub mod dynamics;
pub mod energy;
pub mod optimization;
pub mod stats;

pub use self::dynamics::CriticalPoint;
pub use self::stats::TrainStats;

/// Speed of sound (m/s), carrying the brake command along the consist.
const BRAKE_PROPAGATION_SPEED: f64 = 343.0;

#[derive(Debug, Fail)]
pub enum TrainError {
    #[fail(display = "train {} does not have locomotives", _0)]
    NoLocomotives(String),
    #[fail(display = "train {} needs a path of at least two nodes", _0)]
    PathTooShort(String),
    #[fail(display = "train {} got {} grades and {} curvatures for {} vehicles", train, grades, curvatures, vehicles)]
    GradesCurvaturesMismatch { train: String, grades: usize, curvatures: usize, vehicles: usize },
    #[fail(display = "train {} changed acceleration at {} m/s3, above the maximum jerk {}", train, jerk, max_jerk)]
    JerkViolation { train: String, jerk: f64, max_jerk: f64 },
    #[fail(display = "{}", _0)]
    Network(#[cause] NetworkError),
    #[fail(display = "{}", _0)]
    Vehicle(#[cause] VehicleError),
}

impl From<NetworkError> for TrainError {
    fn from(e: NetworkError) -> TrainError {
        TrainError::Network(e)
    }
}

impl From<VehicleError> for TrainError {
    fn from(e: VehicleError) -> TrainError {
        TrainError::Vehicle(e)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VehicleRef {
    Loco(usize),
    Car(usize),
}

/// Track data sampled under every vehicle of the consist.
#[derive(Clone, Debug, Default)]
pub struct LinksData {
    pub grades: Vec<f64>,
    pub curvatures: Vec<f64>,
    pub free_flow_speeds: Vec<f64>,
    pub links: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct Train {
    /// Position of the train in the simulator's train list.
    pub id: usize,
    pub name: String,
    /// Node indices; fixed once the train is built, so the caches below
    /// can be keyed by node.
    pub path: Vec<usize>,
    path_index: HashMap<usize, usize>,
    pub start_time: f64,
    pub friction: f64,
    pub optimize: bool,
    pub driver: DriverParams,

    pub locomotives: Vec<Locomotive>,
    pub cars: Vec<Car>,
    /// Front to back.
    pub arrangement: Vec<VehicleRef>,
    /// Distance from the train tip to the centroid of each arranged vehicle.
    centroids: Vec<f64>,
    pub length: f64,
    /// Reaction plus brake propagation time.
    pub t_s: f64,

    pub loaded: bool,
    pub reached_destination: bool,
    pub out_of_energy: bool,
    pub travelled: f64,
    pub current_speed: f64,
    pub previous_speed: f64,
    pub current_acceleration: f64,
    pub previous_acceleration: f64,
    pub max_speed: f64,
    pub total_path_length: f64,
    pub cum_lengths: Vec<f64>,
    /// Node most recently passed by the tip.
    pub previous_node: usize,
    pub current_links: Vec<usize>,
    pub first_link: Option<usize>,
    pub head: Point,
    pub tail: Point,
    pub tractive_force: f64,
    pub resistance: f64,
    pub used_power: Vec<f64>,
    pub used_power_total: f64,

    active_locos: Vec<usize>,
    active_tenders: BTreeMap<CarType, Vec<usize>>,
    lower_speeds: RefCell<HashMap<(usize, usize), Vec<(usize, f64)>>>,
    between_nodes: RefCell<HashMap<(usize, usize), f64>>,

    pub optimum_throttle: f64,
    pub optimum_throttle_levels: VecDeque<f64>,
    pub lookahead_counter: i64,
    optimization_levels: Vec<f64>,

    slow_warnings: u32,
    pub stats: TrainStats,
    /// Advisory events raised during the last step, drained by the simulator.
    pub events: Vec<SimulationEvent>,
}

impl Train {
    pub fn new(ctx: &mut SimContext,
               network: &Network,
               name: String,
               path: Vec<usize>,
               start_time: f64,
               friction: f64,
               locomotives: Vec<Locomotive>,
               cars: Vec<Car>,
               optimize: bool,
               driver: DriverParams)
               -> Result<Train, TrainError> {
        if locomotives.is_empty() {
            return Err(TrainError::NoLocomotives(name));
        }
        if path.len() < 2 {
            return Err(TrainError::PathTooShort(name));
        }
        let id = ctx.next_train_id();
        let total_path_length = network.path_length(&path)?;

        let mut path_index = HashMap::new();
        for (i, &n) in path.iter().enumerate() {
            path_index.entry(n).or_insert(i);
        }

        let arrangement = arrange(locomotives.len(), cars.len());
        let mut train = Train {
            id,
            name,
            previous_node: path[0],
            path,
            path_index,
            start_time,
            friction,
            optimize,
            driver,
            locomotives,
            cars,
            arrangement,
            centroids: Vec::new(),
            length: 0.0,
            t_s: 0.0,
            loaded: false,
            reached_destination: false,
            out_of_energy: false,
            travelled: 0.0,
            current_speed: 0.0,
            previous_speed: 0.0,
            current_acceleration: 0.0,
            previous_acceleration: 0.0,
            max_speed: 0.0,
            total_path_length,
            cum_lengths: Vec::new(),
            current_links: Vec::new(),
            first_link: None,
            head: (0.0, 0.0),
            tail: (0.0, 0.0),
            tractive_force: 0.0,
            resistance: 0.0,
            used_power: Vec::new(),
            used_power_total: 0.0,
            active_locos: Vec::new(),
            active_tenders: BTreeMap::new(),
            lower_speeds: RefCell::new(HashMap::new()),
            between_nodes: RefCell::new(HashMap::new()),
            optimum_throttle: 1.0,
            optimum_throttle_levels: VecDeque::new(),
            lookahead_counter: 1,
            optimization_levels: Vec::new(),
            slow_warnings: 0,
            stats: TrainStats::default(),
            events: Vec::new(),
        };

        let mut cum = 0.0;
        for v in train.arrangement.clone() {
            let l = train.vehicle(v).length();
            cum += l;
            train.centroids.push(cum - l / 2.0);
        }
        train.length = cum;
        train.t_s = train.driver.reaction_time + train.length / BRAKE_PROPAGATION_SPEED;

        let n = train.locomotives[0].notches();
        train.optimization_levels = (0..=n).map(|k| (k as f64 / n as f64).powi(2)).collect();
        train.reset();
        Ok(train)
    }

    /// Expands the vehicle groups of a record into a train.
    pub fn from_record(ctx: &mut SimContext, network: &Network, record: &TrainRecord,
                       driver: DriverParams) -> Result<Train, TrainError> {
        let path = record.path.iter()
            .map(|&n| network.node_index(n))
            .collect::<Result<Vec<_>, _>>()?;

        let mut locomotives = Vec::new();
        for group in &record.locomotives {
            let power_type = PowerType::from_code(group.power_type)?;
            for _ in 0..group.count {
                let name = format!("{}-loco{}", record.id, locomotives.len());
                locomotives.push(Locomotive::new(name, group.power, group.transmission_efficiency,
                                                 group.length, group.drag_coef, group.frontal_area,
                                                 group.gross_weight, group.axles, power_type)?);
            }
        }

        let mut cars = Vec::new();
        for group in &record.cars {
            let car_type = CarType::from_code(group.car_type)?;
            for _ in 0..group.count {
                let name = format!("{}-car{}", record.id, cars.len());
                cars.push(Car::new(name, group.length, group.drag_coef, group.frontal_area,
                                   group.gross_weight, group.tare_weight, group.axles, car_type)?);
            }
        }

        Train::new(ctx, network, record.id.clone(), path, record.start_time, record.friction,
                   locomotives, cars, record.optimize, driver)
    }

    pub fn vehicle(&self, v: VehicleRef) -> &dyn Vehicle {
        match v {
            VehicleRef::Loco(i) => &self.locomotives[i],
            VehicleRef::Car(i) => &self.cars[i],
        }
    }

    pub fn vehicle_mut(&mut self, v: VehicleRef) -> &mut dyn Vehicle {
        match v {
            VehicleRef::Loco(i) => &mut self.locomotives[i],
            VehicleRef::Car(i) => &mut self.cars[i],
        }
    }

    pub fn vehicle_count(&self) -> usize {
        self.arrangement.len()
    }

    /// Total mass in kg.
    pub fn mass(&self) -> f64 {
        self.locomotives.iter().map(|l| l.weight()).sum::<f64>() * 1000.0 +
            self.cars.iter().map(|c| c.weight()).sum::<f64>() * 1000.0
    }

    pub fn path_position(&self, node: usize) -> Option<usize> {
        self.path_index.get(&node).cloned()
    }

    /// True when the path passes `a` and later `b`.
    pub fn travels_from_to(&self, a: usize, b: usize) -> bool {
        match (self.path_position(a), self.path_position(b)) {
            (Some(i), Some(j)) => i < j,
            _ => false,
        }
    }

    pub fn min_following_gap(&self) -> f64 {
        self.driver.min_following_gap
    }

    pub fn is_active(&self) -> bool {
        self.loaded && !self.reached_destination
    }

    /// Locomotives still supplying power. Switched-off units are dropped
    /// and the train runs out of energy once none remain.
    pub fn active_locomotives(&mut self) -> &[usize] {
        let locos = &self.locomotives;
        self.active_locos.retain(|&i| locos[i].is_on);
        if self.active_locos.is_empty() {
            self.out_of_energy = true;
        }
        &self.active_locos
    }

    pub fn update_grades_curvatures(&mut self, grades: &[f64], curvatures: &[f64])
                                    -> Result<(), TrainError> {
        let n = self.vehicle_count();
        if grades.len() != n || curvatures.len() != n {
            return Err(TrainError::GradesCurvaturesMismatch {
                train: self.name.clone(),
                grades: grades.len(),
                curvatures: curvatures.len(),
                vehicles: n,
            });
        }
        for (i, v) in self.arrangement.clone().into_iter().enumerate() {
            let body = self.vehicle_mut(v).body_mut();
            body.grade = grades[i];
            body.curvature = curvatures[i];
        }
        Ok(())
    }

    /// Samples the link under each vehicle's centroid when the tip is at
    /// `tip_distance`.
    pub fn links_data(&self, network: &Network, trains: &[Train], tip_distance: f64)
                      -> Result<LinksData, NetworkError> {
        let mut data = LinksData::default();
        for &c in &self.centroids {
            let d = (tip_distance - c).max(0.0).min(self.total_path_length);
            let prev = network.previous_node_index(self, d);
            let link = network.link_for_train(trains, self, self.path[prev], self.path[prev + 1])?;
            let l = &network.links[link];
            data.grades.push(l.grade_from(self.path[prev]));
            data.curvatures.push(l.curvature);
            data.free_flow_speeds.push(l.free_flow_speed);
            data.links.push(link);
        }
        Ok(data)
    }

    /// Assigns host links to vehicles front to back.
    pub fn set_current_links(&mut self, links: &[usize]) {
        self.current_links.clear();
        for &l in links {
            if !self.current_links.contains(&l) {
                self.current_links.push(l);
            }
        }
        for (i, v) in self.arrangement.clone().into_iter().enumerate() {
            let host = links.get(i.min(links.len().saturating_sub(1))).cloned();
            self.vehicle_mut(v).body_mut().host_link = host;
        }
        self.first_link = links.first().cloned();
    }

    /// Nodes between `from_node` and `stop` where the allowed speed drops,
    /// with the new speed. Cached per node pair since the path is fixed.
    pub fn lower_speed_nodes(&self, network: &Network, trains: &[Train], from_node: usize,
                             stop: usize) -> Result<Vec<(usize, f64)>, NetworkError> {
        let key = (from_node, stop);
        if let Some(v) = self.lower_speeds.borrow().get(&key) {
            return Ok(v.clone());
        }
        let mut result = Vec::new();
        if let (Some(from), Some(to)) = (self.path_position(from_node), self.path_position(stop)) {
            let mut previous_speed = None;
            for i in from..to {
                let link = network.link_for_train(trains, self, self.path[i], self.path[i + 1])?;
                let ffs = network.links[link].free_flow_speed;
                if let Some(p) = previous_speed {
                    if ffs < p {
                        result.push((self.path[i], ffs));
                    }
                }
                previous_speed = Some(ffs);
            }
        }
        self.lower_speeds.borrow_mut().insert(key, result.clone());
        Ok(result)
    }

    /// Length along the path between two of its nodes.
    pub fn distance_between_nodes(&self, network: &Network, a: usize, b: usize)
                                  -> Result<f64, NetworkError> {
        if let Some(&d) = self.between_nodes.borrow().get(&(a, b)) {
            return Ok(d);
        }
        let d = match (self.path_position(a), self.path_position(b)) {
            (Some(i), Some(j)) => {
                let (i, j) = if i <= j { (i, j) } else { (j, i) };
                network.path_length(&self.path[i..=j])?
            }
            _ => 0.0,
        };
        let mut cache = self.between_nodes.borrow_mut();
        cache.insert((a, b), d);
        cache.insert((b, a), d);
        Ok(d)
    }

    pub fn reset_lookahead(&mut self) {
        self.lookahead_counter = self.driver.run_optimization_every as i64;
    }

    pub fn cargo_net_weight(&self) -> f64 {
        self.cars.iter().map(|c| c.cargo_net_weight()).sum()
    }

    /// Ton-kilometers of cargo moved so far.
    pub fn total_torque(&self) -> f64 {
        self.cargo_net_weight() * self.travelled / 1000.0
    }

    pub fn reset(&mut self) {
        for l in &mut self.locomotives {
            l.reset();
        }
        for c in &mut self.cars {
            c.reset();
        }
        self.active_locos = (0..self.locomotives.len()).collect();
        self.active_tenders.clear();
        for (i, c) in self.cars.iter().enumerate() {
            if c.car_type.is_tender() {
                self.active_tenders.entry(c.car_type).or_insert_with(Vec::new).push(i);
            }
        }
        self.loaded = false;
        self.reached_destination = false;
        self.out_of_energy = false;
        self.travelled = 0.0;
        self.current_speed = 0.0;
        self.previous_speed = 0.0;
        self.current_acceleration = 0.0;
        self.previous_acceleration = 0.0;
        self.max_speed = 0.0;
        self.cum_lengths.clear();
        self.previous_node = self.path[0];
        self.current_links.clear();
        self.first_link = None;
        self.tractive_force = 0.0;
        self.resistance = 0.0;
        self.used_power.clear();
        self.used_power_total = 0.0;
        self.optimum_throttle = 1.0;
        self.optimum_throttle_levels.clear();
        self.lookahead_counter = 1;
        self.slow_warnings = 0;
        self.stats = TrainStats::default();
        self.events.clear();
    }
}

/// Front to back order of locomotives and cars.
pub fn arrange(n_locos: usize, n_cars: usize) -> Vec<VehicleRef> {
    use self::VehicleRef::*;
    let mut order = Vec::with_capacity(n_locos + n_cars);
    if n_locos == 1 || n_cars == 0 {
        order.extend((0..n_locos).map(Loco));
        order.extend((0..n_cars).map(Car));
    } else if n_locos < 7 || n_cars < 2 {
        let front = n_locos - n_locos / 2;
        order.extend((0..front).map(Loco));
        order.extend((0..n_cars).map(Car));
        order.extend((front..n_locos).map(Loco));
    } else {
        let third = n_locos / 3;
        let front_locos = n_locos - 2 * third;
        let front_cars = n_cars - n_cars / 2;
        order.extend((0..front_locos).map(Loco));
        order.extend((0..front_cars).map(Car));
        order.extend((front_locos..front_locos + third).map(Loco));
        order.extend((front_cars..n_cars).map(Car));
        order.extend((front_locos + third..n_locos).map(Loco));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::VehicleRef::*;

    #[test]
    fn single_locomotive_leads() {
        assert_eq!(arrange(1, 2), vec![Loco(0), Car(0), Car(1)]);
        assert_eq!(arrange(2, 0), vec![Loco(0), Loco(1)]);
    }

    #[test]
    fn moderate_consists_split_front_and_back() {
        assert_eq!(arrange(3, 2), vec![Loco(0), Loco(1), Car(0), Car(1), Loco(2)]);
    }

    #[test]
    fn large_consists_split_three_ways() {
        let order = arrange(7, 3);
        assert_eq!(order, vec![Loco(0), Loco(1), Loco(2), Car(0), Car(1),
                               Loco(3), Loco(4), Car(2), Loco(5), Loco(6)]);
    }
}
