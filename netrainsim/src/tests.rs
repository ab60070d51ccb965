use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{DriverParams, SimulatorConfig};
use crate::context::SimContext;
use crate::input::records::{LinkRecord, NodeRecord};
use crate::network::Network;
use crate::output::history::SimulationEvent;
use crate::output::trajectory::TrajectoryRow;
use crate::simulator::{SimulationError, Simulator};
use crate::train::{Train, TrainError};
use crate::vehicles::{Car, FuelType, Locomotive, PowerType, Tank};
use crate::vehicles::energy::conversion_factor;

pub fn diesel_locomotive(name: &str) -> Locomotive {
    Locomotive::new(name.to_string(), 3000.0, 0.85, 22.0, 0.0055, 15.0, 200.0, 6,
                    PowerType::Diesel).unwrap()
}

/// Straight line of links with the given lengths, node user ids 1, 2, ...
pub fn line_network(lengths: &[f64], free_flow_speed: f64) -> (SimContext, Network) {
    let mut ctx = SimContext::new();
    let mut x = 0.0;
    let mut nodes = vec![NodeRecord::new(1, 0.0, 0.0)];
    let mut links = Vec::new();
    for (i, l) in lengths.iter().enumerate() {
        x += l;
        nodes.push(NodeRecord::new(i as i64 + 2, x, 0.0));
        links.push(LinkRecord::new(i as i64 + 1, i as i64 + 1, i as i64 + 2, *l, free_flow_speed));
    }
    let network = Network::new(&mut ctx, &nodes, &links).unwrap();
    (ctx, network)
}

/// A train running the whole line from its first node, starting at t=0.
pub fn train_on(ctx: &mut SimContext, network: &Network, locomotives: Vec<Locomotive>,
                cars: Vec<Car>) -> Train {
    let name = format!("train{}", ctx.trains_created());
    let path = (0..network.nodes.len()).collect();
    Train::new(ctx, network, name, path, 0.0, 0.5, locomotives, cars, false,
               DriverParams::default()).unwrap()
}

fn quiet_config(end_time: f64) -> SimulatorConfig {
    SimulatorConfig { end_time, ..SimulatorConfig::default() }
}

/// Steps the simulator until all trains are done or `limit` is passed.
fn run_rows(sim: &mut Simulator, limit: f64) -> Vec<TrajectoryRow> {
    let mut rows = Vec::new();
    while !sim.all_trains_reached() && sim.time <= limit {
        rows.extend(sim.step().unwrap());
    }
    rows
}

fn collect_events(sim: &mut Simulator) -> Rc<RefCell<Vec<SimulationEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let log = events.clone();
    sim.set_logger(Box::new(move |e| log.borrow_mut().push(e)));
    events
}

#[test]
fn test_single_train() {
    let (mut ctx, network) = line_network(&[10000.0, 8000.0], 20.0);
    let train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    let mut sim = Simulator::new(network, vec![train], quiet_config(0.0)).unwrap();
    let events = collect_events(&mut sim);

    let rows = run_rows(&mut sim, 7200.0);
    let t = &sim.trains[0];
    assert!(t.reached_destination);
    assert_eq!(t.travelled, 18000.0);
    assert!(t.stats.trip_time > 18000.0 / 20.0);
    assert!(t.stats.trip_time < 7200.0);
    assert!(t.stats.cum_energy > 0.0);

    let max_jerk = t.driver.max_jerk;
    let (mut last, mut last_acceleration) = (0.0, 0.0);
    for r in &rows {
        assert!(r.travelled >= last);
        assert!(r.speed >= 0.0 && r.speed <= 20.0 + 1e-9);
        assert!((r.acceleration - last_acceleration).abs() <= max_jerk * sim.config.time_step + 1e-6,
                "jerk {} at t={}", r.acceleration - last_acceleration, r.time);
        last = r.travelled;
        last_acceleration = r.acceleration;
    }
    assert!(events.borrow().iter().any(|e| match e {
        SimulationEvent::DestinationReached { train, .. } => train == "train0",
        _ => false,
    }));
    assert!(!events.borrow().iter().any(|e| match e {
        SimulationEvent::SuddenAcceleration { .. } => true,
        _ => false,
    }));
}

#[test]
fn test_fuel_matches_consumption() {
    let (mut ctx, network) = line_network(&[5000.0], 20.0);
    let train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    let mut sim = Simulator::new(network, vec![train], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);
    run_rows(&mut sim, 3600.0);

    let train = &sim.trains[0];
    let body = &train.locomotives[0].body;
    let burned = body.tank.initial_capacity() - body.tank.current_capacity();
    let expected = train.stats.total_consumed * conversion_factor(FuelType::Diesel);
    assert!(burned > 0.0);
    assert!((burned - expected).abs() < 1e-6, "burned {} L, energy implies {} L", burned, expected);
    assert!(body.current_weight < body.initial_weight);
}

#[test]
fn test_deterministic() {
    let build = || {
        let (mut ctx, network) = line_network(&[3000.0, 2000.0], 15.0);
        let a = train_on(&mut ctx, &network, vec![diesel_locomotive("a")], vec![]);
        let mut b = train_on(&mut ctx, &network, vec![diesel_locomotive("b")], vec![]);
        b.start_time = 30.0;
        let mut sim = Simulator::new(network, vec![a, b], quiet_config(0.0)).unwrap();
        collect_events(&mut sim);
        sim
    };
    let first = run_rows(&mut build(), 3600.0);
    let second = run_rows(&mut build(), 3600.0);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_following_gap() {
    let (mut ctx, network) = line_network(&[10000.0, 8000.0], 20.0);
    let leader = train_on(&mut ctx, &network, vec![diesel_locomotive("a")], vec![]);
    let mut follower = train_on(&mut ctx, &network, vec![diesel_locomotive("b")], vec![]);
    follower.start_time = 60.0;
    let mut sim = Simulator::new(network, vec![leader, follower], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);

    while !sim.all_trains_reached() && sim.time <= 7200.0 {
        sim.step().unwrap();
        let (l, f) = (&sim.trains[0], &sim.trains[1]);
        if l.is_active() && f.is_active() {
            let gap = l.travelled - l.length - f.travelled;
            assert!(gap >= f.min_following_gap(), "gap {} at t={}", gap, sim.time);
        }
    }
    assert!(sim.trains.iter().all(|t| t.reached_destination));
    assert!(sim.collisions.is_empty());
}

#[test]
fn test_origin_waits_for_previous_train() {
    let (mut ctx, network) = line_network(&[4000.0], 20.0);
    let a = train_on(&mut ctx, &network, vec![diesel_locomotive("a")], vec![]);
    let b = train_on(&mut ctx, &network, vec![diesel_locomotive("b")], vec![]);
    let mut sim = Simulator::new(network, vec![a, b], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);
    sim.step().unwrap();
    assert!(sim.trains[0].loaded);
    assert!(!sim.trains[1].loaded);
    run_rows(&mut sim, 3600.0);
    assert!(sim.trains[1].reached_destination);
}

#[test]
fn test_idle_time_is_skipped() {
    let (mut ctx, network) = line_network(&[1000.0], 20.0);
    let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    train.start_time = 500.0;
    let mut sim = Simulator::new(network, vec![train], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);
    let rows = sim.step().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time, 500.0);
    assert_eq!(sim.time, 501.0);
}

#[test]
fn test_crossing_is_granted_one_way_at_a_time() {
    let mut ctx = SimContext::new();
    let nodes = vec![NodeRecord::new(1, -1000.0, 0.0),
                     NodeRecord::new(2, 0.0, 0.0),
                     NodeRecord::new(3, 1000.0, 0.0),
                     NodeRecord::new(4, 0.0, 1000.0),
                     NodeRecord::new(5, 0.0, -1000.0)];
    let mut west = LinkRecord::new(1, 1, 2, 1000.0, 20.0);
    west.signal_id = 1;
    let mut north = LinkRecord::new(2, 4, 2, 1000.0, 20.0);
    north.signal_id = 2;
    let links = vec![west, north,
                     LinkRecord::new(3, 2, 3, 1000.0, 20.0),
                     LinkRecord::new(4, 2, 5, 1000.0, 20.0)];
    let network = Network::new(&mut ctx, &nodes, &links).unwrap();
    let a = Train::new(&mut ctx, &network, "a".to_string(), vec![0, 1, 2], 0.0, 0.5,
                       vec![diesel_locomotive("a")], vec![], false, DriverParams::default()).unwrap();
    let b = Train::new(&mut ctx, &network, "b".to_string(), vec![3, 1, 4], 0.0, 0.5,
                       vec![diesel_locomotive("b")], vec![], false, DriverParams::default()).unwrap();
    let mut sim = Simulator::new(network, vec![a, b], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);

    assert_eq!(sim.signal_groups.len(), 1);
    assert_eq!(sim.signal_groups[0].nodes, btreeset!{1});
    let from_west = sim.network.signal_into(0, 1).unwrap();
    let from_north = sim.network.signal_into(3, 1).unwrap();

    let mut north_held = false;
    let mut locked_ticks = 0;
    while !sim.all_trains_reached() && sim.time <= 3600.0 {
        sim.step().unwrap();
        let signals = &sim.network.signals;
        let approaching = sim.trains.iter().all(|t| t.travelled < 1000.0);
        if sim.signal_groups[0].locked().is_some() && approaching {
            locked_ticks += 1;
            assert!(!(signals[from_west].is_green && signals[from_north].is_green),
                    "both approaches green at t={}", sim.time);
        }
        if !signals[from_north].is_green {
            north_held = true;
        }
    }
    assert!(locked_ticks > 0);
    assert!(north_held);
    assert!(sim.trains.iter().all(|t| t.reached_destination));
    assert!(sim.collisions.is_empty());
}

#[test]
fn test_strict_jerk_aborts() {
    let (mut ctx, network) = line_network(&[5000.0], 20.0);
    let mut train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    train.driver.max_jerk = 0.01;
    let config = SimulatorConfig { strict_jerk: true, ..quiet_config(0.0) };
    let mut sim = Simulator::new(network, vec![train], config).unwrap();
    collect_events(&mut sim);

    let mut failure = None;
    while !sim.all_trains_reached() && sim.time <= 3600.0 {
        if let Err(e) = sim.step() {
            failure = Some(e);
            break;
        }
    }
    match failure {
        Some(SimulationError::Train(TrainError::JerkViolation { jerk, max_jerk, .. })) => {
            assert!(jerk > max_jerk);
        }
        x => panic!("expected a jerk violation, got {:?}", x),
    }
}

#[test]
fn test_out_of_fuel() {
    let (mut ctx, network) = line_network(&[5000.0], 20.0);
    let mut loco = diesel_locomotive("l");
    loco.set_tank(Tank::with_fuel(0.001));
    let mut train = train_on(&mut ctx, &network, vec![loco], vec![]);
    train.driver.stop_if_no_energy = true;
    let mut sim = Simulator::new(network, vec![train], quiet_config(0.0)).unwrap();
    let events = collect_events(&mut sim);
    run_rows(&mut sim, 3600.0);

    assert!(sim.trains[0].out_of_energy);
    assert!(!sim.trains[0].locomotives[0].is_on);

    // The driver halts a train without energy on its next step.
    sim.step().unwrap();
    let t = &sim.trains[0];
    assert!(!t.reached_destination);
    assert_eq!(t.current_speed, 0.0);
    assert!(events.borrow().iter().any(|e| match e {
        SimulationEvent::LocomotiveOff { locomotive, .. } => locomotive == "l",
        _ => false,
    }));
}

/// Simulator with one diesel train on a 5 km line whose tank is `tank`.
fn fuel_limited(tank: Option<Tank>) -> Simulator {
    let (mut ctx, network) = line_network(&[5000.0], 20.0);
    let mut loco = diesel_locomotive("l");
    if let Some(tank) = tank {
        loco.set_tank(tank);
    }
    let train = train_on(&mut ctx, &network, vec![loco], vec![]);
    let mut sim = Simulator::new(network, vec![train], quiet_config(0.0)).unwrap();
    collect_events(&mut sim);
    sim
}

#[test]
fn test_tank_for_one_step_runs_dry() {
    let mut reference = fuel_limited(None);
    reference.step().unwrap();
    let one_step = reference.trains[0].locomotives[0].body.fuel_consumed;
    assert!(one_step > 0.0);

    let mut sim = fuel_limited(Some(Tank::with_fuel(one_step)));
    sim.step().unwrap();
    let loco = &sim.trains[0].locomotives[0];
    assert!(loco.body.tank.current_capacity().abs() < 1e-9);
    assert!((loco.body.fuel_consumed - one_step).abs() < 1e-12);
    assert!(loco.is_on);

    sim.step().unwrap();
    let loco = &sim.trains[0].locomotives[0];
    assert!(!loco.is_on);
    assert!((loco.body.fuel_consumed - one_step).abs() < 1e-12);
    assert!(sim.trains[0].out_of_energy);
}

#[test]
fn test_progress_reported_every_tick() {
    let mut sim = fuel_limited(None);
    let events = collect_events(&mut sim);
    for _ in 0..5 {
        sim.step().unwrap();
    }
    let progress: Vec<u8> = events.borrow().iter()
        .filter_map(|e| match e {
            SimulationEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 5);
    assert_eq!(sim.progress, progress[4]);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_run_writes_summary_and_trajectory() {
    let dir = std::env::temp_dir().join(format!("netrainsim-run-{}", std::process::id()));
    let (mut ctx, network) = line_network(&[2000.0], 20.0);
    let train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    let config = SimulatorConfig {
        output_folder: dir.clone(),
        trajectory_filename: Some("trajectory.csv".to_string()),
        export_individual_summary: true,
        ..SimulatorConfig::default()
    };
    let mut sim = Simulator::new(network, vec![train], config).unwrap();
    let events = collect_events(&mut sim);
    let summary = sim.run().unwrap();

    assert!(summary.pairs().iter().any(|(k, v)| k == "Trains Reached Destination" && v == "1/1"));
    let written = std::fs::read_to_string(dir.join("trainSummary.txt")).unwrap();
    assert!(written.contains("TRAIN train0"));
    let trajectory = std::fs::read_to_string(dir.join("trajectory.csv")).unwrap();
    assert!(trajectory.lines().count() > 2);
    assert!(trajectory.starts_with("TrainNo,"));
    assert!(events.borrow().iter().any(|e| match e {
        SimulationEvent::Finished { trajectory_file: Some(f), .. } => f.ends_with("trajectory.csv"),
        _ => false,
    }));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cancel_stops_run() {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let dir = std::env::temp_dir().join(format!("netrainsim-cancel-{}", std::process::id()));
    let (mut ctx, network) = line_network(&[2000.0], 20.0);
    let train = train_on(&mut ctx, &network, vec![diesel_locomotive("l")], vec![]);
    let config = SimulatorConfig { output_folder: dir.clone(), ..SimulatorConfig::default() };
    let mut sim = Simulator::new(network, vec![train], config).unwrap();
    collect_events(&mut sim);
    sim.set_cancel_flag(Arc::new(AtomicBool::new(true)));
    sim.run().unwrap();
    assert_eq!(sim.time, 0.0);
    assert!(!sim.trains[0].loaded);
    assert!(dir.join("trainSummary.txt").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_trains_file_to_simulation() {
    let (mut ctx, network) = line_network(&[3000.0, 3000.0], 20.0);
    let text = "trains\n1\n\
                t1\t1,2,3\t0\t0.5\t1,3000,0.85,6,0.0055,15,22,200,0\t2,4,0.0055,10,15,80,25\n";
    let trains = crate::get_trains_string(&mut ctx, &network, text, DriverParams::default()).unwrap();
    assert_eq!(trains.len(), 1);
    assert_eq!(trains[0].cars.len(), 2);
    let mut sim = Simulator::new(network, trains, quiet_config(0.0)).unwrap();
    collect_events(&mut sim);
    run_rows(&mut sim, 7200.0);
    assert!(sim.trains[0].reached_destination);
    assert!(sim.trains[0].cargo_net_weight() > 0.0);
}
