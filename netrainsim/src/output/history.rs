use std::path::PathBuf;

use crate::geometry::Point;

/// Everything the simulator reports to its host while running.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// Percentage of the run completed.
    Progress(u8),
    /// Head and tail coordinates of every train on the network.
    TrainsCoordinates(Vec<(String, Vec<Point>)>),
    SlowOrStopped { train: String, message: String },
    SuddenAcceleration { train: String, message: String },
    LocomotiveOff { train: String, locomotive: String },
    Collision { first: String, second: String, time: f64 },
    DestinationReached { train: String, time: f64 },
    Finished { summary: Vec<(String, String)>, trajectory_file: Option<PathBuf> },
    Error(String),
}

/// Forwards an event to the `log` facade.
pub fn log_event(event: &SimulationEvent) {
    use self::SimulationEvent::*;
    match event {
        Progress(p) => trace!("progress {}%", p),
        TrainsCoordinates(c) => trace!("{} trains on the network", c.len()),
        SlowOrStopped { train, message } => warn!("train {}: {}", train, message),
        SuddenAcceleration { train, message } => warn!("train {}: {}", train, message),
        LocomotiveOff { train, locomotive } => warn!("train {}: locomotive {} is off", train, locomotive),
        Collision { first, second, time } => warn!("trains {} and {} collide at t={}", first, second, time),
        DestinationReached { train, time } => info!("train {} reached its destination at t={}", train, time),
        Finished { trajectory_file, .. } => match trajectory_file {
            Some(f) => info!("simulation finished, trajectory in {}", f.display()),
            None => info!("simulation finished"),
        },
        Error(e) => error!("{}", e),
    }
}

