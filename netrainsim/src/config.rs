use std::path::PathBuf;

/// Run-level settings of the simulator.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Length of one tick in seconds.
    pub time_step: f64,
    /// Simulation end time in seconds. Zero runs until every train is done.
    pub end_time: f64,
    /// Emit coordinate snapshots every n seconds, zero disables them.
    pub plot_frequency: u32,
    pub output_folder: PathBuf,
    pub summary_filename: String,
    /// Trajectory csv file name inside the output folder, `None` disables export.
    pub trajectory_filename: Option<String>,
    pub export_individual_summary: bool,
    /// Treat an acceleration jump above the train's max jerk as a fatal error.
    pub strict_jerk: bool,
}

impl Default for SimulatorConfig {
    fn default() -> SimulatorConfig {
        SimulatorConfig {
            time_step: 1.0,
            end_time: 0.0,
            plot_frequency: 0,
            output_folder: PathBuf::from("."),
            summary_filename: "trainSummary.txt".to_string(),
            trajectory_filename: None,
            export_individual_summary: false,
            strict_jerk: false,
        }
    }
}

impl SimulatorConfig {
    pub fn summary_path(&self) -> PathBuf {
        self.output_folder.join(&self.summary_filename)
    }

    pub fn trajectory_path(&self) -> Option<PathBuf> {
        self.trajectory_filename.as_ref().map(|f| self.output_folder.join(f))
    }
}

/// Behavioural constants of the driver of one train.
#[derive(Copy, Clone, Debug)]
pub struct DriverParams {
    /// Comfortable deceleration used by the safe gap (m/s^2).
    pub desired_deceleration: f64,
    pub reaction_time: f64,
    /// Largest allowed change of acceleration per second (m/s^3).
    pub max_jerk: f64,
    /// Gap kept to the rear of a leading train (m).
    pub min_following_gap: f64,
    pub stop_if_no_energy: bool,
    /// Weight of speed against energy in the throttle optimization, in [0,1].
    pub optimization_speed_weight: f64,
    pub run_optimization_every: u32,
    pub lookahead_steps: u32,
}

impl Default for DriverParams {
    fn default() -> DriverParams {
        DriverParams {
            desired_deceleration: 0.2,
            reaction_time: 1.0,
            max_jerk: 2.0,
            min_following_gap: 2.0,
            stop_if_no_energy: false,
            optimization_speed_weight: 0.0,
            run_optimization_every: 1,
            lookahead_steps: 1,
        }
    }
}
