extern crate netrainsim;
extern crate failure;
extern crate structopt;
extern crate log;
extern crate simple_logger;

use netrainsim::*;
use netrainsim::config::{DriverParams, SimulatorConfig};
use std::path::PathBuf;
use structopt::StructOpt;

/// NeTrainSim -- network multi-train simulation
#[derive(StructOpt, Debug)]
#[structopt(name="netrainsim")]
struct Opt {
    /// Verbose mode (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Nodes file
    #[structopt(parse(from_os_str))]
    nodes: PathBuf,

    /// Links file
    #[structopt(parse(from_os_str))]
    links: PathBuf,

    /// Trains file
    #[structopt(parse(from_os_str))]
    trains: PathBuf,

    /// Output folder for the summary and trajectory files
    #[structopt(short = "o", long = "output", parse(from_os_str), default_value = ".")]
    output: PathBuf,

    /// Summary file name
    #[structopt(short = "s", long = "summary", default_value = "trainSummary.txt")]
    summary: String,

    /// Simulation time step in seconds
    #[structopt(short = "t", long = "time-step", default_value = "1.0")]
    time_step: f64,

    /// Simulation end time in seconds, 0 runs until every train arrives
    #[structopt(short = "e", long = "end-time", default_value = "0")]
    end_time: f64,

    /// Report train coordinates every n seconds
    #[structopt(short = "p", long = "plot-frequency", default_value = "0")]
    plot_frequency: u32,

    /// Export the trajectory of every train to this csv file
    #[structopt(long = "trajectory")]
    trajectory: Option<String>,

    /// Add a block per train to the summary
    #[structopt(long = "individual")]
    individual: bool,

    /// Enable throttle optimization for every train
    #[structopt(long = "optimize")]
    optimize: bool,

    /// Abort when a train exceeds its maximum jerk
    #[structopt(long = "strict-jerk")]
    strict_jerk: bool,
}

fn run(opt :&Opt) -> AppResult<()> {
    let level = match opt.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new().with_level(level).init()
        .map_err(|e| failure::err_msg(e.to_string()))?;

    let config = SimulatorConfig {
        time_step: opt.time_step,
        end_time: opt.end_time,
        plot_frequency: opt.plot_frequency,
        output_folder: opt.output.clone(),
        summary_filename: opt.summary.clone(),
        trajectory_filename: opt.trajectory.clone(),
        export_individual_summary: opt.individual,
        strict_jerk: opt.strict_jerk,
    };

    let mut sim = load_simulation(&opt.nodes, &opt.links, &opt.trains,
                                  DriverParams::default(), config)?;
    if opt.optimize {
        for t in &mut sim.trains {
            t.optimize = true;
        }
    }

    let summary = sim.run()?;
    if opt.verbose >= 1 {
        for (k, v) in summary.pairs() {
            println!("  {}: {}", k, v);
        }
    }
    println!("Summary written to {}", sim.config.summary_path().display());
    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        },
    }
}
