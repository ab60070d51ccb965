extern crate smallvec;
extern crate ordered_float;
extern crate regex;
extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;
#[cfg(test)] #[macro_use] extern crate maplit;

pub mod context;
pub mod config;
pub mod geometry;
pub mod vehicles;
pub mod network;
pub mod train;
pub mod input;
pub mod output;
pub mod simulator;

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::config::{DriverParams, SimulatorConfig};
use crate::context::SimContext;
use crate::network::Network;
use crate::simulator::Simulator;
use crate::train::Train;

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f :&Path) -> AppResult<String> {
  use std::fs::File;
  use std::io::prelude::*;
  use std::io::BufReader;

  let file = File::open(f)?;
  let mut file = BufReader::new(&file);
  let mut contents = String::new();
  file.read_to_string(&mut contents)?;
  Ok(contents)
}

pub fn get_network(ctx :&mut SimContext, nodes :&Path, links :&Path) -> AppResult<Network> {
    let contents = read_file(nodes)?;
    let node_records = input::network_file::parse_nodes(&contents)?;
    let contents = read_file(links)?;
    let link_records = input::network_file::parse_links(&contents)?;
    Ok(Network::new(ctx, &node_records, &link_records)?)
}

pub fn get_trains(ctx :&mut SimContext, network :&Network, trains :&Path, driver :DriverParams)
    -> AppResult<Vec<Train>> {
    let contents = read_file(trains)?;
    get_trains_string(ctx, network, &contents, driver)
}

pub fn get_trains_string(ctx :&mut SimContext, network :&Network, s :&str, driver :DriverParams)
    -> AppResult<Vec<Train>> {
    let records = input::trains_file::parse_trains(s)?;
    let mut trains = Vec::new();
    for r in &records {
        trains.push(Train::from_record(ctx, network, r, driver)?);
    }
    Ok(trains)
}

/// Reads the three input files and builds a simulator ready to run.
pub fn load_simulation(nodes :&Path, links :&Path, trains :&Path,
                       driver :DriverParams, config :SimulatorConfig) -> AppResult<Simulator> {
    let mut ctx = SimContext::new();
    let network = get_network(&mut ctx, nodes, links)?;
    let trains = get_trains(&mut ctx, &network, trains, driver)?;
    Ok(Simulator::new(network, trains, config)?)
}
