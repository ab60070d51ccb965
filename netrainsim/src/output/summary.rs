//! Run summary: network totals, aggregated train statistics and optional
//! per-train blocks. Written once at the end of a run.

use std::collections::BTreeMap;
use std::io;

use crate::network::Network;
use crate::train::Train;

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    fn new(title: &str) -> Section {
        Section { title: title.to_string(), entries: Vec::new() }
    }

    fn add<V: ToString>(&mut self, key: &str, value: V) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    fn num(&mut self, key: &str, value: f64) {
        self.add(key, format!("{:.3}", value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub sections: Vec<Section>,
}

/// `dd:hh:mm:ss`.
pub fn format_duration(seconds: f64) -> String {
    let s = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}:{:02}", s / 86400, (s % 86400) / 3600, (s % 3600) / 60, s % 60)
}

fn per(value: f64, by: f64) -> f64 {
    if by > 0.0 { value / by } else { 0.0 }
}

impl Summary {
    pub fn build(network: &Network, trains: &[Train], simulation_time: f64,
                 individual: bool) -> Summary {
        let stats = network.stats();
        let net_weight: f64 = trains.iter().map(|t| t.cargo_net_weight()).sum();
        let torque: f64 = trains.iter().map(|t| t.total_torque()).sum();

        let mut n = Section::new("NETWORK STATISTICS");
        n.add("Nodes Count", network.nodes.len());
        n.add("Links Count", network.links.len());
        n.num("Total Lengths of All Links (meters)", stats.total_length);
        n.num("Total Lengths of All Links with Catenary (meters)", stats.catenary_length);
        n.add("Total Signals", network.signals.len());
        n.add("Total Number of Trains on Network", trains.len());
        n.num("Percentage of Links with Catenaries to All Links (%)", stats.catenary_links_percent);
        n.add("Number of Trains with Enabled Trajectory Optimization",
              trains.iter().filter(|t| t.optimize).count());
        let catenary_net = stats.catenary_consumed - stats.catenary_regenerated;
        n.num("Catenary Total Energy Consumed (KW.h)", catenary_net);
        n.num("Average Catenary Energy Consumption per Net Weight (KW.h/ton)", per(catenary_net, net_weight));
        n.num("Average Catenary Energy Consumption per Net ton.km (KW.hx10^3/ton.km)",
              per(catenary_net * 1000.0, torque));
        n.num("Catenary Energy Consumed (KW.h)", stats.catenary_consumed);
        n.num("Catenary Energy Regenerated (KW.h)", stats.catenary_regenerated);

        let mut a = Section::new("AGGREGATED/ACCUMULATED TRAINS STATISTICS");
        let locos: usize = trains.iter().map(|t| t.locomotives.len()).sum();
        let cars: usize = trains.iter().map(|t| t.cars.len()).sum();
        a.add("Number of Locomotives/Cars", format!("{}/{}", locos, cars));
        let mut technologies = BTreeMap::new();
        for t in trains {
            for l in &t.locomotives {
                *technologies.entry(l.power_type.to_string()).or_insert(0) += 1;
            }
        }
        a.add("Locomotives (Technology, count)", technologies.iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", "));
        a.add("Operating Locomotives to End of Trains Trip",
              trains.iter().flat_map(|t| t.locomotives.iter()).filter(|l| l.is_on).count());
        a.num("Total Cargo Net Weight (ton)", net_weight);
        a.add("Simulation Time (dd:hh:mm:ss)", format_duration(simulation_time));
        a.add("Trains Reached Destination", format!("{}/{}",
              trains.iter().filter(|t| t.reached_destination).count(), trains.len()));
        a.num("Average Trains Travel Time (seconds)",
              per(trains.iter().map(|t| t.stats.trip_time).sum(), trains.len() as f64));
        a.num("Total Delay Time To Each Link Free Flow Speed (seconds)",
              trains.iter().map(|t| t.stats.cum_max_delay).sum());
        a.num("Total Delay Time To Slowest Link Free Flow Speed (seconds)",
              trains.iter().map(|t| t.stats.cum_delay).sum());
        a.num("Total Stoppings", trains.iter().map(|t| t.stats.cum_stopped).sum());

        let consumed: f64 = trains.iter().map(|t| t.stats.total_consumed).sum();
        let regenerated: f64 = trains.iter().map(|t| t.stats.total_regenerated).sum();
        let net = consumed - regenerated;
        a.num("Total Energy Consumed (KW.h)", consumed);
        a.num("Total Energy Regenerated (KW.h)", regenerated);
        a.num("Net Energy Consumed (KW.h)", net);
        a.num("Average Energy Consumption per Net Weight (KW.h/ton)", per(net, net_weight));
        a.num("Average Energy Consumption per Net ton.km (KW.hx10^3/ton.km)", per(net * 1000.0, torque));
        a.num("Total Cargo ton.km", torque);

        let mut fuels = BTreeMap::new();
        let mut regions = BTreeMap::new();
        for t in trains {
            for (f, v) in t.fuel_consumed() {
                *fuels.entry(f).or_insert(0.0) += v;
            }
            for (r, v) in &t.stats.regional_energy {
                *regions.entry(r.clone()).or_insert(0.0) += *v;
            }
        }
        for (f, v) in &fuels {
            a.num(&format!("Total {} Consumed", f), *v);
        }
        a.num("Total CO2 Emitted (kg)", trains.iter().map(|t| t.stats.co2).sum::<f64>() / 1000.0);
        for (r, v) in &regions {
            a.num(&format!("Net Energy Consumed in {} (KW.h)", r), *v);
        }

        let mut sections = vec![n, a];
        if individual {
            sections.extend(trains.iter().map(train_section));
        }
        Summary { sections }
    }

    /// Flattened `(description, value)` pairs, section titles excluded.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.sections.iter().flat_map(|s| s.entries.iter().cloned()).collect()
    }

    pub fn write<W: io::Write>(&self, f: &mut W) -> io::Result<()> {
        writeln!(f, "~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~")?;
        writeln!(f, "NETRAINSIM SIMULATION SUMMARY")?;
        writeln!(f, "~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~.~\n")?;
        for s in &self.sections {
            writeln!(f, "+ {}:", s.title)?;
            for (k, v) in &s.entries {
                writeln!(f, "  |_ {:<76}: {}", k, v)?;
            }
            writeln!(f, "....................................................\n")?;
        }
        Ok(())
    }
}

fn train_section(t: &Train) -> Section {
    let mut s = Section::new(&format!("TRAIN {}", t.name));
    s.add("Reached Destination", t.reached_destination);
    s.add("Out of Energy", t.out_of_energy);
    s.num("Travelled Distance (meters)", t.travelled);
    s.num("Travel Time (seconds)", t.stats.trip_time);
    s.num("Average Speed (meter/second)", t.stats.average_speed);
    s.num("Average Acceleration (meter/square second)", t.stats.average_acceleration);
    s.num("Maximum Speed (meter/second)", t.max_speed);
    s.num("Delay Time To Each Link Free Flow Speed (seconds)", t.stats.cum_max_delay);
    s.num("Delay Time To Slowest Link Free Flow Speed (seconds)", t.stats.cum_delay);
    s.num("Stoppings", t.stats.cum_stopped);
    s.num("Energy Consumed (KW.h)", t.stats.total_consumed);
    s.num("Energy Regenerated (KW.h)", t.stats.total_regenerated);
    s.num("Net Energy Consumed (KW.h)", t.stats.cum_energy);
    let (battery_consumed, battery_regenerated) = t.battery_energy();
    s.num("Battery Energy Consumed (KW.h)", battery_consumed);
    s.num("Battery Energy Regenerated (KW.h)", battery_regenerated);
    s.num("Average Locomotives Battery State of Charge (%)", t.average_locomotive_battery_soc() * 100.0);
    s.num("Average Locomotives Tank State of Capacity (%)", t.average_locomotive_tank_level() * 100.0);
    s.num("Average Tenders Tank State of Capacity (%)", t.average_tender_tank_level() * 100.0);
    s.num("Average Tenders Battery State of Charge (%)", t.average_tender_battery_level() * 100.0);
    for (f, v) in t.fuel_consumed() {
        s.num(&format!("Consumed {}", f), v);
    }
    s.num("CO2 Emitted (kg)", t.stats.co2 / 1000.0);
    s.num("Cargo Net Weight (ton)", t.cargo_net_weight());
    s.num("Cargo ton.km", t.total_torque());
    s.num("Energy per Net Weight (KW.h/ton)", per(t.stats.cum_energy, t.cargo_net_weight()));
    s.num("Energy per ton.km (KW.hx10^3/ton.km)", per(t.stats.cum_energy * 1000.0, t.total_torque()));
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_roll_over() {
        assert_eq!(format_duration(0.0), "00:00:00:00");
        assert_eq!(format_duration(90061.0), "01:01:01:01");
    }

    #[test]
    fn written_summary_lists_every_entry() {
        let mut s = Section::new("X");
        s.num("a", 1.0);
        s.add("b", "yes");
        let summary = Summary { sections: vec![s] };
        let mut out = Vec::new();
        summary.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("+ X:"));
        assert!(text.contains(": 1.000"));
        assert_eq!(summary.pairs(), vec![("a".to_string(), "1.000".to_string()),
                                         ("b".to_string(), "yes".to_string())]);
    }
}
