//! Rail network: nodes, links and signals stored in arenas and referenced
//! by index, plus the distance bookkeeping along a train's fixed path.

use std::collections::{BTreeSet, HashMap};
use ordered_float::OrderedFloat;

use crate::context::SimContext;
use crate::geometry::{self, Point};
use crate::input::records::{NodeRecord, LinkRecord};
use crate::train::Train;
use crate::vehicles::CatenaryTally;

pub mod node;
pub mod link;
pub mod signal;
pub mod search;

pub use self::node::Node;
pub use self::link::Link;
pub use self::signal::Signal;

/// Signal code in the links file marking the end node as a depot.
pub const DEPOT_SIGNAL_CODE: i64 = 10001;
/// Gap to another train's rear required before sharing a parallel link.
const SHARED_LINK_GAP: f64 = 2.0;

#[derive(Debug, Fail)]
pub enum NetworkError {
    #[fail(display = "node {} is not part of the network", _0)]
    UnknownNode(i64),
    #[fail(display = "no link connects node {} to node {}", _0, _1)]
    NoLink(i64, i64),
    #[fail(display = "link {} must have a positive length", _0)]
    InvalidLinkLength(i64),
    #[fail(display = "link {} must have a positive free flow speed", _0)]
    InvalidSpeed(i64),
    #[fail(display = "no path from node {} to node {}", _0, _1)]
    NoPath(i64, i64),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkStats {
    pub total_length: f64,
    pub catenary_length: f64,
    /// Share of links with catenary, in percent.
    pub catenary_links_percent: f64,
    pub catenary_consumed: f64,
    pub catenary_regenerated: f64,
}

#[derive(Clone, Debug)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub signals: Vec<Signal>,
    node_by_user_id: HashMap<i64, usize>,
}

impl Network {
    pub fn new(ctx: &mut SimContext,
               node_records: &[NodeRecord],
               link_records: &[LinkRecord])
               -> Result<Network, NetworkError> {
        let mut nodes = Vec::new();
        let mut node_by_user_id = HashMap::new();
        for r in node_records {
            node_by_user_id.insert(r.user_id, nodes.len());
            nodes.push(Node {
                sim_id: ctx.next_node_id(),
                user_id: r.user_id,
                x: r.x * r.x_scale,
                y: r.y * r.y_scale,
                description: r.description.clone(),
                is_depot: false,
                dwell_time: 0.0,
                signals: Vec::new(),
                neighbors: Default::default(),
            });
        }

        let mut net = Network {
            nodes,
            links: Vec::new(),
            signals: Vec::new(),
            node_by_user_id,
        };

        for r in link_records {
            let from = net.node_index(r.from)?;
            let to = net.node_index(r.to)?;
            let length = if r.length > 0.0 {
                r.length * r.length_scale
            } else {
                geometry::distance(net.nodes[from].coordinates(), net.nodes[to].coordinates())
            };
            if !(length > 0.0) {
                return Err(NetworkError::InvalidLinkLength(r.user_id));
            }
            let ffs = r.free_flow_speed * r.speed_scale;
            if !(ffs > 0.0) {
                return Err(NetworkError::InvalidSpeed(r.user_id));
            }

            let idx = net.links.len();
            let mut link = Link::new(ctx.next_link_id(), r.user_id, from, to, length, ffs,
                                     r.grade, r.curvature, r.directions);
            link.signal_id = r.signal_id;
            link.speed_variation = r.speed_variation;
            link.region = r.region.clone();
            if r.has_catenary {
                link.catenary = Some(CatenaryTally::default());
            }

            net.nodes[from].neighbors.entry(to).or_insert_with(Vec::new).push(idx);
            if !link.is_one_way() {
                net.nodes[to].neighbors.entry(from).or_insert_with(Vec::new).push(idx);
            }

            if r.signal_id == DEPOT_SIGNAL_CODE {
                net.nodes[to].is_depot = true;
            } else if r.signal_id != 0 {
                net.add_signal(ctx, idx, from, to);
                if !link.is_one_way() {
                    net.add_signal(ctx, idx, to, from);
                }
            }
            net.links.push(link);
        }

        Ok(net)
    }

    fn add_signal(&mut self, ctx: &mut SimContext, link: usize, previous: usize, current: usize) {
        let idx = self.signals.len();
        self.signals.push(Signal::new(ctx.next_signal_id(), link, previous, current));
        self.nodes[current].signals.push(idx);
    }

    pub fn node_index(&self, user_id: i64) -> Result<usize, NetworkError> {
        self.node_by_user_id.get(&user_id).cloned().ok_or(NetworkError::UnknownNode(user_id))
    }

    pub fn coordinates(&self, node: usize) -> Point {
        self.nodes[node].coordinates()
    }

    /// Links leading from `a` to `b`.
    pub fn links_between(&self, a: usize, b: usize) -> &[usize] {
        self.nodes[a].neighbors.get(&b).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn no_link(&self, a: usize, b: usize) -> NetworkError {
        NetworkError::NoLink(self.nodes[a].user_id, self.nodes[b].user_id)
    }

    fn by_cost(&self, candidates: &[usize]) -> Vec<usize> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by_key(|&l| (OrderedFloat(self.links[l].cost), l));
        sorted
    }

    /// Cheapest link from `a` to `b`, ignoring occupancy.
    pub fn cheapest_link(&self, a: usize, b: usize) -> Result<usize, NetworkError> {
        self.by_cost(self.links_between(a, b)).first().cloned().ok_or_else(|| self.no_link(a, b))
    }

    /// Link a train uses from `a` to `b`. A link the train already occupies
    /// wins; otherwise the cheapest link that is empty or only holds trains
    /// heading the same way with enough room behind them.
    pub fn link_for_train(&self, trains: &[Train], train: &Train, a: usize, b: usize)
                          -> Result<usize, NetworkError> {
        let candidates = self.links_between(a, b);
        match candidates.len() {
            0 => return Err(self.no_link(a, b)),
            1 => return Ok(candidates[0]),
            _ => {}
        }
        if let Some(&l) = candidates.iter().find(|&&l| self.links[l].trains.contains(&train.id)) {
            return Ok(l);
        }
        let sorted = self.by_cost(candidates);
        for &l in &sorted {
            let usable = self.links[l].trains.iter()
                .filter(|&&t| t != train.id)
                .all(|&t| {
                    let other = &trains[t];
                    other.travels_from_to(a, b) &&
                        geometry::distance(other.tail, train.head) >= SHARED_LINK_GAP
                });
            if usable {
                return Ok(l);
            }
        }
        Ok(sorted[0])
    }

    /// Static length of a node path over the cheapest links.
    pub fn path_length(&self, path: &[usize]) -> Result<f64, NetworkError> {
        let mut total = 0.0;
        for w in path.windows(2) {
            total += self.links[self.cheapest_link(w[0], w[1])?].length;
        }
        Ok(total)
    }

    /// Distance from the path start to every node of the path.
    pub fn cum_lengths(&self, trains: &[Train], train: &Train) -> Result<Vec<f64>, NetworkError> {
        let mut cum = Vec::with_capacity(train.path.len());
        cum.push(0.0);
        for w in train.path.windows(2) {
            let l = self.link_for_train(trains, train, w[0], w[1])?;
            let last = cum[cum.len() - 1];
            cum.push(last + self.links[l].length);
        }
        Ok(cum)
    }

    /// Path index of the node last passed at distance `d`.
    pub fn previous_node_index(&self, train: &Train, d: f64) -> usize {
        let cum = &train.cum_lengths;
        let next = cum.iter().position(|&c| c > d).unwrap_or(cum.len() - 1).max(1);
        next - 1
    }

    pub fn link_at_distance(&self, trains: &[Train], train: &Train, d: f64)
                            -> Result<usize, NetworkError> {
        let i = self.previous_node_index(train, d);
        self.link_for_train(trains, train, train.path[i], train.path[i + 1])
    }

    pub fn distance_to_node(&self, train: &Train, path_index: usize, d: f64) -> f64 {
        train.cum_lengths[path_index] - d
    }

    /// Coordinates at `d` meters along the train's path.
    pub fn position(&self, train: &Train, d: f64) -> Point {
        let path = &train.path;
        let cum = &train.cum_lengths;
        if d <= 0.0 {
            return self.coordinates(path[0]);
        }
        if d >= cum[cum.len() - 1] {
            return self.coordinates(path[path.len() - 1]);
        }
        let i = self.previous_node_index(train, d);
        let origin = self.coordinates(path[i]);
        let end = self.coordinates(path[i + 1]);
        let direction = (end.0 - origin.0, end.1 - origin.1);
        let segment = cum[i + 1] - cum[i];
        let along = if segment > 0.0 {
            (d - cum[i]) / segment * geometry::distance(origin, end)
        } else {
            0.0
        };
        geometry::position_on_vector(origin, direction, along)
    }

    /// True when some stretch of the path between the two indices has no
    /// parallel track.
    pub fn is_conflict_zone(&self, path: &[usize], from: usize, to: usize) -> bool {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        (from..to).any(|k| {
            let (a, b) = (path[k], path[k + 1]);
            let distinct: BTreeSet<usize> = self.links_between(a, b).iter()
                .chain(self.links_between(b, a).iter())
                .cloned()
                .collect();
            distinct.len() <= 1
        })
    }

    /// Every link (parallel ones included) along the shortest path between
    /// two nodes.
    pub fn links_on_shortest_path(&self, a: usize, b: usize) -> Result<Vec<usize>, NetworkError> {
        let (path, _) = self.shortest_path(a, b)?;
        let mut links = BTreeSet::new();
        for w in path.windows(2) {
            links.extend(self.links_between(w[0], w[1]).iter().cloned());
            links.extend(self.links_between(w[1], w[0]).iter().cloned());
        }
        Ok(links.into_iter().collect())
    }

    /// Signal guarding the move from `previous` into `node`.
    pub fn signal_into(&self, previous: usize, node: usize) -> Option<usize> {
        self.nodes[node].signals.iter().cloned()
            .find(|&s| self.signals[s].previous_node == previous)
    }

    pub fn set_all_signals_green(&mut self) {
        for s in &mut self.signals {
            s.is_green = true;
        }
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        let mut with_catenary = 0;
        for l in &self.links {
            stats.total_length += l.length;
            if let Some(c) = &l.catenary {
                with_catenary += 1;
                stats.catenary_length += l.length;
                stats.catenary_consumed += c.consumed;
                stats.catenary_regenerated += c.regenerated;
            }
        }
        if !self.links.is_empty() {
            stats.catenary_links_percent = 100.0 * with_catenary as f64 / self.links.len() as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Network {
        let nodes = vec![NodeRecord::new(1, 0.0, 0.0),
                         NodeRecord::new(2, 1000.0, 0.0),
                         NodeRecord::new(3, 1000.0, 500.0)];
        let mut l1 = LinkRecord::new(10, 1, 2, 0.0, 20.0);
        l1.signal_id = 5;
        let mut l2 = LinkRecord::new(11, 2, 3, 0.0, 20.0);
        l2.signal_id = DEPOT_SIGNAL_CODE;
        l2.has_catenary = true;
        Network::new(&mut SimContext::new(), &nodes, &[l1, l2]).unwrap()
    }

    #[test]
    fn lengths_from_coordinates() {
        let net = line();
        assert_eq!(net.links[0].length, 1000.0);
        assert_eq!(net.links[1].length, 500.0);
        assert_eq!(net.path_length(&[0, 1, 2]).unwrap(), 1500.0);
    }

    #[test]
    fn signals_and_depots() {
        let net = line();
        assert_eq!(net.signals.len(), 2);
        assert_eq!(net.signal_into(0, 1), Some(0));
        assert_eq!(net.signal_into(1, 0), Some(1));
        assert!(net.nodes[2].is_depot);
        assert_eq!(net.signal_into(1, 2), None);
    }

    #[test]
    fn shortest_path_is_repeatable() {
        let net = line();
        let first = net.shortest_path(0, 2).unwrap();
        let second = net.shortest_path(0, 2).unwrap();
        assert_eq!(first.0, vec![0, 1, 2]);
        assert_eq!(first.1, 1500.0);
        assert_eq!(first, second);
        assert_eq!(net.shortest_path(2, 0).unwrap().0, vec![2, 1, 0]);
    }

    #[test]
    fn unknown_node_and_zero_length() {
        let nodes = vec![NodeRecord::new(1, 0.0, 0.0), NodeRecord::new(2, 0.0, 0.0)];
        let bad = LinkRecord::new(1, 1, 7, 10.0, 10.0);
        match Network::new(&mut SimContext::new(), &nodes, &[bad]) {
            Err(NetworkError::UnknownNode(7)) => {}
            x => panic!("unexpected {:?}", x.map(|_| ())),
        }
        let zero = LinkRecord::new(1, 1, 2, 0.0, 10.0);
        assert!(Network::new(&mut SimContext::new(), &nodes, &[zero]).is_err());
    }

    #[test]
    fn conflict_zone_without_parallel_track() {
        let nodes = vec![NodeRecord::new(1, 0.0, 0.0),
                         NodeRecord::new(2, 100.0, 0.0),
                         NodeRecord::new(3, 200.0, 0.0)];
        let links = vec![LinkRecord::new(1, 1, 2, 0.0, 10.0),
                         LinkRecord::new(2, 1, 2, 0.0, 10.0),
                         LinkRecord::new(3, 2, 3, 0.0, 10.0)];
        let net = Network::new(&mut SimContext::new(), &nodes, &links).unwrap();
        assert!(!net.is_conflict_zone(&[0, 1, 2], 0, 1));
        assert!(net.is_conflict_zone(&[0, 1, 2], 0, 2));
        assert_eq!(net.links_on_shortest_path(0, 1).unwrap(), vec![0, 1]);
    }

    #[test]
    fn catenary_stats() {
        let mut net = line();
        if let Some(c) = &mut net.links[1].catenary {
            c.consumed = 4.0;
        }
        let stats = net.stats();
        assert_eq!(stats.total_length, 1500.0);
        assert_eq!(stats.catenary_length, 500.0);
        assert_eq!(stats.catenary_links_percent, 50.0);
        assert_eq!(stats.catenary_consumed, 4.0);
    }
}
