//! Signal groups: clusters of signalized nodes that are controlled
//! together, so trains approaching a crossing from different directions
//! are given passage one direction at a time.

use std::collections::{BTreeMap, BTreeSet};
use smallvec::SmallVec;

use crate::network::{Network, NetworkError};
use crate::train::dynamics::safe_gap;
use crate::train::Train;

/// Seconds an unused lock survives before another direction may take it.
const LOCK_TIMEOUT: f64 = 5.0;

/// Controls the signals of one group of nodes. A granted request locks the
/// group for the requesting signal; every signal not in the lock holder's
/// direction is kept red while the lock lasts.
#[derive(Clone, Debug)]
pub struct SignalGroupController {
    pub nodes: BTreeSet<usize>,
    pub signals: BTreeSet<usize>,
    /// Links whose occupancy keeps the lock alive.
    pub confined_links: BTreeSet<usize>,
    movements: BTreeMap<usize, bool>,
    locked: Option<usize>,
    time_stamp: f64,
    other_direction: BTreeSet<usize>,
}

impl SignalGroupController {
    pub fn new(network: &Network, nodes: BTreeSet<usize>) -> Result<SignalGroupController, NetworkError> {
        let signals: BTreeSet<usize> = nodes.iter()
            .flat_map(|&n| network.nodes[n].signals.iter().cloned())
            .collect();
        let movements = signals.iter().map(|&s| (s, false)).collect();

        let mut confined_links = BTreeSet::new();
        if nodes.len() == 1 {
            for &n in &nodes {
                for links in network.nodes[n].neighbors.values() {
                    confined_links.extend(links.iter().cloned());
                }
            }
        } else {
            let list: Vec<usize> = nodes.iter().cloned().collect();
            for (i, &a) in list.iter().enumerate() {
                for &b in &list[i + 1..] {
                    confined_links.extend(network.links_on_shortest_path(a, b)?);
                }
            }
        }

        Ok(SignalGroupController {
            nodes,
            signals,
            confined_links,
            movements,
            locked: None,
            time_stamp: -2.0 * LOCK_TIMEOUT,
            other_direction: BTreeSet::new(),
        })
    }

    pub fn locked(&self) -> Option<usize> {
        self.locked
    }

    /// Asks for passage through `signal`. `same_direction` lists the group
    /// signals the requesting train will pass after it.
    pub fn send_pass_request(&mut self, signal: usize, time: f64, same_direction: &[usize]) {
        if self.locked == Some(signal) {
            self.time_stamp = time;
        } else if time - self.time_stamp > LOCK_TIMEOUT {
            self.time_stamp = time;
            self.clear();
            self.movements.insert(signal, true);
        }
        self.set_signals_in_same_direction(same_direction);
    }

    fn set_signals_in_same_direction(&mut self, same_direction: &[usize]) {
        if !self.other_direction.is_empty() {
            return;
        }
        let locked = self.locked;
        self.other_direction = self.signals.iter().cloned()
            .filter(|s| !same_direction.contains(s) && Some(*s) != locked)
            .collect();
    }

    /// Keeps the lock alive while its holder is still inside the group.
    pub fn update_time_step(&mut self, time: f64) {
        if self.locked.is_some() && self.nodes.len() > 1 {
            self.time_stamp = time;
        }
    }

    /// Current lock holder and the signals that must show red. A pending
    /// request is promoted to the lock first.
    pub fn feedback(&mut self) -> (Option<usize>, Vec<usize>) {
        if self.locked.is_none() {
            self.locked = self.movements.iter().find(|(_, &m)| m).map(|(&s, _)| s);
        }
        match self.locked {
            Some(s) => (Some(s), self.other_direction.iter().cloned().collect()),
            None => (None, Vec::new()),
        }
    }

    pub fn clear(&mut self) {
        for m in self.movements.values_mut() {
            *m = false;
        }
        self.locked = None;
        self.other_direction.clear();
    }
}

/// Distance at which a train starts requesting passage at each signal: the
/// largest safe gap of any train running through the signal at the link's
/// free-flow speed.
pub fn signal_proximities(network: &mut Network, trains: &[Train]) {
    for s in 0..network.signals.len() {
        let (previous, current, link) = {
            let sig = &network.signals[s];
            (sig.previous_node, sig.current_node, sig.link)
        };
        let ffs = network.links[link].free_flow_speed;
        let min_gap = trains.iter()
            .filter(|t| t.travels_from_to(previous, current))
            .map(|t| safe_gap(t.min_following_gap(), t.current_speed, ffs, t.t_s,
                              t.driver.desired_deceleration, true))
            .fold(std::f64::INFINITY, f64::min);
        if min_gap.is_finite() {
            let sig = &mut network.signals[s];
            sig.proximity = sig.proximity.max(min_gap);
        }
    }
}

/// Group signals the train passes in its own direction of travel,
/// including those it has already passed.
pub fn same_direction_signals(network: &Network, train: &Train, signals: &BTreeSet<usize>)
                              -> SmallVec<[usize; 4]> {
    signals.iter().cloned()
        .filter(|&s| {
            let sig = &network.signals[s];
            match (train.path_position(sig.previous_node), train.path_position(sig.current_node)) {
                (Some(p), Some(c)) => c == p + 1,
                _ => false,
            }
        })
        .collect()
}

fn is_subset(a: &[usize], b: &[usize]) -> bool {
    a.iter().all(|n| b.contains(n))
}

/// Signalized nodes both trains pass, in the order of the first train.
fn shared_signal_nodes(network: &Network, first: &Train, second: &Train) -> Vec<usize> {
    first.path.iter().cloned()
        .filter(|&n| second.path_position(n).is_some() && !network.nodes[n].signals.is_empty())
        .collect()
}

/// Merges overlapping sets until every pair is disjoint.
fn union_overlapping(mut groups: Vec<BTreeSet<usize>>) -> Vec<BTreeSet<usize>> {
    loop {
        let mut merged = false;
        'outer: for i in 0..groups.len() {
            for j in i + 1..groups.len() {
                if !groups[i].is_disjoint(&groups[j]) {
                    let other = groups.remove(j);
                    groups[i].extend(other);
                    merged = true;
                    break 'outer;
                }
            }
        }
        if !merged {
            return groups;
        }
    }
}

/// Groups signalized nodes shared by pairs of trains. Consecutive shared
/// nodes closer than a train can fit between, or joined by single track,
/// form one group.
pub fn define_signal_groups(network: &Network, trains: &[Train])
                            -> Result<Vec<SignalGroupController>, NetworkError> {
    let longest = trains.iter().map(|t| t.length).fold(0.0, f64::max);
    let min_gap = trains.iter().map(|t| t.min_following_gap()).fold(0.0, f64::max);
    let min_safe_distance = longest + min_gap;

    let mut groups: Vec<BTreeSet<usize>> = Vec::new();
    for (i, first) in trains.iter().enumerate() {
        for second in &trains[i + 1..] {
            if is_subset(&first.path, &second.path) || is_subset(&second.path, &first.path) {
                continue;
            }
            let shared = shared_signal_nodes(network, first, second);
            let mut current: BTreeSet<usize> = BTreeSet::new();
            for (k, &node) in shared.iter().enumerate() {
                if k == 0 {
                    current.insert(node);
                    continue;
                }
                let previous = shared[k - 1];
                let close = first.distance_between_nodes(network, previous, node)? < min_safe_distance;
                let single_track = match (first.path_position(previous), first.path_position(node)) {
                    (Some(a), Some(b)) => network.is_conflict_zone(&first.path, a, b),
                    _ => false,
                };
                if close || single_track {
                    current.insert(node);
                } else {
                    groups.push(std::mem::replace(&mut current, BTreeSet::new()));
                    current.insert(node);
                }
            }
            if !current.is_empty() {
                groups.push(current);
            }
        }
    }

    let mut controllers = Vec::new();
    for nodes in union_overlapping(groups) {
        debug!("Signal group at nodes {:?}", nodes.iter()
            .map(|&n| network.nodes[n].user_id)
            .collect::<Vec<_>>());
        controllers.push(SignalGroupController::new(network, nodes)?);
    }
    Ok(controllers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::records::{LinkRecord, NodeRecord};
    use crate::config::DriverParams;
    use crate::context::SimContext;
    use crate::tests::diesel_locomotive;

    fn crossing() -> Network {
        let nodes = vec![NodeRecord::new(1, -1000.0, 0.0),
                         NodeRecord::new(2, 0.0, 0.0),
                         NodeRecord::new(3, 1000.0, 0.0),
                         NodeRecord::new(4, 0.0, 1000.0)];
        let mut a = LinkRecord::new(1, 1, 2, 1000.0, 20.0);
        a.signal_id = 1;
        let mut b = LinkRecord::new(2, 4, 2, 1000.0, 20.0);
        b.signal_id = 2;
        let links = vec![a, LinkRecord::new(3, 2, 3, 1000.0, 20.0), b];
        Network::new(&mut SimContext::new(), &nodes, &links).unwrap()
    }

    #[test]
    fn one_direction_at_a_time() {
        let network = crossing();
        let mut group = SignalGroupController::new(&network, btreeset!{1}).unwrap();
        let west = network.signal_into(0, 1).unwrap();
        let north = network.signal_into(3, 1).unwrap();

        group.send_pass_request(west, 0.0, &[west]);
        let (holder, red) = group.feedback();
        assert_eq!(holder, Some(west));
        assert!(red.contains(&north));
        assert!(!red.contains(&west));

        // A competing request inside the lock window is not granted.
        group.send_pass_request(north, 2.0, &[north]);
        let (holder, red) = group.feedback();
        assert_eq!(holder, Some(west));
        assert!(red.contains(&north));

        // Once the holder stops refreshing, the lock moves on.
        group.send_pass_request(north, 8.0, &[north]);
        let (holder, red) = group.feedback();
        assert_eq!(holder, Some(north));
        assert!(red.contains(&west));
    }

    #[test]
    fn single_node_group_confines_adjacent_links() {
        let network = crossing();
        let group = SignalGroupController::new(&network, btreeset!{1}).unwrap();
        assert_eq!(group.confined_links.len(), 3);
        assert_eq!(group.signals.len(), 2);
        assert_eq!(network.signals.len(), 4);
    }

    #[test]
    fn overlapping_groups_are_merged() {
        let sets = vec![btreeset!{1, 2}, btreeset!{5}, btreeset!{2, 3}];
        let merged = union_overlapping(sets);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|g| g.len() == 3));
    }

    #[test]
    fn same_direction_includes_passed_signals() {
        let network = crossing();
        let group = SignalGroupController::new(&network, btreeset!{1}).unwrap();
        let west = network.signal_into(0, 1).unwrap();
        let north = network.signal_into(3, 1).unwrap();
        let mut train = Train::new(&mut SimContext::new(), &network, "a".to_string(), vec![0, 1, 2],
                                   0.0, 0.5, vec![diesel_locomotive("a")], vec![], false,
                                   DriverParams::default()).unwrap();

        let ahead = same_direction_signals(&network, &train, &group.signals);
        assert_eq!(ahead.to_vec(), vec![west]);

        // Beyond the crossing the west signal still counts as this direction.
        train.previous_node = 1;
        train.travelled = 1500.0;
        let behind = same_direction_signals(&network, &train, &group.signals);
        assert_eq!(behind.to_vec(), vec![west]);
        assert!(!behind.contains(&north));
    }
}
