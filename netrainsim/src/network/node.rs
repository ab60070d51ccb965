use std::collections::BTreeMap;
use crate::geometry::Point;

#[derive(Clone, Debug)]
pub struct Node {
    /// Number handed out by the simulation context.
    pub sim_id: usize,
    pub user_id: i64,
    pub x: f64,
    pub y: f64,
    pub description: String,
    pub is_depot: bool,
    pub dwell_time: f64,
    /// Signals guarding entry into this node.
    pub signals: Vec<usize>,
    /// Neighbour node index to the links reaching it from here.
    pub neighbors: BTreeMap<usize, Vec<usize>>,
}

impl Node {
    pub fn coordinates(&self) -> Point {
        (self.x, self.y)
    }
}
