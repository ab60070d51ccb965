/// Permission to move from `previous_node` into `current_node`.
#[derive(Clone, Debug)]
pub struct Signal {
    pub sim_id: usize,
    pub link: usize,
    pub previous_node: usize,
    pub current_node: usize,
    pub is_green: bool,
    /// Distance at which approaching trains start requesting passage.
    pub proximity: f64,
}

impl Signal {
    pub fn new(sim_id: usize, link: usize, previous_node: usize, current_node: usize) -> Signal {
        Signal {
            sim_id,
            link,
            previous_node,
            current_node,
            is_green: true,
            proximity: 0.0,
        }
    }
}
