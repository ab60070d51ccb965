/// Counters handing out simulator ids to the objects of one simulation.
/// Every network and fleet built for a run shares one context, so
/// independent simulations never see each other's numbering.
#[derive(Debug, Default, Clone)]
pub struct SimContext {
    nodes: usize,
    links: usize,
    signals: usize,
    trains: usize,
}

impl SimContext {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn next_node_id(&mut self) -> usize {
        let id = self.nodes;
        self.nodes += 1;
        id
    }

    pub fn next_link_id(&mut self) -> usize {
        let id = self.links;
        self.links += 1;
        id
    }

    pub fn next_signal_id(&mut self) -> usize {
        let id = self.signals;
        self.signals += 1;
        id
    }

    pub fn next_train_id(&mut self) -> usize {
        let id = self.trains;
        self.trains += 1;
        id
    }

    pub fn trains_created(&self) -> usize {
        self.trains
    }
}

#[test]
fn test_independent_counters() {
    let mut a = SimContext::new();
    let mut b = SimContext::new();
    assert_eq!(a.next_train_id(), 0);
    assert_eq!(a.next_train_id(), 1);
    assert_eq!(b.next_train_id(), 0);
    assert_eq!(a.next_node_id(), 0);
    assert_eq!(a.trains_created(), 2);
}
