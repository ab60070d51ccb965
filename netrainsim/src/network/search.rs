use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;
use std::cmp::Ordering;
use super::{Network, NetworkError};

#[derive(Eq, PartialEq, Debug)]
struct QueuedNode {
    dist: OrderedFloat<f64>,
    node: usize,
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &QueuedNode) -> Ordering {
        // Flipped to turn the max-heap into a min-heap.
        other.dist.cmp(&self.dist).
            then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &QueuedNode) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Network {
    /// Dijkstra over the node adjacency, weighted by the shortest link
    /// between neighbours. The search state lives in this call only, so
    /// repeated searches always start from a clean slate.
    pub fn shortest_path(&self, start: usize, target: usize)
                         -> Result<(Vec<usize>, f64), NetworkError> {
        let n = self.nodes.len();
        let mut dist = vec![std::f64::INFINITY; n];
        let mut previous: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut queue = BinaryHeap::new();

        dist[start] = 0.0;
        queue.push(QueuedNode { dist: OrderedFloat(0.0), node: start });

        while let Some(QueuedNode { dist: d, node }) = queue.pop() {
            if visited[node] { continue; }
            visited[node] = true;
            if node == target { break; }
            for (&next, links) in &self.nodes[node].neighbors {
                let w = links.iter()
                    .map(|&l| self.links[l].length)
                    .fold(std::f64::INFINITY, f64::min);
                let alt = *d + w;
                if alt < dist[next] {
                    dist[next] = alt;
                    previous[next] = Some(node);
                    queue.push(QueuedNode { dist: OrderedFloat(alt), node: next });
                }
            }
        }

        if !dist[target].is_finite() {
            return Err(NetworkError::NoPath(self.nodes[start].user_id,
                                            self.nodes[target].user_id));
        }

        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = previous[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Ok((path, dist[target]))
    }
}

#[test]
fn test_queue_ordering() {
    let mut q = BinaryHeap::new();
    q.push(QueuedNode { dist: OrderedFloat(12.0), node: 0 });
    q.push(QueuedNode { dist: OrderedFloat(3.0), node: 1 });
    q.push(QueuedNode { dist: OrderedFloat(7.0), node: 2 });
    assert_eq!(q.pop().unwrap().node, 1);
    assert_eq!(q.pop().unwrap().node, 2);
    assert_eq!(q.pop().unwrap().node, 0);
}
