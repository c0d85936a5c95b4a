use std::{cmp::Ordering, collections::BinaryHeap};

const INVALID_NODE: usize = usize::MAX;

#[derive(Copy, Clone, Debug)]
struct HeapItem {
    node_id: usize,
    weight: f64,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &HeapItem) -> bool {
        self.weight == other.weight && self.node_id == other.node_id
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &HeapItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip weight to make this a min-heap
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

struct NodeData {
    weight: f64,
    settled: bool,
    parent: usize,
}

impl NodeData {
    fn new() -> Self {
        NodeData {
            weight: f64::INFINITY,
            settled: false,
            parent: INVALID_NODE,
        }
    }
}

pub struct ShortestPath {
    pub weight: f64,
    pub nodes: Vec<usize>,
}

/// Dijkstra over a graph of `node_count` nodes whose adjacency is produced on
/// demand by `neighbors`, which pushes `(adjacent node, edge weight)` pairs.
pub struct Dijkstra {
    heap: BinaryHeap<HeapItem>,
    data: Vec<NodeData>,
    adjacent: Vec<(usize, f64)>,
}

impl Dijkstra {
    pub fn new(node_count: usize) -> Self {
        Dijkstra {
            heap: BinaryHeap::with_capacity(node_count),
            data: (0..node_count).map(|_| NodeData::new()).collect(),
            adjacent: Vec::with_capacity(node_count),
        }
    }

    fn build_path(&self, end: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(16);
        let mut node = end;

        while node != INVALID_NODE {
            path.push(node);
            node = self.data[node].parent;
        }

        path.reverse();
        path
    }

    pub fn calc_path<F>(mut self, start: usize, end: usize, mut neighbors: F) -> Option<ShortestPath>
    where
        F: FnMut(usize, &mut Vec<(usize, f64)>),
    {
        if start >= self.data.len() || end >= self.data.len() {
            return None;
        }

        self.data[start].weight = 0.0;
        self.heap.push(HeapItem {
            node_id: start,
            weight: 0.0,
        });

        while let Some(HeapItem { node_id, weight }) = self.heap.pop() {
            if self.data[node_id].settled || weight > self.data[node_id].weight {
                continue;
            }

            self.data[node_id].settled = true;

            if node_id == end {
                return Some(ShortestPath {
                    weight,
                    nodes: self.build_path(end),
                });
            }

            let mut adjacent = std::mem::take(&mut self.adjacent);
            adjacent.clear();
            neighbors(node_id, &mut adjacent);

            for &(adj_node, edge_weight) in &adjacent {
                if self.data[adj_node].settled || !edge_weight.is_finite() {
                    continue;
                }

                let next_weight = weight + edge_weight;

                if next_weight < self.data[adj_node].weight {
                    self.data[adj_node].weight = next_weight;
                    self.data[adj_node].parent = node_id;
                    self.heap.push(HeapItem {
                        node_id: adj_node,
                        weight: next_weight,
                    });
                }
            }

            self.adjacent = adjacent;
        }

        None
    }
}
