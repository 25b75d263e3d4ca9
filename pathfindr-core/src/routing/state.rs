use std::{cmp::Ordering, collections::BinaryHeap};

use petgraph::graph::NodeIndex;

use crate::Cost;

/// Frontier entry: rank first, then admission order
#[derive(Copy, Clone, Debug)]
pub(crate) struct State {
    pub(crate) rank: Cost,
    pub(crate) seq: u64,
    pub(crate) node: NodeIndex,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

// Min-heap by rank, earliest admitted first on ties
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank
            .total_cmp(&self.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Binary heap with lazy deletion. Stale entries are left in place and
/// skipped by the caller when popped.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frontier {
    heap: BinaryHeap<State>,
    next_seq: u64,
}

impl Frontier {
    pub(crate) fn push(&mut self, node: NodeIndex, rank: Cost) {
        self.heap.push(State {
            rank,
            seq: self.next_seq,
            node,
        });
        self.next_seq += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<State> {
        self.heap.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
