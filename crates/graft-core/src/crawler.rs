//! Reachability sweeps over a graph.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::debug;

use crate::error::Result;
use crate::node::{Graph, NodeId};

/// Receives nodes discovered while walking strong references.
pub trait GraphCrawler {
    fn accept(&mut self, id: NodeId);
}

/// Partitions other than `home` that resolved weak references point into,
/// in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedBlocks {
    home: String,
    recorded: IndexSet<String>,
}

impl ReferencedBlocks {
    pub fn new(home: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            recorded: IndexSet::new(),
        }
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    /// Returns `true` if `block` was newly recorded.
    pub fn record(&mut self, block: &str) -> bool {
        if block == self.home || self.recorded.contains(block) {
            return false;
        }
        self.recorded.insert(block.to_owned())
    }

    pub fn contains(&self, block: &str) -> bool {
        self.recorded.contains(block)
    }

    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.recorded.iter().map(String::as_str)
    }
}

/// Breadth-first, cycle-safe crawler. Weak references are never entered.
pub struct Sweeper<'g> {
    graph: &'g Graph,
    visited: HashSet<NodeId>,
    queue: VecDeque<NodeId>,
    blocks: Option<ReferencedBlocks>,
}

impl<'g> Sweeper<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            blocks: None,
        }
    }

    /// Also records foreign partitions reached through weak references.
    pub fn with_blocks(graph: &'g Graph, home: impl Into<String>) -> Self {
        Self {
            blocks: Some(ReferencedBlocks::new(home)),
            ..Self::new(graph)
        }
    }

    /// Visits everything reachable from `root` and returns it in visit
    /// order. Nodes already seen by an earlier crawl are not revisited.
    pub fn crawl(&mut self, root: NodeId) -> Result<Vec<NodeId>> {
        let graph = self.graph;
        let mut order = Vec::new();
        self.accept(root);
        while let Some(id) = self.queue.pop_front() {
            let descriptor = graph.descriptor(id)?;
            let node = graph.node(id)?;
            if let Some(blocks) = self.blocks.as_mut() {
                descriptor.collect_referenced_blocks(node, blocks)?;
            }
            descriptor.sweep(node, self)?;
            order.push(id);
        }
        debug!(root = %root, visited = order.len(), "sweep finished");
        Ok(order)
    }

    pub fn visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    pub fn blocks(&self) -> Option<&ReferencedBlocks> {
        self.blocks.as_ref()
    }

    pub fn into_blocks(self) -> Option<ReferencedBlocks> {
        self.blocks
    }
}

impl GraphCrawler for Sweeper<'_> {
    fn accept(&mut self, id: NodeId) {
        if self.visited.insert(id) {
            self.queue.push_back(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_block_is_never_recorded() {
        let mut blocks = ReferencedBlocks::new("home");
        assert!(!blocks.record("home"));
        assert!(blocks.record("b2"));
        assert!(!blocks.record("b2"));
        assert!(blocks.record("b1"));
        assert_eq!(blocks.iter().collect::<Vec<_>>(), vec!["b2", "b1"]);
    }
}
