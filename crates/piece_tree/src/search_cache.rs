use crate::rb_tree::{NodeId, RbTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheEntry {
    pub node: NodeId,
    pub node_start_offset: usize,
    /// 0 when the entry was recorded by an offset lookup.
    pub node_start_line_number: usize,
}

/// Remembers the most recently located nodes so nearby lookups skip the
/// descent from the root.
#[derive(Debug, Clone)]
pub(crate) struct SearchCache {
    limit: usize,
    entries: Vec<CacheEntry>,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SearchCache {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::with_capacity(limit),
        }
    }

    /// Entry whose node spans `offset`.
    pub fn get(&self, tree: &RbTree, offset: usize) -> Option<CacheEntry> {
        self.entries.iter().rev().copied().find(|e| {
            e.node_start_offset <= offset
                && e.node_start_offset + tree.piece(e.node).length >= offset
        })
    }

    /// Entry whose node contains the start of `line_number` past its first line.
    pub fn get2(&self, tree: &RbTree, line_number: usize) -> Option<CacheEntry> {
        self.entries.iter().rev().copied().find(|e| {
            e.node_start_line_number > 0
                && e.node_start_line_number < line_number
                && e.node_start_line_number + tree.piece(e.node).line_feed_cnt >= line_number
        })
    }

    pub fn set(&mut self, entry: CacheEntry) {
        if self.entries.len() >= self.limit {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    /// Drops entries at or after `offset`, which an edit has made stale.
    pub fn validate(&mut self, offset: usize) {
        self.entries.retain(|e| e.node_start_offset < offset);
    }

    /// Drops entries pointing at a node that has been freed.
    pub fn evict(&mut self, node: NodeId) {
        self.entries.retain(|e| e.node != node);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
