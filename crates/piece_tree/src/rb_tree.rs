use serde::{Deserialize, Serialize};

use crate::piece::Piece;

/// Handle of a node inside the arena.
pub type NodeId = usize;

/// The black nil-leaf. Slot 0 of every arena; its `parent` is scratch space
/// used while deleting.
pub const SENTINEL: NodeId = 0;

/// "No node". Freed slots point here until they are reused.
pub const NULL: NodeId = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeColor {
    Red,
    Black,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub piece: Piece,
    pub color: NodeColor,
    pub parent: NodeId,
    pub left: NodeId,
    pub right: NodeId,
    /// Total piece length of the left subtree.
    pub size_left: usize,
    /// Total line feed count of the left subtree.
    pub lf_left: usize,
}

impl TreeNode {
    fn new(piece: Piece, color: NodeColor) -> Self {
        Self {
            piece,
            color,
            parent: SENTINEL,
            left: SENTINEL,
            right: SENTINEL,
            size_left: 0,
            lf_left: 0,
        }
    }
}

/// Red-black tree of pieces stored in a flat arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbTree {
    nodes: Vec<TreeNode>,
    free: Vec<NodeId>,
    pub root: NodeId,
}

impl Default for RbTree {
    fn default() -> Self {
        Self::new()
    }
}

fn add_signed(value: usize, delta: isize) -> usize {
    value.saturating_add_signed(delta)
}

impl RbTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(Piece::default(), NodeColor::Black)],
            free: Vec::new(),
            root: SENTINEL,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root == SENTINEL
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 - self.free.len()
    }

    #[inline]
    pub fn node(&self, x: NodeId) -> &TreeNode {
        &self.nodes[x]
    }

    #[inline]
    pub fn node_mut(&mut self, x: NodeId) -> &mut TreeNode {
        &mut self.nodes[x]
    }

    #[inline]
    pub fn piece(&self, x: NodeId) -> &Piece {
        &self.nodes[x].piece
    }

    #[inline]
    pub fn parent(&self, x: NodeId) -> NodeId {
        self.nodes[x].parent
    }

    #[inline]
    pub fn left(&self, x: NodeId) -> NodeId {
        self.nodes[x].left
    }

    #[inline]
    pub fn right(&self, x: NodeId) -> NodeId {
        self.nodes[x].right
    }

    #[inline]
    fn color(&self, x: NodeId) -> NodeColor {
        self.nodes[x].color
    }

    #[inline]
    fn set_color(&mut self, x: NodeId, color: NodeColor) {
        self.nodes[x].color = color;
    }

    fn alloc(&mut self, piece: Piece) -> NodeId {
        let node = TreeNode::new(piece, NodeColor::Red);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, x: NodeId) {
        let node = &mut self.nodes[x];
        node.parent = NULL;
        node.left = NULL;
        node.right = NULL;
        self.free.push(x);
    }

    fn reset_sentinel(&mut self) {
        let s = &mut self.nodes[SENTINEL];
        s.parent = SENTINEL;
        s.left = SENTINEL;
        s.right = SENTINEL;
        s.color = NodeColor::Black;
        s.size_left = 0;
        s.lf_left = 0;
    }

    pub fn leftest(&self, mut x: NodeId) -> NodeId {
        while self.left(x) != SENTINEL {
            x = self.left(x);
        }
        x
    }

    pub fn rightest(&self, mut x: NodeId) -> NodeId {
        while self.right(x) != SENTINEL {
            x = self.right(x);
        }
        x
    }

    /// In-order successor, or [`SENTINEL`] after the last node.
    pub fn next(&self, x: NodeId) -> NodeId {
        if x == SENTINEL || x == NULL {
            return SENTINEL;
        }
        if self.right(x) != SENTINEL {
            return self.leftest(self.right(x));
        }

        let mut node = x;
        while self.parent(node) != SENTINEL {
            if self.left(self.parent(node)) == node {
                break;
            }
            node = self.parent(node);
        }
        self.parent(node)
    }

    /// In-order predecessor, or [`SENTINEL`] before the first node.
    pub fn prev(&self, x: NodeId) -> NodeId {
        if x == SENTINEL || x == NULL {
            return SENTINEL;
        }
        if self.left(x) != SENTINEL {
            return self.rightest(self.left(x));
        }

        let mut node = x;
        while self.parent(node) != SENTINEL {
            if self.right(self.parent(node)) == node {
                break;
            }
            node = self.parent(node);
        }
        self.parent(node)
    }

    /// Walks the tree in order. Stops early when `f` returns `false`, and
    /// reports whether the walk ran to completion.
    pub fn for_each_inorder<F: FnMut(NodeId) -> bool>(&self, mut f: F) -> bool {
        let mut stack: Vec<NodeId> = Vec::new();
        let mut cur = self.root;

        while cur != SENTINEL || !stack.is_empty() {
            while cur != SENTINEL {
                stack.push(cur);
                cur = self.left(cur);
            }

            let Some(node) = stack.pop() else { break };
            if !f(node) {
                return false;
            }
            cur = self.right(node);
        }
        true
    }

    /// Size of the subtree rooted at `x`, found by walking its right spine.
    pub fn calculate_size(&self, mut x: NodeId) -> usize {
        let mut size = 0;
        while x != SENTINEL {
            size += self.nodes[x].size_left + self.nodes[x].piece.length;
            x = self.right(x);
        }
        size
    }

    /// Line feed count of the subtree rooted at `x`.
    pub fn calculate_lf(&self, mut x: NodeId) -> usize {
        let mut count = 0;
        while x != SENTINEL {
            count += self.nodes[x].lf_left + self.nodes[x].piece.line_feed_cnt;
            x = self.right(x);
        }
        count
    }

    /// Offset of the first byte of `x` in the document.
    pub fn offset_of_node(&self, mut x: NodeId) -> usize {
        if x == NULL || x == SENTINEL {
            return 0;
        }
        let mut pos = self.nodes[x].size_left;
        while x != self.root {
            let parent = self.parent(x);
            if self.right(parent) == x {
                pos += self.nodes[parent].size_left + self.nodes[parent].piece.length;
            }
            x = parent;
        }
        pos
    }

    fn left_rotate(&mut self, x: NodeId) {
        let y = self.right(x);

        // fix size_left
        let (x_size, x_lf) = {
            let xn = &self.nodes[x];
            (xn.size_left + xn.piece.length, xn.lf_left + xn.piece.line_feed_cnt)
        };
        self.nodes[y].size_left += x_size;
        self.nodes[y].lf_left += x_lf;

        let y_left = self.left(y);
        self.nodes[x].right = y_left;
        if y_left != SENTINEL {
            self.nodes[y_left].parent = x;
        }

        let x_parent = self.parent(x);
        self.nodes[y].parent = x_parent;
        if x_parent == SENTINEL {
            self.root = y;
        } else if self.left(x_parent) == x {
            self.nodes[x_parent].left = y;
        } else {
            self.nodes[x_parent].right = y;
        }

        self.nodes[y].left = x;
        self.nodes[x].parent = y;
    }

    fn right_rotate(&mut self, y: NodeId) {
        let x = self.left(y);

        let x_right = self.right(x);
        self.nodes[y].left = x_right;
        if x_right != SENTINEL {
            self.nodes[x_right].parent = y;
        }
        let y_parent = self.parent(y);
        self.nodes[x].parent = y_parent;

        // fix size_left
        let (x_size, x_lf) = {
            let xn = &self.nodes[x];
            (xn.size_left + xn.piece.length, xn.lf_left + xn.piece.line_feed_cnt)
        };
        self.nodes[y].size_left -= x_size;
        self.nodes[y].lf_left -= x_lf;

        if y_parent == SENTINEL {
            self.root = x;
        } else if self.right(y_parent) == y {
            self.nodes[y_parent].right = x;
        } else {
            self.nodes[y_parent].left = x;
        }

        self.nodes[x].right = y;
        self.nodes[y].parent = x;
    }

    /// Inserts `piece` right after `node` in document order.
    ///
    /// ```text
    ///      node            node
    ///     /  \              /  \
    ///    a   b    <----   a    b
    ///                         /
    ///                        z
    /// ```
    pub fn insert_right(&mut self, node: NodeId, piece: Piece) -> NodeId {
        let z = self.alloc(piece);

        if self.root == SENTINEL {
            self.root = z;
            self.set_color(z, NodeColor::Black);
        } else if self.right(node) == SENTINEL {
            self.nodes[node].right = z;
            self.nodes[z].parent = node;
        } else {
            let next = self.leftest(self.right(node));
            self.nodes[next].left = z;
            self.nodes[z].parent = next;
        }

        self.fix_insert(z);
        z
    }

    /// Inserts `piece` right before `node` in document order.
    ///
    /// ```text
    ///      node            node
    ///     /  \              /  \
    ///    a   b     ---->   a    b
    ///                       \
    ///                        z
    /// ```
    pub fn insert_left(&mut self, node: NodeId, piece: Piece) -> NodeId {
        let z = self.alloc(piece);

        if self.root == SENTINEL {
            self.root = z;
            self.set_color(z, NodeColor::Black);
        } else if self.left(node) == SENTINEL {
            self.nodes[node].left = z;
            self.nodes[z].parent = node;
        } else {
            let prev = self.rightest(self.left(node));
            self.nodes[prev].right = z;
            self.nodes[z].parent = prev;
        }

        self.fix_insert(z);
        z
    }

    // ---------- Insert fix-up (RB insert balancing) ----------
    fn fix_insert(&mut self, mut x: NodeId) {
        self.recompute_tree_metadata(x);

        while x != self.root && self.color(self.parent(x)) == NodeColor::Red {
            let parent = self.parent(x);
            let grand = self.parent(parent);

            if parent == self.left(grand) {
                let uncle = self.right(grand);

                if self.color(uncle) == NodeColor::Red {
                    self.set_color(parent, NodeColor::Black);
                    self.set_color(uncle, NodeColor::Black);
                    self.set_color(grand, NodeColor::Red);
                    x = grand;
                } else {
                    if x == self.right(parent) {
                        x = parent;
                        self.left_rotate(x);
                    }
                    let parent = self.parent(x);
                    let grand = self.parent(parent);
                    self.set_color(parent, NodeColor::Black);
                    self.set_color(grand, NodeColor::Red);
                    self.right_rotate(grand);
                }
            } else {
                let uncle = self.left(grand);

                if self.color(uncle) == NodeColor::Red {
                    self.set_color(parent, NodeColor::Black);
                    self.set_color(uncle, NodeColor::Black);
                    self.set_color(grand, NodeColor::Red);
                    x = grand;
                } else {
                    if x == self.left(parent) {
                        x = parent;
                        self.right_rotate(x);
                    }
                    let parent = self.parent(x);
                    let grand = self.parent(parent);
                    self.set_color(parent, NodeColor::Black);
                    self.set_color(grand, NodeColor::Red);
                    self.left_rotate(grand);
                }
            }
        }

        let root = self.root;
        self.set_color(root, NodeColor::Black);
    }

    /// Removes `z` from the tree and frees its slot.
    pub fn delete(&mut self, z: NodeId) {
        let y;
        let mut x;

        if self.left(z) == SENTINEL {
            y = z;
            x = self.right(y);
        } else if self.right(z) == SENTINEL {
            y = z;
            x = self.left(y);
        } else {
            y = self.leftest(self.right(z));
            x = self.right(y);
        }

        if y == self.root {
            self.root = x;
            // x is SENTINEL when the only node goes away
            self.set_color(x, NodeColor::Black);
            self.release(z);
            self.reset_sentinel();
            self.nodes[x].parent = SENTINEL;
            return;
        }

        let y_was_red = self.color(y) == NodeColor::Red;

        let y_parent = self.parent(y);
        if y == self.left(y_parent) {
            self.nodes[y_parent].left = x;
        } else {
            self.nodes[y_parent].right = x;
        }

        if y == z {
            self.nodes[x].parent = y_parent;
            self.recompute_tree_metadata(x);
        } else {
            if y_parent == z {
                self.nodes[x].parent = y;
            } else {
                self.nodes[x].parent = y_parent;
            }

            // x's subtree changed shape, refresh its ancestors first
            self.recompute_tree_metadata(x);

            let (z_left, z_right, z_parent, z_color, z_size_left, z_lf_left) = {
                let zn = &self.nodes[z];
                (zn.left, zn.right, zn.parent, zn.color, zn.size_left, zn.lf_left)
            };
            {
                let yn = &mut self.nodes[y];
                yn.left = z_left;
                yn.right = z_right;
                yn.parent = z_parent;
                yn.color = z_color;
            }

            if z == self.root {
                self.root = y;
            } else if z == self.left(z_parent) {
                self.nodes[z_parent].left = y;
            } else {
                self.nodes[z_parent].right = y;
            }

            if self.left(y) != SENTINEL {
                let l = self.left(y);
                self.nodes[l].parent = y;
            }
            if self.right(y) != SENTINEL {
                let r = self.right(y);
                self.nodes[r].parent = y;
            }

            // y takes z's place, so it inherits z's left subtree totals
            self.nodes[y].size_left = z_size_left;
            self.nodes[y].lf_left = z_lf_left;
            self.recompute_tree_metadata(y);
        }

        self.release(z);

        let x_parent = self.parent(x);
        if self.left(x_parent) == x {
            let new_size_left = self.calculate_size(x);
            let new_lf_left = self.calculate_lf(x);
            let (old_size_left, old_lf_left) =
                (self.nodes[x_parent].size_left, self.nodes[x_parent].lf_left);
            if new_size_left != old_size_left || new_lf_left != old_lf_left {
                let delta = new_size_left as isize - old_size_left as isize;
                let lf_delta = new_lf_left as isize - old_lf_left as isize;
                self.nodes[x_parent].size_left = new_size_left;
                self.nodes[x_parent].lf_left = new_lf_left;
                self.update_tree_metadata(x_parent, delta, lf_delta);
            }
        }

        self.recompute_tree_metadata(x_parent);

        if y_was_red {
            self.reset_sentinel();
            return;
        }

        // RB-DELETE-FIXUP
        while x != self.root && self.color(x) == NodeColor::Black {
            let parent = self.parent(x);
            if x == self.left(parent) {
                let mut w = self.right(parent);

                if self.color(w) == NodeColor::Red {
                    self.set_color(w, NodeColor::Black);
                    self.set_color(parent, NodeColor::Red);
                    self.left_rotate(parent);
                    w = self.right(self.parent(x));
                }

                if self.color(self.left(w)) == NodeColor::Black
                    && self.color(self.right(w)) == NodeColor::Black
                {
                    self.set_color(w, NodeColor::Red);
                    x = self.parent(x);
                } else {
                    if self.color(self.right(w)) == NodeColor::Black {
                        let wl = self.left(w);
                        self.set_color(wl, NodeColor::Black);
                        self.set_color(w, NodeColor::Red);
                        self.right_rotate(w);
                        w = self.right(self.parent(x));
                    }

                    let parent = self.parent(x);
                    self.set_color(w, self.color(parent));
                    self.set_color(parent, NodeColor::Black);
                    let wr = self.right(w);
                    self.set_color(wr, NodeColor::Black);
                    self.left_rotate(parent);
                    x = self.root;
                }
            } else {
                let mut w = self.left(parent);

                if self.color(w) == NodeColor::Red {
                    self.set_color(w, NodeColor::Black);
                    self.set_color(parent, NodeColor::Red);
                    self.right_rotate(parent);
                    w = self.left(self.parent(x));
                }

                if self.color(self.left(w)) == NodeColor::Black
                    && self.color(self.right(w)) == NodeColor::Black
                {
                    self.set_color(w, NodeColor::Red);
                    x = self.parent(x);
                } else {
                    if self.color(self.left(w)) == NodeColor::Black {
                        let wr = self.right(w);
                        self.set_color(wr, NodeColor::Black);
                        self.set_color(w, NodeColor::Red);
                        self.left_rotate(w);
                        w = self.left(self.parent(x));
                    }

                    let parent = self.parent(x);
                    self.set_color(w, self.color(parent));
                    self.set_color(parent, NodeColor::Black);
                    let wl = self.left(w);
                    self.set_color(wl, NodeColor::Black);
                    self.right_rotate(parent);
                    x = self.root;
                }
            }
        }
        self.set_color(x, NodeColor::Black);
        self.reset_sentinel();
    }

    /// Propagates a length or line feed change of `x` to every ancestor whose
    /// left subtree contains it.
    pub fn update_tree_metadata(&mut self, mut x: NodeId, delta: isize, lf_delta: isize) {
        while x != self.root && x != SENTINEL {
            let parent = self.parent(x);
            if self.left(parent) == x {
                let pn = &mut self.nodes[parent];
                pn.size_left = add_signed(pn.size_left, delta);
                pn.lf_left = add_signed(pn.lf_left, lf_delta);
            }
            x = parent;
        }
    }

    /// Re-derives `size_left`/`lf_left` above `x` after its subtree changed shape.
    pub fn recompute_tree_metadata(&mut self, mut x: NodeId) {
        if x == self.root {
            return;
        }

        // go upwards till the node whose left subtree is changed
        while x != self.root && x == self.right(self.parent(x)) {
            x = self.parent(x);
        }

        if x == self.root {
            // appended at the end in order
            return;
        }

        x = self.parent(x);

        let left = self.left(x);
        let delta = self.calculate_size(left) as isize - self.nodes[x].size_left as isize;
        let lf_delta = self.calculate_lf(left) as isize - self.nodes[x].lf_left as isize;
        {
            let xn = &mut self.nodes[x];
            xn.size_left = add_signed(xn.size_left, delta);
            xn.lf_left = add_signed(xn.lf_left, lf_delta);
        }

        // go upwards till root, O(log n)
        while x != self.root && (delta != 0 || lf_delta != 0) {
            let parent = self.parent(x);
            if self.left(parent) == x {
                let pn = &mut self.nodes[parent];
                pn.size_left = add_signed(pn.size_left, delta);
                pn.lf_left = add_signed(pn.lf_left, lf_delta);
            }
            x = parent;
        }
    }

    /// Verifies red-black balance and the cached left-subtree totals.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.color(SENTINEL) != NodeColor::Black {
            return Err("sentinel is not black".into());
        }
        if self.root == SENTINEL {
            return Ok(());
        }
        if self.color(self.root) != NodeColor::Black {
            return Err("root is not black".into());
        }
        if self.parent(self.root) != SENTINEL {
            return Err("root has a parent".into());
        }
        self.check_subtree(self.root).map(|_| ())
    }

    /// Returns (black height, size, line feeds) of the subtree.
    fn check_subtree(&self, x: NodeId) -> Result<(usize, usize, usize), String> {
        if x == SENTINEL {
            return Ok((1, 0, 0));
        }
        let node = &self.nodes[x];
        if node.color == NodeColor::Red
            && (self.color(node.left) == NodeColor::Red || self.color(node.right) == NodeColor::Red)
        {
            return Err(format!("red node {x} has a red child"));
        }
        for child in [node.left, node.right] {
            if child != SENTINEL && self.parent(child) != x {
                return Err(format!("node {child} does not point back to parent {x}"));
            }
        }

        let (lh, lsize, llf) = self.check_subtree(node.left)?;
        let (rh, rsize, rlf) = self.check_subtree(node.right)?;
        if lh != rh {
            return Err(format!("black height differs under node {x}: {lh} vs {rh}"));
        }
        if node.size_left != lsize {
            return Err(format!(
                "node {x} caches size_left {} but left subtree has {lsize}",
                node.size_left
            ));
        }
        if node.lf_left != llf {
            return Err(format!(
                "node {x} caches lf_left {} but left subtree has {llf}",
                node.lf_left
            ));
        }

        let black = usize::from(node.color == NodeColor::Black);
        Ok((
            lh + black,
            lsize + node.piece.length + rsize,
            llf + node.piece.line_feed_cnt + rlf,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::BufferCursor;

    fn piece(len: usize, lf: usize) -> Piece {
        Piece::new(1, BufferCursor::new(0, 0), BufferCursor::new(lf, 0), lf, len)
    }

    fn lengths(tree: &RbTree) -> Vec<usize> {
        let mut out = Vec::new();
        tree.for_each_inorder(|n| {
            out.push(tree.piece(n).length);
            true
        });
        out
    }

    #[test]
    fn insert_right_keeps_order_and_balance() {
        let mut tree = RbTree::new();
        let mut last = SENTINEL;
        for len in 1..=50 {
            last = tree.insert_right(last, piece(len, len % 3));
            tree.check_invariants().unwrap();
        }
        assert_eq!(lengths(&tree), (1..=50).collect::<Vec<_>>());
        assert_eq!(tree.calculate_size(tree.root), (1..=50).sum::<usize>());
        assert_eq!(tree.node_count(), 50);
    }

    #[test]
    fn insert_left_prepends() {
        let mut tree = RbTree::new();
        let first = tree.insert_right(SENTINEL, piece(10, 0));
        let mut head = first;
        for len in (1..10).rev() {
            head = tree.insert_left(head, piece(len, 0));
        }
        tree.check_invariants().unwrap();
        assert_eq!(lengths(&tree), (1..=10).collect::<Vec<_>>());
        assert_eq!(tree.leftest(tree.root), head);
        assert_eq!(tree.rightest(tree.root), first);
    }

    #[test]
    fn next_and_prev_walk_in_order() {
        let mut tree = RbTree::new();
        let mut ids = Vec::new();
        let mut last = SENTINEL;
        for len in 1..=20 {
            last = tree.insert_right(last, piece(len, 0));
            ids.push(last);
        }
        for pair in ids.windows(2) {
            assert_eq!(tree.next(pair[0]), pair[1]);
            assert_eq!(tree.prev(pair[1]), pair[0]);
        }
        assert_eq!(tree.next(*ids.last().unwrap()), SENTINEL);
        assert_eq!(tree.prev(ids[0]), SENTINEL);
        assert_eq!(tree.offset_of_node(ids[4]), 1 + 2 + 3 + 4);
    }

    #[test]
    fn delete_reuses_slots_and_rebalances() {
        let mut tree = RbTree::new();
        let mut ids = Vec::new();
        let mut last = SENTINEL;
        for len in 1..=64 {
            last = tree.insert_right(last, piece(len, 1));
            ids.push(last);
        }
        for id in ids.iter().step_by(2) {
            tree.delete(*id);
            tree.check_invariants().unwrap();
        }
        assert_eq!(tree.node_count(), 32);
        assert_eq!(lengths(&tree), (1..=64).filter(|l| l % 2 == 0).collect::<Vec<_>>());
        assert_eq!(tree.calculate_lf(tree.root), 32);

        let reused = tree.insert_right(tree.rightest(tree.root), piece(100, 0));
        assert!(ids.contains(&reused));
        tree.check_invariants().unwrap();

        for id in tree_ids(&tree) {
            tree.delete(id);
            tree.check_invariants().unwrap();
        }
        assert!(tree.is_empty());
    }

    fn tree_ids(tree: &RbTree) -> Vec<NodeId> {
        let mut out = Vec::new();
        tree.for_each_inorder(|n| {
            out.push(n);
            true
        });
        out
    }

    #[test]
    fn update_metadata_propagates_to_ancestors() {
        let mut tree = RbTree::new();
        let mut last = SENTINEL;
        let mut ids = Vec::new();
        for _ in 0..16 {
            last = tree.insert_right(last, piece(4, 1));
            ids.push(last);
        }
        let target = ids[3];
        tree.node_mut(target).piece.length += 6;
        tree.node_mut(target).piece.line_feed_cnt += 2;
        tree.update_tree_metadata(target, 6, 2);
        tree.check_invariants().unwrap();
        assert_eq!(tree.calculate_size(tree.root), 16 * 4 + 6);
    }
}
