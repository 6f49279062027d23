use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{
    PageId, RecordId, Result, StratumError, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::btree_page::{BTreeNode, BTreeNodeRef, INTERNAL_CAPACITY, LEAF_CAPACITY};
use super::{BTreeIterator, IntegerComparator, KeyComparator};

/// B+Tree index over the buffer pool.
///
/// Keys are unique u64 values ordered by the comparator; values are
/// `RecordId`s. Nodes live in pages and are touched exclusively through
/// page guards, so every fetch is paired with an unpin on every exit path
/// and a node is written back dirty only when it was actually mutated.
///
/// The header page persists `index_name -> root_page_id`, so an index can
/// be reopened by name against the same backing file.
pub struct BPlusTree<C: KeyComparator = IntegerComparator> {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree<IntegerComparator> {
    /// Opens (or creates) an integer-keyed index called `index_name`.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        Self::with_comparator(index_name, bpm, IntegerComparator, leaf_max_size, internal_max_size)
    }
}

impl<C: KeyComparator> BPlusTree<C> {
    pub fn with_comparator(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        assert!(
            (3..=LEAF_CAPACITY).contains(&leaf_max_size),
            "leaf_max_size out of range"
        );
        assert!(
            (3..=INTERNAL_CAPACITY).contains(&internal_max_size),
            "internal_max_size out of range"
        );

        let index_name = index_name.into();
        let root_page_id = {
            let mut guard = bpm
                .write_page(HEADER_PAGE_ID)?
                .ok_or(StratumError::PoolExhausted)?;
            if !HeaderPageRef::new(guard.data()).is_valid() {
                HeaderPage::new(guard.data_mut()).init();
            }
            let existing = HeaderPageRef::new(guard.data()).find_record(&index_name);
            match existing {
                Some(root) => root,
                None => {
                    HeaderPage::new(guard.data_mut()).insert_record(&index_name, INVALID_PAGE_ID)?;
                    INVALID_PAGE_ID
                }
            }
        };

        Ok(Self {
            index_name,
            root_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Point query: Ok(None) when the key is absent.
    pub fn get(&self, key: u64) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let leaf_pid = self.find_leaf(key)?;
        let guard = self.read_guard(leaf_pid)?;
        let node = BTreeNodeRef::new(guard.data());

        match node.leaf_search(key, &self.comparator) {
            Ok(idx) => Ok(Some(node.leaf_value_at(idx))),
            Err(_) => Ok(None),
        }
    }

    /// Inserts a key/value pair. Returns false (tree unchanged) on a
    /// duplicate key.
    pub fn insert(&mut self, key: u64, value: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }

        let leaf_pid = self.find_leaf(key)?;

        enum Plan {
            InPlace(usize),
            Split,
        }

        let plan = {
            let guard = self.read_guard(leaf_pid)?;
            let node = BTreeNodeRef::new(guard.data());
            match node.leaf_search(key, &self.comparator) {
                Ok(_) => return Ok(false),
                Err(idx) => {
                    if node.size() < self.leaf_max_size {
                        Plan::InPlace(idx)
                    } else {
                        Plan::Split
                    }
                }
            }
        };

        match plan {
            Plan::InPlace(idx) => {
                let mut guard = self.write_guard(leaf_pid)?;
                BTreeNode::new(guard.data_mut()).leaf_insert_at(idx, key, value);
            }
            Plan::Split => self.split_leaf_and_insert(leaf_pid, key, value)?,
        }
        Ok(true)
    }

    /// Removes a key. Returns false when the key is absent. Underflowing
    /// nodes are redistributed or merged so the half-full invariant holds
    /// for every non-root node.
    pub fn remove(&mut self, key: u64) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        let leaf_pid = self.find_leaf(key)?;

        let (is_root, new_size) = {
            let mut guard = self.write_guard(leaf_pid)?;
            let idx = match BTreeNodeRef::new(guard.data()).leaf_search(key, &self.comparator) {
                Ok(idx) => idx,
                Err(_) => return Ok(false),
            };
            let mut node = BTreeNode::new(guard.data_mut());
            node.leaf_remove_at(idx);
            (node.is_root(), node.size())
        };

        if is_root {
            if new_size == 0 {
                debug!(root = %leaf_pid, "tree emptied");
                self.set_root(INVALID_PAGE_ID)?;
                self.bpm.delete_page(leaf_pid)?;
            }
            return Ok(true);
        }

        if new_size < self.min_leaf_size() {
            self.rebalance_leaf(leaf_pid)?;
        }
        Ok(true)
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::new(
                Arc::clone(&self.bpm),
                INVALID_PAGE_ID,
                0,
            ));
        }

        let mut current = self.root_page_id;
        loop {
            let guard = self.read_guard(current)?;
            let node = BTreeNodeRef::new(guard.data());
            if node.is_leaf() {
                return Ok(BTreeIterator::new(Arc::clone(&self.bpm), current, 0));
            }
            let next = node.child_at(0);
            drop(guard);
            current = next;
        }
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn begin_at(&self, key: u64) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::new(
                Arc::clone(&self.bpm),
                INVALID_PAGE_ID,
                0,
            ));
        }

        let leaf_pid = self.find_leaf(key)?;
        let index = {
            let guard = self.read_guard(leaf_pid)?;
            match BTreeNodeRef::new(guard.data()).leaf_search(key, &self.comparator) {
                Ok(idx) | Err(idx) => idx,
            }
        };
        Ok(BTreeIterator::new(Arc::clone(&self.bpm), leaf_pid, index))
    }

    /// Descends from the root to the leaf whose range covers `key`.
    fn find_leaf(&self, key: u64) -> Result<PageId> {
        let mut current = self.root_page_id;
        loop {
            let guard = self.read_guard(current)?;
            let node = BTreeNodeRef::new(guard.data());
            if node.is_leaf() {
                return Ok(current);
            }
            let next = node.child_at(node.child_index_for(key, &self.comparator));
            drop(guard);
            current = next;
        }
    }

    fn start_new_tree(&mut self, key: u64, value: RecordId) -> Result<()> {
        let root_pid = {
            let mut guard = self.new_node()?;
            let pid = guard.page_id();
            let mut node = BTreeNode::new(guard.data_mut());
            node.init_leaf(pid, self.leaf_max_size);
            node.set_is_root(true);
            node.leaf_insert_at(0, key, value);
            pid
        };
        debug!(root = %root_pid, "created tree root");
        self.set_root(root_pid)
    }

    /// Splits a full leaf around the midpoint and inserts the new key into
    /// the correct half; the new right leaf's first key is promoted.
    fn split_leaf_and_insert(&mut self, leaf_pid: PageId, key: u64, value: RecordId) -> Result<()> {
        let (moved, old_next, parent_pid, insert_idx, mid, lands_right) = {
            let mut guard = self.write_guard(leaf_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            let insert_idx = match node.leaf_search(key, &self.comparator) {
                Err(idx) => idx,
                Ok(_) => {
                    return Err(StratumError::IndexCorrupted(
                        "duplicate key reached the split path".into(),
                    ))
                }
            };
            let size = node.size();
            // The new key lands in the right half when its slot falls past
            // the midpoint; the midpoint then shifts right by one.
            let lands_right = insert_idx > size / 2;
            let mid = size / 2 + lands_right as usize;
            let moved: Vec<(u64, RecordId)> = (mid..size)
                .map(|i| (node.leaf_key_at(i), node.leaf_value_at(i)))
                .collect();
            node.set_size(mid);
            let old_next = node.next_page_id();
            let parent_pid = node.parent_page_id();
            if !lands_right {
                node.leaf_insert_at(insert_idx, key, value);
            }
            (moved, old_next, parent_pid, insert_idx, mid, lands_right)
        };

        let (new_pid, separator) = {
            let mut guard = self.new_node()?;
            let pid = guard.page_id();
            let mut node = BTreeNode::new(guard.data_mut());
            node.init_leaf(pid, self.leaf_max_size);
            node.set_parent_page_id(parent_pid);
            node.set_next_page_id(old_next);
            for (i, (k, v)) in moved.iter().enumerate() {
                node.leaf_set_pair(i, *k, *v);
            }
            node.set_size(moved.len());
            if lands_right {
                node.leaf_insert_at(insert_idx - mid, key, value);
            }
            (pid, node.leaf_key_at(0))
        };

        {
            let mut guard = self.write_guard(leaf_pid)?;
            BTreeNode::new(guard.data_mut()).set_next_page_id(new_pid);
        }

        debug!(left = %leaf_pid, right = %new_pid, "split leaf");
        self.insert_into_parent(leaf_pid, separator, new_pid, parent_pid)
    }

    /// Hooks a freshly split-off right node into the parent, growing a new
    /// root when the split node was the root.
    fn insert_into_parent(
        &mut self,
        left_pid: PageId,
        key: u64,
        right_pid: PageId,
        parent_pid: PageId,
    ) -> Result<()> {
        if !parent_pid.is_valid() {
            return self.make_new_root(left_pid, key, right_pid);
        }

        let full = {
            let guard = self.read_guard(parent_pid)?;
            BTreeNodeRef::new(guard.data()).size() >= self.internal_max_size
        };

        if full {
            self.split_internal_and_insert(parent_pid, key, right_pid)
        } else {
            let mut guard = self.write_guard(parent_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            let idx = node.child_index_for(key, &self.comparator) + 1;
            node.internal_insert_at(idx, key, right_pid);
            Ok(())
        }
    }

    fn make_new_root(&mut self, left_pid: PageId, key: u64, right_pid: PageId) -> Result<()> {
        let root_pid = {
            let mut guard = self.new_node()?;
            let pid = guard.page_id();
            let mut node = BTreeNode::new(guard.data_mut());
            node.init_internal(pid, self.internal_max_size);
            node.set_is_root(true);
            node.internal_set_pair(0, 0, left_pid);
            node.internal_set_pair(1, key, right_pid);
            node.set_size(2);
            pid
        };

        for child in [left_pid, right_pid] {
            let mut guard = self.write_guard(child)?;
            let mut node = BTreeNode::new(guard.data_mut());
            node.set_parent_page_id(root_pid);
            node.set_is_root(false);
        }

        debug!(root = %root_pid, "grew tree height");
        self.set_root(root_pid)
    }

    /// Split-and-promote for a full internal node. The moved half's first
    /// key becomes the promoted separator and turns into the new node's
    /// sentinel slot; every moved child is re-parented.
    fn split_internal_and_insert(
        &mut self,
        node_pid: PageId,
        key: u64,
        child_pid: PageId,
    ) -> Result<()> {
        let (moved, parent_pid, insert_idx, mid, lands_right) = {
            let mut guard = self.write_guard(node_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            let insert_idx = node.child_index_for(key, &self.comparator) + 1;
            let size = node.size();
            let lands_right = insert_idx > size / 2;
            let mid = size / 2 + lands_right as usize;
            let moved: Vec<(u64, PageId)> = (mid..size)
                .map(|i| (node.internal_key_at(i), node.child_at(i)))
                .collect();
            node.set_size(mid);
            let parent_pid = node.parent_page_id();
            if !lands_right {
                node.internal_insert_at(insert_idx, key, child_pid);
            }
            (moved, parent_pid, insert_idx, mid, lands_right)
        };

        let (new_pid, separator, new_children) = {
            let mut guard = self.new_node()?;
            let pid = guard.page_id();
            let mut node = BTreeNode::new(guard.data_mut());
            node.init_internal(pid, self.internal_max_size);
            node.set_parent_page_id(parent_pid);
            for (i, (k, c)) in moved.iter().enumerate() {
                node.internal_set_pair(i, *k, *c);
            }
            node.set_size(moved.len());
            if lands_right {
                node.internal_insert_at(insert_idx - mid, key, child_pid);
            }
            let separator = node.internal_key_at(0);
            let children: Vec<PageId> = (0..node.size()).map(|i| node.child_at(i)).collect();
            (pid, separator, children)
        };

        for child in new_children {
            let mut guard = self.write_guard(child)?;
            BTreeNode::new(guard.data_mut()).set_parent_page_id(new_pid);
        }

        debug!(left = %node_pid, right = %new_pid, "split internal node");
        self.insert_into_parent(node_pid, separator, new_pid, parent_pid)
    }

    /// Restores the half-full invariant of an underflowing leaf by
    /// borrowing from a sibling, or merging when the pair fits one node.
    fn rebalance_leaf(&mut self, pid: PageId) -> Result<()> {
        let parent_pid = {
            let guard = self.read_guard(pid)?;
            BTreeNodeRef::new(guard.data()).parent_page_id()
        };
        let (child_idx, left_sib, right_sib) = self.sibling_info(parent_pid, pid)?;

        if let Some(right_pid) = right_sib {
            if self.node_size(pid)? + self.node_size(right_pid)? <= self.leaf_max_size {
                return self.merge_leaves(pid, right_pid, parent_pid, child_idx + 1);
            }
            // Borrow the right sibling's first entry
            let (k, v, next_key) = {
                let guard = self.read_guard(right_pid)?;
                let node = BTreeNodeRef::new(guard.data());
                (node.leaf_key_at(0), node.leaf_value_at(0), node.leaf_key_at(1))
            };
            {
                let mut guard = self.write_guard(pid)?;
                let mut node = BTreeNode::new(guard.data_mut());
                let size = node.size();
                node.leaf_insert_at(size, k, v);
            }
            {
                let mut guard = self.write_guard(right_pid)?;
                BTreeNode::new(guard.data_mut()).leaf_remove_at(0);
            }
            {
                let mut guard = self.write_guard(parent_pid)?;
                BTreeNode::new(guard.data_mut()).internal_set_key_at(child_idx + 1, next_key);
            }
            Ok(())
        } else if let Some(left_pid) = left_sib {
            if self.node_size(pid)? + self.node_size(left_pid)? <= self.leaf_max_size {
                return self.merge_leaves(left_pid, pid, parent_pid, child_idx);
            }
            // Borrow the left sibling's last entry
            let (k, v) = {
                let mut guard = self.write_guard(left_pid)?;
                let mut node = BTreeNode::new(guard.data_mut());
                let last = node.size() - 1;
                let pair = (node.leaf_key_at(last), node.leaf_value_at(last));
                node.leaf_remove_at(last);
                pair
            };
            {
                let mut guard = self.write_guard(pid)?;
                BTreeNode::new(guard.data_mut()).leaf_insert_at(0, k, v);
            }
            {
                let mut guard = self.write_guard(parent_pid)?;
                BTreeNode::new(guard.data_mut()).internal_set_key_at(child_idx, k);
            }
            Ok(())
        } else {
            Err(StratumError::IndexCorrupted(
                "non-root leaf has no sibling".into(),
            ))
        }
    }

    /// Moves every entry of `right_pid` into `left_pid`, relinks the leaf
    /// chain, and drops the vacated child from the parent.
    fn merge_leaves(
        &mut self,
        left_pid: PageId,
        right_pid: PageId,
        parent_pid: PageId,
        right_entry_idx: usize,
    ) -> Result<()> {
        let (pairs, next) = {
            let guard = self.read_guard(right_pid)?;
            let node = BTreeNodeRef::new(guard.data());
            let pairs: Vec<(u64, RecordId)> = (0..node.size())
                .map(|i| (node.leaf_key_at(i), node.leaf_value_at(i)))
                .collect();
            (pairs, node.next_page_id())
        };

        {
            let mut guard = self.write_guard(left_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            for (k, v) in pairs {
                let size = node.size();
                node.leaf_insert_at(size, k, v);
            }
            node.set_next_page_id(next);
        }

        debug!(left = %left_pid, right = %right_pid, "merged leaves");
        self.remove_internal_entry(parent_pid, right_entry_idx)?;
        self.bpm.delete_page(right_pid)?;
        Ok(())
    }

    /// Drops the entry at `entry_idx` from an internal node, then restores
    /// its own invariant: rebalance on underflow, or promote the only
    /// remaining child when an internal root shrinks to size one.
    fn remove_internal_entry(&mut self, node_pid: PageId, entry_idx: usize) -> Result<()> {
        let (is_root, new_size) = {
            let mut guard = self.write_guard(node_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            node.internal_remove_at(entry_idx);
            (node.is_root(), node.size())
        };

        if is_root {
            if new_size == 1 {
                let child_pid = {
                    let guard = self.read_guard(node_pid)?;
                    BTreeNodeRef::new(guard.data()).child_at(0)
                };
                {
                    let mut guard = self.write_guard(child_pid)?;
                    let mut node = BTreeNode::new(guard.data_mut());
                    node.set_parent_page_id(INVALID_PAGE_ID);
                    node.set_is_root(true);
                }
                debug!(old = %node_pid, new = %child_pid, "collapsed root");
                self.set_root(child_pid)?;
                self.bpm.delete_page(node_pid)?;
            }
            return Ok(());
        }

        if new_size < self.min_internal_size() {
            self.rebalance_internal(node_pid)?;
        }
        Ok(())
    }

    /// Internal-node counterpart of `rebalance_leaf`. Borrowing rotates a
    /// child through the parent's separator key.
    fn rebalance_internal(&mut self, pid: PageId) -> Result<()> {
        let parent_pid = {
            let guard = self.read_guard(pid)?;
            BTreeNodeRef::new(guard.data()).parent_page_id()
        };
        let (child_idx, left_sib, right_sib) = self.sibling_info(parent_pid, pid)?;

        if let Some(right_pid) = right_sib {
            if self.node_size(pid)? + self.node_size(right_pid)? <= self.internal_max_size {
                return self.merge_internal(pid, right_pid, parent_pid, child_idx + 1);
            }
            // Rotate the right sibling's first child across
            let separator = {
                let guard = self.read_guard(parent_pid)?;
                BTreeNodeRef::new(guard.data()).internal_key_at(child_idx + 1)
            };
            let (moved_child, next_separator) = {
                let guard = self.read_guard(right_pid)?;
                let node = BTreeNodeRef::new(guard.data());
                (node.child_at(0), node.internal_key_at(1))
            };
            {
                let mut guard = self.write_guard(pid)?;
                let mut node = BTreeNode::new(guard.data_mut());
                let size = node.size();
                node.internal_insert_at(size, separator, moved_child);
            }
            {
                let mut guard = self.write_guard(right_pid)?;
                BTreeNode::new(guard.data_mut()).internal_remove_at(0);
            }
            {
                let mut guard = self.write_guard(parent_pid)?;
                BTreeNode::new(guard.data_mut()).internal_set_key_at(child_idx + 1, next_separator);
            }
            {
                let mut guard = self.write_guard(moved_child)?;
                BTreeNode::new(guard.data_mut()).set_parent_page_id(pid);
            }
            Ok(())
        } else if let Some(left_pid) = left_sib {
            if self.node_size(pid)? + self.node_size(left_pid)? <= self.internal_max_size {
                return self.merge_internal(left_pid, pid, parent_pid, child_idx);
            }
            // Rotate the left sibling's last child across
            let separator = {
                let guard = self.read_guard(parent_pid)?;
                BTreeNodeRef::new(guard.data()).internal_key_at(child_idx)
            };
            let (moved_key, moved_child) = {
                let mut guard = self.write_guard(left_pid)?;
                let mut node = BTreeNode::new(guard.data_mut());
                let last = node.size() - 1;
                let pair = (node.internal_key_at(last), node.child_at(last));
                node.set_size(last);
                pair
            };
            {
                let mut guard = self.write_guard(pid)?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.internal_insert_at(0, 0, moved_child);
                // The displaced sentinel child now needs a real key: the
                // old separator bounds it from below.
                node.internal_set_key_at(1, separator);
            }
            {
                let mut guard = self.write_guard(parent_pid)?;
                BTreeNode::new(guard.data_mut()).internal_set_key_at(child_idx, moved_key);
            }
            {
                let mut guard = self.write_guard(moved_child)?;
                BTreeNode::new(guard.data_mut()).set_parent_page_id(pid);
            }
            Ok(())
        } else {
            Err(StratumError::IndexCorrupted(
                "non-root internal node has no sibling".into(),
            ))
        }
    }

    /// Folds `right_pid` into `left_pid`, pulling the separator key down
    /// into the first merged slot, then removes the vacated entry from the
    /// parent (which may cascade).
    fn merge_internal(
        &mut self,
        left_pid: PageId,
        right_pid: PageId,
        parent_pid: PageId,
        right_entry_idx: usize,
    ) -> Result<()> {
        let separator = {
            let guard = self.read_guard(parent_pid)?;
            BTreeNodeRef::new(guard.data()).internal_key_at(right_entry_idx)
        };

        let pairs: Vec<(u64, PageId)> = {
            let guard = self.read_guard(right_pid)?;
            let node = BTreeNodeRef::new(guard.data());
            (0..node.size())
                .map(|i| (node.internal_key_at(i), node.child_at(i)))
                .collect()
        };

        {
            let mut guard = self.write_guard(left_pid)?;
            let mut node = BTreeNode::new(guard.data_mut());
            for (i, (k, c)) in pairs.iter().enumerate() {
                let key = if i == 0 { separator } else { *k };
                let size = node.size();
                node.internal_insert_at(size, key, *c);
            }
        }

        for (_, child) in &pairs {
            let mut guard = self.write_guard(*child)?;
            BTreeNode::new(guard.data_mut()).set_parent_page_id(left_pid);
        }

        debug!(left = %left_pid, right = %right_pid, "merged internal nodes");
        self.remove_internal_entry(parent_pid, right_entry_idx)?;
        self.bpm.delete_page(right_pid)?;
        Ok(())
    }

    /// Neighbors of `pid` in its parent's child list.
    fn sibling_info(
        &self,
        parent_pid: PageId,
        pid: PageId,
    ) -> Result<(usize, Option<PageId>, Option<PageId>)> {
        let guard = self.read_guard(parent_pid)?;
        let node = BTreeNodeRef::new(guard.data());
        let idx = node.find_child_index(pid).ok_or_else(|| {
            StratumError::IndexCorrupted(format!("{pid} missing from parent {parent_pid}"))
        })?;
        let left = (idx > 0).then(|| node.child_at(idx - 1));
        let right = (idx + 1 < node.size()).then(|| node.child_at(idx + 1));
        Ok((idx, left, right))
    }

    fn node_size(&self, pid: PageId) -> Result<usize> {
        let guard = self.read_guard(pid)?;
        Ok(BTreeNodeRef::new(guard.data()).size())
    }

    /// Records the new root in the header page; reopening by name sees it.
    fn set_root(&mut self, new_root: PageId) -> Result<()> {
        self.root_page_id = new_root;
        let mut guard = self
            .bpm
            .write_page(HEADER_PAGE_ID)?
            .ok_or(StratumError::PoolExhausted)?;
        if !HeaderPageRef::new(guard.data()).is_valid() {
            HeaderPage::new(guard.data_mut()).init();
        }
        HeaderPage::new(guard.data_mut()).insert_record(&self.index_name, new_root)
    }

    fn min_leaf_size(&self) -> usize {
        (self.leaf_max_size + 1) / 2
    }

    /// Minimum child count of a non-root internal node.
    fn min_internal_size(&self) -> usize {
        (self.internal_max_size + 1) / 2
    }

    fn read_guard(&self, pid: PageId) -> Result<ReadPageGuard<'_>> {
        self.bpm.read_page(pid)?.ok_or(StratumError::PoolExhausted)
    }

    fn write_guard(&self, pid: PageId) -> Result<WritePageGuard<'_>> {
        self.bpm.write_page(pid)?.ok_or(StratumError::PoolExhausted)
    }

    fn new_node(&self) -> Result<WritePageGuard<'_>> {
        self.bpm.new_page_write()?.ok_or(StratumError::PoolExhausted)
    }
}
