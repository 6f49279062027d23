use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, StratumError};

use super::btree_page::BTreeNodeRef;

/// Ordered cursor over the leaf chain. Holds a `(leaf page id, slot)`
/// position; the end state is the invalid page id. Pages are pinned only
/// for the duration of a single advance.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: PageId,
    index: usize,
}

impl BTreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, start_page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            current_page_id: start_page_id,
            index,
        }
    }

    pub fn is_end(&self) -> bool {
        !self.current_page_id.is_valid()
    }

    /// Yields the entry at the cursor and advances, following
    /// `next_page_id` past the last slot of each leaf.
    pub fn next(&mut self) -> Result<Option<(u64, RecordId)>> {
        while self.current_page_id.is_valid() {
            let next_page = {
                let guard = self
                    .bpm
                    .read_page(self.current_page_id)?
                    .ok_or(StratumError::PoolExhausted)?;
                let node = BTreeNodeRef::new(guard.data());

                if self.index < node.size() {
                    let item = (
                        node.leaf_key_at(self.index),
                        node.leaf_value_at(self.index),
                    );
                    self.index += 1;
                    return Ok(Some(item));
                }

                node.next_page_id()
            };

            self.current_page_id = next_page;
            self.index = 0;
        }

        Ok(None)
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(u64, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
