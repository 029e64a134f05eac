//! Associative priority queue.

use slab::Slab;

/// An associative container optimized for extraction of the value with the
/// lowest key and deletion of arbitrary key-value pairs.
///
/// This has the same theoretical complexity for insert and pull operations as
/// a conventional array-based binary heap, but:
///
/// - elements can be deleted in *O*(log(*N*)) time using the unique key
///   returned at insertion time,
/// - same-key elements are guaranteed to be pulled in FIFO order.
///
/// The binary heap is cross-indexed with values stored in a [`Slab`]. Each
/// heap item holds the user key, a unique insertion epoch used both to break
/// ties and to validate deletion keys, and the index of its slab entry. Each
/// slab entry holds the value and a back-pointing heap index.
pub(crate) struct PriorityQueue<K, V>
where
    K: Copy + Ord,
{
    heap: Vec<Item<K>>,
    slab: Slab<Entry<V>>,
    next_epoch: u64,
}

impl<K: Copy + Ord, V> PriorityQueue<K, V> {
    /// Creates an empty `PriorityQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: Vec::new(),
            slab: Slab::new(),
            next_epoch: 0,
        }
    }

    /// Inserts a new key-value pair and returns a unique insertion key.
    pub(crate) fn insert(&mut self, key: K, value: V) -> InsertKey {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let slab_idx = self.slab.insert(Entry {
            value,
            heap_idx: 0, // overridden in `sift_up`
        });
        let heap_idx = self.heap.len();
        let item = Item {
            key: UniqueKey { key, epoch },
            slab_idx,
        };
        self.heap.push(item);
        self.sift_up(item, heap_idx);

        InsertKey { slab_idx, epoch }
    }

    /// Pulls the value with the lowest key.
    ///
    /// If there are several equal lowest keys, the value which was inserted
    /// first is returned.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        let top = *self.heap.first()?;
        let value = self.slab.remove(top.slab_idx).value;

        // The heap is not empty so `pop` always succeeds.
        if let Some(last) = self.heap.pop() {
            if last.slab_idx != top.slab_idx {
                self.sift_down(last, 0);
            }
        }

        Some((top.key.key, value))
    }

    /// Peeks the lowest key, leaving it in the queue.
    pub(crate) fn peek_key(&self) -> Option<&K> {
        self.heap.first().map(|item| &item.key.key)
    }

    /// Deletes the key-value pair associated to the insertion key if it is
    /// still in the queue, returning its value.
    ///
    /// Using an insertion key returned from another `PriorityQueue` is a logic
    /// error and could result in the deletion of an arbitrary key-value pair.
    pub(crate) fn delete(&mut self, insert_key: InsertKey) -> Option<V> {
        let heap_idx = self.slab.get(insert_key.slab_idx)?.heap_idx;
        if self.heap[heap_idx].key.epoch != insert_key.epoch {
            return None;
        }

        // Move the last item into the vacant spot, then restore the heap
        // property in whichever direction is needed.
        if let Some(last) = self.heap.pop() {
            if let Some(&vacated) = self.heap.get(heap_idx) {
                if last.key < vacated.key {
                    self.sift_up(last, heap_idx);
                } else {
                    self.sift_down(last, heap_idx);
                }
            }
        }

        Some(self.slab.remove(insert_key.slab_idx).value)
    }

    /// Removes all key-value pairs.
    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.slab.clear();
    }

    /// Moves `item` up from `heap_idx` while its parent has a larger key.
    fn sift_up(&mut self, item: Item<K>, heap_idx: usize) {
        let mut child_idx = heap_idx;

        while child_idx != 0 {
            let parent_idx = (child_idx - 1) / 2;
            let parent = self.heap[parent_idx];
            if item.key >= parent.key {
                break;
            }
            self.place(parent, child_idx);
            child_idx = parent_idx;
        }

        self.place(item, child_idx);
    }

    /// Moves `item` down from `heap_idx` while a child has a smaller key.
    fn sift_down(&mut self, item: Item<K>, heap_idx: usize) {
        let mut parent_idx = heap_idx;
        let mut child_idx = 2 * parent_idx + 1;

        while child_idx < self.heap.len() {
            if let Some(sibling) = self.heap.get(child_idx + 1) {
                if sibling.key < self.heap[child_idx].key {
                    child_idx += 1;
                }
            }
            let child = self.heap[child_idx];
            if item.key <= child.key {
                break;
            }
            self.place(child, parent_idx);
            parent_idx = child_idx;
            child_idx = 2 * parent_idx + 1;
        }

        self.place(item, parent_idx);
    }

    /// Stores an item at the specified heap index and updates its slab
    /// back-pointer.
    #[inline]
    fn place(&mut self, item: Item<K>, heap_idx: usize) {
        self.heap[heap_idx] = item;
        self.slab[item.slab_idx].heap_idx = heap_idx;
    }
}

impl<K: Copy + Ord, V> Default for PriorityQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap item for a single key-value pair.
#[derive(Copy, Clone)]
struct Item<K: Copy> {
    key: UniqueKey<K>,
    slab_idx: usize,
}

/// Slab entry for a single key-value pair.
struct Entry<V> {
    value: V,
    heap_idx: usize,
}

/// A unique insertion key that can be used for key-value pair deletion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct InsertKey {
    slab_idx: usize,
    epoch: u64,
}

/// A user-provided key with a unique epoch breaking ties in FIFO order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct UniqueKey<K: Copy> {
    key: K,
    epoch: u64,
}
