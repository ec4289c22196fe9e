//! Open-addressed hash table keyed by byte strings.
//!
//! Keys are compared by value. Deleted entries leave a tombstone (`Slot::Dummy`)
//! so probe sequences that ran through them stay intact; a rebuild discards the
//! tombstones. The table size is always a prime from [`PRIMES`], which together
//! with a step in `1..size` makes every probe sequence visit every slot.

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    resource::ResourceTracker,
    types::{Kind, PyTrait},
    value::Value,
};

/// Table sizes, in ascending order.
///
/// The first run are the largest primes below powers of two, then the largest
/// prime below 6000, then a selection from Knuth, Vol. 3, Sec. 6.1, Table 1.
const PRIMES: [usize; 16] = [
    3, 7, 13, 31, 61, 127, 251, 509, 1021, 2017, 4093, 5987, 9551, 15683, 19609, 31397,
];

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    /// Tombstone left by `remove`. Never matches a key.
    Dummy,
    Live {
        key: Box<[u8]>,
        value: Value,
    },
}

/// Polynomial hash over the key bytes, with the first byte weighted extra so
/// single-character keys spread out.
fn hash(key: &[u8]) -> u64 {
    let mut sum = u64::from(key.first().copied().unwrap_or(0)) << 7;
    for &b in key {
        sum = sum.wrapping_add(sum).wrapping_add(u64::from(b));
    }
    sum
}

/// String-keyed dictionary.
///
/// `fill` counts live entries plus tombstones, `used` counts live entries only.
/// The table is rebuilt when `fill * 3 >= capacity * 2`.
#[derive(Debug)]
pub(crate) struct Dict {
    table: Vec<Slot>,
    fill: usize,
    used: usize,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    /// An empty dict with the smallest table size.
    pub fn new() -> Self {
        Self {
            table: empty_table(PRIMES[0]),
            fill: 0,
            used: 0,
        }
    }

    /// Table capacity (number of slots), not the number of entries.
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Finds the slot for `key`: either the slot holding it or the first empty
    /// slot on its probe sequence.
    ///
    /// Returns None only if the table has no empty slot left and the key is absent.
    #[expect(clippy::cast_possible_truncation, reason = "remainders are below the table size")]
    fn probe(&self, key: &[u8]) -> Option<usize> {
        let size = self.table.len() as u64;
        let mut sum = hash(key);
        let mut i = (sum % size) as usize;
        let incr = loop {
            sum = sum.wrapping_add(sum).wrapping_add(1);
            let incr = sum % size;
            if incr != 0 {
                break incr as usize;
            }
        };

        for _ in 0..self.table.len() {
            match &self.table[i] {
                Slot::Empty => return Some(i),
                Slot::Live { key: k, .. } if **k == *key => return Some(i),
                _ => {}
            }
            i = (i + incr) % self.table.len();
        }
        None
    }

    /// Borrowed reference to the value stored under `key`.
    pub fn lookup(&self, key: &[u8]) -> Option<&Value> {
        match &self.table[self.probe(key)?] {
            Slot::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Stores `value` under `key`, taking ownership of the value and copying the key.
    ///
    /// Replacing an existing entry releases the displaced value. The table is
    /// rebuilt first when it is two-thirds full; a failed rebuild is tolerated
    /// as long as one empty slot remains. On error `value` is released.
    pub fn insert(&mut self, key: &[u8], value: Value, heap: &mut Heap<impl ResourceTracker>) -> RunResult<()> {
        if self.fill * 3 >= self.table.len() * 2
            && let Err(err) = self.resize(heap)
            && self.fill + 1 > self.table.len()
        {
            value.drop_with_heap(heap);
            return Err(err);
        }

        let Some(index) = self.probe(key) else {
            value.drop_with_heap(heap);
            return Err(ExcType::nomem());
        };

        if let Slot::Live { value: slot_value, .. } = &mut self.table[index] {
            std::mem::replace(slot_value, value).drop_with_heap(heap);
            return Ok(());
        }

        if let Err(err) = heap.on_container_insert() {
            value.drop_with_heap(heap);
            return Err(err.into());
        }
        self.table[index] = Slot::Live { key: key.into(), value };
        self.fill += 1;
        self.used += 1;
        Ok(())
    }

    /// Removes `key`, leaving a tombstone and releasing the stored value.
    pub fn remove(&mut self, key: &[u8], heap: &mut Heap<impl ResourceTracker>) -> RunResult<()> {
        let index = self.probe(key).filter(|&i| matches!(self.table[i], Slot::Live { .. }));
        let Some(index) = index else {
            return Err(ExcType::runtime_error("key not in dictionary"));
        };
        if let Slot::Live { value, .. } = std::mem::replace(&mut self.table[index], Slot::Dummy) {
            value.drop_with_heap(heap);
        }
        self.used -= 1;
        Ok(())
    }

    /// Rebuilds the table at the smallest prime above `2 * used`, dropping tombstones.
    fn resize(&mut self, heap: &Heap<impl ResourceTracker>) -> RunResult<()> {
        let Some(new_size) = PRIMES.iter().copied().find(|&p| p > self.used * 2) else {
            return Err(ExcType::nomem());
        };
        heap.check_large_result(new_size * std::mem::size_of::<Slot>())?;

        let old = std::mem::replace(&mut self.table, empty_table(new_size));
        self.fill = 0;
        self.used = 0;
        for slot in old {
            if let Slot::Live { key, value } = slot {
                // the new table holds more than twice the live entries, so probing succeeds
                let index = self.probe(&key).ok_or_else(ExcType::nomem)?;
                self.table[index] = Slot::Live { key, value };
                self.fill += 1;
                self.used += 1;
            }
        }
        Ok(())
    }

    /// Key stored at slot `index`, or None for empty, tombstoned or out-of-range slots.
    ///
    /// Iterating `0..capacity()` must skip the Nones rather than stop at them.
    pub fn key_at(&self, index: usize) -> Option<&[u8]> {
        match self.table.get(index)? {
            Slot::Live { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Value)> {
        self.table.iter().filter_map(|slot| match slot {
            Slot::Live { key, value } => Some((&**key, value)),
            _ => None,
        })
    }

    /// Releases every stored value and resets the dict to empty.
    pub fn drop_all_entries(&mut self, heap: &mut Heap<impl ResourceTracker>) {
        for slot in std::mem::replace(&mut self.table, empty_table(PRIMES[0])) {
            if let Slot::Live { value, .. } = slot {
                value.drop_with_heap(heap);
            }
        }
        self.fill = 0;
        self.used = 0;
    }
}

/// Looks `key` up in the dict stored at `id`. Returns None for a missing key or a non-dict.
pub(crate) fn dict_lookup<'h>(heap: &'h Heap<impl ResourceTracker>, id: HeapId, key: &[u8]) -> Option<&'h Value> {
    match heap.get(id) {
        HeapData::Dict(dict) => dict.lookup(key),
        _ => None,
    }
}

/// Inserts into the dict stored at `id`, consuming `value`.
///
/// A non-dict target is a bad internal call; `value` is released.
pub(crate) fn dict_insert<T: ResourceTracker>(heap: &mut Heap<T>, id: HeapId, key: &[u8], value: Value) -> RunResult<()> {
    heap.with_entry_mut(id, |heap, data| match data {
        HeapData::Dict(dict) => dict.insert(key, value, heap),
        _ => {
            value.drop_with_heap(heap);
            Err(ExcType::badcall())
        }
    })
}

/// Removes `key` from the dict stored at `id`.
pub(crate) fn dict_remove<T: ResourceTracker>(heap: &mut Heap<T>, id: HeapId, key: &[u8]) -> RunResult<()> {
    heap.with_entry_mut(id, |heap, data| match data {
        HeapData::Dict(dict) => dict.remove(key, heap),
        _ => Err(ExcType::badcall()),
    })
}

fn empty_table(size: usize) -> Vec<Slot> {
    let mut table = Vec::with_capacity(size);
    table.resize_with(size, Slot::default);
    table
}

impl PyTrait for Dict {
    fn py_kind(&self) -> Kind {
        Kind::Dict
    }

    fn py_estimate_size(&self) -> usize {
        self.table.len() * std::mem::size_of::<Slot>()
    }

    fn py_len(&self) -> Option<usize> {
        Some(self.used)
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        for slot in &mut self.table {
            if let Slot::Live { value, .. } = slot {
                value.push_child_id(stack);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        exception_private::RunError,
        heap::{DropWithHeap, HeapData},
        resource::{LimitedTracker, NoLimitTracker, ResourceLimits},
    };

    #[test]
    fn hash_weights_first_byte() {
        assert_eq!(hash(b""), 0);
        assert_eq!(hash(b"a"), (97 << 7) * 2 + 97);
    }

    #[test]
    fn insert_then_lookup_returns_same_object() {
        let mut heap = Heap::new(8, NoLimitTracker);
        let mut dict = Dict::new();
        let value = heap.allocate_value(HeapData::Int(42)).unwrap();
        let id = value.id();
        dict.insert(b"k", value, &mut heap).unwrap();
        assert_eq!(dict.lookup(b"k").map(Value::id), Some(id));
        assert_eq!(heap.get_refcount(id), 1, "insert consumes the reference");
        dict.drop_with_heap(&mut heap);
        assert!(!heap.is_live(id));
    }

    #[test]
    fn remove_then_lookup_is_empty() {
        let mut heap = Heap::new(8, NoLimitTracker);
        let mut dict = Dict::new();
        let value = heap.allocate_value(HeapData::Int(1)).unwrap();
        let id = value.id();
        dict.insert(b"k", value, &mut heap).unwrap();
        dict.remove(b"k", &mut heap).unwrap();
        assert!(dict.lookup(b"k").is_none());
        assert!(!heap.is_live(id), "remove releases the value");
        assert_eq!((dict.len(), dict.fill), (0, 1), "tombstone still counts toward fill");
        assert!(matches!(dict.remove(b"k", &mut heap), Err(RunError::Exc(_))));
    }

    #[test]
    fn third_key_triggers_single_resize_to_next_prime() {
        let mut heap = Heap::new(8, NoLimitTracker);
        let mut dict = Dict::new();
        assert_eq!(dict.capacity(), 3);
        let mut capacities = Vec::new();
        for key in ["a", "b", "c", "d", "e", "f"] {
            dict.insert(key.as_bytes(), heap.none(), &mut heap).unwrap();
            capacities.push(dict.capacity());
        }
        assert_eq!(capacities, vec![3, 3, 7, 7, 7, 13]);
        for key in ["a", "b", "c", "d", "e", "f"] {
            assert!(dict.lookup(key.as_bytes()).is_some(), "{key} survives rehash");
        }
        dict.drop_with_heap(&mut heap);
    }

    #[test]
    fn replacing_releases_old_value() {
        let mut heap = Heap::new(8, NoLimitTracker);
        let mut dict = Dict::new();
        let first = heap.allocate_value(HeapData::Int(1)).unwrap();
        let first_id = first.id();
        dict.insert(b"x", first, &mut heap).unwrap();
        dict.insert(b"x", heap.none(), &mut heap).unwrap();
        assert!(!heap.is_live(first_id));
        assert_eq!(dict.len(), 1);
        dict.drop_with_heap(&mut heap);
    }

    #[test]
    fn slot_iteration_skips_empty_and_dummy() {
        let mut heap = Heap::new(8, NoLimitTracker);
        let mut dict = Dict::new();
        dict.insert(b"one", heap.none(), &mut heap).unwrap();
        dict.insert(b"two", heap.none(), &mut heap).unwrap();
        dict.remove(b"one", &mut heap).unwrap();
        let keys: Vec<&[u8]> = (0..dict.capacity()).filter_map(|i| dict.key_at(i)).collect();
        assert_eq!(keys, vec![b"two".as_slice()]);
        assert!(dict.key_at(dict.capacity()).is_none());
        dict.drop_with_heap(&mut heap);
    }

    #[test]
    fn failed_resize_is_tolerated_while_room_remains() {
        // values are the None singleton, which is never charged to the tracker
        let mut heap = Heap::new(8, LimitedTracker::new(ResourceLimits::new().max_memory(1)));
        let mut dict = Dict::new();
        for key in ["a", "b", "c"] {
            dict.insert(key.as_bytes(), heap.none(), &mut heap).unwrap();
        }
        assert_eq!(dict.capacity(), 3, "rebuild was refused but the insert went through");

        let err = dict.insert(b"d", heap.none(), &mut heap).unwrap_err();
        let RunError::Exc(exc) = err else {
            panic!("expected a MemoryError");
        };
        assert_eq!(exc.exc_type(), ExcType::MemoryError);
        assert_eq!(dict.len(), 3);
        dict.drop_with_heap(&mut heap);
    }
}
