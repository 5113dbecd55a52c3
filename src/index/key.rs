//! Primary-key index: one slot per key.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;

use super::{single_arg, Index, Op};
use crate::bitset::BitSet;
use crate::error::Error;
use crate::value::{convert, IndexKey, Value};

/// One-to-one mapping from a record's key to its slot id. Registered under
/// the reserved `id` name; a `set` with an existing key replaces the old
/// slot mapping.
pub struct KeyIndex<T, K> {
    map: HashMap<K, u32>,
    extract: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K: std::fmt::Debug + Eq + Hash> std::fmt::Debug for KeyIndex<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIndex").field("map", &self.map).finish()
    }
}

impl<T, K: IndexKey + Eq + Hash> KeyIndex<T, K> {
    pub(crate) fn new(extract: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        KeyIndex {
            map: HashMap::new(),
            extract: Box::new(extract),
        }
    }

    /// Slot currently mapped to `key`.
    pub(crate) fn slot_of(&self, key: &K) -> Option<u32> {
        self.map.get(key).copied()
    }

    /// Extracts the record's key and resolves its slot in one step.
    pub(crate) fn key_and_slot(&self, record: &T) -> (K, Option<u32>) {
        let key = (self.extract)(record);
        let slot = self.map.get(&key).copied();
        (key, slot)
    }
}

impl<T, K: IndexKey + Eq + Hash> Index<T> for KeyIndex<T, K> {
    fn set(&mut self, record: &T, slot: u32) {
        let key = (self.extract)(record);
        self.map.insert(key, slot);
    }

    fn unset(&mut self, record: &T, _slot: u32) {
        let key = (self.extract)(record);
        self.map.remove(&key);
    }

    fn lookup(&self, op: Op, args: &[&Value]) -> Result<Cow<'_, BitSet>, Error> {
        if op != Op::Eq {
            return Err(Error::UnsupportedOperation { op });
        }

        let key: K = convert(single_arg(args)?)?;
        let mut result = BitSet::new();
        if let Some(slot) = self.map.get(&key) {
            result.set(*slot);
        }
        Ok(Cow::Owned(result))
    }
}
