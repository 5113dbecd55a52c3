//! Hash index for O(1) equality lookups.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;

use super::{single_arg, Index, Op};
use crate::bitset::BitSet;
use crate::error::Error;
use crate::value::{convert, IndexKey, Value};

/// Equality-only index: one bucket bitset per distinct value. A bucket
/// whose bitset drains is dropped, so an entry's presence implies at least
/// one live slot.
pub struct HashIndex<T, K> {
    buckets: HashMap<K, BitSet>,
    extract: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K: std::fmt::Debug + Eq + Hash> std::fmt::Debug for HashIndex<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashIndex").field("buckets", &self.buckets).finish()
    }
}

impl<T, K: IndexKey + Eq + Hash> HashIndex<T, K> {
    pub fn new(extract: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        HashIndex {
            buckets: HashMap::new(),
            extract: Box::new(extract),
        }
    }
}

impl<T, K: IndexKey + Eq + Hash> Index<T> for HashIndex<T, K> {
    fn set(&mut self, record: &T, slot: u32) {
        let key = (self.extract)(record);
        self.buckets.entry(key).or_default().set(slot);
    }

    fn unset(&mut self, record: &T, slot: u32) {
        let key = (self.extract)(record);
        let drained = match self.buckets.get_mut(&key) {
            Some(bucket) => {
                bucket.unset(slot);
                bucket.is_empty()
            }
            None => return,
        };
        if drained {
            self.buckets.remove(&key);
        }
    }

    fn lookup(&self, op: Op, args: &[&Value]) -> Result<Cow<'_, BitSet>, Error> {
        if op != Op::Eq {
            return Err(Error::UnsupportedOperation { op });
        }

        let key: K = convert(single_arg(args)?)?;
        match self.buckets.get(&key) {
            Some(bucket) => Ok(Cow::Borrowed(bucket)),
            None => Ok(Cow::Owned(BitSet::new())),
        }
    }
}
