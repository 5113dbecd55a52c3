//! Sorted index for equality, order, and prefix lookups.

use std::borrow::Cow;
use std::cmp::Ordering;

use super::{pair_args, single_arg, Index, Op};
use crate::bitset::BitSet;
use crate::error::Error;
use crate::skiplist::SkipList;
use crate::value::{convert, IndexKey, Value};

/// Ordered value-to-bitset index backed by a skip list. Serves point
/// lookups like the hash index plus the four order operators, inclusive or
/// open ranges, and string prefixes.
pub struct SortedIndex<T, K> {
    list: SkipList<K, BitSet>,
    extract: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K> std::fmt::Debug for SortedIndex<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedIndex").finish_non_exhaustive()
    }
}

impl<T, K: IndexKey> SortedIndex<T, K> {
    pub fn new(extract: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        SortedIndex {
            list: SkipList::new(),
            extract: Box::new(extract),
        }
    }

    fn half_range(&self, op: Op, key: &K) -> BitSet {
        // each traversal ORs every bucket on its side of the threshold
        let mut result = BitSet::new();
        match op {
            Op::Lt => self.list.less(key, |_, bucket| {
                result.or(bucket);
                true
            }),
            Op::Le => self.list.less_equal(key, |_, bucket| {
                result.or(bucket);
                true
            }),
            Op::Gt => self.list.greater(key, |_, bucket| {
                result.or(bucket);
                true
            }),
            Op::Ge => self.list.greater_equal(key, |_, bucket| {
                result.or(bucket);
                true
            }),
            _ => {}
        }
        result
    }
}

impl<T, K: IndexKey> Index<T> for SortedIndex<T, K> {
    fn set(&mut self, record: &T, slot: u32) {
        let key = (self.extract)(record);
        if let Some(bucket) = self.list.get_mut(&key) {
            bucket.set(slot);
            return;
        }
        let mut bucket = BitSet::new();
        bucket.set(slot);
        self.list.put(key, bucket);
    }

    fn unset(&mut self, record: &T, slot: u32) {
        let key = (self.extract)(record);
        let drained = match self.list.get_mut(&key) {
            Some(bucket) => {
                bucket.unset(slot);
                bucket.is_empty()
            }
            None => return,
        };
        if drained {
            self.list.delete(&key);
        }
    }

    fn lookup(&self, op: Op, args: &[&Value]) -> Result<Cow<'_, BitSet>, Error> {
        match op {
            Op::Eq => {
                let key: K = convert(single_arg(args)?)?;
                match self.list.get(&key) {
                    Some(bucket) => Ok(Cow::Borrowed(bucket)),
                    None => Ok(Cow::Owned(BitSet::new())),
                }
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let key: K = convert(single_arg(args)?)?;
                Ok(Cow::Owned(self.half_range(op, &key)))
            }
            Op::Between { lo_open, hi_open } => {
                let (lo, hi) = pair_args(args)?;
                let lo: K = convert(lo)?;
                let hi: K = convert(hi)?;

                let mut result = BitSet::new();
                if lo.cmp_key(&hi) == Ordering::Greater {
                    return Ok(Cow::Owned(result));
                }

                self.list.range(&lo, &hi, |key, bucket| {
                    if lo_open && key.cmp_key(&lo) == Ordering::Equal {
                        return true;
                    }
                    if hi_open && key.cmp_key(&hi) == Ordering::Equal {
                        return true;
                    }
                    result.or(bucket);
                    true
                });
                Ok(Cow::Owned(result))
            }
            Op::StartsWith => {
                let arg = single_arg(args)?;
                let prefix = match arg {
                    Value::Str(s) => s,
                    other => {
                        return Err(Error::InvalidValueType {
                            expected: "string",
                            got: other.type_name(),
                        })
                    }
                };
                let Some(start) = K::prefix_start(prefix) else {
                    return Err(Error::UnsupportedOperation { op });
                };

                let mut result = BitSet::new();
                self.list.greater_equal(&start, |key, bucket| {
                    if !key.has_prefix(prefix) {
                        return false;
                    }
                    result.or(bucket);
                    true
                });
                Ok(Cow::Owned(result))
            }
        }
    }
}
