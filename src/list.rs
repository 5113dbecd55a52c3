//! The public façade: a typed list with secondary indexes and a
//! reader-writer lock around the whole of it.
//!
//! Reads (queries, gets) share the lock; every mutation takes it
//! exclusively and updates storage plus all indexes under the one
//! acquisition, so a query sees either none or all of a mutation.

use std::cmp::Ordering;
use std::hash::Hash;

use parking_lot::RwLock;

use crate::bitset::BitSet;
use crate::dsl;
use crate::error::Error;
use crate::index::{Index, IndexRegistry, KeyIndex};
use crate::query::Query;
use crate::store::SlotStore;
use crate::value::IndexKey;

struct Core<T, K> {
    store: SlotStore<T>,
    registry: IndexRegistry<T, K>,
}

/// In-memory list of `T` with named secondary indexes.
///
/// Created plain ([`IndexedList::new`]) or with a primary key
/// ([`IndexedList::with_id`]); the key-based record operations (`get`,
/// `update`, `remove`, `contains`) need the latter.
pub struct IndexedList<T, K = ()> {
    core: RwLock<Core<T, K>>,
}

impl<T> IndexedList<T, ()> {
    /// A list without a primary-key index. Records are only reachable
    /// through queries.
    pub fn new() -> Self {
        IndexedList {
            core: RwLock::new(Core {
                store: SlotStore::new(),
                registry: IndexRegistry::new(None),
            }),
        }
    }
}

impl<T> Default for IndexedList<T, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: IndexKey + Eq + Hash> IndexedList<T, K> {
    /// A list with a primary-key index over the extracted key. The key
    /// index answers `Query::id` and is addressable as the reserved field
    /// name `id` in the DSL.
    pub fn with_id(extract: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        IndexedList {
            core: RwLock::new(Core {
                store: SlotStore::new(),
                registry: IndexRegistry::new(Some(KeyIndex::new(extract))),
            }),
        }
    }

    /// Stores a record and registers it with every index. Always inserts;
    /// there is no duplicate check, not even with a primary key.
    pub fn insert(&self, item: T) -> u32 {
        let mut core = self.core.write();
        let Core { store, registry } = &mut *core;

        let slot = store.insert(item);
        if let Some(record) = store.get(slot) {
            registry.set(record, slot);
        }
        slot
    }

    /// Replaces the record whose primary key matches `item` and re-indexes
    /// it. Storage and all index updates happen under one lock
    /// acquisition; a failed key lookup changes nothing.
    pub fn update(&self, item: T) -> Result<(), Error> {
        let mut core = self.core.write();
        let Core { store, registry } = &mut *core;

        let (key, slot) = registry.key_index()?.key_and_slot(&item);
        let Some(slot) = slot else {
            return Err(Error::ValueNotFound {
                value: key.to_value(),
            });
        };
        let Some(old) = store.replace(slot, item) else {
            return Err(Error::ValueNotFound {
                value: key.to_value(),
            });
        };
        if let Some(new) = store.get(slot) {
            registry.reindex(&old, new, slot);
        }
        Ok(())
    }

    /// Removes by primary key, returning the record. A key that is not
    /// present (any more) is `ValueNotFound`.
    pub fn remove(&self, id: &K) -> Result<T, Error> {
        let mut core = self.core.write();
        let Core { store, registry } = &mut *core;

        let slot = registry
            .key_index()?
            .slot_of(id)
            .ok_or_else(|| Error::ValueNotFound {
                value: id.to_value(),
            })?;
        let Some(old) = store.remove(slot) else {
            return Err(Error::ValueNotFound {
                value: id.to_value(),
            });
        };
        registry.unset(&old, slot);
        Ok(old)
    }

    /// Looks a record up by primary key.
    pub fn get(&self, id: &K) -> Result<T, Error>
    where
        T: Clone,
    {
        let core = self.core.read();
        let slot = core
            .registry
            .key_index()?
            .slot_of(id)
            .ok_or_else(|| Error::ValueNotFound {
                value: id.to_value(),
            })?;
        core.store
            .get(slot)
            .cloned()
            .ok_or_else(|| Error::ValueNotFound {
                value: id.to_value(),
            })
    }

    /// Whether the primary key is present. False without a key index.
    pub fn contains(&self, id: &K) -> bool {
        let core = self.core.read();
        core.registry
            .key_index()
            .ok()
            .and_then(|index| index.slot_of(id))
            .is_some()
    }

    /// Number of live records.
    pub fn count(&self) -> usize {
        self.core.read().registry.all_ids().count()
    }

    /// Registers an index under `name`, backfilling it from every live
    /// record before it becomes visible to queries.
    pub fn create_index(&self, name: &str, index: impl Index<T> + 'static) -> Result<(), Error> {
        let mut core = self.core.write();
        let Core { store, registry } = &mut *core;
        registry.create(name, Box::new(index), store.iter())
    }

    /// Drops an index; the records are untouched. Returns whether an index
    /// was removed. Removing `id` drops the primary-key index.
    pub fn remove_index(&self, name: &str) -> bool {
        self.core.write().registry.remove(name)
    }

    /// Runs a query under the read lock and snapshots the matching slot
    /// set. The returned handle is decoupled from later mutations until it
    /// materializes records.
    pub fn query(&self, query: &Query) -> Result<QueryResult<'_, T, K>, Error> {
        let bits = {
            let core = self.core.read();
            query.eval(&core.registry)?.into_owned()
        };
        Ok(QueryResult { bits, list: self })
    }

    /// Parses and runs a DSL query string.
    pub fn query_str(&self, input: &str) -> Result<QueryResult<'_, T, K>, Error> {
        let query = dsl::parse(input)?;
        self.query(&query)
    }
}

/// Page arithmetic of a [`QueryResult::pagination`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub offset: usize,
    pub limit: usize,
    /// Records actually in this page.
    pub count: usize,
    /// Matches in the whole result.
    pub total: usize,
}

/// Snapshot of a query's matching slots, bound to its list.
///
/// Counting is lock-free; materializing takes the read lock and skips
/// slots whose records were removed after the query ran.
pub struct QueryResult<'a, T, K = ()> {
    bits: BitSet,
    list: &'a IndexedList<T, K>,
}

impl<T, K> std::fmt::Debug for QueryResult<'_, T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult").field("bits", &self.bits).finish()
    }
}

impl<T, K: IndexKey + Eq + Hash> QueryResult<'_, T, K> {
    pub fn count(&self) -> usize {
        self.bits.count()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Matching records in slot order.
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        let core = self.list.core.read();
        let mut out = Vec::with_capacity(self.bits.count());
        for slot in self.bits.iter() {
            if let Some(record) = core.store.get(slot) {
                out.push(record.clone());
            }
        }
        out
    }

    /// Matching records, stable-sorted by the comparator.
    pub fn sort_by(&self, mut cmp: impl FnMut(&T, &T) -> Ordering) -> Vec<T>
    where
        T: Clone,
    {
        let mut values = self.values();
        values.sort_by(|a, b| cmp(a, b));
        values
    }

    /// Skips `offset` matches, collects up to `limit`. Offsets past the
    /// end produce an empty page with the true total.
    pub fn pagination(&self, offset: usize, limit: usize) -> (Vec<T>, PageInfo)
    where
        T: Clone,
    {
        let total = self.bits.count();
        let core = self.list.core.read();

        let mut out = Vec::with_capacity(limit.min(total));
        let mut seen = 0usize;
        for slot in self.bits.iter() {
            let Some(record) = core.store.get(slot) else {
                continue;
            };
            if seen < offset {
                seen += 1;
                continue;
            }
            if out.len() == limit {
                break;
            }
            out.push(record.clone());
            seen += 1;
        }

        let info = PageInfo {
            offset,
            limit,
            count: out.len(),
            total,
        };
        (out, info)
    }

    /// Removes every matching record from storage and all indexes, under
    /// one write lock. Slots another result already removed are skipped,
    /// so overlapping bulk deletions compose. Afterwards this result is
    /// empty.
    pub fn remove_all(&mut self) {
        {
            let mut core = self.list.core.write();
            let Core { store, registry } = &mut *core;

            for slot in self.bits.iter() {
                if let Some(old) = store.remove(slot) {
                    registry.unset(&old, slot);
                }
            }
        }
        self.bits = BitSet::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashIndex, SortedIndex};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Car {
        name: String,
        color: String,
        age: u8,
        is_new: bool,
    }

    fn car(name: &str, age: u8) -> Car {
        Car {
            name: name.to_string(),
            age,
            ..Car::default()
        }
    }

    #[test]
    fn test_insert_query_count() {
        let list = IndexedList::new();
        list.create_index("name", HashIndex::new(|c: &Car| c.name.clone()))
            .unwrap();

        list.insert(car("Dacia", 22));
        list.insert(car("Opel", 22));
        list.insert(car("Dacia", 5));
        assert_eq!(list.count(), 3);

        let result = list.query(&Query::eq("name", "Dacia")).unwrap();
        assert_eq!(result.count(), 2);
        assert_eq!(
            result.values(),
            vec![car("Dacia", 22), car("Dacia", 5)]
        );
    }

    #[test]
    fn test_index_created_after_data_is_backfilled() {
        let list = IndexedList::new();
        list.insert(car("Dacia", 22));
        list.insert(car("Opel", 22));

        // no index yet
        let err = list.query(&Query::eq("name", "Opel")).unwrap_err();
        assert_eq!(err, Error::UnknownField { name: "name".into() });

        list.create_index("name", HashIndex::new(|c: &Car| c.name.clone()))
            .unwrap();
        let result = list.query(&Query::eq("name", "Opel")).unwrap();
        assert_eq!(result.values(), vec![car("Opel", 22)]);
    }

    #[test]
    fn test_update_reindexes() {
        let list = IndexedList::with_id(|c: &Car| c.name.clone());
        list.create_index("age", HashIndex::new(|c: &Car| c.age))
            .unwrap();

        list.insert(car("Opel", 22));
        list.insert(car("Dacia", 22));

        list.update(car("Dacia", 25)).unwrap();

        assert_eq!(list.get(&"Dacia".to_string()).unwrap(), car("Dacia", 25));
        let result = list.query(&Query::eq("age", 25u8)).unwrap();
        assert_eq!(result.values(), vec![car("Dacia", 25)]);
        // the old entry is gone from the index
        let result = list.query(&Query::eq("age", 22u8)).unwrap();
        assert_eq!(result.values(), vec![car("Opel", 22)]);

        let err = list.update(car("NotThere", 1)).unwrap_err();
        assert!(matches!(err, Error::ValueNotFound { .. }));
    }

    #[test]
    fn test_update_without_key_index() {
        let list: IndexedList<Car> = IndexedList::new();
        list.insert(car("Opel", 22));
        assert_eq!(list.update(car("Opel", 23)).unwrap_err(), Error::NoPrimaryKey);
        assert_eq!(
            list.get(&()).unwrap_err(),
            Error::NoPrimaryKey
        );
        assert!(!list.contains(&()));
    }

    #[test]
    fn test_remove_lifecycle() {
        let list = IndexedList::with_id(|c: &Car| c.name.clone());
        list.insert(car("Opel", 22));
        list.insert(car("Dacia", 42));
        assert!(list.contains(&"Dacia".to_string()));

        let removed = list.remove(&"Dacia".to_string()).unwrap();
        assert_eq!(removed, car("Dacia", 42));
        assert_eq!(list.count(), 1);
        assert!(!list.contains(&"Dacia".to_string()));

        let err = list.remove(&"Dacia".to_string()).unwrap_err();
        assert_eq!(
            err,
            Error::ValueNotFound {
                value: crate::value::Value::Str("Dacia".into())
            }
        );
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let list = IndexedList::with_id(|c: &Car| c.name.clone());
        list.insert(car("Opel", 22));
        list.insert(car("Dacia", 42));

        list.remove(&"Opel".to_string()).unwrap();
        // freed slot 0 is reused and indexed for the new record
        let slot = list.insert(car("Audi", 7));
        assert_eq!(slot, 0);
        assert_eq!(list.get(&"Audi".to_string()).unwrap(), car("Audi", 7));
        assert_eq!(list.count(), 2);
    }

    #[test]
    fn test_remove_index_keeps_data() {
        let list = IndexedList::new();
        list.create_index("age", HashIndex::new(|c: &Car| c.age))
            .unwrap();
        list.insert(car("Opel", 22));

        assert!(!list.remove_index("not_found"));
        assert!(list.remove_index("age"));

        let err = list.query(&Query::eq("age", 22u8)).unwrap_err();
        assert_eq!(err, Error::UnknownField { name: "age".into() });
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn test_remove_id_index() {
        let list = IndexedList::with_id(|c: &Car| c.name.clone());
        list.insert(car("Opel", 22));

        assert!(list.remove_index("id"));
        assert_eq!(
            list.get(&"Opel".to_string()).unwrap_err(),
            Error::NoPrimaryKey
        );
        // data stays
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn test_query_result_remove_all_overlapping() {
        let list = IndexedList::new();
        list.create_index("name", HashIndex::new(|c: &Car| c.name.clone()))
            .unwrap();
        list.create_index("age", SortedIndex::new(|c: &Car| c.age))
            .unwrap();

        for c in [
            car("Mercedes", 22),
            car("Opel", 22),
            car("Dacia", 5),
            car("Dacia", 22),
            car("Audi", 22),
        ] {
            list.insert(c);
        }

        let mut first = list.query(&Query::eq("name", "Dacia")).unwrap();
        let mut second = list.query(&Query::eq("name", "Dacia")).unwrap();
        assert_eq!(first.count(), 2);
        assert_eq!(second.count(), 2);

        first.remove_all();
        assert_eq!(first.count(), 0);
        assert_eq!(list.count(), 3);

        // stale snapshot materializes to nothing
        assert!(second.values().is_empty());
        // and removing through it is a no-op
        second.remove_all();
        assert_eq!(list.count(), 3);

        let result = list.query(&Query::eq("name", "Dacia")).unwrap();
        assert!(result.is_empty());
        // the age index no longer knows the removed slots either
        let result = list.query(&Query::eq("age", 22u8)).unwrap();
        assert_eq!(result.count(), 3);
    }

    #[test]
    fn test_sort_by() {
        let list = IndexedList::new();
        list.create_index("age", HashIndex::new(|c: &Car| c.age))
            .unwrap();
        for c in [car("Mercedes", 22), car("Opel", 22), car("Audi", 22)] {
            list.insert(c);
        }

        let result = list.query(&Query::eq("age", 22u8)).unwrap();
        let sorted = result.sort_by(|a, b| a.name.cmp(&b.name));
        let names: Vec<_> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Audi", "Mercedes", "Opel"]);
    }
}
