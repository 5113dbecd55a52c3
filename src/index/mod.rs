//! Secondary indexes: the mapping from indexed values to bitsets of slot
//! ids.
//!
//! Every index is parameterized by an extractor closure resolved once at
//! construction; lookups never inspect record types. The read side hands
//! out `Cow<BitSet>`: `Borrowed` is an alias of index-internal state the
//! caller must clone before mutating, `Owned` already belongs to the
//! caller. That split is what lets equality lookups answer straight out of
//! their buckets without allocating.

mod hash;
mod key;
mod sorted;

pub use hash::HashIndex;
pub use sorted::SortedIndex;

pub(crate) use key::KeyIndex;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::bitset::BitSet;
use crate::error::Error;
use crate::value::{IndexKey, Value};

/// Reserved field name routed to the primary-key index.
pub(crate) const ID_FIELD: &str = "id";

/// Lookup operator an index may be asked to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Range lookup over `[lo, hi]`; an open flag excludes that endpoint.
    Between { lo_open: bool, hi_open: bool },
    StartsWith,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Between { .. } => "BETWEEN",
            Op::StartsWith => "STARTSWITH",
        };
        f.write_str(s)
    }
}

/// The capability set of a registered index.
pub trait Index<T>: Send + Sync + std::fmt::Debug {
    /// Registers `slot` under the value extracted from `record`.
    fn set(&mut self, record: &T, slot: u32);

    /// Unregisters `slot` from the value extracted from `record`.
    fn unset(&mut self, record: &T, slot: u32);

    /// Serves `op` over `args`. A value miss yields an empty bitset, never
    /// an error; errors are reserved for unknown operators, wrong argument
    /// counts, and type mismatches.
    fn lookup(&self, op: Op, args: &[&Value]) -> Result<Cow<'_, BitSet>, Error>;
}

/// Value-is-the-key extractor, for lists of raw indexable values.
pub fn identity<V: Clone>() -> fn(&V) -> V {
    |v| v.clone()
}

pub(crate) fn single_arg<'a>(args: &[&'a Value]) -> Result<&'a Value, Error> {
    match args {
        [value] => Ok(value),
        _ => Err(Error::InvalidArgCount {
            expected: 1,
            got: args.len(),
        }),
    }
}

pub(crate) fn pair_args<'a>(args: &[&'a Value]) -> Result<(&'a Value, &'a Value), Error> {
    match args {
        [lo, hi] => Ok((lo, hi)),
        _ => Err(Error::InvalidArgCount {
            expected: 2,
            got: args.len(),
        }),
    }
}

/// Named dictionary of field indexes plus the live-slot bitset. Owned by
/// the list façade; all access happens under its lock.
pub(crate) struct IndexRegistry<T, K> {
    id: Option<KeyIndex<T, K>>,
    fields: HashMap<String, Box<dyn Index<T>>>,
    all_ids: BitSet,
}

impl<T, K: IndexKey + Eq + Hash> IndexRegistry<T, K> {
    pub(crate) fn new(id: Option<KeyIndex<T, K>>) -> Self {
        IndexRegistry {
            id,
            fields: HashMap::new(),
            all_ids: BitSet::new(),
        }
    }

    /// Bitset of every live slot id: the neutral element for AND, the
    /// domain for NOT.
    pub(crate) fn all_ids(&self) -> &BitSet {
        &self.all_ids
    }

    pub(crate) fn key_index(&self) -> Result<&KeyIndex<T, K>, Error> {
        self.id.as_ref().ok_or(Error::NoPrimaryKey)
    }

    /// Lookup dispatch for the query layer. The reserved name resolves to
    /// the primary-key index.
    pub(crate) fn lookup_by_name(&self, name: &str) -> Result<&dyn Index<T>, Error> {
        if name == ID_FIELD {
            return self.key_index().map(|idx| idx as &dyn Index<T>);
        }

        match self.fields.get(name) {
            Some(index) => Ok(index.as_ref()),
            None => Err(Error::UnknownField {
                name: name.to_string(),
            }),
        }
    }

    /// Fans a new record out to the key index, `all_ids`, and every field
    /// index.
    pub(crate) fn set(&mut self, record: &T, slot: u32) {
        if let Some(id) = &mut self.id {
            id.set(record, slot);
        }
        self.all_ids.set(slot);
        for index in self.fields.values_mut() {
            index.set(record, slot);
        }
    }

    /// Removes a record from the key index, `all_ids`, and every field
    /// index.
    pub(crate) fn unset(&mut self, record: &T, slot: u32) {
        if let Some(id) = &mut self.id {
            id.unset(record, slot);
        }
        self.all_ids.unset(slot);
        for index in self.fields.values_mut() {
            index.unset(record, slot);
        }
    }

    /// Re-indexes a replaced record in every field index. The primary key
    /// is unchanged by definition (it located the slot).
    pub(crate) fn reindex(&mut self, old: &T, new: &T, slot: u32) {
        for index in self.fields.values_mut() {
            index.unset(old, slot);
            index.set(new, slot);
        }
    }

    /// Validates the name, backfills the index from all live records, then
    /// publishes it.
    pub(crate) fn create<'a>(
        &mut self,
        name: &str,
        mut index: Box<dyn Index<T>>,
        records: impl Iterator<Item = (u32, &'a T)>,
    ) -> Result<(), Error>
    where
        T: 'a,
    {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if name == ID_FIELD {
            return Err(Error::ReservedName {
                name: name.to_string(),
            });
        }
        if self.fields.contains_key(name) {
            return Err(Error::DuplicateIndex {
                name: name.to_string(),
            });
        }

        for (slot, record) in records {
            index.set(record, slot);
        }

        self.fields.insert(name.to_string(), index);
        Ok(())
    }

    /// Drops the index storage; records are untouched. Removing the
    /// reserved name drops the primary-key index.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        if name == ID_FIELD {
            return self.id.take().is_some();
        }
        self.fields.remove(name).is_some()
    }
}
