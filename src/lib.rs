// IndexList v0.3.0 - In-Memory Index-Aware Collection
// Predicate queries as bitmap set algebra over slot-stable records

pub mod bitset;
pub mod dsl;
pub mod error;
pub mod index;
pub mod list;
pub mod query;
pub mod skiplist;
pub mod slotmap;
pub mod store;
pub mod value;

// Re-export main types
pub use bitset::BitSet;
pub use error::Error;
pub use index::{identity, HashIndex, Index, Op, SortedIndex};
pub use list::{IndexedList, PageInfo, QueryResult};
pub use query::Query;
pub use skiplist::SkipList;
pub use slotmap::{Handle, SlotMap};
pub use store::SlotStore;
pub use value::{IndexKey, Value};
