//! Composable query combinators.
//!
//! A query is a tree of leaves (index lookups) and connectives (bitset
//! algebra) evaluated against the registry under the list's read lock.
//! Evaluation returns `Cow<BitSet>`: lookups answer with borrowed aliases
//! of their internal bitsets, and a connective that needs to mutate calls
//! `Cow::to_mut`, which clones exactly once per compound query. That call
//! is the single place the query layer allocates.

use std::borrow::Cow;
use std::hash::Hash;

use smallvec::SmallVec;

use crate::bitset::BitSet;
use crate::error::Error;
use crate::index::{IndexRegistry, Op};
use crate::value::{IndexKey, Value};

/// A composable filter over an indexed list.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every live record; the neutral element for `And`.
    All,
    /// Primary-key lookup through the reserved index.
    Id(Value),
    Eq(String, Value),
    NotEq(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Between {
        field: String,
        lo: Value,
        hi: Value,
        lo_open: bool,
        hi_open: bool,
    },
    /// Equality against any of the values; empty list matches nothing.
    In(String, SmallVec<[Value; 4]>),
    /// String prefix match on a sorted string index.
    WithPrefix(String, Value),
    /// Matches records whose optional field is absent.
    IsNull(String),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    /// `base ∖ sub`; skips evaluating `sub` when `base` is already empty.
    AndNot(Box<Query>, Box<Query>),
}

impl Query {
    pub fn all() -> Self {
        Query::All
    }

    pub fn id(value: impl Into<Value>) -> Self {
        Query::Id(value.into())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Eq(field.into(), value.into())
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::NotEq(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Le(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Ge(field.into(), value.into())
    }

    /// Inclusive range on both ends.
    pub fn between(
        field: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        Query::Between {
            field: field.into(),
            lo: lo.into(),
            hi: hi.into(),
            lo_open: false,
            hi_open: false,
        }
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Query::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn with_prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Query::WithPrefix(field.into(), Value::Str(prefix.into()))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Query::IsNull(field.into())
    }

    pub fn and(self, other: Query) -> Self {
        match self {
            Query::And(mut operands) => {
                operands.push(other);
                Query::And(operands)
            }
            first => Query::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Query) -> Self {
        match self {
            Query::Or(mut operands) => {
                operands.push(other);
                Query::Or(operands)
            }
            first => Query::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Query::Not(Box::new(self))
    }

    pub fn and_not(self, sub: Query) -> Self {
        Query::AndNot(Box::new(self), Box::new(sub))
    }

    /// Evaluates against the registry. Leaf errors abort the whole
    /// composition; connectives never swallow them.
    pub(crate) fn eval<'r, T, K>(
        &self,
        registry: &'r IndexRegistry<T, K>,
    ) -> Result<Cow<'r, BitSet>, Error>
    where
        K: IndexKey + Eq + Hash,
    {
        match self {
            Query::All => Ok(Cow::Borrowed(registry.all_ids())),

            Query::Id(value) => {
                let index = registry.lookup_by_name(crate::index::ID_FIELD)?;
                index.lookup(Op::Eq, &[value])
            }

            Query::Eq(field, value) => {
                registry.lookup_by_name(field)?.lookup(Op::Eq, &[value])
            }
            Query::Lt(field, value) => {
                registry.lookup_by_name(field)?.lookup(Op::Lt, &[value])
            }
            Query::Le(field, value) => {
                registry.lookup_by_name(field)?.lookup(Op::Le, &[value])
            }
            Query::Gt(field, value) => {
                registry.lookup_by_name(field)?.lookup(Op::Gt, &[value])
            }
            Query::Ge(field, value) => {
                registry.lookup_by_name(field)?.lookup(Op::Ge, &[value])
            }

            Query::NotEq(field, value) => {
                let matches = registry.lookup_by_name(field)?.lookup(Op::Eq, &[value])?;
                if matches.is_empty() {
                    return Ok(Cow::Borrowed(registry.all_ids()));
                }
                let mut result = registry.all_ids().clone();
                result.and_not(&matches);
                Ok(Cow::Owned(result))
            }

            Query::Between {
                field,
                lo,
                hi,
                lo_open,
                hi_open,
            } => registry.lookup_by_name(field)?.lookup(
                Op::Between {
                    lo_open: *lo_open,
                    hi_open: *hi_open,
                },
                &[lo, hi],
            ),

            Query::In(field, values) => {
                if values.is_empty() {
                    return Ok(Cow::Owned(BitSet::new()));
                }

                let index = registry.lookup_by_name(field)?;
                let first = index.lookup(Op::Eq, &[&values[0]])?;
                if values.len() == 1 {
                    return Ok(first);
                }

                let mut result = first.into_owned();
                for value in &values[1..] {
                    result.or(index.lookup(Op::Eq, &[value])?.as_ref());
                }
                Ok(Cow::Owned(result))
            }

            Query::WithPrefix(field, prefix) => {
                registry.lookup_by_name(field)?.lookup(Op::StartsWith, &[prefix])
            }

            Query::IsNull(field) => {
                registry.lookup_by_name(field)?.lookup(Op::Eq, &[&Value::Null])
            }

            Query::And(operands) => {
                let mut iter = operands.iter();
                let Some(first) = iter.next() else {
                    return Ok(Cow::Borrowed(registry.all_ids()));
                };

                let mut acc = first.eval(registry)?;
                for operand in iter {
                    let rhs = operand.eval(registry)?;
                    acc.to_mut().and(&rhs);
                }
                Ok(acc)
            }

            Query::Or(operands) => {
                let mut iter = operands.iter();
                let Some(first) = iter.next() else {
                    return Ok(Cow::Owned(BitSet::new()));
                };

                let mut acc = first.eval(registry)?;
                for operand in iter {
                    let rhs = operand.eval(registry)?;
                    acc.to_mut().or(&rhs);
                }
                Ok(acc)
            }

            Query::Not(inner) => {
                let matches = inner.eval(registry)?;
                let mut result = registry.all_ids().clone();
                result.and_not(&matches);
                Ok(Cow::Owned(result))
            }

            Query::AndNot(base, sub) => {
                let mut acc = base.eval(registry)?;
                if acc.is_empty() {
                    return Ok(acc);
                }
                let rhs = sub.eval(registry)?;
                acc.to_mut().and_not(&rhs);
                Ok(acc)
            }
        }
    }
}
