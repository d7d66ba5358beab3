//! Row predicates: `(column, operator, literal)` triples.
//!
//! A [`Predicate`] is resolved against a table once per operation into a
//! [`BoundPredicate`], so the column lookup and the literal parse happen
//! before any row is touched.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{TabError, TabResult};
use crate::types::{DataType, LiteralPolicy, Row, Value};

/// Comparison operators accepted in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    /// Apply the operator to an ordering of `stored` relative to `literal`.
    ///
    /// An unordered pair (NaN) only satisfies `!=`.
    pub fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (CompareOp::Ne, ord) => ord != Some(Ordering::Equal),
            (_, None) => false,
            (CompareOp::Eq, Some(ord)) => ord == Ordering::Equal,
            (CompareOp::Gt, Some(ord)) => ord == Ordering::Greater,
            (CompareOp::Lt, Some(ord)) => ord == Ordering::Less,
            (CompareOp::Ge, Some(ord)) => ord != Ordering::Less,
            (CompareOp::Le, Some(ord)) => ord != Ordering::Greater,
        }
    }
}

impl FromStr for CompareOp {
    type Err = TabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            other => Err(TabError::UnknownOperator { operator: other.to_string() }),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Compare a stored value against a text literal parsed as `data_type`.
pub fn compare(
    data_type: DataType,
    stored: &Value,
    literal: &str,
    op: CompareOp,
    policy: LiteralPolicy,
) -> TabResult<bool> {
    let rhs = Value::parse(data_type, literal, policy)?;
    Ok(op.holds(stored.compare(&rhs)))
}

/// A row selector as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: CompareOp,
    pub literal: String,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: CompareOp, literal: impl Into<String>) -> Self {
        Self { column: column.into(), op, literal: literal.into() }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.literal)
    }
}

/// A predicate resolved to a column position with its literal parsed.
#[derive(Debug, Clone)]
pub struct BoundPredicate {
    pub(crate) index: usize,
    pub(crate) op: CompareOp,
    pub(crate) literal: Value,
}

impl BoundPredicate {
    pub(crate) fn new(index: usize, data_type: DataType, predicate: &Predicate, policy: LiteralPolicy) -> TabResult<Self> {
        Ok(Self {
            index,
            op: predicate.op,
            literal: Value::parse(data_type, &predicate.literal, policy)?,
        })
    }

    pub fn matches(&self, row: &Row) -> bool {
        match row.get(self.index) {
            Some(stored) => self.op.holds(stored.compare(&self.literal)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse() {
        assert_eq!("=".parse::<CompareOp>().unwrap(), CompareOp::Eq);
        assert_eq!("!=".parse::<CompareOp>().unwrap(), CompareOp::Ne);
        assert_eq!(">=".parse::<CompareOp>().unwrap(), CompareOp::Ge);
        assert_eq!(" <= ".parse::<CompareOp>().unwrap(), CompareOp::Le);
        assert!(matches!("=>".parse::<CompareOp>(), Err(TabError::UnknownOperator { .. })));
        assert!(matches!("==".parse::<CompareOp>(), Err(TabError::UnknownOperator { .. })));
    }

    #[test]
    fn test_compare_numeric() {
        let stored = Value::Int32(10);
        let strict = LiteralPolicy::Strict;
        assert!(compare(DataType::Int32, &stored, "10", CompareOp::Eq, strict).unwrap());
        assert!(compare(DataType::Int32, &stored, "9", CompareOp::Gt, strict).unwrap());
        assert!(compare(DataType::Int32, &stored, "10", CompareOp::Ge, strict).unwrap());
        assert!(compare(DataType::Int32, &stored, "11", CompareOp::Lt, strict).unwrap());
        assert!(!compare(DataType::Int32, &stored, "10", CompareOp::Ne, strict).unwrap());
        assert!(compare(DataType::Int32, &stored, "-3", CompareOp::Gt, strict).unwrap());
    }

    #[test]
    fn test_compare_string() {
        let stored = Value::from("nut");
        let strict = LiteralPolicy::Strict;
        assert!(compare(DataType::String, &stored, "bolt", CompareOp::Gt, strict).unwrap());
        assert!(compare(DataType::String, &stored, "nut", CompareOp::Le, strict).unwrap());
        assert!(compare(DataType::String, &stored, "nuts", CompareOp::Lt, strict).unwrap());
    }

    #[test]
    fn test_compare_malformed_literal_per_policy() {
        let stored = Value::UInt32(0);
        let err = compare(DataType::UInt32, &stored, "abc", CompareOp::Eq, LiteralPolicy::Strict);
        assert!(matches!(err, Err(TabError::InvalidLiteral { .. })));

        // Lenient: "abc" becomes 0, which equals the stored 0
        assert!(compare(DataType::UInt32, &stored, "abc", CompareOp::Eq, LiteralPolicy::Lenient).unwrap());
    }

    #[test]
    fn test_nan_only_satisfies_not_equal() {
        let stored = Value::Float32(f32::NAN);
        for op in [CompareOp::Eq, CompareOp::Gt, CompareOp::Lt, CompareOp::Ge, CompareOp::Le] {
            assert!(!compare(DataType::Float32, &stored, "1.0", op, LiteralPolicy::Strict).unwrap());
        }
        assert!(compare(DataType::Float32, &stored, "1.0", CompareOp::Ne, LiteralPolicy::Strict).unwrap());
    }

    #[test]
    fn test_bound_predicate_short_row() {
        let pred = Predicate::new("x", CompareOp::Eq, "1");
        let bound = BoundPredicate::new(3, DataType::Int32, &pred, LiteralPolicy::Strict).unwrap();
        assert!(!bound.matches(&Row::new(vec![Value::Int32(1)])));
    }
}
