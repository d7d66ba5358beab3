//! TableStore: schema plus rows for one table.
//!
//! Every operation keeps the row invariant: each row has exactly one value
//! per attribute, and value `i` has the type of attribute `i`. Operations
//! validate (column lookup, literal parsing, arity) before mutating, so a
//! failed call leaves the table as it was.

use std::fmt;

use crate::error::{TabError, TabResult};
use crate::predicate::{BoundPredicate, Predicate};
use crate::types::{Attribute, DataType, LiteralPolicy, Row, Value};

/// Row capacity of a freshly created table. Capacity doubles when full.
pub const INITIAL_ROW_CAPACITY: usize = 4;

/// One typed table held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    attributes: Vec<Attribute>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table.
    ///
    /// The name must be non-empty, there must be at least one attribute, and
    /// attribute names must be non-empty and unique.
    pub fn create(name: impl Into<String>, attributes: Vec<Attribute>) -> TabResult<Self> {
        Self::with_row_capacity(name, attributes, INITIAL_ROW_CAPACITY)
    }

    /// Like [`Table::create`] with an explicit starting row capacity.
    pub fn with_row_capacity(name: impl Into<String>, attributes: Vec<Attribute>, capacity: usize) -> TabResult<Self> {
        let name = name.into();
        validate_table_name(&name)?;

        if attributes.is_empty() {
            return Err(TabError::InvalidSchema {
                reason: format!("table '{}' needs at least one attribute", name),
            });
        }
        for (i, attr) in attributes.iter().enumerate() {
            if attr.name.is_empty() {
                return Err(TabError::InvalidSchema {
                    reason: format!("attribute {} of table '{}' has an empty name", i, name),
                });
            }
            if attributes[..i].iter().any(|prev| prev.name == attr.name) {
                return Err(TabError::InvalidSchema {
                    reason: format!("attribute name '{}' appears more than once", attr.name),
                });
            }
        }

        Ok(Self {
            name,
            attributes,
            rows: Vec::with_capacity(capacity.max(1)),
        })
    }

    /// Assemble a table from decoded parts without schema validation.
    ///
    /// Used by the codec; the caller guarantees the row invariant.
    pub(crate) fn from_parts(name: String, attributes: Vec<Attribute>, rows: Vec<Row>) -> Self {
        Self { name, attributes, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Rows that fit before the next growth step.
    pub fn row_capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Position of the first attribute named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    fn require_column(&self, name: &str) -> TabResult<usize> {
        self.column_index(name).ok_or_else(|| TabError::ColumnNotFound {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    fn bind(&self, predicate: &Predicate, policy: LiteralPolicy) -> TabResult<BoundPredicate> {
        let index = self.require_column(&predicate.column)?;
        BoundPredicate::new(index, self.attributes[index].data_type, predicate, policy)
    }

    /// Rename the table in place.
    pub fn rename(&mut self, new_name: impl Into<String>) -> TabResult<()> {
        let new_name = new_name.into();
        validate_table_name(&new_name)?;
        self.name = new_name;
        Ok(())
    }

    /// Append a row. Values move into the table.
    pub fn insert(&mut self, values: Vec<Value>) -> TabResult<()> {
        if values.len() != self.attributes.len() {
            return Err(TabError::ArityMismatch {
                expected: self.attributes.len(),
                actual: values.len(),
            });
        }
        for (attr, value) in self.attributes.iter().zip(&values) {
            if value.data_type() != attr.data_type {
                return Err(TabError::TypeMismatch {
                    column: attr.name.clone(),
                    expected: attr.data_type,
                    found: value.data_type(),
                });
            }
        }

        self.grow_if_full()?;
        self.rows.push(Row::new(values));
        Ok(())
    }

    /// Append a row given as text, parsing each literal by its column type.
    pub fn insert_literals(&mut self, literals: &[&str], policy: LiteralPolicy) -> TabResult<()> {
        if literals.len() != self.attributes.len() {
            return Err(TabError::ArityMismatch {
                expected: self.attributes.len(),
                actual: literals.len(),
            });
        }
        let values = self
            .attributes
            .iter()
            .zip(literals)
            .map(|(attr, literal)| Value::parse(attr.data_type, literal, policy))
            .collect::<TabResult<Vec<_>>>()?;
        self.insert(values)
    }

    /// Double row capacity when the next append would not fit.
    fn grow_if_full(&mut self) -> TabResult<()> {
        if self.rows.len() < self.rows.capacity() {
            return Ok(());
        }
        let additional = self.rows.capacity().max(INITIAL_ROW_CAPACITY);
        self.rows
            .try_reserve_exact(additional)
            .map_err(|_| TabError::CapacityExhausted {
                requested: self.rows.len() + additional,
            })
    }

    /// Iterate over all rows in insertion order.
    pub fn scan(&self) -> impl Iterator<Item = &Row> + '_ {
        self.rows.iter()
    }

    /// Lazily yield rows matching `predicate`.
    ///
    /// The column is resolved and the literal parsed up front; errors surface
    /// here rather than during iteration.
    pub fn filter<'a>(
        &'a self,
        predicate: &Predicate,
        policy: LiteralPolicy,
    ) -> TabResult<impl Iterator<Item = &'a Row> + 'a> {
        let bound = self.bind(predicate, policy)?;
        Ok(self.rows.iter().filter(move |row| bound.matches(row)))
    }

    /// Copy the rows matching `predicate` into a new table with this schema.
    pub fn select(&self, predicate: &Predicate, policy: LiteralPolicy) -> TabResult<Table> {
        let rows: Vec<Row> = self.filter(predicate, policy)?.cloned().collect();
        Ok(Table::from_parts(self.name.clone(), self.attributes.clone(), rows))
    }

    /// Remove every matching row, keeping the others in order.
    pub fn delete(&mut self, predicate: &Predicate, policy: LiteralPolicy) -> TabResult<usize> {
        let bound = self.bind(predicate, policy)?;
        let before = self.rows.len();
        self.rows.retain(|row| !bound.matches(row));
        Ok(before - self.rows.len())
    }

    /// Set `target` to `new_literal` in every matching row.
    ///
    /// The new literal is parsed by the target column's type, independent of
    /// the predicate column.
    pub fn update(
        &mut self,
        target: &str,
        new_literal: &str,
        predicate: &Predicate,
        policy: LiteralPolicy,
    ) -> TabResult<usize> {
        let target_index = self.require_column(target)?;
        let new_value = Value::parse(self.attributes[target_index].data_type, new_literal, policy)?;
        let bound = self.bind(predicate, policy)?;

        let mut updated = 0;
        for row in self.rows.iter_mut().filter(|row| bound.matches(row)) {
            row.values_mut()[target_index] = new_value.clone();
            updated += 1;
        }
        Ok(updated)
    }

    /// Append a column; existing rows get the type's zero value.
    pub fn add_column(&mut self, name: impl Into<String>, data_type: DataType) -> TabResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(TabError::InvalidSchema {
                reason: "attribute name must not be empty".to_string(),
            });
        }
        if self.column_index(&name).is_some() {
            return Err(TabError::DuplicateName { kind: "column", name });
        }

        let zero = Value::zero(data_type);
        for row in &mut self.rows {
            row.values_mut().push(zero.clone());
        }
        self.attributes.push(Attribute::new(name, data_type));
        Ok(())
    }

    /// Remove a column and its value from every row.
    pub fn drop_column(&mut self, name: &str) -> TabResult<()> {
        let index = self.require_column(name)?;
        for row in &mut self.rows {
            row.values_mut().remove(index);
        }
        self.attributes.remove(index);
        Ok(())
    }
}

fn validate_table_name(name: &str) -> TabResult<()> {
    if name.is_empty() {
        return Err(TabError::InvalidSchema {
            reason: "table name must not be empty".to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        for attr in &self.attributes {
            write!(f, "| {:<15} ", attr.name)?;
        }
        writeln!(f, "|")?;
        for _ in &self.attributes {
            write!(f, "+-----------------")?;
        }
        writeln!(f, "+")?;
        for row in &self.rows {
            for value in row.values() {
                write!(f, "| {:<15} ", value.to_string())?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CompareOp;

    const STRICT: LiteralPolicy = LiteralPolicy::Strict;

    fn inventory() -> Table {
        let mut table = Table::create(
            "Inventory",
            vec![
                Attribute::new("id", DataType::Int32),
                Attribute::new("name", DataType::String),
                Attribute::new("qty", DataType::UInt32),
            ],
        )
        .unwrap();
        table.insert(vec![1.into(), "bolt".into(), 50u32.into()]).unwrap();
        table.insert(vec![2.into(), "nut".into(), 3u32.into()]).unwrap();
        table
    }

    fn numbered(n: i32) -> Table {
        let mut table = Table::create("nums", vec![Attribute::new("n", DataType::Int32)]).unwrap();
        for i in 0..n {
            table.insert(vec![Value::Int32(i)]).unwrap();
        }
        table
    }

    fn ids(table: &Table) -> Vec<i32> {
        table
            .scan()
            .map(|row| match row.get(0) {
                Some(Value::Int32(v)) => *v,
                other => panic!("unexpected value {:?}", other),
            })
            .collect()
    }

    fn assert_invariant(table: &Table) {
        for row in table.rows() {
            assert_eq!(row.len(), table.attribute_count());
            for (value, attr) in row.values().iter().zip(table.attributes()) {
                assert_eq!(value.data_type(), attr.data_type);
            }
        }
    }

    #[test]
    fn test_create_rejects_bad_schemas() {
        assert!(matches!(
            Table::create("", vec![Attribute::new("a", DataType::Int32)]),
            Err(TabError::InvalidSchema { .. })
        ));
        assert!(matches!(Table::create("t", vec![]), Err(TabError::InvalidSchema { .. })));
        assert!(matches!(
            Table::create("t", vec![Attribute::new("a", DataType::Int32), Attribute::new("a", DataType::String)]),
            Err(TabError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_insert_arity_and_type_checked() {
        let mut table = inventory();
        assert!(matches!(
            table.insert(vec![3.into(), "washer".into()]),
            Err(TabError::ArityMismatch { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            table.insert(vec![3.into(), "washer".into(), 7.into()]),
            Err(TabError::TypeMismatch { .. })
        ));
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_capacity_doubles_without_losing_rows() {
        let mut table = numbered(0);
        assert_eq!(table.row_capacity(), INITIAL_ROW_CAPACITY);

        for i in 0..INITIAL_ROW_CAPACITY as i32 {
            table.insert(vec![Value::Int32(i)]).unwrap();
        }
        assert_eq!(table.row_capacity(), INITIAL_ROW_CAPACITY);

        table.insert(vec![Value::Int32(99)]).unwrap();
        assert!(table.row_capacity() >= INITIAL_ROW_CAPACITY * 2);
        assert_eq!(ids(&table), vec![0, 1, 2, 3, 99]);
    }

    #[test]
    fn test_insert_many_row_count() {
        for k in [0, 1, 4, 5, 100] {
            let table = numbered(k);
            assert_eq!(table.row_count(), k as usize);
            assert_invariant(&table);
        }
    }

    #[test]
    fn test_insert_literals() {
        let mut table = inventory();
        table.insert_literals(&["3", "washer", "12"], STRICT).unwrap();
        assert_eq!(table.rows()[2].get(2), Some(&Value::UInt32(12)));

        let err = table.insert_literals(&["x", "washer", "12"], STRICT);
        assert!(matches!(err, Err(TabError::InvalidLiteral { .. })));
        assert_eq!(table.row_count(), 3);

        table.insert_literals(&["x", "washer", "12"], LiteralPolicy::Lenient).unwrap();
        assert_eq!(table.rows()[3].get(0), Some(&Value::Int32(0)));
    }

    #[test]
    fn test_filter_is_lazy_view() {
        let table = inventory();
        let pred = Predicate::new("qty", CompareOp::Gt, "10");
        let matched: Vec<&Row> = table.filter(&pred, STRICT).unwrap().collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get(1), Some(&Value::from("bolt")));
    }

    #[test]
    fn test_filter_unknown_column() {
        let table = inventory();
        let pred = Predicate::new("price", CompareOp::Eq, "1");
        assert!(matches!(table.filter(&pred, STRICT).err(), Some(TabError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_filter_duplicate_column_first_match_wins() {
        // Decoded files are not re-validated, so duplicates can exist.
        let table = Table::from_parts(
            "dup".to_string(),
            vec![Attribute::new("x", DataType::Int32), Attribute::new("x", DataType::Int32)],
            vec![
                Row::new(vec![Value::Int32(1), Value::Int32(2)]),
                Row::new(vec![Value::Int32(2), Value::Int32(1)]),
            ],
        );
        let pred = Predicate::new("x", CompareOp::Eq, "1");
        let matched: Vec<&Row> = table.filter(&pred, STRICT).unwrap().collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get(1), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_select_copies_schema() {
        let table = inventory();
        let selected = table.select(&Predicate::new("name", CompareOp::Eq, "nut"), STRICT).unwrap();
        assert_eq!(selected.attributes(), table.attributes());
        assert_eq!(selected.row_count(), 1);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_delete_preserves_order() {
        let mut table = numbered(8);
        let mut deleted = 0;
        for n in ["2", "5", "7"] {
            deleted += table.delete(&Predicate::new("n", CompareOp::Eq, n), STRICT).unwrap();
        }
        assert_eq!(deleted, 3);
        assert_eq!(table.row_count(), 5);
        assert_eq!(ids(&table), vec![0, 1, 3, 4, 6]);
    }

    #[test]
    fn test_delete_consecutive_and_tail() {
        let mut table = numbered(8);
        let deleted = table.delete(&Predicate::new("n", CompareOp::Ge, "5"), STRICT).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(ids(&table), vec![0, 1, 2, 3, 4]);

        let deleted = table.delete(&Predicate::new("n", CompareOp::Lt, "100"), STRICT).unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_delete_bad_literal_leaves_table() {
        let mut table = numbered(3);
        let err = table.delete(&Predicate::new("n", CompareOp::Eq, "two"), STRICT);
        assert!(matches!(err, Err(TabError::InvalidLiteral { .. })));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_update_only_matching_rows() {
        let mut table = inventory();
        table.add_column("price", DataType::Float32).unwrap();
        table.insert(vec![3.into(), "washer".into(), 11u32.into(), 0.5f32.into()]).unwrap();

        let before = table.clone();
        let updated = table
            .update("price", "9.99", &Predicate::new("qty", CompareOp::Gt, "10"), STRICT)
            .unwrap();
        assert_eq!(updated, 2);

        for (new, old) in table.rows().iter().zip(before.rows()) {
            let qty = match old.get(2) {
                Some(Value::UInt32(q)) => *q,
                _ => unreachable!(),
            };
            assert_eq!(&new.values()[..3], &old.values()[..3]);
            if qty > 10 {
                assert_eq!(new.get(3), Some(&Value::Float32(9.99)));
            } else {
                assert_eq!(new.get(3), old.get(3));
            }
        }
    }

    #[test]
    fn test_update_parses_by_target_type() {
        let mut table = inventory();
        let updated = table
            .update("name", "12", &Predicate::new("id", CompareOp::Eq, "1"), STRICT)
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(table.rows()[0].get(1), Some(&Value::from("12")));

        let err = table.update("qty", "lots", &Predicate::new("id", CompareOp::Eq, "1"), STRICT);
        assert!(matches!(err, Err(TabError::InvalidLiteral { expected: DataType::UInt32, .. })));
        assert_eq!(table.rows()[0].get(2), Some(&Value::UInt32(50)));
    }

    #[test]
    fn test_add_column_zero_fills() {
        let mut table = inventory();
        table.add_column("price", DataType::Float32).unwrap();
        table.add_column("note", DataType::String).unwrap();
        assert_invariant(&table);
        assert_eq!(table.rows()[1].get(3), Some(&Value::Float32(0.0)));
        assert_eq!(table.rows()[1].get(4), Some(&Value::Str(String::new())));
        assert_eq!(table.rows()[1].get(1), Some(&Value::from("nut")));

        assert!(matches!(
            table.add_column("qty", DataType::Int32),
            Err(TabError::DuplicateName { kind: "column", .. })
        ));
    }

    #[test]
    fn test_add_then_drop_restores() {
        let mut table = inventory();
        let before = table.clone();
        table.add_column("price", DataType::Float32).unwrap();
        table.drop_column("price").unwrap();
        assert_eq!(table.attributes(), before.attributes());
        assert_eq!(table.rows(), before.rows());
    }

    #[test]
    fn test_drop_first_last_and_only() {
        let mut table = inventory();
        table.drop_column("id").unwrap();
        assert_eq!(table.attributes()[0].name, "name");
        assert_eq!(table.rows()[0].values(), &[Value::from("bolt"), Value::UInt32(50)]);

        table.drop_column("qty").unwrap();
        assert_eq!(table.attribute_count(), 1);
        assert_eq!(table.rows()[1].values(), &[Value::from("nut")]);

        table.drop_column("name").unwrap();
        assert_eq!(table.attribute_count(), 0);
        assert_eq!(table.row_count(), 2);
        assert_invariant(&table);

        assert!(matches!(table.drop_column("name"), Err(TabError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_rename() {
        let mut table = inventory();
        table.rename("Stock").unwrap();
        assert_eq!(table.name(), "Stock");
        assert!(table.rename("").is_err());
        assert_eq!(table.name(), "Stock");
    }

    #[test]
    fn test_display_grid() {
        let rendered = inventory().to_string();
        assert!(rendered.contains("Table: Inventory"));
        assert!(rendered.contains("| id"));
        assert!(rendered.contains("bolt"));
    }
}
