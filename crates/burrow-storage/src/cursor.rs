//! Cursor: ordered iteration and point mutation over one table.
//!
//! A cursor is a `(leaf page, record slot)` position; page 0 (the meta
//! node, never a leaf) doubles as the end-of-table sentinel. Leaves whose
//! live record count has dropped to zero are skipped transparently, both
//! when the cursor opens and as it advances.
//!
//! The cursor also owns the entry points the query executor drives for
//! selection, projection, limit, grouping keys, and sorting. Expression
//! evaluation itself stays outside the storage engine: the executor hands
//! in a [`RowEvaluator`] and opaque expression values, and the cursor only
//! routes rows through it.

use crate::record::{self, Record, Schema};
use crate::rows::RowList;
use crate::tree::Table;
use burrow_common::{BurrowError, Result, Value};
use bytes::{Bytes, BytesMut};
use std::cmp::Ordering;

/// Expression evaluation callback provided by the query executor.
///
/// The expression type is opaque to the storage engine.
pub trait RowEvaluator {
    type Expr;

    /// Evaluates an expression against one row.
    fn eval(&self, expr: &Self::Expr, row: &Record, schema: &Schema) -> Result<Value>;
}

/// Iterator plus mutation handle bound to a position within one table.
pub struct Cursor<'a> {
    table: &'a Table,
    node: u32,
    slot: u16,
}

impl Table {
    /// Opens a cursor, optionally positioned at the leaf owning a key.
    ///
    /// A seek key above the cached largest key starts at end-of-table
    /// without touching the tree. Leaves with no live records are skipped.
    pub fn cursor(&self, seek: Option<&Value>) -> Result<Cursor<'_>> {
        let node = match seek {
            None => self.leftmost_leaf()?,
            Some(key) => {
                let m = self.read_meta()?;
                let beyond_max = match self.max_key_value(&m)? {
                    Some(max) => key.compare(&max)? == Ordering::Greater,
                    None => false,
                };
                if beyond_max {
                    0
                } else {
                    self.locate_leaf(key)?.0
                }
            }
        };

        let mut cursor = Cursor {
            table: self,
            node,
            slot: 0,
        };
        cursor.skip_to_live()?;
        Ok(cursor)
    }
}

impl<'a> Cursor<'a> {
    /// Returns true once the cursor has passed the last record.
    pub fn at_end(&self) -> bool {
        self.node == 0
    }

    /// Returns the current (leaf, slot) position; leaf 0 means end.
    pub fn position(&self) -> (u32, u16) {
        (self.node, self.slot)
    }

    /// Moves the position forward to the next live slot, hopping over
    /// exhausted leaves via the leaf chain.
    fn skip_to_live(&mut self) -> Result<()> {
        while self.node != 0 {
            if let Some(slot) = self.table.first_live_slot(self.node, self.slot)? {
                self.slot = slot;
                return Ok(());
            }
            let (_, next, _) = self.table.leaf_info(self.node)?;
            self.node = next;
            self.slot = 0;
        }
        Ok(())
    }

    /// Returns the record at the current position without advancing, or
    /// None at end-of-table.
    ///
    /// This is what a mutating executor drives: look at the current
    /// record, then either `delete`/`update` it or step over it with
    /// `fetch`.
    pub fn current(&mut self) -> Result<Option<Record>> {
        self.skip_to_live()?;
        if self.node == 0 {
            return Ok(None);
        }
        self.table.read_record(self.node, self.slot)
    }

    /// Returns the record at the current position and advances, or None at
    /// end-of-table.
    pub fn fetch(&mut self) -> Result<Option<Record>> {
        self.skip_to_live()?;
        if self.node == 0 {
            return Ok(None);
        }
        let record = self.table.read_record(self.node, self.slot)?;
        self.slot += 1;
        self.skip_to_live()?;
        Ok(record)
    }

    /// Inserts a record into the table.
    ///
    /// A duplicate key is a hard `DuplicateKey` error; the layer above is
    /// responsible for never producing one.
    pub fn insert(&mut self, record: &Record) -> Result<()> {
        self.table.insert(record)
    }

    /// Deletes the record at the current position, releasing its overflow
    /// chains. The slot stays allocated as a hole; if the leaf is now
    /// exhausted the cursor advances past it. Returns false at end.
    pub fn delete(&mut self) -> Result<bool> {
        self.skip_to_live()?;
        if self.node == 0 {
            return Ok(false);
        }
        let deleted = self.table.delete_at(self.node, self.slot)?;
        self.skip_to_live()?;
        Ok(deleted)
    }

    /// Rewrites named fields of the current record in place, then advances
    /// exactly like `fetch`. Returns false at end.
    pub fn update(&mut self, attributes: &[&str], values: &[Value]) -> Result<bool> {
        if attributes.len() != values.len() {
            return Err(BurrowError::TypeMismatch {
                expected: format!("{} values", attributes.len()),
                actual: format!("{} values", values.len()),
            });
        }
        let schema = self.table.schema();
        let mut changes = Vec::with_capacity(attributes.len());
        for (name, value) in attributes.iter().zip(values) {
            let index = schema
                .field_index(name)
                .ok_or_else(|| BurrowError::ColumnNotFound(name.to_string()))?;
            changes.push((index, value.clone()));
        }

        self.skip_to_live()?;
        if self.node == 0 {
            return Ok(false);
        }
        let updated = self.table.update_at(self.node, self.slot, &changes)?;
        self.slot += 1;
        self.skip_to_live()?;
        Ok(updated)
    }

    /// Drains the cursor into a row list in ascending key order.
    pub fn collect(&mut self) -> Result<RowList> {
        let mut rows = RowList::new();
        while let Some(record) = self.fetch()? {
            rows.push_front(record);
        }
        rows.reverse();
        Ok(rows)
    }

    /// Drains the cursor into a row list in descending key order.
    pub fn collect_descending(&mut self) -> Result<RowList> {
        let mut rows = RowList::new();
        while let Some(record) = self.fetch()? {
            rows.push_front(record);
        }
        Ok(rows)
    }

    // =========================================================================
    // Executor-driven helpers
    // =========================================================================

    /// Evaluates a predicate expression against one row.
    ///
    /// Null is falsy; any non-boolean result is a type error.
    pub fn passes_predicate<E: RowEvaluator>(
        &self,
        evaluator: &E,
        predicate: &E::Expr,
        row: &Record,
    ) -> Result<bool> {
        match evaluator.eval(predicate, row, self.table.schema())? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(BurrowError::TypeMismatch {
                expected: "BOOLEAN".to_string(),
                actual: other.type_id().to_string(),
            }),
        }
    }

    /// Replaces each row's fields with the evaluated projection results.
    ///
    /// A wildcard projection (`None`) passes rows through unchanged.
    pub fn apply_projection<E: RowEvaluator>(
        &self,
        evaluator: &E,
        exprs: Option<&[E::Expr]>,
        rows: &mut RowList,
    ) -> Result<()> {
        let Some(exprs) = exprs else {
            return Ok(());
        };
        let schema = self.table.schema();
        for row in rows.iter_mut() {
            let values = exprs
                .iter()
                .map(|expr| evaluator.eval(expr, row, schema))
                .collect::<Result<Vec<_>>>()?;
            row.values = values;
        }
        Ok(())
    }

    /// Truncates a result list to at most `limit` rows.
    pub fn apply_limit(&self, rows: &mut RowList, limit: usize) {
        rows.truncate(limit);
    }

    /// Builds a byte key over the named columns of one row, for grouping
    /// and distinct hashing.
    pub fn key_from_columns(&self, row: &Record, columns: &[usize]) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for &column in columns {
            let value = row.values.get(column).ok_or_else(|| {
                BurrowError::ColumnNotFound(format!("column index {}", column))
            })?;
            buf.extend_from_slice(&record::encode_value(value)?);
        }
        Ok(buf.freeze())
    }

    /// Sorts a result list with the executor's comparator, stable on ties
    /// by falling back to the key field.
    pub fn sort<F>(&self, rows: &mut RowList, mut cmp: F)
    where
        F: FnMut(&Record, &Record) -> Ordering,
    {
        let key_index = self.table.schema().key_index();
        rows.sort_by(|a, b| {
            cmp(a, b).then_with(|| {
                a.values[key_index]
                    .compare(&b.values[key_index])
                    .unwrap_or(Ordering::Equal)
            })
        });
    }
}
