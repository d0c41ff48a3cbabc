//! Row hydration without per-row field lookup.
//!
//! A destination type describes its fields once ([`Scannable::fields`]).
//! That description becomes a [`ScannerPlan`], built once per type and
//! shared through the [`ScannerCache`]. Scanning a result set resolves
//! column names against the plan once, then writes every row by
//! position.

mod cache;

pub use cache::ScannerCache;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::ScannerKey;
use crate::error::{SqlError, SqlResult};
use crate::value::{FromValue, Value};

type Setter<T> = Arc<dyn Fn(&mut T, Value) -> SqlResult<()> + Send + Sync>;

/// A type rows can be hydrated into.
pub trait Scannable: Default + Send + 'static {
    fn fields() -> Vec<Field<Self>>;
}

/// One writable field of `T`, addressed by a (possibly nested) path.
pub struct Field<T> {
    path: Vec<&'static str>,
    setter: Setter<T>,
}

impl<T: 'static> Field<T> {
    /// A leaf field; the column value is converted with [`FromValue`].
    pub fn new<V, F>(name: &'static str, set: F) -> Self
    where
        V: FromValue,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            path: vec![name],
            setter: Arc::new(move |target: &mut T, value: Value| -> SqlResult<()> {
                set(target, V::from_value(value)?);
                Ok(())
            }),
        }
    }

    /// All fields of a nested struct, reached through `project` and
    /// prefixed with `prefix`.
    pub fn nested<U: Scannable>(prefix: &'static str, project: fn(&mut T) -> &mut U) -> Vec<Self> {
        U::fields()
            .into_iter()
            .map(|inner| {
                let mut path = Vec::with_capacity(inner.path.len() + 1);
                path.push(prefix);
                path.extend(inner.path);
                let set = inner.setter;
                Field {
                    path,
                    setter: Arc::new(move |target: &mut T, value: Value| set(project(target), value)),
                }
            })
            .collect()
    }
}

impl<T> Field<T> {
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    /// Column name this field is matched against: the path joined by `.`.
    pub fn column(&self) -> String {
        self.path.join(".")
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("path", &self.path).finish()
    }
}

/// Precomputed field-access table for one destination type.
pub struct ScannerPlan<T> {
    key: ScannerKey,
    fields: Vec<Field<T>>,
    index: HashMap<String, usize>,
}

impl<T: Scannable> ScannerPlan<T> {
    pub fn build() -> Self {
        Self::from_fields(T::fields())
    }

    pub fn from_fields(fields: Vec<Field<T>>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.column(), i))
            .collect();
        Self {
            key: ScannerKey::of::<T>(),
            fields,
            index,
        }
    }

    pub fn key(&self) -> ScannerKey {
        self.key
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// Field slot for each result column; `None` for unmapped columns.
    pub fn resolve(&self, columns: &[String]) -> Vec<Option<usize>> {
        columns.iter().map(|c| self.index.get(c).copied()).collect()
    }

    /// Hydrate one row.
    pub fn scan(&self, row: &RowData) -> SqlResult<T> {
        let slots = self.resolve(row.columns());
        self.scan_resolved(&slots, row)
    }

    /// Hydrate a result set, resolving columns once.
    pub fn scan_all(&self, rows: Vec<RowData>) -> SqlResult<Vec<T>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let slots = self.resolve(first.columns());
        rows.iter().map(|row| self.scan_resolved(&slots, row)).collect()
    }

    fn scan_resolved(&self, slots: &[Option<usize>], row: &RowData) -> SqlResult<T> {
        let mut out = T::default();
        for (pos, slot) in slots.iter().enumerate() {
            let Some(field) = slot.map(|i| &self.fields[i]) else {
                continue;
            };
            let value = row.values.get(pos).cloned().unwrap_or(Value::Null);
            (field.setter)(&mut out, value)
                .map_err(|e| SqlError::scan(field.column(), e.to_string()))?;
        }
        Ok(out)
    }
}

impl<T> fmt::Debug for ScannerPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerPlan")
            .field("type", &self.key.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A decoded row: column names shared across the result set, plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl RowData {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let pos = self.columns.iter().position(|c| c == column)?;
        self.values.get(pos)
    }
}
