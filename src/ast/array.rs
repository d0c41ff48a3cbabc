//! Literal lists and their reuse pool.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Node, NodeType, Visitor};
use crate::error::SqlResult;
use crate::value::Value;

/// An ordered list of literal values (an INSERT row, an IN operand).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    values: Vec<Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop the contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl From<Vec<Value>> for Array {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Node for Array {
    fn node_type(&self) -> NodeType {
        NodeType::Array
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_array(self)
    }
}

struct ArrayPoolInner {
    free: Mutex<Vec<Array>>,
    max_idle: usize,
}

impl ArrayPoolInner {
    fn release(&self, mut array: Array) {
        array.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(array);
        }
    }
}

/// Thread-safe free list of [`Array`]s.
///
/// An acquired array is always empty. Once released, its previous
/// contents are gone; holders must not keep references across release.
#[derive(Clone)]
pub struct ArrayPool {
    inner: Arc<ArrayPoolInner>,
}

impl ArrayPool {
    /// Pool keeping at most `max_idle` released arrays around.
    pub fn new(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(ArrayPoolInner {
                free: Mutex::new(Vec::with_capacity(max_idle)),
                max_idle,
            }),
        }
    }

    /// Take an empty array; it goes back to the pool when dropped.
    pub fn acquire(&self) -> PooledArray {
        let array = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        PooledArray {
            array: Some(array),
            pool: self.inner.clone(),
        }
    }

    /// Return a detached array to the pool.
    pub fn release(&self, array: Array) {
        self.inner.release(array);
    }

    /// Number of released arrays waiting for reuse.
    pub fn idle(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ArrayPool {
    fn default() -> Self {
        Self::new(64)
    }
}

/// An [`Array`] borrowed from an [`ArrayPool`].
pub struct PooledArray {
    array: Option<Array>,
    pool: Arc<ArrayPoolInner>,
}

impl PooledArray {
    /// Keep the array instead of returning it to the pool.
    pub fn detach(mut self) -> Array {
        self.array
            .take()
            .expect("pooled array should always be present")
    }
}

impl Deref for PooledArray {
    type Target = Array;

    fn deref(&self) -> &Array {
        self.array
            .as_ref()
            .expect("pooled array should always be present")
    }
}

impl DerefMut for PooledArray {
    fn deref_mut(&mut self) -> &mut Array {
        self.array
            .as_mut()
            .expect("pooled array should always be present")
    }
}

impl Drop for PooledArray {
    fn drop(&mut self) {
        if let Some(array) = self.array.take() {
            self.pool.release(array);
        }
    }
}
