//! Scanner-plan cache keyed by destination type.

use std::any::{Any, TypeId};
use std::sync::Arc;

use super::{Scannable, ScannerPlan};
use crate::cache::RwCache;

/// One canonical [`ScannerPlan`] per destination type.
#[derive(Default)]
pub struct ScannerCache {
    plans: RwCache<TypeId, dyn Any + Send + Sync>,
}

impl ScannerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `plan` unless one exists for `T`; return the plan in effect.
    /// A losing candidate is dropped.
    pub fn get_or_set<T: Scannable>(&self, plan: ScannerPlan<T>) -> Arc<ScannerPlan<T>> {
        let stored = self.plans.get_or_set(TypeId::of::<T>(), Arc::new(plan));
        Self::downcast(stored)
    }

    pub fn get<T: Scannable>(&self) -> Option<Arc<ScannerPlan<T>>> {
        self.plans.get(&TypeId::of::<T>()).map(Self::downcast)
    }

    /// The cached plan for `T`, building it on first use.
    pub fn plan_for<T: Scannable>(&self) -> Arc<ScannerPlan<T>> {
        match self.get::<T>() {
            Some(plan) => plan,
            None => {
                tracing::debug!("building scanner plan for {}", std::any::type_name::<T>());
                self.get_or_set(ScannerPlan::<T>::build())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn downcast<T: Scannable>(plan: Arc<dyn Any + Send + Sync>) -> Arc<ScannerPlan<T>> {
        plan.downcast::<ScannerPlan<T>>().unwrap_or_else(|_| {
            panic!(
                "scanner plan for {} stored under a foreign TypeId",
                std::any::type_name::<T>()
            )
        })
    }
}
