//! Statement compilation with memoized rendering.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::ast::{Node, Param};
use crate::cache::{CachedQuery, QueryCache, ScannerKey};
use crate::error::{SqlError, SqlResult};
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::value::Value;
use crate::visitor::{Context, Rendered};

/// Turns AST nodes into [`CachedQuery`]s, rendering each distinct
/// shape once.
#[derive(Default)]
pub struct Compiler {
    queries: QueryCache,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queries(&self) -> &QueryCache {
        &self.queries
    }

    /// Compile `node` with the visitor `ctx` supplies.
    pub fn compile<N>(&self, ctx: &dyn Context, node: &N) -> SqlResult<Arc<CachedQuery>>
    where
        N: Node + Fingerprint,
    {
        self.compile_with(ctx, node, None)
    }

    /// Compile `node` for rows hydrated into `T`.
    pub fn compile_as<T: 'static, N>(&self, ctx: &dyn Context, node: &N) -> SqlResult<Arc<CachedQuery>>
    where
        N: Node + Fingerprint,
    {
        self.compile_with(ctx, node, Some(ScannerKey::of::<T>()))
    }

    /// Cache key: dialect, destination type, then the node's shape.
    pub fn fingerprint<N: Fingerprint>(ctx: &dyn Context, node: &N, scanner: Option<ScannerKey>) -> u64 {
        let mut fp = Fingerprinter::new();
        fp.tag("dialect:").str(ctx.dialect().name());
        if let Some(key) = scanner {
            fp.tag("scanner:").type_id(key.type_id);
        }
        node.fingerprint_into(&mut fp);
        fp.finish()
    }

    fn compile_with<N>(
        &self,
        ctx: &dyn Context,
        node: &N,
        scanner: Option<ScannerKey>,
    ) -> SqlResult<Arc<CachedQuery>>
    where
        N: Node + Fingerprint,
    {
        let key = Self::fingerprint(ctx, node, scanner);
        if let Some(hit) = self.queries.lookup(key) {
            return Ok(hit);
        }

        let mut visitor = ctx.visitor();
        node.accept(visitor.as_visitor())?;
        let Rendered { sql, args } = visitor.finish();
        debug!("compiled {:016x}: {}", key, sql);

        let mut query = CachedQuery::new(sql, args);
        if let Some(scanner) = scanner {
            query = query.with_scanner(scanner);
        }
        Ok(self.queries.set(key, query))
    }
}

/// Argument values for one call.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next positional argument (`$1`, `$2`, ...).
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Values for `query`'s bind slots, in placeholder order.
    pub fn resolve(&self, query: &CachedQuery) -> SqlResult<Vec<Value>> {
        query
            .args
            .iter()
            .map(|param| {
                let found = match param {
                    Param::Named(name) => self.named.get(name),
                    Param::Positional(n) => n.checked_sub(1).and_then(|i| self.positional.get(i)),
                };
                found
                    .cloned()
                    .ok_or_else(|| SqlError::MissingArgument(param.to_string()))
            })
            .collect()
    }
}
