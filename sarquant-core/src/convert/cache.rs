use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::{debug, info};

use crate::amplitude_table::{AmplitudeTable, TableId};
use crate::convert::context::ConverterContext;
use crate::error::Result;

static DEFAULT_CONTEXT: OnceLock<Result<Arc<ConverterContext>>> = OnceLock::new();

/// The process-wide default-scheme context, built on first use.
///
/// Concurrent first callers block on the same `OnceLock`; exactly one build
/// runs. The outcome (including an error, should the build ever fail) is
/// kept for the life of the process.
pub fn default_context() -> Result<Arc<ConverterContext>> {
    DEFAULT_CONTEXT
        .get_or_init(|| ConverterContext::default_scheme().map(Arc::new))
        .clone()
}

/// Contexts for caller-supplied amplitude tables, keyed by table identity.
///
/// The cache owns the contexts; tables stay plain immutable values. Lookups
/// take a read lock. A miss takes the write lock and builds while holding
/// it, so no two contexts are ever built for one table and nobody sees a
/// half-built one. Builds are a few hundred trig calls.
#[derive(Default)]
pub struct ContextCache {
    slots: RwLock<HashMap<TableId, Arc<ConverterContext>>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` resolves to the default-scheme context.
    pub fn get_or_create(&self, table: Option<&AmplitudeTable>) -> Result<Arc<ConverterContext>> {
        match table {
            Some(table) => self.for_table(table),
            None => default_context(),
        }
    }

    /// Returns the cached context for `table`, building it on first request.
    ///
    /// # Errors
    /// Propagates the configuration error from context construction. Failed
    /// builds are not cached.
    pub fn for_table(&self, table: &AmplitudeTable) -> Result<Arc<ConverterContext>> {
        let id = table.id();
        {
            // A panic can only poison the lock between whole-entry inserts,
            // so the map is always consistent.
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ctx) = slots.get(&id) {
                debug!("Context cache hit for table #{}", id.get());
                return Ok(ctx.clone());
            }
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = slots.get(&id) {
            return Ok(ctx.clone());
        }
        let ctx = Arc::new(ConverterContext::for_table(table)?);
        slots.insert(id, ctx.clone());
        info!("Context cache now holds {} table(s)", slots.len());
        Ok(ctx)
    }

    pub fn contains(&self, table: &AmplitudeTable) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&table.id())
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the cached context for `table`. Contexts already handed out stay valid.
    pub fn evict(&self, table: &AmplitudeTable) -> bool {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&table.id())
            .is_some()
    }

    pub fn clear(&self) {
        self.slots.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
