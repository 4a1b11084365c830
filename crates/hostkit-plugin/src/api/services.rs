//! Typed methods: request/response calls between plugins.
//!
//! Any number of plugins may provide an implementation. Calls try the
//! providers from the highest priority down and return the first success.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use hostkit_core::error::AppError;
use hostkit_core::result::AppResult;

/// Declares a method: its argument and result types.
pub trait MethodDecl: 'static {
    /// Call arguments.
    type Args: 'static;
    /// Call result.
    type Output: 'static;
}

type Provider<D> = Arc<
    dyn Fn(&<D as MethodDecl>::Args) -> AppResult<<D as MethodDecl>::Output> + Send + Sync,
>;

struct Entry<D: MethodDecl> {
    priority: i32,
    provider: Provider<D>,
}

/// A method instance, shared by every plugin of one orchestrator.
pub struct Method<D: MethodDecl> {
    /// Providers sorted by descending priority; ties keep registration order.
    providers: Mutex<Vec<Entry<D>>>,
    _decl: PhantomData<fn() -> D>,
}

impl<D: MethodDecl> Method<D> {
    /// Creates a method with no provider.
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(Vec::new()),
            _decl: PhantomData,
        }
    }

    /// Registers a provider at `priority` (higher is tried first).
    pub fn register<F>(&self, priority: i32, f: F)
    where
        F: Fn(&D::Args) -> AppResult<D::Output> + Send + Sync + 'static,
    {
        let mut providers = self.providers.lock();
        let at = providers
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(providers.len());
        providers.insert(
            at,
            Entry {
                priority,
                provider: Arc::new(f),
            },
        );
        info!(method = %std::any::type_name::<D>(), priority, "Method provider registered");
    }

    /// Number of providers.
    pub fn provider_count(&self) -> usize {
        self.providers.lock().len()
    }

    /// Calls providers in priority order until one succeeds.
    ///
    /// Fails with `NotFound` when nobody provides the method, or with the
    /// last provider's error when all of them fail.
    pub fn call(&self, args: &D::Args) -> AppResult<D::Output> {
        let snapshot: Vec<Provider<D>> = self
            .providers
            .lock()
            .iter()
            .map(|e| Arc::clone(&e.provider))
            .collect();

        let mut last_error = None;
        for provider in snapshot {
            match provider(args) {
                Ok(output) => return Ok(output),
                Err(e) => {
                    debug!(method = %std::any::type_name::<D>(), error = %e, "Method provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            AppError::not_found(format!(
                "No provider for method '{}'",
                std::any::type_name::<D>()
            ))
        }))
    }
}

impl<D: MethodDecl> Default for Method<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: MethodDecl> fmt::Debug for Method<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("decl", &std::any::type_name::<D>())
            .field("providers", &self.provider_count())
            .finish()
    }
}
