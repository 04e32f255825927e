//! Configuration: the mutable setup phase that builds an [`Engine`].
//!
//! ```text
//! Configuration::new()                      (mutable, single-threaded)
//!   .add_filter_with(payload, guard)
//!   .add_result_factory(payload)
//!   .with_default_factory(payload)
//!   .resolve_with(object_factory)
//!   .build()?                               (freeze point)
//!       └── Engine { filters, results }     (immutable, shareable)
//! ```
//!
//! Everything that can fail fails in `build`: guard materialization, limit
//! validation, unknown type URLs, and payload config. Filter type payloads
//! are still created afresh on each `find_filters`.

use std::fmt;
use std::sync::Arc;

use crate::{
    ActionResult, EngineError, FilterScope, Guard, ObjectFactory, Payload, PayloadKind, Registry,
    RegistryBuilder, ResultFactory, ResultPipeline, ResultSelector, Selector, TypeRegistry,
};

struct Pending<P: ?Sized> {
    payload: Payload<P>,
    guard: Guard,
    scope: Option<FilterScope>,
}

/// Collects filter and result factory registrations for one engine.
///
/// `F` is the host's filter type, usually a trait object (`dyn MyFilter`).
#[must_use]
pub struct Configuration<F: ?Sized> {
    filters: Vec<Pending<F>>,
    result_factories: Vec<Pending<dyn ResultFactory>>,
    default_result_factory: Option<Payload<dyn ResultFactory>>,
    factory: Option<Arc<dyn ObjectFactory<F>>>,
}

impl<F: ?Sized + Send + Sync + 'static> Configuration<F> {
    /// An empty configuration resolved through the built-in [`TypeRegistry`].
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            result_factories: Vec::new(),
            default_result_factory: None,
            factory: None,
        }
    }

    /// Register a filter that applies everywhere.
    pub fn add_filter(self, payload: impl Into<Payload<F>>) -> Self {
        self.add_filter_with(payload, Guard::Always)
    }

    /// Register a filter under a guard. The scope is derived from the guard.
    pub fn add_filter_with(mut self, payload: impl Into<Payload<F>>, guard: impl Into<Guard>) -> Self {
        self.filters.push(Pending {
            payload: payload.into(),
            guard: guard.into(),
            scope: None,
        });
        self
    }

    /// Register a filter under a guard with an explicit scope.
    pub fn add_filter_scoped(
        mut self,
        payload: impl Into<Payload<F>>,
        guard: impl Into<Guard>,
        scope: FilterScope,
    ) -> Self {
        self.filters.push(Pending {
            payload: payload.into(),
            guard: guard.into(),
            scope: Some(scope),
        });
        self
    }

    pub(crate) fn push_filter(&mut self, payload: Payload<F>, guard: Guard, scope: Option<FilterScope>) {
        self.filters.push(Pending {
            payload,
            guard,
            scope,
        });
    }

    pub(crate) fn push_result_factory(
        &mut self,
        payload: Payload<dyn ResultFactory>,
        guard: Guard,
        scope: Option<FilterScope>,
    ) {
        self.result_factories.push(Pending {
            payload,
            guard,
            scope,
        });
    }

    /// Register a result factory that is a candidate everywhere.
    pub fn add_result_factory(self, payload: impl Into<Payload<dyn ResultFactory>>) -> Self {
        self.add_result_factory_with(payload, Guard::Always)
    }

    /// Register a result factory under a guard.
    pub fn add_result_factory_with(
        mut self,
        payload: impl Into<Payload<dyn ResultFactory>>,
        guard: impl Into<Guard>,
    ) -> Self {
        self.result_factories.push(Pending {
            payload: payload.into(),
            guard: guard.into(),
            scope: None,
        });
        self
    }

    /// Set the result factory used when no candidate applies.
    ///
    /// Calling again replaces the previous default.
    pub fn with_default_factory(mut self, payload: impl Into<Payload<dyn ResultFactory>>) -> Self {
        self.default_result_factory = Some(payload.into());
        self
    }

    /// Resolve type payloads through `factory` instead of the built-in registry.
    pub fn resolve_with(mut self, factory: Arc<dyn ObjectFactory<F>>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Number of filter registrations so far.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of result factory registrations so far.
    #[must_use]
    pub fn result_factory_count(&self) -> usize {
        self.result_factories.len()
    }

    /// Returns `true` if a default result factory has been set.
    #[must_use]
    pub fn has_default_factory(&self) -> bool {
        self.default_result_factory.is_some()
    }

    /// Freeze into an [`Engine`].
    ///
    /// # Errors
    ///
    /// - guard materialization failures ([`EngineError::ActionNotOnController`],
    ///   [`EngineError::UnknownTypeUrl`] for capabilities)
    /// - limit violations from guard validation
    /// - [`EngineError::UnknownTypeUrl`] for a type payload the factory cannot create
    /// - [`EngineError::InvalidConfig`] for a type payload whose `config` is rejected
    /// - [`EngineError::MissingDefaultResultFactory`] if result factories were
    ///   registered without a default
    pub fn build(self) -> Result<Engine<F>, EngineError> {
        let factory: Arc<dyn ObjectFactory<F>> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(TypeRegistry::<F>::core()),
        };

        let mut filters = RegistryBuilder::<F>::new();
        for pending in self.filters {
            check_type(&*factory, PayloadKind::Filter, &pending.payload)?;
            if let Payload::Type(token) = &pending.payload {
                // Filters are created per find; this one only validates the config.
                factory.create_filter(token)?;
            }
            let guard = pending.guard.materialize(&*factory)?;
            let scope = pending.scope.unwrap_or_else(|| pending.guard.default_scope());
            filters = filters.register(guard, pending.payload, scope);
        }
        let filter_factory = Arc::clone(&factory);
        let filters = filters.build(move |token| filter_factory.create_filter(token))?;

        let mut results = RegistryBuilder::<dyn ResultFactory>::new();
        for pending in self.result_factories {
            check_type(&*factory, PayloadKind::ResultFactory, &pending.payload)?;
            let guard = pending.guard.materialize(&*factory)?;
            let scope = pending.scope.unwrap_or_else(|| pending.guard.default_scope());
            results = results.register(guard, pending.payload, scope);
        }
        if let Some(default) = self.default_result_factory {
            check_type(&*factory, PayloadKind::ResultFactory, &default)?;
            results = results.set_default(default);
        }
        let result_factory = Arc::clone(&factory);
        let results = results.build(move |token| result_factory.create_result_factory(token))?;
        let results = ResultPipeline::new(results)?;

        tracing::debug!(
            filters = filters.len(),
            result_factories = results.registry().len(),
            has_default = results.default_factory().is_some(),
            "configuration built"
        );

        Ok(Engine { filters, results })
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for Configuration<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Configuration<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("filters", &self.filters.len())
            .field("result_factories", &self.result_factories.len())
            .field("has_default", &self.default_result_factory.is_some())
            .field("custom_factory", &self.factory.is_some())
            .finish()
    }
}

fn check_type<F: ?Sized, P: ?Sized>(
    factory: &dyn ObjectFactory<F>,
    kind: PayloadKind,
    payload: &Payload<P>,
) -> Result<(), EngineError> {
    match payload.type_token() {
        Some(token) if !factory.can_create(kind, token) => Err(EngineError::UnknownTypeUrl {
            type_url: token.type_url.clone(),
            kind: kind.as_str(),
            available: factory.registered_type_urls(kind),
        }),
        _ => Ok(()),
    }
}

/// A built, immutable filter and result engine.
///
/// `Send + Sync` whenever `F` is; share it across request threads.
pub struct Engine<F: ?Sized> {
    filters: Registry<F>,
    results: ResultPipeline,
}

impl<F: ?Sized> Engine<F> {
    /// The filter registry.
    #[must_use]
    pub fn filters(&self) -> &Registry<F> {
        &self.filters
    }

    /// The result pipeline.
    #[must_use]
    pub fn results(&self) -> &ResultPipeline {
        &self.results
    }

    /// Instantiated filters whose guard holds, in registration order.
    ///
    /// # Errors
    ///
    /// Fails if a type payload cannot be instantiated.
    pub fn find_filters(&self, selector: &Selector) -> Result<Vec<Arc<F>>, EngineError> {
        self.filters.find_instances(selector)
    }

    /// The result factory chosen for `selector`.
    ///
    /// # Errors
    ///
    /// See [`ResultPipeline::resolve`].
    pub fn resolve_result(&self, selector: &ResultSelector) -> Result<&Arc<dyn ResultFactory>, EngineError> {
        self.results.resolve(selector)
    }

    /// Resolve and render the action result.
    ///
    /// # Errors
    ///
    /// See [`ResultPipeline::resolve`].
    pub fn render(&self, selector: &ResultSelector) -> Result<ActionResult, EngineError> {
        self.results.render(selector)
    }
}

impl<F: ?Sized> fmt::Debug for Engine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("filters", &self.filters)
            .field("results", &self.results)
            .finish()
    }
}
