//! Result pipeline: picks the result factory for an action's return value.
//!
//! Resolution is first-match-wins over the result registry: guards narrow
//! the candidates, then each candidate's own
//! [`should_be_returned_for`](crate::ResultFactory::should_be_returned_for)
//! is asked in insertion order. When nobody volunteers, the default factory
//! renders the result.

use std::fmt;
use std::sync::Arc;

use crate::{
    ActionResult, EngineError, Registry, ResolveStep, ResolveTrace, ResultFactory, ResultSelector,
};

/// Ordered candidate set of result factories plus a default.
///
/// All payloads are instantiated once, at construction.
pub struct ResultPipeline {
    registry: Registry<dyn ResultFactory>,
    candidates: Vec<Arc<dyn ResultFactory>>,
    default: Option<Arc<dyn ResultFactory>>,
}

impl ResultPipeline {
    /// Instantiate every candidate and the default.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingDefaultResultFactory`] if candidates exist but no default was set
    /// - any instantiation failure from the registry
    pub fn new(registry: Registry<dyn ResultFactory>) -> Result<Self, EngineError> {
        let candidates = registry
            .registrations()
            .iter()
            .map(|r| registry.instantiate(r.payload()))
            .collect::<Result<Vec<_>, _>>()?;
        let default = registry
            .default_payload()
            .map(|payload| registry.instantiate(payload))
            .transpose()?;
        if default.is_none() && !candidates.is_empty() {
            return Err(EngineError::MissingDefaultResultFactory);
        }
        Ok(Self {
            registry,
            candidates,
            default,
        })
    }

    /// Choose the factory that renders `selector`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoResultFactory`] if no candidate applies and there is
    /// no default (only possible for an empty pipeline).
    pub fn resolve(&self, selector: &ResultSelector) -> Result<&Arc<dyn ResultFactory>, EngineError> {
        let chosen = self
            .registry
            .find(selector.selector())
            .into_iter()
            .filter_map(|r| self.candidates.get(r.id().index()))
            .find(|factory| factory.should_be_returned_for(selector));
        if let Some(factory) = chosen {
            return Ok(factory);
        }

        tracing::debug!(action = %selector.selector().action(), "no result factory applied, using default");
        self.default.as_ref().ok_or_else(|| EngineError::NoResultFactory {
            action: selector.selector().action().to_string(),
        })
    }

    /// Resolve with a full trace of guard evaluation and applicability checks.
    #[must_use]
    pub fn resolve_with_trace(&self, selector: &ResultSelector) -> ResolveTrace {
        let find = self.registry.find_with_trace(selector.selector());
        let mut steps = Vec::new();
        let mut chosen = None;
        for id in find.matched_ids() {
            let Some(factory) = self.candidates.get(id.index()) else {
                continue;
            };
            let applicable = factory.should_be_returned_for(selector);
            steps.push(ResolveStep { id, applicable });
            if applicable {
                chosen = Some(id);
                break;
            }
        }
        let used_default = chosen.is_none() && self.default.is_some();
        ResolveTrace {
            find,
            steps,
            chosen,
            used_default,
        }
    }

    /// Resolve, then render.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn render(&self, selector: &ResultSelector) -> Result<ActionResult, EngineError> {
        Ok(self.resolve(selector)?.create(selector))
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<dyn ResultFactory> {
        &self.registry
    }

    /// The default factory, if one was configured.
    #[must_use]
    pub fn default_factory(&self) -> Option<&Arc<dyn ResultFactory>> {
        self.default.as_ref()
    }
}

impl fmt::Debug for ResultPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultPipeline")
            .field("candidates", &self.candidates)
            .field("default", &self.default)
            .finish()
    }
}
