//! Registry: an ordered, frozen set of guarded registrations.
//!
//! ```text
//! RegistryBuilder::new()
//!     .register(guard, payload, scope)   // append, insertion order kept
//!     .set_default(payload)              // last write wins
//!     .build(instantiate)?               // validate + freeze
//!         └── Registry::find(&selector)  // guards evaluated in order
//! ```
//!
//! `find` never fails and never reorders. Instantiating a type payload goes
//! through the closure handed to [`RegistryBuilder::build`], normally an
//! [`ObjectFactory`](crate::ObjectFactory) method.

use std::fmt;
use std::sync::Arc;

use crate::{
    Constraint, EngineError, FilterScope, FindStep, FindTrace, Payload, Registration, RegistrationId,
    RegistrationStore, Selector, TypeToken, MAX_REGISTRATIONS,
};

/// Collects registrations before they are frozen into a [`Registry`].
pub struct RegistryBuilder<P: ?Sized> {
    store: RegistrationStore<P>,
    default: Option<Payload<P>>,
}

impl<P: ?Sized + 'static> RegistryBuilder<P> {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RegistrationStore::new(),
            default: None,
        }
    }

    /// Append a registration. Duplicates are kept.
    #[must_use]
    pub fn register(mut self, guard: Constraint, payload: impl Into<Payload<P>>, scope: FilterScope) -> Self {
        self.store.push(guard, payload.into(), scope);
        self
    }

    /// Set the fallback payload. Calling again replaces the previous one.
    #[must_use]
    pub fn set_default(mut self, payload: impl Into<Payload<P>>) -> Self {
        self.default = Some(payload.into());
        self
    }

    /// Number of registrations so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Validate every guard and freeze.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TooManyRegistrations`] if more than [`MAX_REGISTRATIONS`] were added
    /// - [`EngineError::DepthExceeded`] / [`EngineError::TooManyConstraints`] from guard validation
    pub fn build<I>(self, instantiate: I) -> Result<Registry<P>, EngineError>
    where
        I: Fn(&TypeToken) -> Result<Arc<P>, EngineError> + Send + Sync + 'static,
    {
        if self.store.len() > MAX_REGISTRATIONS {
            return Err(EngineError::TooManyRegistrations {
                count: self.store.len(),
                max: MAX_REGISTRATIONS,
            });
        }
        for registration in &self.store {
            registration.guard().validate()?;
        }

        tracing::debug!(
            registrations = self.store.len(),
            has_default = self.default.is_some(),
            "registry frozen"
        );

        Ok(Registry {
            store: self.store,
            default: self.default,
            instantiate: Arc::new(instantiate),
        })
    }
}

impl<P: ?Sized + 'static> Default for RegistryBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen registrations plus an optional default.
///
/// # Thread Safety
///
/// `Registry<P>` is `Send + Sync` when `P` is; it can be shared across request
/// threads behind an `Arc` or a plain reference.
pub struct Registry<P: ?Sized> {
    store: RegistrationStore<P>,
    default: Option<Payload<P>>,
    instantiate: Arc<dyn Fn(&TypeToken) -> Result<Arc<P>, EngineError> + Send + Sync>,
}

impl<P: ?Sized> Registry<P> {
    /// Registrations whose guard holds for `selector`, in insertion order.
    #[must_use]
    pub fn find(&self, selector: &Selector) -> Vec<&Registration<P>> {
        let found: Vec<&Registration<P>> = self.store.iter().filter(|r| r.matches(selector)).collect();
        tracing::trace!(
            action = %selector.action(),
            candidates = self.store.len(),
            matched = found.len(),
            "registry find"
        );
        found
    }

    /// Like [`find`](Self::find), with a full per-guard trace.
    #[must_use]
    pub fn find_with_trace(&self, selector: &Selector) -> FindTrace {
        let steps = self
            .store
            .iter()
            .map(|r| {
                let guard = r.guard().evaluate_with_trace(selector);
                FindStep {
                    id: r.id(),
                    matched: guard.matched(),
                    guard,
                }
            })
            .collect();
        FindTrace { steps }
    }

    /// Resolve a payload: instances are returned as-is, type tokens go
    /// through the instantiation closure.
    ///
    /// # Errors
    ///
    /// Propagates whatever the instantiation closure returns.
    pub fn instantiate(&self, payload: &Payload<P>) -> Result<Arc<P>, EngineError> {
        match payload {
            Payload::Instance(instance) => Ok(Arc::clone(instance)),
            Payload::Type(token) => (self.instantiate)(token),
        }
    }

    /// [`find`](Self::find) followed by [`instantiate`](Self::instantiate).
    ///
    /// # Errors
    ///
    /// Fails on the first payload that cannot be instantiated.
    pub fn find_instances(&self, selector: &Selector) -> Result<Vec<Arc<P>>, EngineError> {
        self.find(selector)
            .into_iter()
            .map(|r| self.instantiate(r.payload()))
            .collect()
    }

    /// The fallback payload, if one was set.
    #[must_use]
    pub fn default_payload(&self) -> Option<&Payload<P>> {
        self.default.as_ref()
    }

    /// All registrations, in insertion order.
    #[must_use]
    pub fn registrations(&self) -> &[Registration<P>] {
        self.store.as_slice()
    }

    /// Look up a registration by id.
    #[must_use]
    pub fn get(&self, id: RegistrationId) -> Option<&Registration<P>> {
        self.store.get(id)
    }

    /// Number of registrations (the default is not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if there are no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<P: ?Sized> fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registrations", &self.store.len())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
