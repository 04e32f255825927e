//! Registration: guard + payload + scope, stored in insertion order.

use crate::{Constraint, Selector, TypeToken};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Monotonic insertion index of a registration within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(usize);

impl RegistrationId {
    /// Wrap a raw insertion index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw insertion index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scope a host runtime should attach a matched filter at.
///
/// Carried as metadata only; [`Registry::find`](crate::Registry::find) never
/// reorders by scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    /// Applies across controllers.
    #[default]
    Global,
    /// Scoped to a controller.
    Controller,
    /// Scoped to a single action.
    Action,
}

impl FilterScope {
    /// The config spelling of this scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Controller => "controller",
            Self::Action => "action",
        }
    }
}

/// What a registration carries: a type token resolved lazily through the
/// object factory, or a pre-built instance used as-is.
pub enum Payload<P: ?Sized> {
    /// Resolved via [`ObjectFactory`](crate::ObjectFactory) when needed.
    Type(TypeToken),
    /// Used as-is.
    Instance(Arc<P>),
}

impl<P: ?Sized> Payload<P> {
    /// A type-token payload.
    pub fn of_type(token: impl Into<TypeToken>) -> Self {
        Self::Type(token.into())
    }

    /// The type token, if this payload is one.
    #[must_use]
    pub fn type_token(&self) -> Option<&TypeToken> {
        match self {
            Self::Type(token) => Some(token),
            Self::Instance(_) => None,
        }
    }
}

impl<P: ?Sized> Clone for Payload<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Type(token) => Self::Type(token.clone()),
            Self::Instance(instance) => Self::Instance(Arc::clone(instance)),
        }
    }
}

impl<P: ?Sized + Debug> Debug for Payload<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(token) => f.debug_tuple("Type").field(&token.type_url).finish(),
            Self::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
        }
    }
}

impl<P: ?Sized> From<TypeToken> for Payload<P> {
    fn from(token: TypeToken) -> Self {
        Self::Type(token)
    }
}

impl<P: ?Sized> From<Arc<P>> for Payload<P> {
    fn from(instance: Arc<P>) -> Self {
        Self::Instance(instance)
    }
}

/// An immutable (guard, payload, scope) tuple.
pub struct Registration<P: ?Sized> {
    id: RegistrationId,
    guard: Constraint,
    payload: Payload<P>,
    scope: FilterScope,
}

impl<P: ?Sized> Registration<P> {
    /// The insertion index.
    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// The guard constraint.
    #[must_use]
    pub fn guard(&self) -> &Constraint {
        &self.guard
    }

    /// The payload.
    #[must_use]
    pub fn payload(&self) -> &Payload<P> {
        &self.payload
    }

    /// The scope metadata.
    #[must_use]
    pub fn scope(&self) -> FilterScope {
        self.scope
    }

    /// Returns `true` if the guard holds for `selector`.
    pub fn matches(&self, selector: &Selector) -> bool {
        self.guard.evaluate(selector)
    }
}

impl<P: ?Sized + Debug> Debug for Registration<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("guard", &self.guard)
            .field("payload", &self.payload)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Append-only, insertion-ordered sequence of registrations.
///
/// # INV: insertion order is the only order
///
/// No reordering, no deduplication. Ids are assigned from the current length.
pub struct RegistrationStore<P: ?Sized> {
    entries: Vec<Registration<P>>,
}

impl<P: ?Sized> RegistrationStore<P> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a registration and return its id.
    pub fn push(&mut self, guard: Constraint, payload: Payload<P>, scope: FilterScope) -> RegistrationId {
        let id = RegistrationId(self.entries.len());
        self.entries.push(Registration {
            id,
            guard,
            payload,
            scope,
        });
        id
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Registration<P>> {
        self.entries.iter()
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a registration by id.
    #[must_use]
    pub fn get(&self, id: RegistrationId) -> Option<&Registration<P>> {
        self.entries.get(id.0)
    }

    pub(crate) fn as_slice(&self) -> &[Registration<P>] {
        &self.entries
    }
}

impl<P: ?Sized> Default for RegistrationStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, P: ?Sized> IntoIterator for &'a RegistrationStore<P> {
    type Item = &'a Registration<P>;
    type IntoIter = std::slice::Iter<'a, Registration<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
