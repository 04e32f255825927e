//! Controller and action identities.
//!
//! The engine never inspects host runtime metadata. Controllers and actions are
//! opaque values compared by equality; an external [`ActionDescriptorProvider`]
//! turns whatever the host uses to reference an action (a route, an enum, a
//! method handle) into an [`ActionIdentity`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identity of a controller type.
///
/// Two identities are the same controller iff their names are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerIdentity(Arc<str>);

impl ControllerIdentity {
    /// Create an identity from a controller name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Derive an identity from a Rust type (type token).
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::from(std::any::type_name::<T>()))
    }

    /// The controller name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ControllerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ControllerIdentity").field(&&*self.0).finish()
    }
}

impl fmt::Display for ControllerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControllerIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ControllerIdentity {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Opaque identity of an action, always bound to the controller that declares it.
///
/// `Home::index` and `Admin::index` are different actions.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionIdentity {
    controller: ControllerIdentity,
    name: Arc<str>,
}

impl ActionIdentity {
    /// Create an action identity declared on `controller`.
    pub fn new(controller: impl Into<ControllerIdentity>, name: impl Into<Arc<str>>) -> Self {
        Self {
            controller: controller.into(),
            name: name.into(),
        }
    }

    /// The controller this action is declared on.
    #[must_use]
    pub fn controller(&self) -> &ControllerIdentity {
        &self.controller
    }

    /// The action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ActionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionIdentity({}::{})", self.controller, self.name)
    }
}

impl fmt::Display for ActionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.controller, self.name)
    }
}

/// The subject controller type of an invocation.
///
/// Carries the controller's own identity plus its lineage (base controllers,
/// nearest first) so type constraints can match on "equals or derives from".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDescriptor {
    identity: ControllerIdentity,
    lineage: Vec<ControllerIdentity>,
}

impl ControllerDescriptor {
    /// Create a descriptor with no base controllers.
    pub fn new(identity: impl Into<ControllerIdentity>) -> Self {
        Self {
            identity: identity.into(),
            lineage: Vec::new(),
        }
    }

    /// Append a base controller to the lineage (builder pattern).
    #[must_use]
    pub fn with_base(mut self, base: impl Into<ControllerIdentity>) -> Self {
        self.lineage.push(base.into());
        self
    }

    /// The controller's own identity.
    #[must_use]
    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    /// Base controllers, nearest first.
    #[must_use]
    pub fn lineage(&self) -> &[ControllerIdentity] {
        &self.lineage
    }

    /// Returns `true` if this controller is `target` or derives from it.
    #[must_use]
    pub fn is_assignable_to(&self, target: &ControllerIdentity) -> bool {
        self.identity == *target || self.lineage.contains(target)
    }
}

impl From<ControllerIdentity> for ControllerDescriptor {
    fn from(identity: ControllerIdentity) -> Self {
        Self::new(identity)
    }
}

impl From<&str> for ControllerDescriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Type-token surface for Rust controller types.
///
/// Implement this for host controller types to use the generic DSL entry
/// points ([`Apply::for_type`](crate::Apply::for_type),
/// [`Except::for_type`](crate::Except::for_type)).
///
/// ```
/// use filtra::{Controller, ControllerIdentity};
///
/// struct AccountController;
///
/// impl Controller for AccountController {
///     fn identity() -> ControllerIdentity {
///         ControllerIdentity::new("Account")
///     }
/// }
///
/// assert_eq!(AccountController::descriptor().identity().as_str(), "Account");
/// ```
pub trait Controller: 'static {
    /// The controller identity. Defaults to the Rust type name.
    fn identity() -> ControllerIdentity {
        ControllerIdentity::of::<Self>()
    }

    /// Base controllers, nearest first.
    fn bases() -> Vec<ControllerIdentity> {
        Vec::new()
    }

    /// Full descriptor (identity + lineage).
    fn descriptor() -> ControllerDescriptor {
        Self::bases()
            .into_iter()
            .fold(ControllerDescriptor::new(Self::identity()), |d, base| {
                d.with_base(base)
            })
    }

    /// Identity of an action declared on this controller.
    fn action(name: &str) -> ActionIdentity {
        ActionIdentity::new(Self::identity(), name)
    }
}

/// Maps a host action reference to opaque identities.
///
/// This is the external collaborator that replaces inspecting typed method
/// references. `E` is whatever the host uses to name an action.
pub trait ActionDescriptorProvider<E: ?Sized>: Send + Sync {
    /// The identity of the action referenced by `expression`.
    fn action_of(&self, expression: &E) -> ActionIdentity;

    /// The controller the referenced action belongs to.
    fn controller_of(&self, expression: &E) -> ControllerIdentity {
        self.action_of(expression).controller().clone()
    }
}
