//! Fluent guard DSL: `Apply`, `Except` and their materialization.
//!
//! A DSL value is a description. Nothing is resolved until
//! [`Guard::materialize`] turns it into a [`Constraint`], at which point
//! capability type tokens go through the [`ConstraintFactory`].
//!
//! ```
//! use filtra::{Apply, ActionIdentity, Constraint, Except, Guard, Selector, TypeRegistry};
//!
//! struct AnyFilter;
//! let types = TypeRegistry::<AnyFilter>::core();
//!
//! let guard: Guard = Apply::for_controller("Home")
//!     .and_for_action("Account", ActionIdentity::new("Account", "login"))
//!     .into();
//! let c = guard.materialize(&types).unwrap();
//! assert!(c.evaluate(&Selector::new("Home", "about")));
//! assert!(c.evaluate(&Selector::new("Account", "login")));
//! assert!(!c.evaluate(&Selector::new("Account", "logout")));
//!
//! let guard: Guard = Except::for_controller("Admin").into();
//! let c = guard.materialize(&types).unwrap();
//! assert!(!c.evaluate(&Selector::new("Admin", "index")));
//! ```

use std::sync::Arc;

use crate::{
    ActionDescriptorProvider, ActionIdentity, Constraint, ConstraintFactory, Controller, ControllerIdentity,
    EngineError, FilterScope, SelectorPredicate, TypeToken,
};

/// A controller or action target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Controller(ControllerIdentity),
    Action {
        controller: ControllerIdentity,
        action: ActionIdentity,
    },
}

impl Target {
    /// The action identity is bound to `controller`; a derived controller
    /// invoking the inherited action does not match.
    pub(crate) fn action(controller: ControllerIdentity, action: ActionIdentity) -> Self {
        Self::Action { controller, action }
    }

    fn of_expression<E, P>(provider: &P, expression: &E) -> Self
    where
        E: ?Sized,
        P: ActionDescriptorProvider<E> + ?Sized,
    {
        Self::Action {
            controller: provider.controller_of(expression),
            action: provider.action_of(expression),
        }
    }

    /// An action target is `AllOf[Controller, Action]`: the action must be
    /// declared on the target controller.
    fn materialize(&self) -> Result<Constraint, EngineError> {
        match self {
            Self::Controller(id) => Ok(Constraint::Controller(id.clone())),
            Self::Action { controller, action } => {
                if action.controller() != controller {
                    return Err(EngineError::ActionNotOnController {
                        controller: controller.to_string(),
                        action: action.to_string(),
                    });
                }
                Ok(Constraint::AllOf(vec![
                    Constraint::Controller(controller.clone()),
                    Constraint::Action(action.clone()),
                ]))
            }
        }
    }

    fn is_action(&self) -> bool {
        matches!(self, Self::Action { .. })
    }
}

/// One disjunct of an [`Apply`].
#[derive(Debug, Clone)]
pub(crate) enum ApplyTerm {
    Target(Target),
    When(TypeToken),
    Predicate(Arc<dyn SelectorPredicate>),
}

impl ApplyTerm {
    fn materialize<C: ConstraintFactory + ?Sized>(&self, factory: &C) -> Result<Constraint, EngineError> {
        match self {
            Self::Target(target) => target.materialize(),
            Self::When(token) => Ok(Constraint::Capability(factory.create_constraint(token)?)),
            Self::Predicate(predicate) => Ok(Constraint::Capability(Arc::clone(predicate))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Apply
// ═══════════════════════════════════════════════════════════════════════════════

/// Positive guard: applies when ANY of its terms holds.
///
/// Always holds at least one term; the only way to build one is through an
/// entry point that supplies the first.
#[derive(Debug, Clone)]
#[must_use]
pub struct Apply {
    terms: Vec<ApplyTerm>,
}

impl Apply {
    pub(crate) fn from_terms(first: ApplyTerm, rest: impl IntoIterator<Item = ApplyTerm>) -> Self {
        let mut terms = vec![first];
        terms.extend(rest);
        Self { terms }
    }

    fn start(term: ApplyTerm) -> Self {
        Self { terms: vec![term] }
    }

    fn push(mut self, term: ApplyTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// Apply to controller type `T` (and anything deriving from it).
    pub fn for_type<T: Controller>() -> Self {
        Self::start(ApplyTerm::Target(Target::Controller(T::identity())))
    }

    /// Apply to a controller identity (and anything deriving from it).
    pub fn for_controller(controller: impl Into<ControllerIdentity>) -> Self {
        Self::start(ApplyTerm::Target(Target::Controller(controller.into())))
    }

    /// Apply to one action of `controller`.
    ///
    /// Unlike [`for_controller`](Self::for_controller), this does not extend
    /// to derived controllers: the selector must name `controller` itself.
    ///
    /// Materialization fails with [`EngineError::ActionNotOnController`] if
    /// `action` is not declared on `controller`.
    pub fn for_action(controller: impl Into<ControllerIdentity>, action: ActionIdentity) -> Self {
        Self::start(ApplyTerm::Target(Target::action(controller.into(), action)))
    }

    /// Apply to the action a host expression refers to.
    pub fn for_expression<E, P>(provider: &P, expression: &E) -> Self
    where
        E: ?Sized,
        P: ActionDescriptorProvider<E> + ?Sized,
    {
        Self::start(ApplyTerm::Target(Target::of_expression(provider, expression)))
    }

    /// Apply when a capability constraint holds. The token is resolved at
    /// materialization time.
    pub fn when(token: impl Into<TypeToken>) -> Self {
        Self::start(ApplyTerm::When(token.into()))
    }

    /// Apply when an already-instantiated predicate holds.
    pub fn when_predicate(predicate: impl SelectorPredicate + 'static) -> Self {
        Self::start(ApplyTerm::Predicate(Arc::new(predicate)))
    }

    /// Also apply to controller type `T`.
    pub fn and_for_type<T: Controller>(self) -> Self {
        self.push(ApplyTerm::Target(Target::Controller(T::identity())))
    }

    /// Also apply to a controller identity.
    pub fn and_for_controller(self, controller: impl Into<ControllerIdentity>) -> Self {
        self.push(ApplyTerm::Target(Target::Controller(controller.into())))
    }

    /// Also apply to one action of `controller`.
    pub fn and_for_action(self, controller: impl Into<ControllerIdentity>, action: ActionIdentity) -> Self {
        self.push(ApplyTerm::Target(Target::action(controller.into(), action)))
    }

    /// Also apply to the action a host expression refers to.
    pub fn and_for_expression<E, P>(self, provider: &P, expression: &E) -> Self
    where
        E: ?Sized,
        P: ActionDescriptorProvider<E> + ?Sized,
    {
        self.push(ApplyTerm::Target(Target::of_expression(provider, expression)))
    }

    /// Also apply when a capability constraint holds.
    pub fn and_when(self, token: impl Into<TypeToken>) -> Self {
        self.push(ApplyTerm::When(token.into()))
    }

    /// Also apply when an already-instantiated predicate holds.
    pub fn and_when_predicate(self, predicate: impl SelectorPredicate + 'static) -> Self {
        self.push(ApplyTerm::Predicate(Arc::new(predicate)))
    }

    /// Number of disjuncts. Always at least one.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Produce `AnyOf` over the materialized terms (a single term is unwrapped).
    ///
    /// # Errors
    ///
    /// Propagates capability resolution failures and
    /// [`EngineError::ActionNotOnController`].
    pub fn materialize<C: ConstraintFactory + ?Sized>(&self, factory: &C) -> Result<Constraint, EngineError> {
        let terms = self
            .terms
            .iter()
            .map(|t| t.materialize(factory))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Constraint::from_any(terms, Constraint::AnyOf(Vec::new())))
    }

    /// The narrowest scope the targets allow.
    ///
    /// Capability terms can match anywhere, so they widen the scope to global.
    #[must_use]
    pub fn default_scope(&self) -> FilterScope {
        let mut scope = FilterScope::Controller;
        for term in &self.terms {
            match term {
                ApplyTerm::When(_) | ApplyTerm::Predicate(_) => return FilterScope::Global,
                ApplyTerm::Target(t) if t.is_action() => scope = FilterScope::Action,
                ApplyTerm::Target(_) => {}
            }
        }
        scope
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Except
// ═══════════════════════════════════════════════════════════════════════════════

/// Negative guard: applies everywhere EXCEPT the listed targets.
#[derive(Debug, Clone)]
#[must_use]
pub struct Except {
    targets: Vec<Target>,
}

impl Except {
    pub(crate) fn from_targets(first: Target, rest: impl IntoIterator<Item = Target>) -> Self {
        let mut targets = vec![first];
        targets.extend(rest);
        Self { targets }
    }

    fn start(target: Target) -> Self {
        Self {
            targets: vec![target],
        }
    }

    fn push(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Exclude controller type `T` (and anything deriving from it).
    pub fn for_type<T: Controller>() -> Self {
        Self::start(Target::Controller(T::identity()))
    }

    /// Exclude a controller identity.
    pub fn for_controller(controller: impl Into<ControllerIdentity>) -> Self {
        Self::start(Target::Controller(controller.into()))
    }

    /// Exclude one action of `controller`. Derived controllers invoking the
    /// same action are not excluded.
    pub fn for_action(controller: impl Into<ControllerIdentity>, action: ActionIdentity) -> Self {
        Self::start(Target::action(controller.into(), action))
    }

    /// Exclude the action a host expression refers to.
    pub fn for_expression<E, P>(provider: &P, expression: &E) -> Self
    where
        E: ?Sized,
        P: ActionDescriptorProvider<E> + ?Sized,
    {
        Self::start(Target::of_expression(provider, expression))
    }

    /// Also exclude controller type `T`.
    pub fn and_for_type<T: Controller>(self) -> Self {
        self.push(Target::Controller(T::identity()))
    }

    /// Also exclude a controller identity.
    pub fn and_for_controller(self, controller: impl Into<ControllerIdentity>) -> Self {
        self.push(Target::Controller(controller.into()))
    }

    /// Also exclude one action of `controller`.
    pub fn and_for_action(self, controller: impl Into<ControllerIdentity>, action: ActionIdentity) -> Self {
        self.push(Target::action(controller.into(), action))
    }

    /// Also exclude the action a host expression refers to.
    pub fn and_for_expression<E, P>(self, provider: &P, expression: &E) -> Self
    where
        E: ?Sized,
        P: ActionDescriptorProvider<E> + ?Sized,
    {
        self.push(Target::of_expression(provider, expression))
    }

    /// Number of excluded targets. Always at least one.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Produce `Not(AnyOf[targets])`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ActionNotOnController`] for a mismatched action target.
    pub fn materialize(&self) -> Result<Constraint, EngineError> {
        let targets = self
            .targets
            .iter()
            .map(Target::materialize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Constraint::from_any(targets, Constraint::AnyOf(Vec::new())).negate())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Guard
// ═══════════════════════════════════════════════════════════════════════════════

/// Any guard form accepted by a configuration.
#[derive(Debug, Clone, Default)]
pub enum Guard {
    /// No declared constraint: applies everywhere.
    #[default]
    Always,
    /// Positive targets.
    Apply(Apply),
    /// Negative targets.
    Except(Except),
    /// A hand-built constraint.
    Constraint(Constraint),
}

impl Guard {
    /// Turn the guard into its runtime constraint.
    ///
    /// # Errors
    ///
    /// Propagates capability resolution failures and
    /// [`EngineError::ActionNotOnController`].
    pub fn materialize<C: ConstraintFactory + ?Sized>(&self, factory: &C) -> Result<Constraint, EngineError> {
        match self {
            Self::Always => Ok(Constraint::Always),
            Self::Apply(apply) => apply.materialize(factory),
            Self::Except(except) => except.materialize(),
            Self::Constraint(constraint) => Ok(constraint.clone()),
        }
    }

    /// The scope used when a registration does not declare one.
    #[must_use]
    pub fn default_scope(&self) -> FilterScope {
        match self {
            Self::Apply(apply) => apply.default_scope(),
            Self::Always | Self::Except(_) | Self::Constraint(_) => FilterScope::Global,
        }
    }
}

impl From<Apply> for Guard {
    fn from(apply: Apply) -> Self {
        Self::Apply(apply)
    }
}

impl From<Except> for Guard {
    fn from(except: Except) -> Self {
        Self::Except(except)
    }
}

impl From<Constraint> for Guard {
    fn from(constraint: Constraint) -> Self {
        Self::Constraint(constraint)
    }
}
