//! Constraint: Boolean guards over a [`Selector`]
//!
//! Constraints decide whether a registration applies to an invocation.
//! Primitives compare identities by value; composites combine them with
//! NOT / OR / AND; capability constraints delegate to externally supplied
//! [`SelectorPredicate`] objects.

use crate::{
    ActionIdentity, ConstraintTrace, ControllerIdentity, EngineError, Selector, MAX_CONSTRAINTS_PER_COMPOUND,
    MAX_DEPTH,
};
use std::fmt::Debug;
use std::sync::Arc;

/// An externally supplied, instantiated predicate over a selector.
///
/// Obtained from the [`ObjectFactory`](crate::ObjectFactory) (or supplied as an
/// instance) and wrapped in [`Constraint::Capability`].
///
/// # Contract
///
/// `evaluate` must be pure, cheap and deterministic: no I/O, no panics, the
/// same answer for the same selector.
///
/// # Example
///
/// ```
/// use filtra::{Selector, SelectorPredicate};
///
/// #[derive(Debug)]
/// struct IsIndex;
///
/// impl SelectorPredicate for IsIndex {
///     fn evaluate(&self, selector: &Selector) -> bool {
///         selector.action().name() == "index"
///     }
/// }
///
/// assert!(IsIndex.evaluate(&Selector::new("Home", "index")));
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `SelectorPredicate`",
    label = "this type cannot be used as a capability constraint",
    note = "capability constraints evaluate a `Selector`; implement `SelectorPredicate::evaluate`"
)]
pub trait SelectorPredicate: Send + Sync + Debug {
    /// Returns `true` if the predicate holds for `selector`.
    fn evaluate(&self, selector: &Selector) -> bool;
}

/// A guard constraint.
///
/// # Laws
///
/// - `Always` is true for every selector
/// - `Not(c)` is `!c`
/// - `AnyOf([])` is `false`, `AllOf([])` is `true`
/// - `AnyOf` short-circuits on the first `true`, `AllOf` on the first `false`
///
/// # Example
///
/// ```
/// use filtra::{Constraint, Selector};
///
/// // everything except the Admin controller
/// let c = Constraint::Controller("Admin".into()).negate();
/// assert!(c.evaluate(&Selector::new("Home", "index")));
/// assert!(!c.evaluate(&Selector::new("Admin", "index")));
/// ```
#[derive(Debug, Clone)]
pub enum Constraint {
    /// No constraint declared: matches every selector.
    Always,

    /// Subject controller equals or derives from the target.
    Controller(ControllerIdentity),

    /// Invoked action equals the target.
    Action(ActionIdentity),

    /// Inverts the inner constraint.
    Not(Box<Constraint>),

    /// Any child must hold (logical OR).
    AnyOf(Vec<Constraint>),

    /// All children must hold (logical AND).
    AllOf(Vec<Constraint>),

    /// Externally supplied predicate.
    Capability(Arc<dyn SelectorPredicate>),
}

impl Constraint {
    /// Evaluate this constraint against the given selector.
    pub fn evaluate(&self, selector: &Selector) -> bool {
        match self {
            Self::Always => true,
            Self::Controller(target) => selector.controller().is_assignable_to(target),
            Self::Action(target) => selector.action() == target,
            Self::Not(inner) => !inner.evaluate(selector),
            Self::AnyOf(children) => children.iter().any(|c| c.evaluate(selector)),
            Self::AllOf(children) => children.iter().all(|c| c.evaluate(selector)),
            Self::Capability(predicate) => predicate.evaluate(selector),
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Unlike [`evaluate()`](Self::evaluate), this does NOT short-circuit
    /// `AnyOf`/`AllOf`. The `matched` result is still the same.
    #[must_use]
    pub fn evaluate_with_trace(&self, selector: &Selector) -> ConstraintTrace {
        match self {
            Self::Always => ConstraintTrace::Always,
            Self::Controller(target) => ConstraintTrace::Controller {
                matched: selector.controller().is_assignable_to(target),
                target: target.to_string(),
                subject: selector.controller_identity().to_string(),
            },
            Self::Action(target) => ConstraintTrace::Action {
                matched: selector.action() == target,
                target: target.to_string(),
                subject: selector.action().to_string(),
            },
            Self::Not(inner) => {
                let inner = inner.evaluate_with_trace(selector);
                ConstraintTrace::Not {
                    matched: !inner.matched(),
                    inner: Box::new(inner),
                }
            }
            Self::AnyOf(children) => {
                let children: Vec<ConstraintTrace> =
                    children.iter().map(|c| c.evaluate_with_trace(selector)).collect();
                let matched = children.iter().any(ConstraintTrace::matched);
                ConstraintTrace::AnyOf { matched, children }
            }
            Self::AllOf(children) => {
                let children: Vec<ConstraintTrace> =
                    children.iter().map(|c| c.evaluate_with_trace(selector)).collect();
                let matched = children.iter().all(ConstraintTrace::matched);
                ConstraintTrace::AllOf { matched, children }
            }
            Self::Capability(predicate) => ConstraintTrace::Capability {
                matched: predicate.evaluate(selector),
                predicate: format!("{predicate:?}"),
            },
        }
    }

    /// Wrap an instantiated predicate.
    pub fn capability(predicate: impl SelectorPredicate + 'static) -> Self {
        Self::Capability(Arc::new(predicate))
    }

    /// `Not(self)`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Compose constraints with OR semantics.
    ///
    /// - Empty → `catch_all`
    /// - Single → unwrapped
    /// - Multiple → `AnyOf(constraints)`
    #[must_use]
    pub fn from_any(constraints: Vec<Self>, catch_all: Self) -> Self {
        Self::compose(constraints, catch_all, Self::AnyOf)
    }

    /// Compose constraints with AND semantics. Symmetric with [`from_any`](Self::from_any).
    #[must_use]
    pub fn from_all(constraints: Vec<Self>, catch_all: Self) -> Self {
        Self::compose(constraints, catch_all, Self::AllOf)
    }

    fn compose(mut constraints: Vec<Self>, catch_all: Self, wrap: fn(Vec<Self>) -> Self) -> Self {
        match constraints.len() {
            0 => catch_all,
            1 => constraints.pop().unwrap_or(catch_all),
            _ => wrap(constraints),
        }
    }

    /// Returns `true` if this is the unconstrained guard.
    #[must_use]
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Calculate the depth of this constraint tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Always | Self::Controller(_) | Self::Action(_) | Self::Capability(_) => 1,
            Self::Not(inner) => 1 + inner.depth(),
            Self::AnyOf(cs) | Self::AllOf(cs) => 1 + cs.iter().map(Self::depth).max().unwrap_or(0),
        }
    }

    /// Validate this constraint against safety limits.
    ///
    /// Call at configuration time; evaluation itself never fails.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DepthExceeded`] if nesting exceeds [`MAX_DEPTH`]
    /// - [`EngineError::TooManyConstraints`] if a compound exceeds [`MAX_CONSTRAINTS_PER_COMPOUND`]
    pub fn validate(&self) -> Result<(), EngineError> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            return Err(EngineError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        self.check_width()
    }

    fn check_width(&self) -> Result<(), EngineError> {
        match self {
            Self::Not(inner) => inner.check_width(),
            Self::AnyOf(cs) | Self::AllOf(cs) => {
                if cs.len() > MAX_CONSTRAINTS_PER_COMPOUND {
                    return Err(EngineError::TooManyConstraints {
                        count: cs.len(),
                        max: MAX_CONSTRAINTS_PER_COMPOUND,
                    });
                }
                cs.iter().try_for_each(Self::check_width)
            }
            _ => Ok(()),
        }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Self::Always
    }
}
