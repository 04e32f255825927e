//! Evaluation trace types for debugging resolution.
//!
//! Trace types mirror the runtime types ([`Constraint`](crate::Constraint),
//! [`Registry`](crate::Registry), [`ResultPipeline`](crate::ResultPipeline))
//! but capture evaluation results instead of inputs.
//!
//! # Three Levels of Trace
//!
//! - [`ConstraintTrace`]: Per-guard: which sub-constraints held?
//! - [`FindTrace`]: Per-registry: which registrations matched, in order?
//! - [`ResolveTrace`]: Per-result: which candidate was applicable, was the default used?
//!
//! # Example
//!
//! ```ignore
//! let trace = registry.find_with_trace(&selector);
//! for step in &trace.steps {
//!     println!("  registration[{}]: matched={}", step.id, step.matched);
//! }
//! ```

use crate::RegistrationId;
use std::fmt;

/// Trace of a constraint evaluation.
///
/// In `AnyOf`/`AllOf`, ALL children are evaluated (no short-circuit).
pub enum ConstraintTrace {
    /// Unconstrained guard (always matched).
    Always,
    /// Controller type comparison.
    Controller {
        /// Whether the subject equals or derives from the target.
        matched: bool,
        /// The controller the constraint targets.
        target: String,
        /// The subject controller of the selector.
        subject: String,
    },
    /// Action identity comparison.
    Action {
        /// Whether the invoked action equals the target.
        matched: bool,
        /// The action the constraint targets.
        target: String,
        /// The invoked action.
        subject: String,
    },
    /// A capability predicate.
    Capability {
        /// What the predicate returned.
        matched: bool,
        /// Debug description of the predicate.
        predicate: String,
    },
    /// OR over children.
    AnyOf {
        /// Whether any child matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConstraintTrace>,
    },
    /// AND over children.
    AllOf {
        /// Whether all children matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConstraintTrace>,
    },
    /// Negation.
    Not {
        /// Whether the negation held (i.e. inner did NOT match).
        matched: bool,
        /// Trace of the inner constraint.
        inner: Box<ConstraintTrace>,
    },
}

impl ConstraintTrace {
    /// Get the overall match result.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Controller { matched, .. }
            | Self::Action { matched, .. }
            | Self::Capability { matched, .. }
            | Self::AnyOf { matched, .. }
            | Self::AllOf { matched, .. }
            | Self::Not { matched, .. } => *matched,
        }
    }
}

impl fmt::Debug for ConstraintTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Controller {
                matched,
                target,
                subject,
            } => f
                .debug_struct("Controller")
                .field("matched", matched)
                .field("target", target)
                .field("subject", subject)
                .finish(),
            Self::Action {
                matched,
                target,
                subject,
            } => f
                .debug_struct("Action")
                .field("matched", matched)
                .field("target", target)
                .field("subject", subject)
                .finish(),
            Self::Capability { matched, predicate } => f
                .debug_struct("Capability")
                .field("matched", matched)
                .field("predicate", predicate)
                .finish(),
            Self::AnyOf { matched, children } => f
                .debug_struct("AnyOf")
                .field("matched", matched)
                .field("children", children)
                .finish(),
            Self::AllOf { matched, children } => f
                .debug_struct("AllOf")
                .field("matched", matched)
                .field("children", children)
                .finish(),
            Self::Not { matched, inner } => f
                .debug_struct("Not")
                .field("matched", matched)
                .field("inner", inner)
                .finish(),
        }
    }
}

/// Trace of a full [`Registry::find`](crate::Registry::find).
///
/// # INV: `matched_ids()` == ids returned by `find()`
#[derive(Debug)]
pub struct FindTrace {
    /// One step per registration, in insertion order.
    pub steps: Vec<FindStep>,
}

impl FindTrace {
    /// Ids of the registrations that matched, in insertion order.
    #[must_use]
    pub fn matched_ids(&self) -> Vec<RegistrationId> {
        self.steps
            .iter()
            .filter(|s| s.matched)
            .map(|s| s.id)
            .collect()
    }
}

/// One registration's evaluation in a [`FindTrace`].
#[derive(Debug)]
pub struct FindStep {
    /// The registration evaluated.
    pub id: RegistrationId,
    /// Did its guard hold?
    pub matched: bool,
    /// Full guard evaluation trace.
    pub guard: ConstraintTrace,
}

/// Trace of a [`ResultPipeline::resolve`](crate::ResultPipeline::resolve).
#[derive(Debug)]
pub struct ResolveTrace {
    /// Guard evaluation over the result registry.
    pub find: FindTrace,
    /// Applicability checks, in insertion order, up to the first applicable candidate.
    pub steps: Vec<ResolveStep>,
    /// The registration chosen, or `None` if the default was used (or nothing resolved).
    pub chosen: Option<RegistrationId>,
    /// Whether the default factory was used.
    pub used_default: bool,
}

/// One candidate's applicability check in a [`ResolveTrace`].
#[derive(Debug)]
pub struct ResolveStep {
    /// The candidate registration.
    pub id: RegistrationId,
    /// What `should_be_returned_for` answered.
    pub applicable: bool,
}
