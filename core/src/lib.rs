//! filtra - declarative filter and result-factory selection for MVC hosts
//!
//! Given "which controller and action is being invoked" (a [`Selector`]),
//! filtra answers two questions:
//!
//! 1. Which filters apply, in registration order?
//! 2. Which result factory renders the action's return value?
//!
//! # Architecture
//!
//! - [`Constraint`]: Boolean guards over a selector (controller, action, NOT / OR / AND, capability)
//! - [`Apply`] / [`Except`] / [`Guard`]: fluent DSL that materializes into constraints
//! - [`Registry<P>`]: ordered, frozen (guard, payload, scope) registrations
//! - [`ResultPipeline`]: first applicable result factory, else the default
//! - [`ObjectFactory<F>`]: external boundary that turns [`TypeToken`]s into instances
//! - [`Configuration<F>`] → [`Engine<F>`]: mutable setup, then an immutable, shareable engine
//!
//! # Key Design Insights
//!
//! 1. **Registration order is the only order**: `find` never sorts by scope or specificity.
//!
//! 2. **Setup fails, requests don't**: guards, limits and type URLs are checked in
//!    [`Configuration::build`]; evaluating a guard never fails.
//!
//! 3. **Actions belong to controllers**: an action target is
//!    `AllOf[Controller(c), Action(a)]`, and `a` must be declared on `c`.
//!
//! # Example
//!
//! ```
//! use filtra::prelude::*;
//! use std::sync::Arc;
//!
//! trait Filter: Send + Sync + std::fmt::Debug {
//!     fn name(&self) -> &str;
//! }
//!
//! #[derive(Debug)]
//! struct Audit;
//! impl Filter for Audit {
//!     fn name(&self) -> &str { "audit" }
//! }
//!
//! #[derive(Debug)]
//! struct Csrf;
//! impl Filter for Csrf {
//!     fn name(&self) -> &str { "csrf" }
//! }
//!
//! let engine = Configuration::<dyn Filter>::new()
//!     .add_filter(Arc::new(Audit) as Arc<dyn Filter>)
//!     .add_filter_with(Arc::new(Csrf) as Arc<dyn Filter>, Except::for_controller("Api"))
//!     .build()
//!     .unwrap();
//!
//! let names = |s: &Selector| -> Vec<String> {
//!     engine.find_filters(s).unwrap().iter().map(|f| f.name().to_string()).collect()
//! };
//! assert_eq!(names(&Selector::new("Home", "index")), ["audit", "csrf"]);
//! assert_eq!(names(&Selector::new("Api", "list")), ["audit"]);
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod capability;
mod config;
mod configuration;
mod constraint;
mod dsl;
mod factory;
mod identity;
mod pipeline;
mod registration;
mod registry;
mod result;
mod selector;
mod trace;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Identities and selectors
pub use identity::{ActionDescriptorProvider, ActionIdentity, Controller, ControllerDescriptor, ControllerIdentity};
pub use selector::{RequestContext, RequestContextBuilder, ResultSelector, ReturnValue, Selector};

// Constraints and DSL
pub use constraint::{Constraint, SelectorPredicate};
pub use dsl::{Apply, Except, Guard};

// Registrations
pub use registration::{FilterScope, Payload, Registration, RegistrationId, RegistrationStore};
pub use registry::{Registry, RegistryBuilder};

// Results
pub use pipeline::ResultPipeline;
pub use result::{ActionResult, ContentResultFactory, JsonResultFactory, ResultFactory, ViewResultFactory};

// Object factory
pub use factory::{
    register_core_types, ConstraintFactory, HeaderMatchesConfig, HttpMethodIsConfig, IntoConstraint, IntoFilter,
    IntoResultFactory, ObjectFactory, PayloadKind, TypeRegistry, TypeRegistryBuilder, TypeToken, UnitConfig,
    ViewResultFactoryConfig,
};

// Built-in capabilities
pub use capability::{ExpectsJson, HeaderMatches, HttpMethodIs, IsAjaxRequest};

// Configuration
pub use config::{ConstraintConfig, EngineConfig, GuardConfig, RegistrationConfig, TargetConfig};
pub use configuration::{Configuration, Engine};

// Trace types
pub use trace::{ConstraintTrace, FindStep, FindTrace, ResolveStep, ResolveTrace};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use filtra::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Identities and selectors
        ActionIdentity, Controller, ControllerDescriptor, ControllerIdentity, RequestContext, ResultSelector,
        Selector,
        // Guards
        Apply, Constraint, Except, Guard, SelectorPredicate,
        // Setup
        Configuration, Engine, FilterScope, ObjectFactory, Payload, TypeRegistry, TypeToken,
        // Results
        ActionResult, ResultFactory,
        // Errors
        EngineError,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum allowed depth for nested constraints.
///
/// Protects against stack overflow from deeply nested guards.
/// Checked when a registry is built, via [`Constraint::validate`].
pub const MAX_DEPTH: usize = 32;

/// Maximum number of children in a single `AnyOf` or `AllOf`.
///
/// Width-based counterpart to [`MAX_DEPTH`].
pub const MAX_CONSTRAINTS_PER_COMPOUND: usize = 256;

/// Maximum number of registrations in a single [`Registry`].
pub const MAX_REGISTRATIONS: usize = 1024;

/// Maximum length for regex patterns in [`HeaderMatches`].
pub const MAX_PATTERN_LENGTH: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from engine construction and result resolution.
///
/// Everything except [`NoResultFactory`](Self::NoResultFactory) is raised at
/// setup time by [`Configuration::build`]. Fix the configuration and rebuild.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Constraint nesting exceeds [`MAX_DEPTH`].
    #[error("constraint depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        /// Actual depth of the constraint tree.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },

    /// A compound constraint has more than [`MAX_CONSTRAINTS_PER_COMPOUND`] children.
    #[error("compound constraint has {count} children, maximum is {max}")]
    TooManyConstraints {
        /// Actual number of children.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A registry has more than [`MAX_REGISTRATIONS`] entries.
    #[error("registry has {count} registrations, maximum is {max}")]
    TooManyRegistrations {
        /// Actual number of registrations.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// An action target names an action that is not declared on its controller.
    #[error("action '{action}' is not declared on controller '{controller}'")]
    ActionNotOnController {
        /// The target controller.
        controller: String,
        /// The mismatched action.
        action: String,
    },

    /// A type URL is not known to the object factory.
    #[error("unknown {kind} type_url '{type_url}'{}", format_available(.available))]
    UnknownTypeUrl {
        /// The unregistered type URL.
        type_url: String,
        /// What was being created (`"filter"`, `"result_factory"`, `"constraint"`).
        kind: &'static str,
        /// Type URLs that ARE registered (for self-correcting error messages).
        available: Vec<String>,
    },

    /// Configuration deserialization or construction failed.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// The underlying error message.
        reason: String,
    },

    /// A regex pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying error message.
        reason: String,
    },

    /// A regex pattern exceeds [`MAX_PATTERN_LENGTH`].
    #[error("pattern length {len} exceeds maximum {max}")]
    PatternTooLong {
        /// Actual pattern length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Result factories were registered without a default.
    #[error("result factories are registered but no default result factory is configured")]
    MissingDefaultResultFactory,

    /// No result factory applied and there is no default.
    #[error("no result factory for action '{action}'")]
    NoResultFactory {
        /// The action whose result could not be rendered.
        action: String,
    },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!("; registered: {}", available.join(", "))
    }
}
