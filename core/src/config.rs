//! Config types for data-driven engine construction.
//!
//! These types mirror the runtime setup API but are serde-deserializable,
//! so a whole engine can be described in JSON or YAML and loaded through
//! [`Configuration::from_config`].
//!
//! # Relationship to runtime types
//!
//! | Config type | Runtime type |
//! |-------------|-------------|
//! | [`EngineConfig`] | [`Configuration`] → [`Engine`](crate::Engine) |
//! | [`RegistrationConfig`] | one `add_filter_*` / `add_result_factory_*` call |
//! | [`GuardConfig`] | [`Guard`] |
//! | [`TargetConfig`] | an `Apply` / `Except` target |
//! | [`ConstraintConfig`] | [`Constraint`] |
//! | [`TypeToken`] | [`Payload::Type`](crate::Payload::Type) |
//!
//! ```yaml
//! filters:
//!   - payload: { type_url: acme.v1.Audit }
//!   - payload: { type_url: acme.v1.Csrf }
//!     guard:
//!       type: except
//!       targets: [{ controller: Api }]
//! result_factories:
//!   - payload: { type_url: filtra.core.v1.JsonResultFactory }
//! default_result_factory: { type_url: filtra.core.v1.ViewResultFactory }
//! ```

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    ActionIdentity, Apply, Configuration, Constraint, ConstraintFactory, ControllerIdentity, EngineError,
    Except, FilterScope, Guard, ObjectFactory, Payload, TypeToken, MAX_CONSTRAINTS_PER_COMPOUND,
    MAX_DEPTH, MAX_REGISTRATIONS,
};
use crate::dsl::{ApplyTerm, Target};

/// A complete engine description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Filter registrations, in order.
    #[serde(default)]
    pub filters: Vec<RegistrationConfig>,

    /// Result factory registrations, in order.
    #[serde(default)]
    pub result_factories: Vec<RegistrationConfig>,

    /// Fallback result factory.
    #[serde(default)]
    pub default_result_factory: Option<TypeToken>,
}

/// One registration: a type payload, an optional guard and an optional scope.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// What to instantiate.
    pub payload: TypeToken,

    /// When it applies. Absent means everywhere.
    #[serde(default)]
    pub guard: Option<GuardConfig>,

    /// Explicit scope. Absent means derived from the guard.
    #[serde(default)]
    pub scope: Option<FilterScope>,
}

/// Configuration for a [`Guard`].
///
/// ```json
/// { "type": "apply", "targets": [{ "controller": "Home" }], "when": [{ "type_url": "..." }] }
/// { "type": "except", "targets": [{ "controller": "Admin", "action": "purge" }] }
/// { "type": "constraint", "constraint": { "type": "always" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum GuardConfig {
    /// Positive targets and capabilities (OR).
    #[serde(rename = "apply")]
    Apply {
        /// Controllers and actions to apply to.
        #[serde(default)]
        targets: Vec<TargetConfig>,
        /// Capability constraints to apply under.
        #[serde(default)]
        when: Vec<TypeToken>,
    },

    /// Everything except the targets.
    #[serde(rename = "except")]
    Except {
        /// Controllers and actions to exclude.
        targets: Vec<TargetConfig>,
    },

    /// A raw constraint tree.
    #[serde(rename = "constraint")]
    Constraint {
        /// The constraint.
        constraint: ConstraintConfig,
    },
}

/// A controller, or one action of a controller.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// The controller.
    pub controller: ControllerIdentity,

    /// Narrow to this action of the controller.
    #[serde(default)]
    pub action: Option<String>,
}

/// Configuration for a [`Constraint`].
///
/// ```json
/// { "type": "always" }
/// { "type": "controller", "name": "Home" }
/// { "type": "action", "controller": "Home", "name": "index" }
/// { "type": "not", "constraint": { ... } }
/// { "type": "any_of", "constraints": [...] }
/// { "type": "all_of", "constraints": [...] }
/// { "type": "capability", "predicate": { "type_url": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ConstraintConfig {
    /// Matches every selector.
    #[serde(rename = "always")]
    Always,

    /// Controller equals or derives from `name`.
    #[serde(rename = "controller")]
    Controller {
        /// Controller identity.
        name: ControllerIdentity,
    },

    /// Invoked action equals `controller::name`.
    #[serde(rename = "action")]
    Action {
        /// Declaring controller.
        controller: ControllerIdentity,
        /// Action name.
        name: String,
    },

    /// Negation.
    #[serde(rename = "not")]
    Not {
        /// The constraint to negate.
        constraint: Box<ConstraintConfig>,
    },

    /// Logical OR.
    #[serde(rename = "any_of")]
    AnyOf {
        /// Children (any must hold).
        constraints: Vec<ConstraintConfig>,
    },

    /// Logical AND.
    #[serde(rename = "all_of")]
    AllOf {
        /// Children (all must hold).
        constraints: Vec<ConstraintConfig>,
    },

    /// A capability predicate resolved through the object factory.
    #[serde(rename = "capability")]
    Capability {
        /// The predicate type.
        predicate: TypeToken,
    },
}

impl ConstraintConfig {
    /// Build the runtime constraint, resolving capabilities through `factory`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DepthExceeded`] if nesting exceeds [`MAX_DEPTH`]
    /// - [`EngineError::TooManyConstraints`] if a compound exceeds [`MAX_CONSTRAINTS_PER_COMPOUND`]
    /// - capability resolution failures
    pub fn load<C: ConstraintFactory + ?Sized>(&self, factory: &C) -> Result<Constraint, EngineError> {
        self.load_at(factory, 1)
    }

    fn load_at<C: ConstraintFactory + ?Sized>(&self, factory: &C, depth: usize) -> Result<Constraint, EngineError> {
        if depth > MAX_DEPTH {
            return Err(EngineError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        Ok(match self {
            Self::Always => Constraint::Always,
            Self::Controller { name } => Constraint::Controller(name.clone()),
            Self::Action { controller, name } => {
                Constraint::Action(ActionIdentity::new(controller.clone(), name.as_str()))
            }
            Self::Not { constraint } => constraint.load_at(factory, depth + 1)?.negate(),
            Self::AnyOf { constraints } => Constraint::AnyOf(Self::load_all(constraints, factory, depth)?),
            Self::AllOf { constraints } => Constraint::AllOf(Self::load_all(constraints, factory, depth)?),
            Self::Capability { predicate } => Constraint::Capability(factory.create_constraint(predicate)?),
        })
    }

    fn load_all<C: ConstraintFactory + ?Sized>(
        constraints: &[ConstraintConfig],
        factory: &C,
        depth: usize,
    ) -> Result<Vec<Constraint>, EngineError> {
        if constraints.len() > MAX_CONSTRAINTS_PER_COMPOUND {
            return Err(EngineError::TooManyConstraints {
                count: constraints.len(),
                max: MAX_CONSTRAINTS_PER_COMPOUND,
            });
        }
        constraints.iter().map(|c| c.load_at(factory, depth + 1)).collect()
    }
}

impl TargetConfig {
    fn into_target(self) -> Target {
        match self.action {
            Some(action) => {
                let identity = ActionIdentity::new(self.controller.clone(), action);
                Target::action(self.controller, identity)
            }
            None => Target::Controller(self.controller),
        }
    }
}

impl GuardConfig {
    /// Build the DSL guard. Capability tokens in `apply.when` stay unresolved
    /// until the configuration is built; raw constraint trees resolve now.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidConfig`] for an `apply` or `except` guard with no targets
    /// - constraint loading failures
    pub fn into_guard<C: ConstraintFactory + ?Sized>(self, factory: &C) -> Result<Guard, EngineError> {
        match self {
            Self::Apply { targets, when } => {
                let mut terms = targets
                    .into_iter()
                    .map(|t| ApplyTerm::Target(t.into_target()))
                    .chain(when.into_iter().map(ApplyTerm::When));
                let first = terms.next().ok_or_else(|| EngineError::InvalidConfig {
                    reason: "apply guard needs at least one target or capability".into(),
                })?;
                Ok(Guard::Apply(Apply::from_terms(first, terms)))
            }
            Self::Except { targets } => {
                let mut targets = targets.into_iter().map(TargetConfig::into_target);
                let first = targets.next().ok_or_else(|| EngineError::InvalidConfig {
                    reason: "except guard needs at least one target".into(),
                })?;
                Ok(Guard::Except(Except::from_targets(first, targets)))
            }
            Self::Constraint { constraint } => Ok(Guard::Constraint(constraint.load(factory)?)),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> Configuration<F> {
    /// Load a configuration from its serde description.
    ///
    /// The returned configuration resolves through `factory`; call
    /// [`build`](Self::build) to freeze it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TooManyRegistrations`] if either list exceeds [`MAX_REGISTRATIONS`]
    /// - guard loading failures (see [`GuardConfig::into_guard`])
    pub fn from_config(config: EngineConfig, factory: Arc<dyn ObjectFactory<F>>) -> Result<Self, EngineError> {
        for list in [&config.filters, &config.result_factories] {
            if list.len() > MAX_REGISTRATIONS {
                return Err(EngineError::TooManyRegistrations {
                    count: list.len(),
                    max: MAX_REGISTRATIONS,
                });
            }
        }

        let mut configuration = Self::new().resolve_with(Arc::clone(&factory));
        for registration in config.filters {
            let guard = load_guard(registration.guard, &*factory)?;
            configuration.push_filter(Payload::Type(registration.payload), guard, registration.scope);
        }
        for registration in config.result_factories {
            let guard = load_guard(registration.guard, &*factory)?;
            configuration.push_result_factory(Payload::Type(registration.payload), guard, registration.scope);
        }
        if let Some(default) = config.default_result_factory {
            configuration = configuration.with_default_factory(default);
        }
        Ok(configuration)
    }
}

fn load_guard<C: ConstraintFactory + ?Sized>(guard: Option<GuardConfig>, factory: &C) -> Result<Guard, EngineError> {
    guard.map_or(Ok(Guard::Always), |g| g.into_guard(factory))
}
