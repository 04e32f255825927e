//! filtra-test: Test domain for conformance testing
//!
//! Provides a sample filter type, a small controller hierarchy and an action
//! descriptor provider for exercising the engine. This is the reference
//! extension that demonstrates how a host plugs into filtra.
//!
//! # Example
//!
//! ```
//! use filtra_test::prelude::*;
//!
//! let engine = Configuration::<dyn Filter>::new()
//!     .add_filter(filter("audit"))
//!     .add_filter_with(filter("csrf"), Except::for_type::<AdminController>())
//!     .build()
//!     .unwrap();
//!
//! let admin = Selector::new(AdminController::descriptor(), "purge");
//! assert_eq!(names(&engine, &admin), ["audit"]);
//! ```

use filtra::prelude::*;
use filtra::{
    register_core_types, ActionDescriptorProvider, IntoConstraint, IntoFilter, TypeRegistryBuilder, UnitConfig,
};
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;

pub mod fixture;

// ═══════════════════════════════════════════════════════════════════════════════
// Filters
// ═══════════════════════════════════════════════════════════════════════════════

/// The filter type of the test domain. Filters only carry a name.
pub trait Filter: Send + Sync + Debug {
    /// Name used in assertions.
    fn name(&self) -> &str;
}

/// A filter identified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFilter {
    name: String,
}

impl NamedFilter {
    /// Create a named filter.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for NamedFilter {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Configuration for [`NamedFilter`].
#[derive(Debug, Clone, Deserialize)]
pub struct NamedFilterConfig {
    /// The filter name.
    pub name: String,
}

impl IntoFilter<dyn Filter> for NamedFilter {
    type Config = NamedFilterConfig;

    fn from_config(config: NamedFilterConfig) -> Result<Arc<dyn Filter>, EngineError> {
        if config.name.is_empty() {
            return Err(EngineError::InvalidConfig {
                reason: "NamedFilter name must not be empty".into(),
            });
        }
        Ok(Arc::new(NamedFilter::new(config.name)))
    }
}

/// An instance payload for a [`NamedFilter`].
pub fn filter(name: &str) -> Payload<dyn Filter> {
    Payload::Instance(Arc::new(NamedFilter::new(name)))
}

/// A type payload for a [`NamedFilter`], resolved through [`types`].
pub fn filter_type(name: &str) -> Payload<dyn Filter> {
    Payload::Type(TypeToken::new("filtra.test.v1.NamedFilter").with_config(serde_json::json!({ "name": name })))
}

/// Names of the filters that apply to `selector`, in order.
///
/// # Panics
///
/// Panics if a filter cannot be instantiated.
pub fn names(engine: &Engine<dyn Filter>, selector: &Selector) -> Vec<String> {
    engine
        .find_filters(selector)
        .unwrap_or_else(|e| panic!("find_filters failed: {e}"))
        .iter()
        .map(|f| f.name().to_owned())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Controllers
// ═══════════════════════════════════════════════════════════════════════════════

/// `Home` controller.
pub struct HomeController;

impl Controller for HomeController {
    fn identity() -> ControllerIdentity {
        ControllerIdentity::new("Home")
    }
}

/// `Account` controller.
pub struct AccountController;

impl Controller for AccountController {
    fn identity() -> ControllerIdentity {
        ControllerIdentity::new("Account")
    }
}

/// `Secured` base controller.
pub struct SecuredController;

impl Controller for SecuredController {
    fn identity() -> ControllerIdentity {
        ControllerIdentity::new("Secured")
    }
}

/// `Admin` controller, derived from [`SecuredController`].
pub struct AdminController;

impl Controller for AdminController {
    fn identity() -> ControllerIdentity {
        ControllerIdentity::new("Admin")
    }

    fn bases() -> Vec<ControllerIdentity> {
        vec![SecuredController::identity()]
    }
}

/// Action references of the test domain, as a host would pass them around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestAction {
    /// `Home::index`
    HomeIndex,
    /// `Home::about`
    HomeAbout,
    /// `Account::login`
    AccountLogin,
    /// `Account::logout`
    AccountLogout,
    /// `Admin::purge`
    AdminPurge,
}

/// Maps [`TestAction`] references to identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestDescriptors;

impl ActionDescriptorProvider<TestAction> for TestDescriptors {
    fn action_of(&self, expression: &TestAction) -> ActionIdentity {
        match expression {
            TestAction::HomeIndex => HomeController::action("index"),
            TestAction::HomeAbout => HomeController::action("about"),
            TestAction::AccountLogin => AccountController::action("login"),
            TestAction::AccountLogout => AccountController::action("logout"),
            TestAction::AdminPurge => AdminController::action("purge"),
        }
    }
}

impl TestAction {
    /// A selector invoking this action on its controller.
    #[must_use]
    pub fn selector(self) -> Selector {
        let action = TestDescriptors.action_of(&self);
        let descriptor = match self {
            Self::HomeIndex | Self::HomeAbout => HomeController::descriptor(),
            Self::AccountLogin | Self::AccountLogout => AccountController::descriptor(),
            Self::AdminPurge => AdminController::descriptor(),
        };
        Selector::new(descriptor, action.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test constraints
// ═══════════════════════════════════════════════════════════════════════════════

/// Capability that always holds.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysTrue;

impl SelectorPredicate for AlwaysTrue {
    fn evaluate(&self, _selector: &Selector) -> bool {
        true
    }
}

impl IntoConstraint for AlwaysTrue {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        Ok(Arc::new(AlwaysTrue))
    }
}

/// Capability that never holds.
#[derive(Debug, Clone, Copy)]
pub struct Never;

impl SelectorPredicate for Never {
    fn evaluate(&self, _selector: &Selector) -> bool {
        false
    }
}

impl IntoConstraint for Never {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        Ok(Arc::new(Never))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════════════════════════

/// Register the test domain types.
///
/// | Type URL | Type |
/// |----------|------|
/// | `filtra.test.v1.NamedFilter` | [`NamedFilter`] |
/// | `filtra.test.v1.AlwaysTrue` | [`AlwaysTrue`] |
/// | `filtra.test.v1.Never` | [`Never`] |
#[must_use]
pub fn register(builder: TypeRegistryBuilder<dyn Filter>) -> TypeRegistryBuilder<dyn Filter> {
    builder
        .filter::<NamedFilter>("filtra.test.v1.NamedFilter")
        .constraint::<AlwaysTrue>("filtra.test.v1.AlwaysTrue")
        .constraint::<Never>("filtra.test.v1.Never")
}

/// Core types plus the test domain types.
#[must_use]
pub fn types() -> TypeRegistry<dyn Filter> {
    register(register_core_types(TypeRegistryBuilder::new())).build()
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        filter, filter_type, names, AccountController, AdminController, AlwaysTrue, Filter, HomeController,
        NamedFilter, Never, SecuredController, TestAction, TestDescriptors,
    };
    pub use filtra::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use filtra::PayloadKind;

    #[test]
    fn admin_derives_from_secured() {
        let d = AdminController::descriptor();
        assert!(d.is_assignable_to(&SecuredController::identity()));
        assert!(!d.is_assignable_to(&HomeController::identity()));
    }

    #[test]
    fn descriptors_bind_actions_to_controllers() {
        assert_eq!(TestDescriptors.action_of(&TestAction::AccountLogin).to_string(), "Account::login");
        assert_eq!(TestDescriptors.controller_of(&TestAction::AdminPurge).as_str(), "Admin");
    }

    #[test]
    fn test_action_selector_uses_descriptor() {
        let s = TestAction::AdminPurge.selector();
        assert_eq!(s.action(), &AdminController::action("purge"));
        assert_eq!(s.controller().lineage(), &[SecuredController::identity()]);
    }

    #[test]
    fn register_adds_test_types() {
        let t = types();
        assert!(t.contains(PayloadKind::Filter, "filtra.test.v1.NamedFilter"));
        assert!(t.contains(PayloadKind::Constraint, "filtra.test.v1.Never"));
        assert!(t.contains(PayloadKind::ResultFactory, "filtra.core.v1.JsonResultFactory"));
    }

    #[test]
    fn named_filter_from_config() {
        let f = types()
            .create_filter(
                &TypeToken::new("filtra.test.v1.NamedFilter").with_config(serde_json::json!({"name": "audit"})),
            )
            .unwrap();
        assert_eq!(f.name(), "audit");
    }

    #[test]
    fn empty_name_rejected() {
        let result = types().create_filter(
            &TypeToken::new("filtra.test.v1.NamedFilter").with_config(serde_json::json!({"name": ""})),
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn type_payloads_build_through_registry() {
        let engine = Configuration::<dyn Filter>::new()
            .resolve_with(Arc::new(types()))
            .add_filter(filter_type("typed"))
            .add_filter_with(filter("instance"), Apply::when("filtra.test.v1.Never"))
            .build()
            .unwrap();
        assert_eq!(names(&engine, &TestAction::HomeIndex.selector()), ["typed"]);
    }
}
