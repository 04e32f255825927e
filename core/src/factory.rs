//! Object factory boundary and the bundled type registry.
//!
//! The engine never constructs filters, result factories or capability
//! constraints itself. It asks an [`ObjectFactory`] for an instance given a
//! [`TypeToken`]. Hosts with a dependency container implement the trait over
//! it; everyone else uses [`TypeRegistry`].
//!
//! # Architecture (type-erased factory closures)
//!
//! Each constructible type registers through one of three traits, each with
//! its own serde `Config`:
//!
//! | Kind | Trait | Builder method |
//! |------|-------|----------------|
//! | Filters | [`IntoFilter<F>`] | `builder.filter::<T>(url)` |
//! | Result factories | [`IntoResultFactory`] | `builder.result_factory::<T>(url)` |
//! | Capability constraints | [`IntoConstraint`] | `builder.constraint::<T>(url)` |
//!
//! At registration the concrete `T` is monomorphized into a closure and erased
//! behind `Box<dyn Fn>`; at creation time the token's JSON config is
//! deserialized as `T::Config` and handed to `T::from_config`.
//!
//! # Example
//!
//! ```ignore
//! let types = register_core_types(TypeRegistryBuilder::<dyn MyFilter>::new())
//!     .filter::<AuditFilter>("acme.v1.AuditFilter")
//!     .build();
//! let filter = types.create_filter(&TypeToken::new("acme.v1.AuditFilter"))?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    ContentResultFactory, EngineError, ExpectsJson, HeaderMatches, HttpMethodIs, IsAjaxRequest,
    JsonResultFactory, ResultFactory, SelectorPredicate, ViewResultFactory,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Type tokens
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifies a constructible type, plus its construction config.
///
/// ```json
/// { "type_url": "filtra.core.v1.HeaderMatches", "config": { "name": "accept", "pattern": "json" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeToken {
    /// Registered type URL.
    pub type_url: String,

    /// Type-specific configuration, deserialized as the registered type's `Config`.
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

impl TypeToken {
    /// A token with an empty config object.
    pub fn new(type_url: impl Into<String>) -> Self {
        Self {
            type_url: type_url.into(),
            config: default_config(),
        }
    }

    /// Attach a construction config (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

impl From<&str> for TypeToken {
    fn from(type_url: &str) -> Self {
        Self::new(type_url)
    }
}

impl From<String> for TypeToken {
    fn from(type_url: String) -> Self {
        Self::new(type_url)
    }
}

fn default_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Empty configuration for types that need no construction parameters.
///
/// Accepts any JSON value (`{}`, `null`, etc.) and ignores it.
#[derive(Debug, Clone, Copy)]
pub struct UnitConfig;

impl<'de> Deserialize<'de> for UnitConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(UnitConfig)
    }
}

/// What a type token is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// A filter instance.
    Filter,
    /// A [`ResultFactory`] instance.
    ResultFactory,
    /// A [`SelectorPredicate`] instance.
    Constraint,
}

impl PayloadKind {
    /// Stable lowercase name, used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::ResultFactory => "result_factory",
            Self::Constraint => "constraint",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Factory traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Creates capability constraints from type tokens.
pub trait ConstraintFactory: Send + Sync {
    /// Instantiate the predicate named by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTypeUrl`] or [`EngineError::InvalidConfig`]
    /// when the token cannot be resolved.
    fn create_constraint(&self, token: &TypeToken) -> Result<Arc<dyn SelectorPredicate>, EngineError>;
}

/// Creates every payload kind the engine needs. `F` is the host's filter type.
pub trait ObjectFactory<F: ?Sized>: ConstraintFactory {
    /// Instantiate the filter named by `token`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the token cannot be resolved.
    fn create_filter(&self, token: &TypeToken) -> Result<Arc<F>, EngineError>;

    /// Instantiate the result factory named by `token`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the token cannot be resolved.
    fn create_result_factory(&self, token: &TypeToken) -> Result<Arc<dyn ResultFactory>, EngineError>;

    /// Returns `true` if `token` can be created as `kind`.
    ///
    /// Checked for every type payload when a configuration is built, so
    /// unknown types fail at build time instead of on first request.
    fn can_create(&self, kind: PayloadKind, token: &TypeToken) -> bool {
        let _ = (kind, token);
        true
    }

    /// The type URLs this factory can create as `kind`, listed in
    /// unknown-type errors. Empty when the factory cannot enumerate them.
    fn registered_type_urls(&self, kind: PayloadKind) -> Vec<String> {
        let _ = kind;
        Vec::new()
    }
}

/// Trait for filter types that can be constructed from configuration.
pub trait IntoFilter<F: ?Sized>: Send + Sync + 'static {
    /// The configuration type deserialized from the token's `config`.
    type Config: DeserializeOwned + Send + Sync;

    /// Construct a filter from deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the config is semantically invalid.
    fn from_config(config: Self::Config) -> Result<Arc<F>, EngineError>;
}

/// Trait for result factory types that can be constructed from configuration.
pub trait IntoResultFactory: Send + Sync + 'static {
    /// The configuration type deserialized from the token's `config`.
    type Config: DeserializeOwned + Send + Sync;

    /// Construct a result factory from deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the config is semantically invalid.
    fn from_config(config: Self::Config) -> Result<Arc<dyn ResultFactory>, EngineError>;
}

/// Trait for capability constraint types that can be constructed from configuration.
pub trait IntoConstraint: Send + Sync + 'static {
    /// The configuration type deserialized from the token's `config`.
    type Config: DeserializeOwned + Send + Sync;

    /// Construct a predicate from deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] or [`EngineError::InvalidPattern`]
    /// if the config is invalid.
    fn from_config(config: Self::Config) -> Result<Arc<dyn SelectorPredicate>, EngineError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Type-erased factories
// ═══════════════════════════════════════════════════════════════════════════════

struct FactoryFn<T: ?Sized>(
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<T>, EngineError> + Send + Sync>,
);

fn parse_config<C: DeserializeOwned>(value: &serde_json::Value) -> Result<C, EngineError> {
    serde_json::from_value(value.clone()).map_err(|e| EngineError::InvalidConfig {
        reason: e.to_string(),
    })
}

fn lookup<T: ?Sized>(
    table: &HashMap<String, FactoryFn<T>>,
    kind: PayloadKind,
    token: &TypeToken,
) -> Result<Arc<T>, EngineError> {
    let factory = table
        .get(&token.type_url)
        .ok_or_else(|| EngineError::UnknownTypeUrl {
            type_url: token.type_url.clone(),
            kind: kind.as_str(),
            available: sorted_urls(table).into_iter().map(str::to_owned).collect(),
        })?;
    (factory.0)(&token.config)
}

fn sorted_urls<T: ?Sized>(table: &HashMap<String, FactoryFn<T>>) -> Vec<&str> {
    let mut urls: Vec<&str> = table.keys().map(String::as_str).collect();
    urls.sort_unstable();
    urls
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for constructing a [`TypeRegistry`].
///
/// The registry is immutable after [`build()`](Self::build).
pub struct TypeRegistryBuilder<F: ?Sized> {
    filters: HashMap<String, FactoryFn<F>>,
    result_factories: HashMap<String, FactoryFn<dyn ResultFactory>>,
    constraints: HashMap<String, FactoryFn<dyn SelectorPredicate>>,
}

impl<F: ?Sized + 'static> TypeRegistryBuilder<F> {
    /// Create a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
            result_factories: HashMap::new(),
            constraints: HashMap::new(),
        }
    }

    /// Register a filter type with a type URL.
    #[must_use]
    pub fn filter<T: IntoFilter<F>>(mut self, type_url: &str) -> Self {
        self.filters.insert(
            type_url.to_owned(),
            FactoryFn(Box::new(|value: &serde_json::Value| T::from_config(parse_config(value)?))),
        );
        self
    }

    /// Register a result factory type with a type URL.
    #[must_use]
    pub fn result_factory<T: IntoResultFactory>(mut self, type_url: &str) -> Self {
        self.result_factories.insert(
            type_url.to_owned(),
            FactoryFn(Box::new(|value: &serde_json::Value| T::from_config(parse_config(value)?))),
        );
        self
    }

    /// Register a capability constraint type with a type URL.
    #[must_use]
    pub fn constraint<T: IntoConstraint>(mut self, type_url: &str) -> Self {
        self.constraints.insert(
            type_url.to_owned(),
            FactoryFn(Box::new(|value: &serde_json::Value| T::from_config(parse_config(value)?))),
        );
        self
    }

    /// Freeze the registry. No further registration is possible.
    #[must_use]
    pub fn build(self) -> TypeRegistry<F> {
        TypeRegistry {
            filters: self.filters,
            result_factories: self.result_factories,
            constraints: self.constraints,
        }
    }
}

impl<F: ?Sized + 'static> Default for TypeRegistryBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the built-in result factories and capability constraints.
///
/// | Type URL | Type |
/// |----------|------|
/// | `filtra.core.v1.JsonResultFactory` | [`JsonResultFactory`] |
/// | `filtra.core.v1.ViewResultFactory` | [`ViewResultFactory`] |
/// | `filtra.core.v1.ContentResultFactory` | [`ContentResultFactory`] |
/// | `filtra.core.v1.ExpectsJson` | [`ExpectsJson`] |
/// | `filtra.core.v1.IsAjaxRequest` | [`IsAjaxRequest`] |
/// | `filtra.core.v1.HttpMethodIs` | [`HttpMethodIs`] |
/// | `filtra.core.v1.HeaderMatches` | [`HeaderMatches`] |
#[must_use]
pub fn register_core_types<F: ?Sized + 'static>(builder: TypeRegistryBuilder<F>) -> TypeRegistryBuilder<F> {
    builder
        .result_factory::<JsonResultFactory>("filtra.core.v1.JsonResultFactory")
        .result_factory::<ViewResultFactory>("filtra.core.v1.ViewResultFactory")
        .result_factory::<ContentResultFactory>("filtra.core.v1.ContentResultFactory")
        .constraint::<ExpectsJson>("filtra.core.v1.ExpectsJson")
        .constraint::<IsAjaxRequest>("filtra.core.v1.IsAjaxRequest")
        .constraint::<HttpMethodIs>("filtra.core.v1.HttpMethodIs")
        .constraint::<HeaderMatches>("filtra.core.v1.HeaderMatches")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TypeRegistry
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable registry of type factories; the bundled [`ObjectFactory`].
pub struct TypeRegistry<F: ?Sized> {
    filters: HashMap<String, FactoryFn<F>>,
    result_factories: HashMap<String, FactoryFn<dyn ResultFactory>>,
    constraints: HashMap<String, FactoryFn<dyn SelectorPredicate>>,
}

impl<F: ?Sized + 'static> TypeRegistry<F> {
    /// A registry holding only the built-in types.
    #[must_use]
    pub fn core() -> Self {
        register_core_types(TypeRegistryBuilder::new()).build()
    }

    /// Returns the number of registered types of `kind`.
    #[must_use]
    pub fn count(&self, kind: PayloadKind) -> usize {
        match kind {
            PayloadKind::Filter => self.filters.len(),
            PayloadKind::ResultFactory => self.result_factories.len(),
            PayloadKind::Constraint => self.constraints.len(),
        }
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.result_factories.is_empty() && self.constraints.is_empty()
    }

    /// Returns `true` if `type_url` is registered as `kind`.
    #[must_use]
    pub fn contains(&self, kind: PayloadKind, type_url: &str) -> bool {
        match kind {
            PayloadKind::Filter => self.filters.contains_key(type_url),
            PayloadKind::ResultFactory => self.result_factories.contains_key(type_url),
            PayloadKind::Constraint => self.constraints.contains_key(type_url),
        }
    }

    /// Returns the registered type URLs of `kind` (sorted).
    #[must_use]
    pub fn type_urls(&self, kind: PayloadKind) -> Vec<&str> {
        match kind {
            PayloadKind::Filter => sorted_urls(&self.filters),
            PayloadKind::ResultFactory => sorted_urls(&self.result_factories),
            PayloadKind::Constraint => sorted_urls(&self.constraints),
        }
    }
}

impl<F: ?Sized + 'static> ConstraintFactory for TypeRegistry<F> {
    fn create_constraint(&self, token: &TypeToken) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        lookup(&self.constraints, PayloadKind::Constraint, token)
    }
}

impl<F: ?Sized + 'static> ObjectFactory<F> for TypeRegistry<F> {
    fn create_filter(&self, token: &TypeToken) -> Result<Arc<F>, EngineError> {
        lookup(&self.filters, PayloadKind::Filter, token)
    }

    fn create_result_factory(&self, token: &TypeToken) -> Result<Arc<dyn ResultFactory>, EngineError> {
        lookup(&self.result_factories, PayloadKind::ResultFactory, token)
    }

    fn can_create(&self, kind: PayloadKind, token: &TypeToken) -> bool {
        self.contains(kind, &token.type_url)
    }

    fn registered_type_urls(&self, kind: PayloadKind) -> Vec<String> {
        self.type_urls(kind).into_iter().map(str::to_owned).collect()
    }
}

impl<F: ?Sized> fmt::Debug for TypeRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("filters", &self.filters.len())
            .field("result_factories", &self.result_factories.len())
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Built-in registrations
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResultFactory for JsonResultFactory {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn ResultFactory>, EngineError> {
        Ok(Arc::new(JsonResultFactory))
    }
}

/// Configuration for [`ViewResultFactory`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewResultFactoryConfig {
    /// Fixed view name; defaults to the action name.
    #[serde(default)]
    pub view: Option<String>,
}

impl IntoResultFactory for ViewResultFactory {
    type Config = ViewResultFactoryConfig;

    fn from_config(config: ViewResultFactoryConfig) -> Result<Arc<dyn ResultFactory>, EngineError> {
        Ok(Arc::new(match config.view {
            Some(view) => ViewResultFactory::named(view),
            None => ViewResultFactory::new(),
        }))
    }
}

impl IntoResultFactory for ContentResultFactory {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn ResultFactory>, EngineError> {
        Ok(Arc::new(ContentResultFactory))
    }
}

impl IntoConstraint for ExpectsJson {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        Ok(Arc::new(ExpectsJson))
    }
}

impl IntoConstraint for IsAjaxRequest {
    type Config = UnitConfig;

    fn from_config(_: UnitConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        Ok(Arc::new(IsAjaxRequest))
    }
}

/// Configuration for [`HttpMethodIs`].
#[derive(Debug, Clone, Deserialize)]
pub struct HttpMethodIsConfig {
    /// Accepted methods; must not be empty.
    pub methods: Vec<String>,
}

impl IntoConstraint for HttpMethodIs {
    type Config = HttpMethodIsConfig;

    fn from_config(config: HttpMethodIsConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        if config.methods.is_empty() {
            return Err(EngineError::InvalidConfig {
                reason: "HttpMethodIs requires at least one method".into(),
            });
        }
        Ok(Arc::new(HttpMethodIs::new(config.methods)))
    }
}

/// Configuration for [`HeaderMatches`].
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderMatchesConfig {
    /// Header name (case-insensitive).
    pub name: String,
    /// Regular expression the header value must match.
    pub pattern: String,
}

impl IntoConstraint for HeaderMatches {
    type Config = HeaderMatchesConfig;

    fn from_config(config: HeaderMatchesConfig) -> Result<Arc<dyn SelectorPredicate>, EngineError> {
        if config.name.is_empty() {
            return Err(EngineError::InvalidConfig {
                reason: "HeaderMatches requires a header name".into(),
            });
        }
        Ok(Arc::new(HeaderMatches::new(config.name, &config.pattern)?))
    }
}
