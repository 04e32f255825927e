//! Result factories: strategies that render an action's return value.

use crate::{ExpectsJson, ResultSelector, SelectorPredicate};
use std::fmt::Debug;

/// The rendered outcome handed back to the host runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Serialize the value as JSON.
    Json(serde_json::Value),
    /// Render a named view with the value as its model.
    View {
        /// View name.
        name: String,
        /// View model.
        model: serde_json::Value,
    },
    /// Raw content with an explicit content type.
    Content {
        /// MIME type of `body`.
        content_type: String,
        /// Response body.
        body: String,
    },
}

impl ActionResult {
    /// Short name of the variant (`"json"`, `"view"`, `"content"`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::View { .. } => "view",
            Self::Content { .. } => "content",
        }
    }
}

/// Renders a [`ResultSelector`] into an [`ActionResult`].
///
/// `should_be_returned_for` is the factory's own applicability test,
/// evaluated after its registration guard has matched.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `ResultFactory`",
    note = "result factories decide applicability (`should_be_returned_for`) and render (`create`)"
)]
pub trait ResultFactory: Send + Sync + Debug {
    /// Returns `true` if this factory should render `selector`.
    fn should_be_returned_for(&self, selector: &ResultSelector) -> bool;

    /// Render the result.
    fn create(&self, selector: &ResultSelector) -> ActionResult;
}

/// Renders the return value as JSON when the caller expects JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultFactory;

impl ResultFactory for JsonResultFactory {
    fn should_be_returned_for(&self, selector: &ResultSelector) -> bool {
        ExpectsJson.evaluate(selector.selector())
    }

    fn create(&self, selector: &ResultSelector) -> ActionResult {
        ActionResult::Json(selector.return_value().value().clone())
    }
}

/// Renders a view, named after the action unless a view name is configured.
///
/// Always applicable, which makes it the usual default factory.
#[derive(Debug, Clone, Default)]
pub struct ViewResultFactory {
    view: Option<String>,
}

impl ViewResultFactory {
    /// A factory that names views after the invoked action.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that always renders `view`.
    pub fn named(view: impl Into<String>) -> Self {
        Self {
            view: Some(view.into()),
        }
    }
}

impl ResultFactory for ViewResultFactory {
    fn should_be_returned_for(&self, _selector: &ResultSelector) -> bool {
        true
    }

    fn create(&self, selector: &ResultSelector) -> ActionResult {
        let name = self
            .view
            .clone()
            .unwrap_or_else(|| selector.selector().action().name().to_owned());
        ActionResult::View {
            name,
            model: selector.return_value().value().clone(),
        }
    }
}

/// Renders string return values as `text/plain` content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentResultFactory;

impl ResultFactory for ContentResultFactory {
    fn should_be_returned_for(&self, selector: &ResultSelector) -> bool {
        selector.return_value().value().is_string()
    }

    fn create(&self, selector: &ResultSelector) -> ActionResult {
        let body = match selector.return_value().value() {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        ActionResult::Content {
            content_type: "text/plain".to_owned(),
            body,
        }
    }
}
