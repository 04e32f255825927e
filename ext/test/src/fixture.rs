//! Conformance test fixture runner
//!
//! Loads YAML fixtures (an [`EngineConfig`] plus invocation cases) and runs
//! them against the filtra engine with the test domain [`types`](crate::types).

use crate::{types, Filter};
use filtra::prelude::*;
use filtra::EngineConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A complete test fixture
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,
    pub description: String,
    pub engine: EngineConfig,
    /// Substring of the error `Configuration::build` must fail with.
    #[serde(default)]
    pub build_error: Option<String>,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

/// Test case
#[derive(Debug, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub invocation: Invocation,
    pub expect: Expectation,
}

/// One action invocation as seen by the host runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct Invocation {
    pub controller: String,
    /// Base controllers, nearest first.
    #[serde(default)]
    pub bases: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub return_value: serde_json::Value,
}

impl Invocation {
    /// Build the selector for this invocation.
    #[must_use]
    pub fn selector(&self) -> Selector {
        let descriptor = self
            .bases
            .iter()
            .fold(ControllerDescriptor::new(self.controller.as_str()), |d, base| {
                d.with_base(base.as_str())
            });
        let mut request = RequestContext::builder();
        if let Some(method) = &self.method {
            request = request.method(method.as_str());
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        Selector::new(descriptor, self.action.as_str()).with_request(request.build())
    }

    /// Build the result selector for this invocation.
    #[must_use]
    pub fn result_selector(&self) -> ResultSelector {
        ResultSelector::new(self.selector(), self.return_value.clone())
    }
}

/// What a case expects. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Expectation {
    /// Filter names, in order.
    #[serde(default)]
    pub filters: Option<Vec<String>>,
    /// Result kind (`json`, `view`, `content`).
    #[serde(default)]
    pub result: Option<String>,
    /// Which result registration resolved: `"<index> <scope>"`, `default`, or `none`.
    #[serde(default)]
    pub chosen: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

impl TestCase {
    fn run(&self, engine: &Engine<dyn Filter>) -> CaseResult {
        let actual = Expectation {
            filters: self.expect.filters.as_ref().map(|_| {
                match engine.find_filters(&self.invocation.selector()) {
                    Ok(filters) => filters.iter().map(|f| f.name().to_owned()).collect(),
                    Err(e) => vec![format!("error: {e}")],
                }
            }),
            result: self.expect.result.as_ref().map(|_| {
                match engine.render(&self.invocation.result_selector()) {
                    Ok(result) => result.kind().to_owned(),
                    Err(e) => format!("error: {e}"),
                }
            }),
            chosen: self.expect.chosen.as_ref().map(|_| chosen(engine, &self.invocation)),
        };
        CaseResult {
            case_name: self.name.clone(),
            passed: actual == self.expect,
            expected: format!("{:?}", self.expect),
            actual: format!("{actual:?}"),
        }
    }
}

fn chosen(engine: &Engine<dyn Filter>, invocation: &Invocation) -> String {
    let results = engine.results();
    let trace = results.resolve_with_trace(&invocation.result_selector());
    match trace.chosen.and_then(|id| results.registry().get(id)) {
        Some(registration) => format!("{} {}", registration.id().index(), registration.scope().as_str()),
        None if trace.used_default => "default".into(),
        None => "none".into(),
    }
}

impl Fixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    /// Load and build the engine described by this fixture.
    ///
    /// # Errors
    ///
    /// Any [`EngineError`] from loading or building.
    pub fn build(&self) -> Result<Engine<dyn Filter>, EngineError> {
        Configuration::from_config(self.engine.clone(), Arc::new(types()))?.build()
    }

    /// Run all test cases and return results
    pub fn run(&self) -> Vec<CaseResult> {
        match (self.build(), &self.build_error) {
            (Ok(engine), None) => self.cases.iter().map(|case| case.run(&engine)).collect(),
            (Err(e), Some(expected)) => vec![CaseResult {
                case_name: "build".into(),
                passed: e.to_string().contains(expected.as_str()),
                expected: format!("build error containing {expected:?}"),
                actual: e.to_string(),
            }],
            (Ok(_), Some(expected)) => vec![CaseResult {
                case_name: "build".into(),
                passed: false,
                expected: format!("build error containing {expected:?}"),
                actual: "engine built".into(),
            }],
            (Err(e), None) => vec![CaseResult {
                case_name: "build".into(),
                passed: false,
                expected: "engine built".into(),
                actual: e.to_string(),
            }],
        }
    }

    /// Run all test cases and panic on first failure
    pub fn run_and_assert(&self) {
        let results = self.run();
        for result in results {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: expected {}, got {}",
                self.name, result.case_name, result.expected, result.actual
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: smoke
description: one unguarded filter
engine:
  filters:
    - payload: { type_url: filtra.test.v1.NamedFilter, config: { name: F1 } }
cases:
  - name: any invocation
    invocation: { controller: Home, action: index }
    expect: { filters: [F1] }
"#;

    #[test]
    fn parses_and_runs() {
        let fixture = Fixture::from_yaml(YAML).unwrap();
        assert_eq!(fixture.cases.len(), 1);
        fixture.run_and_assert();
    }

    #[test]
    fn multi_document() {
        let yaml = format!("{YAML}\n---\n{YAML}");
        assert_eq!(Fixture::from_yaml_multi(&yaml).unwrap().len(), 2);
    }

    #[test]
    fn mismatch_is_reported() {
        let yaml = YAML.replace("filters: [F1] }", "filters: [F2] }");
        let fixture = Fixture::from_yaml(&yaml).unwrap();
        let results = fixture.run();
        assert!(!results[0].passed);
        assert!(results[0].actual.contains("F1"));
    }

    #[test]
    fn invocation_builds_selector() {
        let invocation: Invocation = serde_yaml::from_str(
            "{ controller: Admin, bases: [Secured], action: purge, method: POST, headers: { Accept: text/html } }",
        )
        .unwrap();
        let s = invocation.selector();
        assert!(s.controller().is_assignable_to(&"Secured".into()));
        assert_eq!(s.request().method(), "POST");
        assert_eq!(s.request().header("accept"), Some("text/html"));
    }
}
