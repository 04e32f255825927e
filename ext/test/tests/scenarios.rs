//! End-to-end behavior through the fluent setup API.

use filtra::{ActionDescriptorProvider, ContentResultFactory, JsonResultFactory, ViewResultFactory};
use filtra_test::prelude::*;
use std::sync::Arc;

fn json_request(selector: Selector) -> ResultSelector {
    ResultSelector::new(
        selector.with_request(RequestContext::builder().header("Accept", "application/json").build()),
        serde_json::json!({ "ok": true }),
    )
}

fn html_request(selector: Selector) -> ResultSelector {
    ResultSelector::new(
        selector.with_request(RequestContext::builder().header("Accept", "text/html").build()),
        serde_json::json!({ "ok": true }),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Filters
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn global_filter_plus_excluded_controller() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter(filter("F1"))
        .add_filter_with(filter("F2"), Except::for_type::<AccountController>())
        .build()
        .unwrap();

    assert_eq!(names(&engine, &TestAction::HomeIndex.selector()), ["F1", "F2"]);
    assert_eq!(names(&engine, &TestAction::AccountLogin.selector()), ["F1"]);
}

#[test]
fn excluded_action_leaves_sibling_actions() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter(filter("F1"))
        .add_filter_with(
            filter("F2"),
            Except::for_type::<HomeController>()
                .and_for_expression(&TestDescriptors, &TestAction::AccountLogout),
        )
        .build()
        .unwrap();

    assert_eq!(names(&engine, &TestAction::AccountLogin.selector()), ["F1", "F2"]);
    assert_eq!(names(&engine, &TestAction::AccountLogout.selector()), ["F1"]);
    assert_eq!(names(&engine, &TestAction::HomeAbout.selector()), ["F1"]);
}

#[test]
fn additive_guards_over_every_controller() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter(filter("r1"))
        .add_filter_with(filter("r2"), Except::for_type::<HomeController>())
        .build()
        .unwrap();

    for action in [
        TestAction::HomeIndex,
        TestAction::HomeAbout,
        TestAction::AccountLogin,
        TestAction::AccountLogout,
        TestAction::AdminPurge,
    ] {
        let found = names(&engine, &action.selector());
        assert_eq!(found[0], "r1");
        if TestDescriptors.controller_of(&action) == HomeController::identity() {
            assert_eq!(found, ["r1"], "{action:?}");
        } else {
            assert_eq!(found, ["r1", "r2"], "{action:?}");
        }
    }
}

#[test]
fn order_survives_interleaved_misses() {
    let mut configuration = Configuration::<dyn Filter>::new();
    for i in 0..20 {
        let name = format!("hit{i}");
        configuration = configuration
            .add_filter_with(filter(&format!("miss{i}")), Apply::for_type::<AdminController>())
            .add_filter_with(filter(&name), Apply::for_type::<HomeController>());
    }
    let engine = configuration.build().unwrap();

    let expected: Vec<String> = (0..20).map(|i| format!("hit{i}")).collect();
    assert_eq!(names(&engine, &TestAction::HomeIndex.selector()), expected);
}

#[test]
fn except_two_controllers_or_one_action() {
    let both = Configuration::<dyn Filter>::new()
        .add_filter_with(
            filter("F"),
            Except::for_type::<HomeController>().and_for_type::<AccountController>(),
        )
        .build()
        .unwrap();
    assert!(names(&both, &TestAction::HomeIndex.selector()).is_empty());
    assert!(names(&both, &TestAction::AccountLogin.selector()).is_empty());
    assert_eq!(names(&both, &TestAction::AdminPurge.selector()), ["F"]);

    let one_action = Configuration::<dyn Filter>::new()
        .add_filter_with(
            filter("F"),
            Except::for_type::<HomeController>()
                .and_for_action(AccountController::identity(), AccountController::action("login")),
        )
        .build()
        .unwrap();
    assert!(names(&one_action, &TestAction::HomeAbout.selector()).is_empty());
    assert!(names(&one_action, &TestAction::AccountLogin.selector()).is_empty());
    assert_eq!(names(&one_action, &TestAction::AccountLogout.selector()), ["F"]);
}

#[test]
fn base_controller_guard_covers_derived() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter_with(filter("auth"), Apply::for_type::<SecuredController>())
        .add_filter_with(filter("public"), Except::for_type::<SecuredController>())
        .build()
        .unwrap();

    assert_eq!(names(&engine, &TestAction::AdminPurge.selector()), ["auth"]);
    assert_eq!(names(&engine, &TestAction::HomeIndex.selector()), ["public"]);
}

#[test]
fn base_action_guard_skips_derived_invocation() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter_with(
            filter("base-action"),
            Apply::for_action(SecuredController::identity(), SecuredController::action("purge")),
        )
        .add_filter_with(filter("base-controller"), Apply::for_type::<SecuredController>())
        .build()
        .unwrap();

    assert_eq!(names(&engine, &TestAction::AdminPurge.selector()), ["base-controller"]);
}

#[test]
fn action_on_wrong_controller_fails_build() {
    let result = Configuration::<dyn Filter>::new()
        .add_filter_with(
            filter("F"),
            Apply::for_action(HomeController::identity(), AccountController::action("login")),
        )
        .build();
    assert!(matches!(result, Err(EngineError::ActionNotOnController { .. })));
}

#[test]
fn capability_guards_from_registry_and_instance() {
    let engine = Configuration::<dyn Filter>::new()
        .resolve_with(Arc::new(filtra_test::types()))
        .add_filter_with(filter("ajax"), Apply::when("filtra.core.v1.IsAjaxRequest"))
        .add_filter_with(filter("always"), Apply::when_predicate(AlwaysTrue))
        .add_filter_with(
            filter("never_or_admin"),
            Apply::for_type::<AdminController>().and_when("filtra.test.v1.Never"),
        )
        .build()
        .unwrap();

    let ajax = TestAction::HomeIndex
        .selector()
        .with_request(RequestContext::builder().header("X-Requested-With", "XMLHttpRequest").build());
    assert_eq!(names(&engine, &ajax), ["ajax", "always"]);
    assert_eq!(names(&engine, &TestAction::AdminPurge.selector()), ["always", "never_or_admin"]);
}

#[test]
fn type_and_instance_payloads_mix() {
    let engine = Configuration::<dyn Filter>::new()
        .resolve_with(Arc::new(filtra_test::types()))
        .add_filter(filter_type("typed"))
        .add_filter(filter("instance"))
        .build()
        .unwrap();
    assert_eq!(names(&engine, &TestAction::HomeIndex.selector()), ["typed", "instance"]);
}

#[test]
fn scope_is_derived_from_guard() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter(filter("g"))
        .add_filter_with(filter("c"), Apply::for_type::<HomeController>())
        .add_filter_with(filter("a"), Apply::for_expression(&TestDescriptors, &TestAction::HomeAbout))
        .add_filter_scoped(filter("s"), Apply::for_type::<HomeController>(), FilterScope::Global)
        .build()
        .unwrap();

    let scopes: Vec<_> = engine.filters().registrations().iter().map(|r| r.scope()).collect();
    assert_eq!(
        scopes,
        [FilterScope::Global, FilterScope::Controller, FilterScope::Action, FilterScope::Global]
    );
}

#[test]
fn find_is_idempotent() {
    let engine = Configuration::<dyn Filter>::new()
        .add_filter(filter("F1"))
        .add_filter_with(filter("F2"), Except::for_type::<AdminController>())
        .add_filter_with(filter("F3"), Apply::for_type::<HomeController>())
        .build()
        .unwrap();

    let s = TestAction::HomeAbout.selector();
    let first = names(&engine, &s);
    assert_eq!(first, names(&engine, &s));
    assert_eq!(first, ["F1", "F2", "F3"]);
}

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(
        Configuration::<dyn Filter>::new()
            .add_filter(filter("F1"))
            .add_filter_with(filter("F2"), Except::for_type::<AccountController>())
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || names(&engine, &TestAction::AccountLogin.selector()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), ["F1"]);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Result factories
// ═══════════════════════════════════════════════════════════════════════════════

fn result_engine() -> Engine<dyn Filter> {
    Configuration::<dyn Filter>::new()
        .add_result_factory(Payload::Instance(Arc::new(JsonResultFactory) as Arc<dyn ResultFactory>))
        .with_default_factory(Payload::Instance(
            Arc::new(ViewResultFactory::new()) as Arc<dyn ResultFactory>
        ))
        .build()
        .unwrap()
}

#[test]
fn json_caller_gets_json_else_default() {
    let engine = result_engine();

    let json = engine.render(&json_request(TestAction::HomeIndex.selector())).unwrap();
    assert_eq!(json, ActionResult::Json(serde_json::json!({ "ok": true })));

    let html = engine.render(&html_request(TestAction::HomeIndex.selector())).unwrap();
    assert_eq!(html.kind(), "view");
}

#[test]
fn fallback_returns_the_default_instance() {
    let engine = result_engine();
    let chosen = engine
        .resolve_result(&html_request(TestAction::AccountLogin.selector()))
        .unwrap();
    let default = engine.results().default_factory().unwrap();
    assert!(Arc::ptr_eq(chosen, default));
}

#[test]
fn first_applicable_factory_wins() {
    let engine = Configuration::<dyn Filter>::new()
        .add_result_factory(Payload::Instance(Arc::new(ContentResultFactory) as Arc<dyn ResultFactory>))
        .add_result_factory(Payload::Instance(Arc::new(JsonResultFactory) as Arc<dyn ResultFactory>))
        .with_default_factory(TypeToken::new("filtra.core.v1.ViewResultFactory"))
        .build()
        .unwrap();

    let rs = ResultSelector::new(
        TestAction::HomeIndex
            .selector()
            .with_request(RequestContext::builder().header("Accept", "application/json").build()),
        serde_json::json!("plain text"),
    );
    assert_eq!(engine.render(&rs).unwrap().kind(), "content");
}

#[test]
fn guarded_result_factory() {
    let engine = Configuration::<dyn Filter>::new()
        .add_result_factory_with(
            Payload::Instance(Arc::new(JsonResultFactory) as Arc<dyn ResultFactory>),
            Apply::for_type::<AccountController>(),
        )
        .with_default_factory(TypeToken::new("filtra.core.v1.ViewResultFactory"))
        .build()
        .unwrap();

    assert_eq!(
        engine.render(&json_request(TestAction::AccountLogin.selector())).unwrap().kind(),
        "json"
    );
    assert_eq!(
        engine.render(&json_request(TestAction::HomeIndex.selector())).unwrap().kind(),
        "view"
    );
}

#[test]
fn resolve_is_idempotent() {
    let engine = result_engine();
    let rs = json_request(TestAction::AdminPurge.selector());
    let first = engine.resolve_result(&rs).unwrap();
    let second = engine.resolve_result(&rs).unwrap();
    assert!(Arc::ptr_eq(first, second));
}

#[test]
fn trace_explains_fallback() {
    let engine = result_engine();
    let trace = engine
        .results()
        .resolve_with_trace(&html_request(TestAction::HomeIndex.selector()));
    assert!(trace.used_default);
    assert_eq!(trace.steps.len(), 1);
}

#[test]
fn capability_guard_on_result_factory_falls_back_to_default() {
    let engine = Configuration::<dyn Filter>::new()
        .add_result_factory_with(
            Payload::Instance(Arc::new(ViewResultFactory::named("json-shell")) as Arc<dyn ResultFactory>),
            Apply::when("filtra.core.v1.ExpectsJson"),
        )
        .with_default_factory(Payload::Instance(
            Arc::new(ViewResultFactory::named("page")) as Arc<dyn ResultFactory>
        ))
        .build()
        .unwrap();

    let json = engine.render(&json_request(TestAction::HomeIndex.selector())).unwrap();
    assert_eq!(
        json,
        ActionResult::View {
            name: "json-shell".into(),
            model: serde_json::json!({ "ok": true }),
        }
    );

    let html = html_request(TestAction::HomeIndex.selector());
    let chosen = engine.resolve_result(&html).unwrap();
    assert!(Arc::ptr_eq(chosen, engine.results().default_factory().unwrap()));
    assert!(engine.results().resolve_with_trace(&html).used_default);
}

#[test]
fn ajax_guarded_json_factory_needs_both_guard_and_accept() {
    let engine = Configuration::<dyn Filter>::new()
        .add_result_factory_with(
            Payload::Instance(Arc::new(JsonResultFactory) as Arc<dyn ResultFactory>),
            Apply::when("filtra.core.v1.IsAjaxRequest"),
        )
        .with_default_factory(TypeToken::new("filtra.core.v1.ViewResultFactory"))
        .build()
        .unwrap();

    let ajax_json = ResultSelector::new(
        TestAction::AccountLogin.selector().with_request(
            RequestContext::builder()
                .header("X-Requested-With", "XMLHttpRequest")
                .header("Accept", "application/json")
                .build(),
        ),
        serde_json::json!([1]),
    );
    assert_eq!(engine.render(&ajax_json).unwrap().kind(), "json");
    assert_eq!(
        engine.render(&json_request(TestAction::AccountLogin.selector())).unwrap().kind(),
        "view"
    );
}

#[test]
fn permissive_earlier_result_guard_shadows_later() {
    let engine = Configuration::<dyn Filter>::new()
        .add_result_factory_with(
            Payload::Instance(Arc::new(ViewResultFactory::named("everything")) as Arc<dyn ResultFactory>),
            Apply::when_predicate(AlwaysTrue),
        )
        .add_result_factory_with(
            Payload::Instance(Arc::new(JsonResultFactory) as Arc<dyn ResultFactory>),
            Apply::when("filtra.core.v1.ExpectsJson"),
        )
        .with_default_factory(TypeToken::new("filtra.core.v1.ContentResultFactory"))
        .build()
        .unwrap();

    let rs = json_request(TestAction::HomeIndex.selector());
    assert_eq!(engine.render(&rs).unwrap().kind(), "view");

    let trace = engine.results().resolve_with_trace(&rs);
    assert_eq!(trace.chosen.map(|id| id.index()), Some(0));
    assert!(!trace.used_default);
}
