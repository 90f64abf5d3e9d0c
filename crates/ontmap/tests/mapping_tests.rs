use std::collections::BTreeSet;
use std::sync::Arc;

use ontmap::error::Category;
use ontmap::function::{ArgSpec, Function, ValueType};
use ontmap::graph::MemGraph;
use ontmap::loader::parse_ntriples;
use ontmap::{
    Call, CallBuilder, ErrorCode, FunctionRegistry, Graph, Key, Literal, MapConfig, MappingModel, Term,
    Triple, Value,
};

const SCHEMA: &str = include_str!("fixtures/schema.nt");

fn src(local: &str) -> String {
    format!("http://src.example/{local}")
}

fn tgt(local: &str) -> String {
    format!("http://tgt.example/{local}")
}

fn schema_with(extra: &str) -> MemGraph {
    parse_ntriples(&format!("{SCHEMA}\n{extra}")).unwrap()
}

fn model_with(registry: FunctionRegistry) -> MappingModel {
    MappingModel::new(schema_with(""), Arc::new(registry))
}

fn model() -> MappingModel {
    model_with(FunctionRegistry::with_builtins())
}

fn call(model: &MappingModel, function: &str) -> CallBuilder {
    model.functions().require(function).unwrap().call()
}

fn user_uri(model: &MappingModel) -> Call {
    call(model, "fn:buildURI")
        .string("template", "http://tgt.example/user/{?1}")
        .reference("arg1", &src("firstName"))
        .build()
        .unwrap()
}

fn equals(model: &MappingModel, property: &str) -> Call {
    call(model, "fn:equals").reference("arg1", property).build().unwrap()
}

/// Person → User with a class bridge.
fn users(model: &mut MappingModel) -> String {
    let id = model.create_context(&src("Person"), &tgt("User")).unwrap();
    let bridge = user_uri(model);
    model.context_mut(&id).unwrap().add_class_bridge(bridge).unwrap();
    id
}

/// Person → Profile with a uuid class bridge.
fn profiles(model: &mut MappingModel) -> String {
    let id = model.create_context(&src("Person"), &tgt("Profile")).unwrap();
    let bridge = call(model, "fn:uuid").build().unwrap();
    model.context_mut(&id).unwrap().add_class_bridge(bridge).unwrap();
    id
}

fn triples(graph: &MemGraph) -> BTreeSet<Triple> {
    graph.triples().collect()
}

// --- Contexts ---

#[test]
fn create_context_is_idempotent() {
    let mut m = model();
    let a = m.create_context(&src("Person"), &tgt("User")).unwrap();
    let b = m.create_context(&src("Person"), &tgt("User")).unwrap();
    assert_eq!(a, b);
    assert_eq!(m.contexts().count(), 1);
    assert!(a.ends_with("#Context-Person-User"), "Unexpected id {a}");
    assert!(m.find_context(&src("Person"), &tgt("User")).is_some());
}

#[test]
fn unknown_context_is_reported() {
    let mut m = model();
    let err = m.context_mut("urn:missing").err().unwrap();
    assert_eq!(err.code(), ErrorCode::ContextNotFound);
    assert_eq!(err.detail(Key::Context), Some("urn:missing"));
}

#[test]
fn class_bridge_requires_target_function() {
    let mut m = model();
    let id = m.create_context(&src("Person"), &tgt("User")).unwrap();
    let upper = call(&m, "fn:upperCase").string("arg1", "x").build().unwrap();
    let err = m.context_mut(&id).unwrap().add_class_bridge(upper).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContextRequireTargetFunction);
    assert_eq!(err.category(), Category::Context);
    assert!(m.context(&id).unwrap().class_bridge().is_none());
    assert_eq!(m.rules().count(), 0);
}

#[test]
fn class_filter_must_be_boolean() {
    let mut m = model();
    let id = m.create_context(&src("Person"), &tgt("User")).unwrap();
    let filter = call(&m, "fn:upperCase").string("arg1", "x").build().unwrap();
    let bridge = user_uri(&m);
    let err = m
        .context_mut(&id)
        .unwrap()
        .add_class_bridge_with_filter(filter, bridge)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContextNotBooleanFilterFunction);
}

#[test]
fn replacing_the_class_bridge_keeps_one_rule() {
    let mut m = model();
    let id = users(&mut m);
    let uuid = call(&m, "fn:uuid").build().unwrap();
    m.context_mut(&id).unwrap().add_class_bridge(uuid).unwrap();
    assert_eq!(m.rules().count(), 1);
    let bridge = m.context(&id).unwrap().class_bridge().unwrap();
    assert_eq!(bridge.call().function().local_name(), "uuid");
}

// --- Property bridges ---

#[test]
fn property_bridge_compiles_a_rule() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = equals(&m, &src("firstName"));
    let bridge = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap();

    let ctx = m.context(&id).unwrap();
    let rule = ctx.property_bridge(&bridge).unwrap().rule();
    assert_eq!(rule.context(), id);
    assert_eq!(rule.target_predicate(), &Term::iri(tgt("userName")));
    assert_eq!(rule.predicates(), &[(1, Term::iri(src("firstName")))]);
    assert_eq!(m.rules().count(), 2);
    assert_eq!(m.rules().next().unwrap().id(), ctx.class_bridge().unwrap().rule().id());
}

#[test]
fn property_bridge_rejects_target_function() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = call(&m, "fn:self").build().unwrap();
    let err = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PropertyBridgeTargetFunction);
}

#[test]
fn property_filter_must_be_boolean() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = equals(&m, &src("firstName"));
    let filter = equals(&m, &src("lastName"));
    let err = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(Some(filter), mapping, &tgt("userName"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PropertyBridgeNotBooleanFilterFunction);
}

#[test]
fn property_bridge_needs_target_class_property() {
    let mut m = model();
    let id = users(&mut m);
    let before = triples(&m.to_graph());
    let mapping = equals(&m, &src("firstName"));
    let err = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &src("lastName"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PropertyBridgeWrongTargetProperty);
    assert_eq!(err.detail(Key::Property), Some(src("lastName").as_str()));
    assert_eq!(triples(&m.to_graph()), before, "A rejected bridge changes nothing");
}

#[test]
fn remove_property_bridge() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = equals(&m, &src("firstName"));
    let bridge = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap();
    assert_eq!(m.rules().count(), 2);

    m.context_mut(&id).unwrap().remove_property_bridge(&bridge).unwrap();
    assert_eq!(m.rules().count(), 1);
    assert!(m.store().variables().is_empty(), "Slot variables are collected");

    let err = m
        .context_mut(&id)
        .unwrap()
        .remove_property_bridge(&bridge)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PropertyBridgeNotFound);
    assert_eq!(err.detail(Key::Mapping), Some(bridge.as_str()));
}

// --- Templates ---

#[test]
fn equal_shapes_share_one_template() {
    let mut m = model();
    let id = users(&mut m);
    let first = equals(&m, &src("firstName"));
    let last = equals(&m, &src("lastName"));
    let mut ctx = m.context_mut(&id).unwrap();
    let a = ctx.add_property_bridge(None, first, &tgt("userName")).unwrap();
    let b = ctx.add_property_bridge(None, last, &tgt("fullName")).unwrap();

    let ctx = m.context(&id).unwrap();
    let ra = ctx.property_bridge(&a).unwrap().rule();
    let rb = ctx.property_bridge(&b).unwrap().rule();
    assert!(Arc::ptr_eq(ra.template(), rb.template()));
    assert_ne!(ra.text(), rb.text());
    // class bridge template plus the shared property template
    assert_eq!(m.store().templates().count(), 2);
}

#[test]
fn filter_slots_change_the_template() {
    let mut m = model();
    let id = users(&mut m);
    let first = equals(&m, &src("firstName"));
    let again = equals(&m, &src("firstName"));
    let adult = call(&m, "fn:gt")
        .reference("arg1", &src("age"))
        .literal("arg2", Literal::integer(17))
        .build()
        .unwrap();
    let mut ctx = m.context_mut(&id).unwrap();
    let plain = ctx.add_property_bridge(None, first, &tgt("userName")).unwrap();
    let gated = ctx
        .add_property_bridge(Some(adult), again, &tgt("fullName"))
        .unwrap();

    let ctx = m.context(&id).unwrap();
    let plain = ctx.property_bridge(&plain).unwrap().rule();
    let gated = ctx.property_bridge(&gated).unwrap().rule();
    assert!(!Arc::ptr_eq(plain.template(), gated.template()));
    assert_eq!(gated.template().key().filters(), &[2]);
    assert_eq!(gated.predicate(2), Some(&Term::iri(src("age"))));
}

#[test]
fn defaults_are_recorded_per_slot() {
    let mut m = model();
    let id = users(&mut m);
    let status = call(&m, "fn:withDefault")
        .reference("arg1", &src("status"))
        .string("arg2", "active")
        .build()
        .unwrap();
    let bridge = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, status, &tgt("status"))
        .unwrap();
    let rule = m.context(&id).unwrap().property_bridge(&bridge).unwrap().rule();
    assert_eq!(rule.default(1), Some(&Literal::string("active")));
}

#[test]
fn default_around_a_call_stays_in_the_expression() {
    let mut m = model();
    let id = users(&mut m);
    let joined = call(&m, "fn:concatWithSeparator")
        .reference("arg1", &src("firstName"))
        .reference("arg2", &src("lastName"))
        .build()
        .unwrap();
    let full = call(&m, "fn:withDefault")
        .call("arg1", joined)
        .string("arg2", "anonymous")
        .build()
        .unwrap();
    let bridge = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, full, &tgt("fullName"))
        .unwrap();
    let rule = m.context(&id).unwrap().property_bridge(&bridge).unwrap().rule();
    assert!(rule.defaults().is_empty());
    assert!(
        rule.expression().to_string().contains("withDefault"),
        "Unexpected expression {}",
        rule.expression()
    );
}

// --- Validation ---

#[test]
fn validation_collects_every_violation() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = call(&m, "fn:and")
        .string("arg1", "maybe")
        .string("arg2", "perhaps")
        .build()
        .unwrap();
    let err = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::MappingFunctionValidationFail);
    assert_eq!(err.detail(Key::Context), Some(id.as_str()));
    assert_eq!(err.causes().len(), 2);
    let args: Vec<&str> = err.causes().iter().filter_map(|c| c.detail(Key::Arg)).collect();
    assert_eq!(args, vec!["arg1", "arg2"]);
    assert!(err
        .causes()
        .iter()
        .all(|c| c.code() == ErrorCode::FunctionCallWrongLiteral));
    assert!(err.report().lines().count() >= 3, "Report lists the causes");
}

#[test]
fn validation_checks_nested_return_types() {
    let m = model();
    let sum = call(&m, "fn:add")
        .literal("arg1", Literal::integer(1))
        .literal("arg2", Literal::integer(2))
        .build()
        .unwrap();
    let upper = call(&m, "fn:upperCase").call("arg1", sum).build().unwrap();
    let err = m.validate(&upper).unwrap_err();
    assert_eq!(err.causes().len(), 1);
    assert_eq!(err.causes()[0].code(), ErrorCode::FunctionCallIncompatibleReturnType);
}

#[test]
fn validation_checks_context_properties() {
    let mut m = model();
    let id = m.create_context(&src("Person"), &tgt("User")).unwrap();
    let bridge = call(&m, "fn:buildURI")
        .string("template", "http://tgt.example/user/{?1}")
        .reference("arg1", "http://elsewhere.example/nickname")
        .build()
        .unwrap();
    let ctx = m.context_mut(&id).unwrap();
    let err = ctx.validate(&bridge).unwrap_err();
    assert_eq!(err.causes()[0].code(), ErrorCode::FunctionCallNotContextProperty);

    let unknown = call(&m, "fn:targetResource")
        .reference("context", "urn:no-such-context")
        .build()
        .unwrap();
    let err = m.validate(&unknown).unwrap_err();
    assert_eq!(err.causes()[0].code(), ErrorCode::FunctionCallWrongResource);
}

// --- Builder errors ---

#[test]
fn missing_required_args_are_all_listed() {
    let m = model();
    let err = call(&m, "fn:concatWithSeparator").build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::FunctionNoRequiredArg);
    assert_eq!(err.detail_all(Key::Arg), vec!["arg1", "arg2"]);
}

#[test]
fn unknown_argument_is_rejected() {
    let m = model();
    let err = call(&m, "fn:upperCase").string("nope", "x").build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::FunctionNonexistentArgument);
    assert_eq!(err.detail(Key::Arg), Some("nope"));
}

#[test]
fn self_call_is_rejected() {
    let m = model();
    let builder = call(&m, "fn:concat").string("arg1", "a");
    let itself = builder.clone().build().unwrap();
    let err = builder.call("arg2", itself).build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::FunctionSelfCall);
    assert_eq!(err.detail(Key::Arg), Some("arg2"));

    let builder = call(&m, "fn:concat");
    let err = builder.clone().nested("arg1", builder).build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::FunctionSelfCall);
}

#[test]
fn same_function_may_nest() {
    let m = model();
    let inner = call(&m, "fn:concat").build().unwrap();
    let outer = call(&m, "fn:concat").call("arg1", inner.clone()).build().unwrap();
    assert_eq!(outer.arg("arg1"), Some(&Value::from(inner)));

    let nested = call(&m, "fn:concat")
        .nested("arg1", call(&m, "fn:concat").string("arg1", "x"))
        .build();
    assert!(nested.is_ok());
}

#[test]
fn omitted_optional_args_take_defaults() {
    let m = model();
    let joined = call(&m, "fn:concatWithSeparator")
        .string("arg1", "a")
        .string("arg2", "b")
        .build()
        .unwrap();
    assert_eq!(joined.arg("separator"), Some(&Value::string(" ")));

    let uuid = call(&m, "fn:uuid").build().unwrap();
    assert_eq!(uuid.arg("source"), Some(&Value::source()));
}

#[test]
fn unknown_function_is_reported() {
    let registry = FunctionRegistry::with_builtins();
    let err = registry.require("fn:nope").unwrap_err();
    assert_eq!(err.code(), ErrorCode::FunctionNotFound);
}

// --- Deletion and garbage collection ---

#[test]
fn dependent_context_blocks_deletion() {
    let mut m = model();
    let u = users(&mut m);
    let p = profiles(&mut m);
    m.bind_contexts(&u, &p).unwrap();
    assert_eq!(m.dependent_contexts(&p), vec![u.clone()]);

    let before = triples(&m.to_graph());
    let err = m.remove_context(&p).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MappingContextCannotBeDeletedDueToDependencies);
    assert_eq!(err.detail_all(Key::Dependent), vec![u.as_str()]);
    assert_eq!(err.detail(Key::ContextTarget), Some(tgt("Profile").as_str()));
    assert_eq!(triples(&m.to_graph()), before, "A refused deletion changes nothing");

    m.remove_context(&u).unwrap();
    m.remove_context(&p).unwrap();
    assert_eq!(m.contexts().count(), 0);
    assert!(m.store().is_empty(), "Nothing is left to collect");
}

#[test]
fn garbage_collection_reaches_a_fixed_point() {
    let mut registry = FunctionRegistry::with_builtins();
    let string_fn = |iri: &str| {
        Function::define(iri)
            .custom()
            .arg(ArgSpec::required("arg1", ValueType::string()))
            .returns(ValueType::string())
            .eval(|_, args| Ok(args.get("arg1").map(|t| Term::string(t.value().trim()))))
    };
    registry.register(string_fn("http://fn.example/trim").build());
    registry.register(string_fn("http://fn.example/clean").depends_on("http://fn.example/trim").build());
    registry.register(string_fn("http://fn.example/shout").depends_on("http://fn.example/clean").build());

    let mut m = model_with(registry);
    let id = users(&mut m);
    let mapping = call(&m, "http://fn.example/shout")
        .reference("arg1", &src("firstName"))
        .build()
        .unwrap();
    let bridge = m
        .context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap();
    assert_eq!(m.store().functions().count(), 3, "Dependencies are stored too");
    let graph = m.to_graph();
    assert!(graph.contains(&Triple::new(
        Term::iri("http://fn.example/shout"),
        Term::iri("http://ontmap.example/mapping#dependsOn"),
        Term::iri("http://fn.example/clean"),
    )));

    m.context_mut(&id).unwrap().remove_property_bridge(&bridge).unwrap();
    assert_eq!(m.store().functions().count(), 0, "The whole chain is collected");
    assert_eq!(m.collect_garbage(), 0);
}

// --- Binding ---

#[test]
fn bind_contexts_adds_link_bridge() {
    let mut m = model();
    let u = users(&mut m);
    let p = profiles(&mut m);
    let bridge = m.bind_contexts(&p, &u).unwrap();

    let owner = m.context(&u).unwrap();
    let link = owner.property_bridge(&bridge).expect("bridge on the domain side");
    assert_eq!(link.target(), &Term::iri(tgt("hasProfile")));
    assert_eq!(link.mapping().function().local_name(), "targetResource");
    assert!(link.mapping().references().contains(&p.as_str()));
}

#[test]
fn bind_contexts_rejects_ambiguous_links() {
    let extra = "<http://tgt.example/backupProfile> <http://www.w3.org/2000/01/rdf-schema#domain> <http://tgt.example/User> .\n\
                 <http://tgt.example/backupProfile> <http://www.w3.org/2000/01/rdf-schema#range> <http://tgt.example/Profile> .";
    let mut m = MappingModel::new(schema_with(extra), Arc::new(FunctionRegistry::with_builtins()));
    let u = users(&mut m);
    let p = profiles(&mut m);
    let err = m.bind_contexts(&u, &p).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MappingAttachedContextAmbiguousClassLink);
    assert_eq!(err.detail_all(Key::Property).len(), 2);
}

#[test]
fn bind_contexts_needs_a_link() {
    let extra = "<http://tgt.example/Badge> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .";
    let mut m = MappingModel::new(schema_with(extra), Arc::new(FunctionRegistry::with_builtins()));
    let u = users(&mut m);
    let b = m.create_context(&src("Person"), &tgt("Badge")).unwrap();
    let err = m.bind_contexts(&u, &b).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MappingAttachedContextTargetClassNotLinked);
    assert_eq!(m.rules().count(), 1);
}

// --- Named individuals ---

#[test]
fn named_individual_context_follows_its_target() {
    let config = MapConfig::default().with_named_individuals(true);
    let mut m = MappingModel::with_config(
        schema_with(""),
        Arc::new(FunctionRegistry::with_builtins()),
        config,
    );
    let u = users(&mut m);
    let hidden: Vec<_> = m.contexts().filter(|c| c.is_hidden()).collect();
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].source(), &Term::iri(tgt("User")));
    assert!(hidden[0].class_bridge().is_some());

    m.remove_context(&u).unwrap();
    assert_eq!(m.contexts().count(), 0, "The hidden context goes with the last user of it");
}

// --- Materialization ---

#[test]
fn mapping_graph_lists_rules_by_source_class() {
    let mut m = model();
    let id = users(&mut m);
    let mapping = equals(&m, &src("firstName"));
    m.context_mut(&id)
        .unwrap()
        .add_property_bridge(None, mapping, &tgt("userName"))
        .unwrap();

    let graph = m.to_graph();
    let rules = graph.objects(
        &Term::iri(src("Person")),
        &Term::iri("http://ontmap.example/mapping#rule"),
    );
    assert_eq!(rules.len(), 2);
    for rule in m.rules() {
        assert!(rules.contains(&Term::iri(rule.id())));
    }
}
