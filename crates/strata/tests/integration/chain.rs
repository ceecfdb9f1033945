use pretty_assertions::assert_eq;
use strata::{ComposeError, ComposerConfig, Composer, Condition, LayerSpec, Target, Value};

use crate::common::{Trace, composer, enemy, int};

/// Deploys a layer named `name` whose `hp` refinement records itself and
/// then proceeds.
fn tracing_layer(composer: &Composer, target: &Target, name: &'static str, trace: &Trace) -> LayerSpec {
	let spec = LayerSpec::new(name, Condition::never());
	composer.deploy(&spec).unwrap();
	let trace = trace.clone();
	composer
		.add_refinement(&spec, target, "hp", move |_, args, proceed| {
			trace.push(name);
			proceed.call(args)
		})
		.unwrap();
	spec
}

/// Deploys a layer named `name` whose `hp` refinement returns `value`.
fn constant_layer(composer: &Composer, target: &Target, name: &str, value: i64) -> LayerSpec {
	let spec = LayerSpec::new(name, Condition::never());
	composer.deploy(&spec).unwrap();
	composer
		.add_refinement(&spec, target, "hp", move |_, _, _| Ok(Value::Int(value)))
		.unwrap();
	spec
}

#[test]
fn chain_skips_inactive_layers() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let trace = Trace::default();
	let a = tracing_layer(&composer, &enemy, "A", &trace);
	let b = tracing_layer(&composer, &enemy, "B", &trace);
	let c = tracing_layer(&composer, &enemy, "C", &trace);
	composer.set_resolution_order(&enemy, "hp", &[a.clone(), b.clone(), c.clone()]).unwrap();

	composer.activate(&c).unwrap();
	composer.activate(&a).unwrap();

	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 1);
	assert_eq!(trace.take(), vec!["A", "C"]);
	assert_eq!(composer.installed_layer(&enemy, "hp").as_deref(), Some("A"));

	composer.deactivate(&a).unwrap();
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 1);
	assert_eq!(trace.take(), vec!["C"]);

	composer.activate(&b).unwrap();
	int(&composer, &enemy.instantiate(), "hp");
	assert_eq!(trace.take(), vec!["B", "C"]);
}

#[test]
fn proceed_exposes_remaining_chain() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let trace = Trace::default();
	let b = tracing_layer(&composer, &enemy, "B", &trace);
	let c = tracing_layer(&composer, &enemy, "C", &trace);
	let a = LayerSpec::new("A", Condition::never());
	composer.deploy(&a).unwrap();
	composer
		.add_refinement(&a, &enemy, "hp", |_, _, proceed| {
			let remaining = proceed.remaining().join(",");
			Ok(Value::Str(format!("{}:{remaining}|{:?}", proceed.method(), proceed.next_layer())))
		})
		.unwrap();
	composer.set_resolution_order(&enemy, "hp", &[a.clone(), b.clone(), c.clone()]).unwrap();
	for spec in [&a, &b, &c] {
		composer.activate(spec).unwrap();
	}

	let out = composer.call(&enemy.instantiate(), "hp", &[]).unwrap();
	assert_eq!(out, Value::from("hp:B,C|Some(\"B\")"));
	assert!(trace.take().is_empty());
}

#[test]
fn default_mode_runs_most_recent_layer() {
	let composer = composer(ComposerConfig::default());
	let enemy = enemy();
	let trace = Trace::default();
	let a = tracing_layer(&composer, &enemy, "A", &trace);
	let b = tracing_layer(&composer, &enemy, "B", &trace);

	composer.activate(&a).unwrap();
	composer.activate(&b).unwrap();
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 1);
	assert_eq!(trace.take(), vec!["B"]);

	composer.deactivate(&b).unwrap();
	int(&composer, &enemy.instantiate(), "hp");
	assert_eq!(trace.take(), vec!["A"]);

	composer.deactivate(&a).unwrap();
	assert!(composer.is_original(&enemy, "hp"));
}

#[test]
fn chain_mode_without_resolution_behaves_like_default() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let trace = Trace::default();
	let a = tracing_layer(&composer, &enemy, "A", &trace);
	let b = tracing_layer(&composer, &enemy, "B", &trace);

	composer.activate(&b).unwrap();
	composer.activate(&a).unwrap();
	int(&composer, &enemy.instantiate(), "hp");
	assert_eq!(trace.take(), vec!["A"]);
}

#[test]
fn unlisted_layers_do_not_contend() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let listed = constant_layer(&composer, &enemy, "Listed", 5);
	let stray = constant_layer(&composer, &enemy, "Stray", 9);
	composer.set_resolution_order(&enemy, "hp", &[listed.clone()]).unwrap();

	composer.activate(&stray).unwrap();
	assert!(composer.is_original(&enemy, "hp"));

	composer.activate(&listed).unwrap();
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 5);
}

#[test]
fn resolver_sees_active_listed_contenders() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let a = constant_layer(&composer, &enemy, "A", 2);
	let b = constant_layer(&composer, &enemy, "B", 3);
	let c = constant_layer(&composer, &enemy, "C", 4);
	composer
		.set_resolver(&enemy, "hp", &[a.clone(), b.clone(), c.clone()], |contenders, args| {
			let mut total = contenders.original(args)?.as_int().unwrap_or(0);
			for value in contenders.call_all(args)? {
				total += value.as_int().unwrap_or(0);
			}
			Ok(Value::Str(format!("{}={total}", contenders.names().collect::<Vec<_>>().join("+"))))
		})
		.unwrap();

	assert!(composer.is_original(&enemy, "hp"));

	composer.activate(&c).unwrap();
	composer.activate(&a).unwrap();
	let out = composer.call(&enemy.instantiate(), "hp", &[]).unwrap();
	assert_eq!(out, Value::from("A+C=7"));

	let resolved = composer.installed(&enemy, "hp").unwrap();
	composer.activate(&b).unwrap();
	assert!(std::rc::Rc::ptr_eq(&resolved, &composer.installed(&enemy, "hp").unwrap()));
	assert_eq!(composer.call(&enemy.instantiate(), "hp", &[]).unwrap(), Value::from("A+B+C=10"));
}

#[test]
fn resolver_can_guard() {
	let composer = composer(ComposerConfig::chain());
	let enemy = enemy();
	let a = constant_layer(&composer, &enemy, "A", 2);
	composer
		.set_resolver(&enemy, "hp", &[a.clone()], |contenders, args| {
			if contenders.instance().get("immune").as_bool() == Some(true) {
				return Err(ComposeError::behavior("hp", "immune"));
			}
			contenders.call("A", args).unwrap_or_else(|| contenders.original(args))
		})
		.unwrap();
	composer.activate(&a).unwrap();

	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 2);
	let immune = enemy.instantiate().with_field("immune", true);
	assert!(matches!(
		composer.call(&immune, "hp", &[]),
		Err(ComposeError::Behavior { message, .. }) if message == "immune"
	));
}

#[test]
fn mode_and_resolution_changes_reroute_live_slots() {
	let composer = composer(ComposerConfig::default());
	let enemy = enemy();
	let a = constant_layer(&composer, &enemy, "A", 2);
	let c = constant_layer(&composer, &enemy, "C", 4);
	composer.activate(&a).unwrap();
	composer.activate(&c).unwrap();

	composer.set_resolution_order(&enemy, "hp", &[a.clone(), c.clone()]).unwrap();
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 4);

	composer.configure(ComposerConfig::chain());
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 2);
	let order: Vec<_> = composer
		.resolution_order(&enemy, "hp")
		.unwrap()
		.iter()
		.map(|spec| spec.name().unwrap_or_default().to_string())
		.collect();
	assert_eq!(order, vec!["A", "C"]);

	composer.clear_resolutions();
	assert!(composer.resolution_order(&enemy, "hp").is_none());
	assert_eq!(int(&composer, &enemy.instantiate(), "hp"), 4);
}
