use strata::{ComposeError, ComposerConfig, Composer, Condition, LayerSpec, Target, Value};

use crate::common::{composer, enemy, int};

fn layer(composer: &Composer, target: &Target, name: &str, value: i64) -> LayerSpec {
	let spec = LayerSpec::new(name, Condition::never());
	composer.deploy(&spec).unwrap();
	composer
		.add_refinement(&spec, target, "hp", move |_, _, _| Ok(Value::Int(value)))
		.unwrap();
	spec
}

#[test]
fn requires_installed_extension() {
	let composer = composer(ComposerConfig::default());
	let enemy = enemy();
	let instance = enemy.instantiate();
	let spec = layer(&composer, &enemy, "Boss", 10);

	assert!(!composer.has_object_scope());
	assert!(matches!(
		composer.activate_for(&spec, &instance),
		Err(ComposeError::ObjectScopeNotInstalled)
	));
	assert!(matches!(
		composer.is_active_for(&spec, &instance),
		Err(ComposeError::ObjectScopeNotInstalled)
	));

	composer.install_object_scope();
	composer.install_object_scope();
	assert!(composer.has_object_scope());
	assert!(!composer.is_active_for(&spec, &instance).unwrap());
}

#[test]
fn override_shadows_global_activation_until_emptied() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let boss = enemy.instantiate();
	let grunt = enemy.instantiate();
	let global = layer(&composer, &enemy, "Global", 5);
	let scoped = layer(&composer, &enemy, "Scoped", 10);

	composer.activate(&global).unwrap();
	composer.activate_for(&scoped, &boss).unwrap();

	assert_eq!(int(&composer, &boss, "hp"), 10);
	assert_eq!(int(&composer, &grunt, "hp"), 5);
	assert!(composer.is_active_for(&scoped, &boss).unwrap());
	assert!(!composer.is_active_for(&scoped, &grunt).unwrap());
	assert!(!composer.is_active(&scoped));

	composer.deactivate(&global).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 10);

	composer.activate(&global).unwrap();
	composer.deactivate_for(&scoped, &boss).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 5);
	assert_eq!(composer.instance_override(&boss, "hp").unwrap(), None);
}

#[test]
fn stack_restores_next_entry_from_anywhere() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let boss = enemy.instantiate();
	let first = layer(&composer, &enemy, "First", 1_000);
	let second = layer(&composer, &enemy, "Second", 2_000);
	let third = layer(&composer, &enemy, "Third", 3_000);

	for spec in [&first, &second, &third, &second] {
		composer.activate_for(spec, &boss).unwrap();
	}
	assert_eq!(composer.instance_override(&boss, "hp").unwrap().as_deref(), Some("Third"));

	composer.deactivate_for(&second, &boss).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 3_000);

	composer.deactivate_for(&third, &boss).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 1_000);

	composer.deactivate_for(&first, &boss).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 1);
}

#[test]
fn override_proceeds_to_pristine_original() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let boss = enemy.instantiate();
	let global = layer(&composer, &enemy, "Global", 5);
	let doubled = LayerSpec::new("Doubled", Condition::never());
	composer.deploy(&doubled).unwrap();
	composer
		.add_refinement(&doubled, &enemy, "hp", |_, args, proceed| {
			Ok(Value::Int(proceed.call(args)?.as_int().unwrap_or(0) * 2))
		})
		.unwrap();

	composer.activate(&global).unwrap();
	composer.activate_for(&doubled, &boss).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 2);
}

#[test]
fn activation_is_all_or_nothing() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let wall = Target::new("Wall").with_method("hp", |_, _| Ok(Value::Int(100)));
	let goblin = enemy.instantiate();
	let brick = wall.instantiate();
	let spec = layer(&composer, &enemy, "Boss", 10);

	let err = composer.activate_for(&spec, [&goblin, &brick]).unwrap_err();
	assert!(matches!(
		&err,
		ComposeError::NoRefinementForType { layer, target } if layer == "Boss" && target == "Wall"
	));
	assert_eq!(err.to_string(), "layer \"Boss\" has no refinement for target \"Wall\"");
	assert!(!composer.is_active_for(&spec, &goblin).unwrap());

	let none: &[strata::Instance] = &[];
	assert!(matches!(
		composer.activate_for(&spec, none),
		Err(ComposeError::InvalidArgument { .. })
	));
}

#[test]
fn undeployed_layer_is_rejected_after_type_check() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let goblin = enemy.instantiate();
	let spec = LayerSpec::new("Ghost", Condition::never());
	composer
		.add_refinement(&spec, &enemy, "hp", |_, _, _| Ok(Value::Int(0)))
		.unwrap();

	assert!(matches!(
		composer.activate_for(&spec, &goblin),
		Err(ComposeError::NotDeployed { layer }) if layer == "Ghost"
	));
	let wall = Target::new("Wall").instantiate();
	assert!(matches!(
		composer.activate_for(&spec, &wall),
		Err(ComposeError::NoRefinementForType { .. })
	));
}

#[test]
fn undeploy_and_uninstall_drop_overrides() {
	let composer = composer(ComposerConfig::default());
	composer.install_object_scope();
	let enemy = enemy();
	let boss = enemy.instantiate();
	let minions = vec![enemy.instantiate(), enemy.instantiate()];
	let spec = layer(&composer, &enemy, "Boss", 10);
	let other = layer(&composer, &enemy, "Other", 20);

	composer.activate_for(&spec, &boss).unwrap();
	composer.activate_for(&other, &minions).unwrap();
	assert!(minions.iter().all(|m| composer.is_active_for(&other, m).unwrap()));

	composer.undeploy(&spec).unwrap();
	assert_eq!(int(&composer, &boss, "hp"), 1);
	assert_eq!(int(&composer, &minions[1], "hp"), 20);

	composer.uninstall_object_scope();
	assert!(!composer.has_object_scope());
	assert_eq!(int(&composer, &minions[0], "hp"), 1);
}
