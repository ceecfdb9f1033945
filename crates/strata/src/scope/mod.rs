//! Per-instance layer activation.
//!
//! # Purpose
//!
//! The object-scope extension lets a single [`Instance`] run a layer's
//! refinements regardless of the layer's global state. Each (instance,
//! method) pair owns a stack of refinements; the top of a non-empty stack
//! fully shadows the target's installed behavior for that instance.
//!
//! The extension is off until [`Composer::install_object_scope`] is called.
//! Overrides live in a side table keyed by instance identity and are removed
//! only by [`Composer::deactivate_for`], undeploying the layer, or
//! uninstalling the extension.
//!
//! # Invariants
//!
//! - Pushing a layer already on a stack is a no-op.
//!   - Enforced in: [`ObjectScopes::push`]
//!   - Tested by: `scope::tests::duplicate_push_is_noop`
//! - Activation validates every instance before touching any stack.
//!   - Enforced in: [`Composer::activate_for`]
//!   - Tested by: `object_scope::activation_is_all_or_nothing`
//!   - Failure symptom: half of the instances run the layer after an error.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use smallvec::SmallVec;

use crate::Composer;
use crate::error::{ComposeError, Result};
use crate::id::{InstanceId, LayerKey};
use crate::layer::LayerSpec;
use crate::target::{Behavior, Instance, Instances, RefinementFn};


/// One layer's refinement of one method, pushed for one instance.
#[derive(Clone)]
pub(crate) struct ScopeEntry {
	pub(crate) layer: LayerKey,
	pub(crate) layer_name: Box<str>,
	pub(crate) func: RefinementFn,
	/// Pristine original of the slot; continuations end here.
	pub(crate) original: Option<Rc<Behavior>>,
}

type Stack = SmallVec<[ScopeEntry; 2]>;

/// Override stacks per instance and method.
#[derive(Default)]
pub(crate) struct ObjectScopes {
	stacks: HashMap<InstanceId, IndexMap<Box<str>, Stack>>,
}

impl ObjectScopes {
	/// Pushes `entry` onto the stack of `instance.method`. Returns false when
	/// the layer is already on that stack.
	pub(crate) fn push(&mut self, instance: InstanceId, method: &str, entry: ScopeEntry) -> bool {
		let methods = self.stacks.entry(instance).or_default();
		if !methods.contains_key(method) {
			methods.insert(method.into(), Stack::new());
		}
		let Some(stack) = methods.get_mut(method) else {
			return false;
		};
		if stack.iter().any(|e| e.layer == entry.layer) {
			return false;
		}
		stack.push(entry);
		true
	}

	/// Removes `layer` from every stack of `instance`, wherever it sits.
	/// Emptied stacks are dropped.
	pub(crate) fn remove(&mut self, instance: InstanceId, layer: LayerKey) -> usize {
		let Some(methods) = self.stacks.get_mut(&instance) else {
			return 0;
		};
		let removed = remove_layer(methods, layer);
		if methods.is_empty() {
			self.stacks.remove(&instance);
		}
		removed
	}

	/// Removes `layer` from every stack of every instance.
	pub(crate) fn purge_layer(&mut self, layer: LayerKey) -> usize {
		let mut removed = 0;
		self.stacks.retain(|_, methods| {
			removed += remove_layer(methods, layer);
			!methods.is_empty()
		});
		removed
	}

	pub(crate) fn is_active_for(&self, instance: InstanceId, layer: LayerKey) -> bool {
		self.stacks
			.get(&instance)
			.is_some_and(|methods| methods.values().any(|stack| stack.iter().any(|e| e.layer == layer)))
	}

	/// The entry that runs for `instance.method`, if overridden.
	pub(crate) fn top(&self, instance: InstanceId, method: &str) -> Option<&ScopeEntry> {
		self.stacks.get(&instance)?.get(method)?.last()
	}

	pub(crate) fn len(&self) -> usize {
		self.stacks.values().flat_map(|methods| methods.values()).map(SmallVec::len).sum()
	}
}

fn remove_layer(methods: &mut IndexMap<Box<str>, Stack>, layer: LayerKey) -> usize {
	let mut removed = 0;
	methods.retain(|_, stack| {
		let before = stack.len();
		stack.retain(|e| e.layer != layer);
		removed += before - stack.len();
		!stack.is_empty()
	});
	removed
}

impl Composer {
	/// Enables per-instance activation. Installing twice is a no-op.
	pub fn install_object_scope(&self) {
		let mut state = self.state_mut();
		if state.scope.is_none() {
			tracing::debug!(domain = "scope", "object_scope.install");
			state.scope = Some(ObjectScopes::default());
		}
	}

	/// Disables per-instance activation and drops every override.
	pub fn uninstall_object_scope(&self) {
		if let Some(scope) = self.state_mut().scope.take() {
			tracing::debug!(domain = "scope", dropped = scope.len(), "object_scope.uninstall");
		}
	}

	pub fn has_object_scope(&self) -> bool {
		self.state().scope.is_some()
	}

	/// Activates `spec` for each of `instances` only.
	///
	/// Every instance's target must have a refinement owned by the layer, and
	/// the layer must be deployed. Nothing is pushed unless all checks pass.
	pub fn activate_for<'i>(&self, spec: &LayerSpec, instances: impl Into<Instances<'i>>) -> Result<()> {
		let instances = instances.into();
		let mut state = self.state_mut();
		if state.scope.is_none() {
			return Err(ComposeError::ObjectScopeNotInstalled);
		}
		if instances.is_empty() {
			return Err(ComposeError::invalid("object scope activation needs at least one instance"));
		}

		let key = spec.key();
		for instance in instances.iter() {
			let target = instance.target();
			if !state.refinements.has_refinements_for(key, target.id()) {
				return Err(ComposeError::NoRefinementForType {
					layer: state.layer_name(spec),
					target: target.name().to_string(),
				});
			}
		}
		let Some(layer_name) = state.layers.get(&key).map(|layer| layer.name.clone()) else {
			return Err(ComposeError::NotDeployed {
				layer: state.layer_name(spec),
			});
		};

		let mut pushes = Vec::new();
		for instance in instances.iter() {
			let tid = instance.target().id();
			for entry in state.refinements.by_layer(key).filter(|e| e.target.id() == tid) {
				let Some(func) = entry.func() else {
					continue;
				};
				pushes.push((
					instance.id(),
					entry.method.clone(),
					ScopeEntry {
						layer: key,
						layer_name: layer_name.clone(),
						func: Rc::clone(func),
						original: state.originals.get(tid, &entry.method),
					},
				));
			}
		}

		let Some(scope) = state.scope.as_mut() else {
			return Err(ComposeError::ObjectScopeNotInstalled);
		};
		for (instance, method, entry) in pushes {
			if scope.push(instance, &method, entry) {
				tracing::debug!(domain = "scope", layer = &*layer_name, ?instance, method = &*method, "object_scope.push");
			}
		}
		Ok(())
	}

	/// Removes `spec` from the override stacks of each of `instances`.
	pub fn deactivate_for<'i>(&self, spec: &LayerSpec, instances: impl Into<Instances<'i>>) -> Result<()> {
		let instances = instances.into();
		let mut state = self.state_mut();
		let Some(scope) = state.scope.as_mut() else {
			return Err(ComposeError::ObjectScopeNotInstalled);
		};
		if instances.is_empty() {
			return Err(ComposeError::invalid("object scope deactivation needs at least one instance"));
		}

		for instance in instances.iter() {
			let removed = scope.remove(instance.id(), spec.key());
			tracing::debug!(domain = "scope", layer = ?spec.key(), instance = ?instance.id(), removed, "object_scope.remove");
		}
		Ok(())
	}

	/// True when `spec` is on any override stack of `instance`.
	pub fn is_active_for(&self, spec: &LayerSpec, instance: &Instance) -> Result<bool> {
		let state = self.state();
		let scope = state.scope.as_ref().ok_or(ComposeError::ObjectScopeNotInstalled)?;
		Ok(scope.is_active_for(instance.id(), spec.key()))
	}

	/// Name of the layer overriding `instance.method`, if any.
	pub fn instance_override(&self, instance: &Instance, method: &str) -> Result<Option<String>> {
		let state = self.state();
		let scope = state.scope.as_ref().ok_or(ComposeError::ObjectScopeNotInstalled)?;
		Ok(scope.top(instance.id(), method).map(|entry| entry.layer_name.to_string()))
	}
}
