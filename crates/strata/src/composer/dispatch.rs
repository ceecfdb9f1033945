//! Method dispatch through installed slots.

use std::rc::Rc;

use indexmap::IndexMap;
use strata_signal::Value;

use super::{Composer, State};
use crate::config::DelegationMode;
use crate::error::{ComposeError, Result};
use crate::id::{LayerKey, TargetId};
use crate::proceed::{Link, Proceed};
use crate::resolution::Contenders;
use crate::target::{Behavior, Instance, MethodFn, RefinementFn, ResolverFn};

/// What a call will run, captured while the state is borrowed.
enum Plan {
	Native(MethodFn),
	Refined { func: RefinementFn, proceed: Proceed },
	Resolved { resolver: ResolverFn, contenders: Contenders },
}

impl Composer {
	/// Calls `method` on `instance`.
	///
	/// An object-scope override for the instance wins over the target's
	/// installed behavior. The continuation handed to a refinement is fixed
	/// here; layer changes made while it runs do not alter it.
	pub fn call(&self, instance: &Instance, method: &str, args: &[Value]) -> Result<Value> {
		let plan = self.plan(instance, method)?;
		match plan {
			Plan::Native(f) => f(instance, args),
			Plan::Refined { func, proceed } => func(instance, args, &proceed),
			Plan::Resolved { resolver, contenders } => resolver(&contenders, args),
		}
	}

	fn plan(&self, instance: &Instance, method: &str) -> Result<Plan> {
		let state = self.state();
		let target = instance.target();
		let method_name: Rc<str> = Rc::from(method);

		if let Some(entry) = state.scope.as_ref().and_then(|scope| scope.top(instance.id(), method)) {
			tracing::trace!(
				domain = "dispatch",
				target = target.name(),
				method,
				layer = &*entry.layer_name,
				"object scope override",
			);
			return Ok(Plan::Refined {
				func: Rc::clone(&entry.func),
				proceed: Proceed::to_original(instance.clone(), method_name, entry.original.clone()),
			});
		}

		let Some(behavior) = target.installed(method) else {
			return Err(ComposeError::UnknownMethod {
				target: target.name().to_string(),
				method: method.to_string(),
			});
		};

		let original = || state.originals.get(target.id(), method);
		Ok(match &*behavior {
			Behavior::Native(f) => Plan::Native(Rc::clone(f)),
			Behavior::Refinement { layer, func } => {
				let links = state.chain_after(target.id(), method, *layer);
				tracing::trace!(
					domain = "dispatch",
					target = target.name(),
					method,
					chain = links.len(),
					"dispatch refinement",
				);
				Plan::Refined {
					func: Rc::clone(func),
					proceed: Proceed::new(instance.clone(), method_name, links, original()),
				}
			}
			Behavior::Resolved(resolver) => Plan::Resolved {
				resolver: Rc::clone(resolver),
				contenders: Contenders::new(
					instance.clone(),
					method_name,
					state.contenders(target.id(), method),
					original(),
				),
			},
		})
	}
}

impl State {
	/// Active refinements of `target.method` that follow `layer` in the slot's
	/// resolution order. Empty outside chain mode or when `layer` is not
	/// listed.
	fn chain_after(&self, target: TargetId, method: &str, layer: LayerKey) -> Rc<[Link]> {
		if self.config.delegation_mode != DelegationMode::Chain {
			return Rc::from(Vec::new());
		}
		let Some(resolution) = self.resolutions.get(target, method) else {
			return Rc::from(Vec::new());
		};
		let Some(pos) = resolution.position(layer) else {
			return Rc::from(Vec::new());
		};

		resolution.order[pos + 1..]
			.iter()
			.filter_map(|spec| self.active_refinement(target, method, spec.key()))
			.map(|(layer, func)| Link { layer, func })
			.collect()
	}

	/// Active listed refinements of `target.method`, in resolution order.
	fn contenders(&self, target: TargetId, method: &str) -> IndexMap<Box<str>, RefinementFn> {
		let Some(resolution) = self.resolutions.get(target, method) else {
			return IndexMap::new();
		};
		resolution
			.order
			.iter()
			.filter_map(|spec| self.active_refinement(target, method, spec.key()))
			.collect()
	}

	fn active_refinement(&self, target: TargetId, method: &str, key: LayerKey) -> Option<(Box<str>, RefinementFn)> {
		let layer = self.layers.get(&key).filter(|l| l.is_active())?;
		let entry = self.refinements.get(target, method, key)?;
		Some((layer.name.clone(), Rc::clone(entry.func()?)))
	}
}
