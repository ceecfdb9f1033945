//! Deployment, refinement registration and layer transitions.

use std::rc::Rc;

use strata_signal::{Signal, Value};

use super::Composer;
use crate::error::{ComposeError, Result};
use crate::id::LayerKey;
use crate::layer::{Layer, LayerInfo, LayerPhase, LayerSpec, deployed_name};
use crate::proceed::Proceed;
use crate::target::{Instance, RefinementFn, Targets};

impl Composer {
	/// Deploys `spec`, attaching every exhibited signal its condition reads.
	///
	/// A condition that already holds activates the layer before this
	/// returns.
	pub fn deploy(&self, spec: &LayerSpec) -> Result<LayerInfo> {
		let key = spec.key();
		{
			let mut state = self.state_mut();
			let name = deployed_name(spec, state.layers.len());
			if state.layers.contains_key(&key) || state.layers.values().any(|l| l.name == name) {
				return Err(ComposeError::AlreadyDeployed { layer: name.into() });
			}
			tracing::debug!(domain = "layers", layer = &*name, condition = %spec.condition(), "layer.deploy");
			state.layers.insert(key, Layer::new(spec, name));
		}

		self.attach(key, &self.exhibited());
		self.settle(key);
		self.layer(spec).ok_or_else(|| ComposeError::NotDeployed {
			layer: spec.name().unwrap_or("<anonymous>").to_string(),
		})
	}

	/// Deactivates `spec` (running its exit hook), then removes it.
	///
	/// Refinements stay registered against the spec, so deploying it again
	/// restores them. Object-scope entries of the layer are dropped.
	pub fn undeploy(&self, spec: &LayerSpec) -> Result<()> {
		let key = spec.key();
		self.require_deployed(spec)?;
		self.transition(key, false);

		let layer = {
			let mut state = self.state_mut();
			let Some(layer) = state.layers.shift_remove(&key) else {
				return Ok(());
			};
			let purged = state.scope.as_mut().map_or(0, |scope| scope.purge_layer(key));
			tracing::debug!(domain = "layers", layer = &*layer.name, purged, "layer.undeploy");
			for (target, method) in state.refinements.slots_of(key) {
				state.refresh_slot(&target, &method);
			}
			layer
		};
		layer.watch.borrow_mut().reset();
		Ok(())
	}

	/// Activates `spec` regardless of its condition.
	pub fn activate(&self, spec: &LayerSpec) -> Result<()> {
		self.require_deployed(spec)?;
		self.transition(spec.key(), true);
		Ok(())
	}

	/// Deactivates `spec` regardless of its condition and detaches its
	/// condition from every signal. The condition is re-attached by the next
	/// [`Composer::exhibit`]. A request made while the layer is entering is
	/// ignored and leaves the condition attached.
	pub fn deactivate(&self, spec: &LayerSpec) -> Result<()> {
		self.require_deployed(spec)?;
		self.transition(spec.key(), false);

		// A request dropped mid-transition leaves the layer heading active; its
		// condition must stay attached so a later signal change can exit it.
		let watch = self
			.state()
			.layers
			.get(&spec.key())
			.filter(|layer| layer.phase == LayerPhase::Inactive)
			.map(|layer| Rc::clone(&layer.watch));
		if let Some(watch) = watch {
			watch.borrow_mut().reset();
		}
		Ok(())
	}

	/// Registers `f` as `spec`'s refinement of `method` on every target.
	///
	/// The first refinement of a slot records its original. Registering
	/// again for the same layer and slot replaces the function. An active
	/// layer's new refinement is installed immediately.
	pub fn add_refinement<'t>(
		&self,
		spec: &LayerSpec,
		targets: impl Into<Targets<'t>>,
		method: &str,
		f: impl Fn(&Instance, &[Value], &Proceed) -> Result<Value> + 'static,
	) -> Result<()> {
		let targets = targets.into();
		if targets.is_empty() {
			return Err(ComposeError::invalid("refinement needs at least one target"));
		}
		if method.is_empty() {
			return Err(ComposeError::invalid("method name must not be empty"));
		}

		let func: RefinementFn = Rc::new(f);
		let mut state = self.state_mut();
		let active = state.is_layer_active(spec.key());
		for target in targets.iter() {
			state.originals.capture(target, method);
			let action = state.refinements.insert(target, method, spec.key(), Rc::clone(&func));
			tracing::debug!(
				domain = "registry",
				layer = %state.layer_name(spec),
				target = target.name(),
				method,
				?action,
				"refinement.add",
			);
			if active {
				state.refresh_slot(target, method);
			}
		}
		Ok(())
	}

	fn require_deployed(&self, spec: &LayerSpec) -> Result<()> {
		if self.is_deployed(spec) {
			return Ok(());
		}
		Err(ComposeError::NotDeployed {
			layer: spec.name().unwrap_or("<anonymous>").to_string(),
		})
	}

	/// Binds the signals `key`'s condition reads. A condition containing a
	/// predicate may read anything, so it binds every signal offered.
	///
	/// Returns true when any binding was added or replaced.
	pub(super) fn attach(&self, key: LayerKey, signals: &[(Box<str>, Signal)]) -> bool {
		let Some(watch) = self.state().layers.get(&key).map(|layer| Rc::clone(&layer.watch)) else {
			return false;
		};

		let mut watch = watch.borrow_mut();
		let everything = watch.condition().contains_predicate();
		let wanted: Vec<String> = watch
			.condition()
			.referenced_signals()
			.into_iter()
			.map(str::to_string)
			.collect();

		let mut bound = false;
		for (name, signal) in signals {
			if !everything && !wanted.iter().any(|w| **w == **name) {
				continue;
			}
			let composer = Rc::downgrade(&self.inner);
			bound |= watch.watch(name, signal, move |_| {
				if let Some(inner) = composer.upgrade() {
					Composer { inner }.settle(key);
				}
			});
		}
		bound
	}

	/// Re-evaluates `key`'s condition and transitions if the result differs
	/// from the state the layer is in or heading to. Unarmed conditions never
	/// transition.
	pub(super) fn settle(&self, key: LayerKey) {
		let Some((watch, active)) = self.state().layers.get(&key).map(|layer| {
			let heading_active = matches!(layer.phase, LayerPhase::Active | LayerPhase::Entering);
			(Rc::clone(&layer.watch), heading_active)
		}) else {
			return;
		};

		let holds = {
			let watch = watch.borrow();
			if !watch.is_armed() {
				return;
			}
			watch.evaluate()
		};
		if holds != active {
			self.transition(key, holds);
		}
	}

	/// Moves `key` to the requested state.
	///
	/// Runs the enter or exit hook with no borrow held, then records the new
	/// phase and recomputes the layer's slots. Returns false when nothing
	/// happened: the layer is gone, already in that state, or mid-transition.
	pub(crate) fn transition(&self, key: LayerKey, to_active: bool) -> bool {
		let hook = {
			let mut state = self.state_mut();
			let Some(layer) = state.layers.get_mut(&key) else {
				return false;
			};
			if layer.is_transitioning() {
				tracing::warn!(
					domain = "layers",
					layer = &*layer.name,
					phase = %layer.phase,
					requested = if to_active { "activate" } else { "deactivate" },
					"ignoring transition request during transition",
				);
				return false;
			}
			if layer.is_active() == to_active {
				return false;
			}

			layer.phase = if to_active { LayerPhase::Entering } else { LayerPhase::Exiting };
			if to_active {
				layer.spec.enter_hook()
			} else {
				layer.spec.exit_hook()
			}
		};

		if let Some(hook) = hook {
			hook();
		}

		let mut state = self.state_mut();
		let at = state.next_activation();
		let Some(layer) = state.layers.get_mut(&key) else {
			return true;
		};
		layer.phase = if to_active { LayerPhase::Active } else { LayerPhase::Inactive };
		if to_active {
			layer.activated_at = at;
		}
		tracing::debug!(
			domain = "layers",
			layer = &*layer.name,
			active = to_active,
			"layer.transition",
		);
		for (target, method) in state.refinements.slots_of(key) {
			state.refresh_slot(&target, &method);
		}
		true
	}
}
