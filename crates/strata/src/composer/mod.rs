//! The composition root.
//!
//! # Purpose
//!
//! A [`Composer`] owns everything that decides what a refined slot runs:
//! deployed layers, exhibited signals, the original and refinement
//! registries, conflict resolutions, delegation mode and the optional
//! object-scope side table. Discarding a composer discards all of it.
//!
//! # Mental Model
//!
//! - Layers change state through [`Composer::transition`]; every transition
//!   ends by recomputing the slots the layer refines.
//! - A slot's installed behavior is a pure function of registry contents,
//!   active layers, activation recency, resolutions and delegation mode. It is
//!   recomputed, never patched incrementally.
//! - Dispatch reads the installed behavior and builds the continuation from
//!   the same state, then releases every borrow before running user code.
//!
//! # Invariants
//!
//! - No `State` borrow is held while user code runs (methods, refinements,
//!   resolvers, hooks, predicates, signal subscribers).
//!   - Enforced in: `Composer::transition`, `Composer::call`
//!   - Tested by: `composer::tests::hooks_may_reenter_composer`
//!   - Failure symptom: `BorrowMutError` panic from a hook or refinement.
//! - A deactivated slot is reference-equal to its original.
//!   - Enforced in: `State::resolve_slot`
//!   - Tested by: `difficulty::hard_mode_round_trip`
//!   - Failure symptom: `is_original` stays false after every layer exits.

mod dispatch;
mod lifecycle;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use indexmap::IndexMap;
use strata_signal::{Signal, Value};

use crate::config::{ComposerConfig, DelegationMode};
use crate::error::{ComposeError, Result};
use crate::id::LayerKey;
use crate::layer::{Layer, LayerInfo, LayerSpec};
use crate::registry::{OriginalRegistry, RefinementRegistry};
use crate::resolution::{ConflictResolutionTable, Contenders};
use crate::scope::ObjectScopes;
use crate::target::{Behavior, ResolverFn, Target};


/// Signals exhibited under one namespace.
struct Exhibit {
	namespace: Box<str>,
	signals: IndexMap<Box<str>, Signal>,
}

#[derive(Default)]
pub(crate) struct State {
	pub(crate) config: ComposerConfig,
	pub(crate) layers: IndexMap<LayerKey, Layer>,
	exhibits: Vec<Exhibit>,
	pub(crate) originals: OriginalRegistry,
	pub(crate) refinements: RefinementRegistry,
	pub(crate) resolutions: ConflictResolutionTable,
	pub(crate) scope: Option<ObjectScopes>,
	/// Monotonic activation counter.
	clock: u64,
}

impl State {
	fn is_layer_active(&self, key: LayerKey) -> bool {
		self.layers.get(&key).is_some_and(Layer::is_active)
	}

	/// Name used in errors and logs for `spec`, deployed or not.
	pub(crate) fn layer_name(&self, spec: &LayerSpec) -> String {
		match self.layers.get(&spec.key()) {
			Some(layer) => layer.name.to_string(),
			None => spec.name().unwrap_or("<anonymous>").to_string(),
		}
	}

	/// Computes what `target.method` should execute right now.
	///
	/// `None` means the slot must be empty: nothing refines it actively and
	/// it had no original.
	fn resolve_slot(&self, target: &Target, method: &str) -> Option<Rc<Behavior>> {
		let tid = target.id();
		let original = self.originals.get(tid, method);

		if self.config.delegation_mode == DelegationMode::Chain
			&& let Some(resolution) = self.resolutions.get(tid, method)
		{
			let first = resolution.order.iter().find_map(|spec| {
				if !self.is_layer_active(spec.key()) {
					return None;
				}
				self.refinements.get(tid, method, spec.key())
			});
			return match (first, &resolution.resolver) {
				(Some(_), Some(resolver)) => Some(Rc::clone(resolver)),
				(Some(entry), None) => Some(Rc::clone(&entry.behavior)),
				(None, _) => original,
			};
		}

		self.refinements
			.for_slot(tid, method)
			.filter_map(|entry| {
				let layer = self.layers.get(&entry.layer).filter(|l| l.is_active())?;
				Some((layer.activated_at, entry))
			})
			.max_by_key(|(at, _)| *at)
			.map(|(_, entry)| Rc::clone(&entry.behavior))
			.or(original)
	}

	fn refresh_slot(&self, target: &Target, method: &str) {
		let behavior = self.resolve_slot(target, method);
		tracing::trace!(
			domain = "dispatch",
			target = target.name(),
			method,
			installed = ?behavior,
			"slot refreshed",
		);
		match behavior {
			Some(behavior) => target.install(method, behavior),
			None => {
				target.uninstall(method);
			}
		}
	}

	fn refresh_all(&self) {
		for (target, method) in self.refinements.all_slots() {
			self.refresh_slot(&target, &method);
		}
	}

	fn next_activation(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}
}

struct Inner {
	state: RefCell<State>,
}

/// Handle to a composition context. Clones share the same context.
#[derive(Clone)]
pub struct Composer {
	inner: Rc<Inner>,
}

impl Default for Composer {
	fn default() -> Self {
		Self::new()
	}
}

impl Composer {
	pub fn new() -> Self {
		Self::with_config(ComposerConfig::default())
	}

	pub fn with_config(config: ComposerConfig) -> Self {
		Self {
			inner: Rc::new(Inner {
				state: RefCell::new(State {
					config,
					..State::default()
				}),
			}),
		}
	}

	pub(crate) fn state(&self) -> Ref<'_, State> {
		self.inner.state.borrow()
	}

	pub(crate) fn state_mut(&self) -> RefMut<'_, State> {
		self.inner.state.borrow_mut()
	}

	/// Replaces the configuration and re-routes every refined slot.
	pub fn configure(&self, config: ComposerConfig) {
		let mut state = self.state_mut();
		tracing::debug!(domain = "config", mode = %config.delegation_mode, "composer.configure");
		state.config = config;
		state.refresh_all();
	}

	/// Parses TOML configuration and applies it.
	pub fn configure_toml(&self, text: &str) -> Result<()> {
		self.configure(ComposerConfig::from_toml(text)?);
		Ok(())
	}

	pub fn config(&self) -> ComposerConfig {
		self.state().config.clone()
	}

	/// Makes `signals` visible to every deployed and future layer.
	///
	/// Each signal is renamed after the field it is exhibited under. Deployed
	/// layers attach the signals their condition reads and re-evaluate at
	/// once, so a condition that already holds activates its layer here.
	/// Layers that bind none of `signals` are left alone.
	pub fn exhibit<N, I>(&self, namespace: &str, signals: I)
	where
		N: Into<Box<str>>,
		I: IntoIterator<Item = (N, Signal)>,
	{
		let signals: IndexMap<Box<str>, Signal> = signals
			.into_iter()
			.map(|(name, signal)| {
				let name: Box<str> = name.into();
				signal.rename(name.clone());
				(name, signal)
			})
			.collect();

		let keys: Vec<LayerKey> = {
			let mut state = self.state_mut();
			tracing::debug!(
				domain = "signals",
				namespace,
				signals = ?signals.keys().collect::<Vec<_>>(),
				"composer.exhibit",
			);
			match state.exhibits.iter_mut().find(|e| &*e.namespace == namespace) {
				Some(exhibit) => exhibit.signals.extend(signals.iter().map(|(n, s)| (n.clone(), s.clone()))),
				None => state.exhibits.push(Exhibit {
					namespace: namespace.into(),
					signals: signals.clone(),
				}),
			}
			state.layers.keys().copied().collect()
		};

		let signals: Vec<(Box<str>, Signal)> = signals.into_iter().collect();
		for key in keys {
			if self.attach(key, &signals) {
				self.settle(key);
			}
		}
	}

	/// The most recently exhibited signal named `name`.
	pub fn signal(&self, name: &str) -> Option<Signal> {
		self.state()
			.exhibits
			.iter()
			.rev()
			.find_map(|e| e.signals.get(name).cloned())
	}

	/// Every exhibited signal, later exhibits shadowing earlier ones.
	fn exhibited(&self) -> Vec<(Box<str>, Signal)> {
		let state = self.state();
		let mut all: IndexMap<Box<str>, Signal> = IndexMap::new();
		for exhibit in &state.exhibits {
			for (name, signal) in &exhibit.signals {
				all.insert(name.clone(), signal.clone());
			}
		}
		all.into_iter().collect()
	}

	/// Sets the resolution order of `target.method`.
	pub fn set_resolution_order(&self, target: &Target, method: &str, layers: &[LayerSpec]) -> Result<()> {
		self.store_resolution(target, method, layers, None)
	}

	/// Sets the resolution order of `target.method` and a resolver that
	/// replaces chained delegation for it.
	pub fn set_resolver(
		&self,
		target: &Target,
		method: &str,
		layers: &[LayerSpec],
		resolver: impl Fn(&Contenders, &[Value]) -> Result<Value> + 'static,
	) -> Result<()> {
		self.store_resolution(target, method, layers, Some(Rc::new(resolver)))
	}

	fn store_resolution(
		&self,
		target: &Target,
		method: &str,
		layers: &[LayerSpec],
		resolver: Option<ResolverFn>,
	) -> Result<()> {
		if method.is_empty() {
			return Err(ComposeError::invalid("method name must not be empty"));
		}
		let mut state = self.state_mut();
		let action = state.resolutions.set(target.id(), method, layers, resolver);
		tracing::debug!(
			domain = "resolution",
			target = target.name(),
			method,
			order = ?layers.iter().map(|spec| state.layer_name(spec)).collect::<Vec<_>>(),
			?action,
			"composer.set_resolution",
		);
		state.refresh_slot(target, method);
		Ok(())
	}

	/// Registered resolution order of `target.method`.
	pub fn resolution_order(&self, target: &Target, method: &str) -> Option<Vec<LayerSpec>> {
		let state = self.state();
		let resolution = state.resolutions.get(target.id(), method)?;
		Some(resolution.order.to_vec())
	}

	/// Drops every resolution entry and re-routes every refined slot.
	pub fn clear_resolutions(&self) {
		let mut state = self.state_mut();
		let cleared = state.resolutions.clear();
		tracing::debug!(domain = "resolution", cleared, "composer.clear_resolutions");
		state.refresh_all();
	}

	/// Behavior installed in `target.method`.
	pub fn installed(&self, target: &Target, method: &str) -> Option<Rc<Behavior>> {
		target.installed(method)
	}

	/// Recorded original of `target.method`; `None` before the slot is first
	/// refined or when it had no original.
	pub fn original(&self, target: &Target, method: &str) -> Option<Rc<Behavior>> {
		self.state().originals.get(target.id(), method)
	}

	/// True when `target.method` runs its original behavior.
	pub fn is_original(&self, target: &Target, method: &str) -> bool {
		let state = self.state();
		let installed = target.installed(method);
		if !state.originals.is_recorded(target.id(), method) {
			return installed.is_some_and(|b| b.is_native());
		}
		match (installed, state.originals.get(target.id(), method)) {
			(Some(installed), Some(original)) => Rc::ptr_eq(&installed, &original),
			(None, None) => true,
			_ => false,
		}
	}

	/// Name of the layer whose refinement is installed in `target.method`.
	pub fn installed_layer(&self, target: &Target, method: &str) -> Option<String> {
		let key = target.installed(method)?.layer()?;
		self.state().layers.get(&key).map(|layer| layer.name.to_string())
	}

	pub fn is_deployed(&self, spec: &LayerSpec) -> bool {
		self.state().layers.contains_key(&spec.key())
	}

	pub fn is_active(&self, spec: &LayerSpec) -> bool {
		self.state().is_layer_active(spec.key())
	}

	/// Snapshot of one deployed layer.
	pub fn layer(&self, spec: &LayerSpec) -> Option<LayerInfo> {
		self.state().layers.get(&spec.key()).map(Layer::info)
	}

	/// Snapshots of deployed layers matching `filter`, in deployment order.
	pub fn layers(&self, filter: impl Fn(&LayerInfo) -> bool) -> Vec<LayerInfo> {
		let infos: Vec<LayerInfo> = self.state().layers.values().map(Layer::info).collect();
		infos.into_iter().filter(|info| filter(info)).collect()
	}

	/// Snapshots of every deployed layer.
	pub fn layer_states(&self) -> Vec<LayerInfo> {
		self.layers(|_| true)
	}

	pub fn active_layers(&self) -> Vec<LayerInfo> {
		self.layers(LayerInfo::is_active)
	}

	pub fn inactive_layers(&self) -> Vec<LayerInfo> {
		self.layers(|info| !info.is_active())
	}
}

impl std::fmt::Debug for Composer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state();
		f.debug_struct("Composer")
			.field("config", &state.config)
			.field("layers", &state.layers.values().map(|l| &*l.name).collect::<Vec<_>>())
			.field("refinements", &state.refinements.len())
			.field("object_scope", &state.scope.is_some())
			.finish()
	}
}
