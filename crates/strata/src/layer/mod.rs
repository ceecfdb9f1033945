//! Layer declarations and deployed layer state.
//!
//! # Purpose
//!
//! - [`LayerSpec`]: what the user declares.
//! - [`Layer`]: what the composer tracks per deployed spec: resolved name,
//!   the condition watch, lifecycle phase and activation recency.
//!
//! # Invariants
//!
//! - Transitions only move along `Inactive -> Entering -> Active -> Exiting ->
//!   Inactive`; requests arriving mid-transition are dropped.
//!   - Enforced in: `Composer::transition`
//!   - Tested by: `composer::tests::reentrant_transition_is_ignored`
//!   - Failure symptom: enter or exit hooks run twice for one change.
//! - A layer is `Active` iff every refinement it owns is reachable from its
//!   slot.
//!   - Enforced in: `Composer::transition`, `State::resolve_slot`
//!   - Tested by: `invariants::active_iff_reachable`

mod spec;

use std::cell::RefCell;
use std::rc::Rc;

use strata_signal::ConditionWatch;
use strum::Display;

pub use self::spec::{Hook, LayerSpec, LayerSpecBuilder};
use crate::id::LayerKey;


/// Lifecycle state of a deployed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LayerPhase {
	Inactive,
	/// Enter hook is running; slots are not yet refreshed.
	Entering,
	Active,
	/// Exit hook is running; slots still route to the layer.
	Exiting,
}

/// Snapshot of a deployed layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
	pub key: LayerKey,
	pub name: String,
	pub phase: LayerPhase,
}

impl LayerInfo {
	pub fn is_active(&self) -> bool {
		self.phase == LayerPhase::Active
	}
}

/// A deployed layer.
pub(crate) struct Layer {
	pub(crate) spec: LayerSpec,
	pub(crate) name: Box<str>,
	/// Shared so signal callbacks can evaluate without borrowing composer
	/// state.
	pub(crate) watch: Rc<RefCell<ConditionWatch>>,
	pub(crate) phase: LayerPhase,
	/// Activation sequence number; higher is more recent.
	pub(crate) activated_at: u64,
}

impl Layer {
	pub(crate) fn new(spec: &LayerSpec, name: Box<str>) -> Self {
		Self {
			spec: spec.clone(),
			name,
			watch: Rc::new(RefCell::new(ConditionWatch::new(spec.condition().clone()))),
			phase: LayerPhase::Inactive,
			activated_at: 0,
		}
	}

	pub(crate) fn is_active(&self) -> bool {
		self.phase == LayerPhase::Active
	}

	pub(crate) fn is_transitioning(&self) -> bool {
		matches!(self.phase, LayerPhase::Entering | LayerPhase::Exiting)
	}

	pub(crate) fn info(&self) -> LayerInfo {
		LayerInfo {
			key: self.spec.key(),
			name: self.name.to_string(),
			phase: self.phase,
		}
	}
}

/// Resolves the deployed name of `spec`: its declared name, or
/// `Layer_<n>` where `n` is `deployed + 1`.
pub(crate) fn deployed_name(spec: &LayerSpec, deployed: usize) -> Box<str> {
	match spec.name() {
		Some(name) => name.into(),
		None => format!("Layer_{}", deployed + 1).into(),
	}
}
