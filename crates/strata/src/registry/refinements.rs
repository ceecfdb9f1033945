use std::rc::Rc;

use super::InsertAction;
use crate::id::{LayerKey, TargetId};
use crate::target::{Behavior, RefinementFn, Target};

/// A layer's refinement of one slot.
pub(crate) struct RefinementEntry {
	pub(crate) target: Target,
	pub(crate) method: Box<str>,
	pub(crate) layer: LayerKey,
	/// Installed as-is, so reinstalling the same entry is reference-equal.
	pub(crate) behavior: Rc<Behavior>,
}

impl RefinementEntry {
	pub(crate) fn func(&self) -> Option<&RefinementFn> {
		match &*self.behavior {
			Behavior::Refinement { func, .. } => Some(func),
			_ => None,
		}
	}

	fn is_slot(&self, target: TargetId, method: &str) -> bool {
		self.target.id() == target && &*self.method == method
	}
}

/// All registered refinements, in registration order.
#[derive(Default)]
pub(crate) struct RefinementRegistry {
	entries: Vec<RefinementEntry>,
}

impl RefinementRegistry {
	pub(crate) fn insert(&mut self, target: &Target, method: &str, layer: LayerKey, func: RefinementFn) -> InsertAction {
		let behavior = Rc::new(Behavior::Refinement { layer, func });
		if let Some(existing) = self
			.entries
			.iter_mut()
			.find(|e| e.layer == layer && e.is_slot(target.id(), method))
		{
			existing.behavior = behavior;
			return InsertAction::ReplacedExisting;
		}

		self.entries.push(RefinementEntry {
			target: target.clone(),
			method: method.into(),
			layer,
			behavior,
		});
		InsertAction::InsertedNew
	}

	pub(crate) fn get(&self, target: TargetId, method: &str, layer: LayerKey) -> Option<&RefinementEntry> {
		self.entries.iter().find(|e| e.layer == layer && e.is_slot(target, method))
	}

	/// Entries refining one slot, in registration order.
	pub(crate) fn for_slot<'a>(&'a self, target: TargetId, method: &'a str) -> impl Iterator<Item = &'a RefinementEntry> {
		self.entries.iter().filter(move |e| e.is_slot(target, method))
	}

	pub(crate) fn by_layer(&self, layer: LayerKey) -> impl Iterator<Item = &RefinementEntry> {
		self.entries.iter().filter(move |e| e.layer == layer)
	}

	pub(crate) fn has_refinements_for(&self, layer: LayerKey, target: TargetId) -> bool {
		self.by_layer(layer).any(|e| e.target.id() == target)
	}

	/// Slots refined by `layer`.
	pub(crate) fn slots_of(&self, layer: LayerKey) -> Vec<(Target, Box<str>)> {
		self.by_layer(layer).map(|e| (e.target.clone(), e.method.clone())).collect()
	}

	/// Every refined slot, deduplicated, in first-registration order.
	pub(crate) fn all_slots(&self) -> Vec<(Target, Box<str>)> {
		let mut slots: Vec<(Target, Box<str>)> = Vec::new();
		for entry in &self.entries {
			if !slots.iter().any(|(t, m)| t.id() == entry.target.id() && *m == entry.method) {
				slots.push((entry.target.clone(), entry.method.clone()));
			}
		}
		slots
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}
}
