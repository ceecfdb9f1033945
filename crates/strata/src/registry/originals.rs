use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;

use crate::id::TargetId;
use crate::target::{Behavior, Target};

/// Write-once record of pre-refinement behavior.
///
/// `None` marks a slot that had no native behavior when it was first
/// refined; continuations that reach it fail with `MissingOriginal`.
#[derive(Default)]
pub(crate) struct OriginalRegistry {
	entries: HashMap<TargetId, HashMap<Box<str>, Option<Rc<Behavior>>>>,
}

impl OriginalRegistry {
	/// Records the slot's current native behavior unless an original is
	/// already recorded. Returns true when this call recorded it.
	pub(crate) fn capture(&mut self, target: &Target, method: &str) -> bool {
		let slots = self.entries.entry(target.id()).or_default();
		if slots.contains_key(method) {
			return false;
		}

		let original = target.installed(method).filter(|b| b.is_native());
		tracing::trace!(
			domain = "registry",
			target = target.name(),
			method,
			present = original.is_some(),
			"captured original",
		);
		slots.insert(method.into(), original);
		true
	}

	/// The recorded original, or `None` when the slot was never refined or
	/// had no original.
	pub(crate) fn get(&self, target: TargetId, method: &str) -> Option<Rc<Behavior>> {
		self.entries.get(&target)?.get(method)?.clone()
	}

	pub(crate) fn is_recorded(&self, target: TargetId, method: &str) -> bool {
		self.entries.get(&target).is_some_and(|slots| slots.contains_key(method))
	}
}
