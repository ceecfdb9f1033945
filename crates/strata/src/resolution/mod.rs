//! Conflict resolution orders and resolvers.
//!
//! A resolution entry orders the layers that may refine one slot. In chain
//! mode it decides which refinement is installed and what `proceed` walks;
//! with a resolver it replaces both with a synthesized behavior that sees
//! every active contender at once.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use smallvec::SmallVec;
use strata_signal::Value;

use crate::error::Result;
use crate::id::{LayerKey, TargetId};
use crate::layer::LayerSpec;
use crate::proceed::Proceed;
use crate::registry::InsertAction;
use crate::target::{Behavior, Instance, RefinementFn, ResolverFn};


/// Ordered layers for one slot, plus the optional resolver behavior.
pub(crate) struct Resolution {
	pub(crate) order: SmallVec<[LayerSpec; 4]>,
	/// Always [`Behavior::Resolved`]; kept as one handle so reinstalling it
	/// is reference-equal.
	pub(crate) resolver: Option<Rc<Behavior>>,
}

impl Resolution {
	pub(crate) fn position(&self, layer: LayerKey) -> Option<usize> {
		self.order.iter().position(|spec| spec.key() == layer)
	}
}

/// Resolution entries keyed by slot. Independent of layer activation.
#[derive(Default)]
pub(crate) struct ConflictResolutionTable {
	entries: HashMap<TargetId, HashMap<Box<str>, Resolution>>,
}

impl ConflictResolutionTable {
	pub(crate) fn set(
		&mut self,
		target: TargetId,
		method: &str,
		order: &[LayerSpec],
		resolver: Option<ResolverFn>,
	) -> InsertAction {
		let resolution = Resolution {
			order: order.iter().cloned().collect(),
			resolver: resolver.map(|f| Rc::new(Behavior::Resolved(f))),
		};
		let slots = self.entries.entry(target).or_default();
		match slots.insert(method.into(), resolution) {
			Some(_) => InsertAction::ReplacedExisting,
			None => InsertAction::InsertedNew,
		}
	}

	pub(crate) fn get(&self, target: TargetId, method: &str) -> Option<&Resolution> {
		self.entries.get(&target)?.get(method)
	}

	/// Removes every entry, returning how many there were.
	pub(crate) fn clear(&mut self) -> usize {
		let count = self.entries.values().map(HashMap::len).sum();
		self.entries.clear();
		count
	}
}

/// The active listed refinements of a slot, handed to a resolver.
///
/// Contenders appear in resolution order. Each one runs with a continuation
/// that leads straight to the original.
pub struct Contenders {
	instance: Instance,
	method: Rc<str>,
	entries: IndexMap<Box<str>, RefinementFn>,
	original: Option<Rc<Behavior>>,
}

impl Contenders {
	pub(crate) fn new(
		instance: Instance,
		method: Rc<str>,
		entries: IndexMap<Box<str>, RefinementFn>,
		original: Option<Rc<Behavior>>,
	) -> Self {
		Self {
			instance,
			method,
			entries,
			original,
		}
	}

	/// Layer names in resolution order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(|k| &**k)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, layer: &str) -> bool {
		self.entries.contains_key(layer)
	}

	/// Runs the named contender; `None` when it is not contending.
	pub fn call(&self, layer: &str, args: &[Value]) -> Option<Result<Value>> {
		let func = self.entries.get(layer)?;
		Some(func(&self.instance, args, &self.continuation()))
	}

	/// Runs every contender in order and collects the results.
	pub fn call_all(&self, args: &[Value]) -> Result<Vec<Value>> {
		let proceed = self.continuation();
		self.entries.values().map(|func| func(&self.instance, args, &proceed)).collect()
	}

	/// Runs the original method.
	pub fn original(&self, args: &[Value]) -> Result<Value> {
		self.continuation().original(args)
	}

	pub fn instance(&self) -> &Instance {
		&self.instance
	}

	fn continuation(&self) -> Proceed {
		Proceed::to_original(self.instance.clone(), Rc::clone(&self.method), self.original.clone())
	}
}

impl fmt::Debug for Contenders {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Contenders")
			.field("method", &self.method)
			.field("layers", &self.names().collect::<Vec<_>>())
			.finish()
	}
}
