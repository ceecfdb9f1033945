//! Explicit continuations handed to refinements.

use std::fmt;
use std::rc::Rc;

use strata_signal::Value;

use crate::error::{ComposeError, Result};
use crate::target::{Behavior, Instance, RefinementFn};

/// One refinement in a delegation chain.
#[derive(Clone)]
pub(crate) struct Link {
	pub(crate) layer: Box<str>,
	pub(crate) func: RefinementFn,
}

/// The rest of a delegation chain, captured when a refinement is dispatched.
///
/// [`Proceed::call`] runs the next link with its own continuation, or the
/// original method once the links are exhausted. A continuation stays valid
/// only for the synchronous execution of the refinement it was handed to;
/// layer changes made meanwhile are not observed by it.
#[derive(Clone)]
pub struct Proceed {
	instance: Instance,
	method: Rc<str>,
	links: Rc<[Link]>,
	pos: usize,
	original: Option<Rc<Behavior>>,
}

impl Proceed {
	pub(crate) fn new(instance: Instance, method: Rc<str>, links: Rc<[Link]>, original: Option<Rc<Behavior>>) -> Self {
		Self {
			instance,
			method,
			links,
			pos: 0,
			original,
		}
	}

	/// Continuation that leads straight to the original.
	pub(crate) fn to_original(instance: Instance, method: Rc<str>, original: Option<Rc<Behavior>>) -> Self {
		Self::new(instance, method, Rc::from(Vec::new()), original)
	}

	/// Invokes the next refinement in the chain, or the original.
	pub fn call(&self, args: &[Value]) -> Result<Value> {
		let Some(link) = self.links.get(self.pos) else {
			return self.original(args);
		};

		tracing::trace!(
			domain = "dispatch",
			target = self.instance.target().name(),
			method = &*self.method,
			layer = &*link.layer,
			"proceed to next layer",
		);
		let next = Self {
			pos: self.pos + 1,
			..self.clone()
		};
		(link.func)(&self.instance, args, &next)
	}

	/// Invokes the original method, skipping any remaining links.
	pub fn original(&self, args: &[Value]) -> Result<Value> {
		match self.original.as_deref() {
			Some(Behavior::Native(f)) => f(&self.instance, args),
			_ => Err(ComposeError::MissingOriginal {
				target: self.instance.target().name().to_string(),
				method: self.method.to_string(),
			}),
		}
	}

	/// Name of the layer [`Proceed::call`] would run, if any.
	pub fn next_layer(&self) -> Option<&str> {
		self.links.get(self.pos).map(|link| &*link.layer)
	}

	/// Names of the layers still ahead in the chain.
	pub fn remaining(&self) -> Vec<&str> {
		self.links[self.pos.min(self.links.len())..]
			.iter()
			.map(|link| &*link.layer)
			.collect()
	}

	pub fn has_original(&self) -> bool {
		matches!(self.original.as_deref(), Some(Behavior::Native(_)))
	}

	pub fn instance(&self) -> &Instance {
		&self.instance
	}

	pub fn method(&self) -> &str {
		&self.method
	}
}

impl fmt::Debug for Proceed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Proceed")
			.field("method", &self.method)
			.field("remaining", &self.remaining())
			.field("has_original", &self.has_original())
			.finish()
	}
}
