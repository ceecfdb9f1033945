use std::fmt;
use std::rc::Rc;

use strata_signal::Condition;

use crate::id::LayerKey;

/// Side effect run when a layer enters or exits.
pub type Hook = Rc<dyn Fn()>;

struct SpecInner {
	key: LayerKey,
	name: Option<Box<str>>,
	condition: Condition,
	enter: Option<Hook>,
	exit: Option<Hook>,
}

/// A layer declaration: name, activation condition, enter/exit hooks.
///
/// Specs are cheap handles. Refinements and resolution orders are keyed by
/// the spec's identity, not by its name.
#[derive(Clone)]
pub struct LayerSpec {
	inner: Rc<SpecInner>,
}

impl LayerSpec {
	/// Named layer with a condition and no hooks.
	pub fn new(name: impl Into<Box<str>>, condition: Condition) -> Self {
		Self::builder(name).condition(condition).build()
	}

	pub fn builder(name: impl Into<Box<str>>) -> LayerSpecBuilder {
		LayerSpecBuilder {
			name: Some(name.into()),
			..LayerSpecBuilder::default()
		}
	}

	/// Unnamed layer; deploying it assigns `Layer_<n>`.
	pub fn anonymous() -> LayerSpecBuilder {
		LayerSpecBuilder::default()
	}

	pub fn key(&self) -> LayerKey {
		self.inner.key
	}

	/// Declared name, if any.
	pub fn name(&self) -> Option<&str> {
		self.inner.name.as_deref()
	}

	pub fn condition(&self) -> &Condition {
		&self.inner.condition
	}

	pub(crate) fn enter_hook(&self) -> Option<Hook> {
		self.inner.enter.clone()
	}

	pub(crate) fn exit_hook(&self) -> Option<Hook> {
		self.inner.exit.clone()
	}

	pub fn ptr_eq(&self, other: &LayerSpec) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl fmt::Debug for LayerSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LayerSpec")
			.field("key", &self.inner.key)
			.field("name", &self.inner.name)
			.field("condition", &self.inner.condition)
			.finish_non_exhaustive()
	}
}

#[derive(Default)]
pub struct LayerSpecBuilder {
	name: Option<Box<str>>,
	condition: Condition,
	enter: Option<Hook>,
	exit: Option<Hook>,
}

impl LayerSpecBuilder {
	pub fn condition(mut self, condition: Condition) -> Self {
		self.condition = condition;
		self
	}

	pub fn on_enter(mut self, f: impl Fn() + 'static) -> Self {
		self.enter = Some(Rc::new(f));
		self
	}

	pub fn on_exit(mut self, f: impl Fn() + 'static) -> Self {
		self.exit = Some(Rc::new(f));
		self
	}

	pub fn build(self) -> LayerSpec {
		LayerSpec {
			inner: Rc::new(SpecInner {
				key: LayerKey::next(),
				name: self.name,
				condition: self.condition,
				enter: self.enter,
				exit: self.exit,
			}),
		}
	}
}
