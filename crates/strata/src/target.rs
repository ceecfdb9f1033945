//! Method tables and the objects dispatched through them.
//!
//! A [`Target`] owns one slot per method name. Each slot holds an
//! `Rc<Behavior>`: the native implementation, a layer's refinement, or a
//! resolver synthesized from a conflict resolution. The composer rewrites
//! slots when layers change state; nothing else patches them once they are
//! refined.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;
use strata_signal::Value;

use crate::error::Result;
use crate::id::{InstanceId, LayerKey, TargetId};
use crate::proceed::Proceed;
use crate::resolution::Contenders;

/// Native method implementation.
pub type MethodFn = Rc<dyn Fn(&Instance, &[Value]) -> Result<Value>>;

/// Layer refinement; `proceed` continues down the chain.
pub type RefinementFn = Rc<dyn Fn(&Instance, &[Value], &Proceed) -> Result<Value>>;

/// Conflict resolver; synthesizes a result from the active contenders.
pub type ResolverFn = Rc<dyn Fn(&Contenders, &[Value]) -> Result<Value>>;

/// What a method slot executes.
pub enum Behavior {
	Native(MethodFn),
	Refinement { layer: LayerKey, func: RefinementFn },
	Resolved(ResolverFn),
}

impl Behavior {
	pub fn native(f: impl Fn(&Instance, &[Value]) -> Result<Value> + 'static) -> Self {
		Behavior::Native(Rc::new(f))
	}

	/// Owning layer of a refinement behavior.
	pub fn layer(&self) -> Option<LayerKey> {
		match self {
			Behavior::Refinement { layer, .. } => Some(*layer),
			_ => None,
		}
	}

	pub fn is_native(&self) -> bool {
		matches!(self, Behavior::Native(_))
	}
}

impl fmt::Debug for Behavior {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Behavior::Native(_) => write!(f, "Native"),
			Behavior::Refinement { layer, .. } => write!(f, "Refinement({layer:?})"),
			Behavior::Resolved(_) => write!(f, "Resolved"),
		}
	}
}

struct TargetInner {
	id: TargetId,
	name: Box<str>,
	slots: RefCell<HashMap<Box<str>, Rc<Behavior>>>,
}

/// A type-level method table. Clones share the same table.
#[derive(Clone)]
pub struct Target {
	inner: Rc<TargetInner>,
}

impl Target {
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self {
			inner: Rc::new(TargetInner {
				id: TargetId::next(),
				name: name.into(),
				slots: RefCell::new(HashMap::default()),
			}),
		}
	}

	/// Builder form of [`Target::define`].
	pub fn with_method(self, method: &str, f: impl Fn(&Instance, &[Value]) -> Result<Value> + 'static) -> Self {
		self.define(method, f);
		self
	}

	/// Installs a native method, replacing whatever the slot held.
	///
	/// Define methods before refining them: the original recorded at the
	/// first refinement is never overwritten.
	pub fn define(&self, method: &str, f: impl Fn(&Instance, &[Value]) -> Result<Value> + 'static) {
		self.install(method, Rc::new(Behavior::native(f)));
	}

	pub fn id(&self) -> TargetId {
		self.inner.id
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	/// Behavior currently installed for `method`.
	pub fn installed(&self, method: &str) -> Option<Rc<Behavior>> {
		self.inner.slots.borrow().get(method).cloned()
	}

	pub fn has_method(&self, method: &str) -> bool {
		self.inner.slots.borrow().contains_key(method)
	}

	/// Installed method names, sorted.
	pub fn methods(&self) -> Vec<String> {
		let mut names: Vec<String> = self.inner.slots.borrow().keys().map(|k| k.to_string()).collect();
		names.sort();
		names
	}

	pub fn instantiate(&self) -> Instance {
		Instance::new(self)
	}

	pub fn ptr_eq(&self, other: &Target) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	pub(crate) fn install(&self, method: &str, behavior: Rc<Behavior>) {
		let mut slots = self.inner.slots.borrow_mut();
		match slots.get_mut(method) {
			Some(slot) => *slot = behavior,
			None => {
				slots.insert(method.into(), behavior);
			}
		}
	}

	pub(crate) fn uninstall(&self, method: &str) -> Option<Rc<Behavior>> {
		self.inner.slots.borrow_mut().remove(method)
	}
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Target")
			.field("id", &self.inner.id)
			.field("name", &self.inner.name)
			.field("methods", &self.methods())
			.finish()
	}
}

struct InstanceInner {
	id: InstanceId,
	target: Target,
	fields: RefCell<HashMap<Box<str>, Value>>,
}

/// An object of a [`Target`], carrying its own fields. Clones share state.
#[derive(Clone)]
pub struct Instance {
	inner: Rc<InstanceInner>,
}

impl Instance {
	pub fn new(target: &Target) -> Self {
		Self {
			inner: Rc::new(InstanceInner {
				id: InstanceId::next(),
				target: target.clone(),
				fields: RefCell::new(HashMap::default()),
			}),
		}
	}

	pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
		self.set(name, value);
		self
	}

	pub fn id(&self) -> InstanceId {
		self.inner.id
	}

	pub fn target(&self) -> &Target {
		&self.inner.target
	}

	/// Field value, or [`Value::Unit`] when unset.
	pub fn get(&self, name: &str) -> Value {
		self.inner.fields.borrow().get(name).cloned().unwrap_or_default()
	}

	pub fn set(&self, name: &str, value: impl Into<Value>) {
		let value = value.into();
		let mut fields = self.inner.fields.borrow_mut();
		match fields.get_mut(name) {
			Some(field) => *field = value,
			None => {
				fields.insert(name.into(), value);
			}
		}
	}

	pub fn ptr_eq(&self, other: &Instance) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl fmt::Debug for Instance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("id", &self.inner.id)
			.field("target", &self.inner.target.name())
			.field("fields", &self.inner.fields.borrow())
			.finish()
	}
}

/// One or more targets passed to a registration call.
#[derive(Debug, Clone)]
pub struct Targets<'a>(Vec<&'a Target>);

impl<'a> Targets<'a> {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &'a Target> + '_ {
		self.0.iter().copied()
	}
}

impl<'a> From<&'a Target> for Targets<'a> {
	fn from(target: &'a Target) -> Self {
		Self(vec![target])
	}
}

impl<'a> From<&'a [Target]> for Targets<'a> {
	fn from(targets: &'a [Target]) -> Self {
		Self(targets.iter().collect())
	}
}

impl<'a> From<&'a Vec<Target>> for Targets<'a> {
	fn from(targets: &'a Vec<Target>) -> Self {
		Self(targets.iter().collect())
	}
}

impl<'a, const N: usize> From<[&'a Target; N]> for Targets<'a> {
	fn from(targets: [&'a Target; N]) -> Self {
		Self(targets.to_vec())
	}
}

/// One or more instances passed to an object-scope call.
#[derive(Debug, Clone)]
pub struct Instances<'a>(Vec<&'a Instance>);

impl<'a> Instances<'a> {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &'a Instance> + '_ {
		self.0.iter().copied()
	}
}

impl<'a> From<&'a Instance> for Instances<'a> {
	fn from(instance: &'a Instance) -> Self {
		Self(vec![instance])
	}
}

impl<'a> From<&'a [Instance]> for Instances<'a> {
	fn from(instances: &'a [Instance]) -> Self {
		Self(instances.iter().collect())
	}
}

impl<'a> From<&'a Vec<Instance>> for Instances<'a> {
	fn from(instances: &'a Vec<Instance>) -> Self {
		Self(instances.iter().collect())
	}
}

impl<'a, const N: usize> From<[&'a Instance; N]> for Instances<'a> {
	fn from(instances: [&'a Instance; N]) -> Self {
		Self(instances.to_vec())
	}
}
