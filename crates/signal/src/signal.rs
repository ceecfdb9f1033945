//! Observable value cells.
//!
//! A [`Signal`] is a shared handle: clones observe and mutate the same cell.
//! Writes notify subscribers synchronously, in registration order, and only
//! when the written value differs from the current one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::Value;


/// Callback invoked with the new value after a signal changes.
pub type Subscriber = Rc<dyn Fn(&Value)>;

/// Process-unique identity of a signal cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct SignalInner {
	id: SignalId,
	name: RefCell<Option<Box<str>>>,
	value: RefCell<Value>,
	subscribers: RefCell<SmallVec<[(SubscriptionId, Subscriber); 4]>>,
	next_subscription: Cell<u64>,
}

/// An observable mutable value cell with a change-notification list.
#[derive(Clone)]
pub struct Signal {
	inner: Rc<SignalInner>,
}

impl Signal {
	/// Creates a named signal holding `value`.
	pub fn new(value: impl Into<Value>, name: impl Into<Box<str>>) -> Self {
		let signal = Self::anonymous(value);
		signal.rename(name);
		signal
	}

	/// Creates a signal without a name. Exhibiting it names it after the
	/// field it is exhibited under.
	pub fn anonymous(value: impl Into<Value>) -> Self {
		Self {
			inner: Rc::new(SignalInner {
				id: SignalId::next(),
				name: RefCell::new(None),
				value: RefCell::new(value.into()),
				subscribers: RefCell::new(SmallVec::new()),
				next_subscription: Cell::new(0),
			}),
		}
	}

	pub fn id(&self) -> SignalId {
		self.inner.id
	}

	pub fn name(&self) -> Option<String> {
		self.inner.name.borrow().as_deref().map(str::to_string)
	}

	/// Replaces the signal's name.
	pub fn rename(&self, name: impl Into<Box<str>>) {
		*self.inner.name.borrow_mut() = Some(name.into());
	}

	/// Returns a copy of the current value.
	pub fn get(&self) -> Value {
		self.inner.value.borrow().clone()
	}

	/// Runs `f` against the current value without cloning it.
	pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	/// Writes a new value and notifies subscribers.
	///
	/// Returns `false` without notifying anyone when `value` equals the
	/// current value. Subscribers registered at the moment of the write are
	/// invoked in registration order; no internal borrow is held while they
	/// run, so they may read or write signals themselves.
	pub fn set(&self, value: impl Into<Value>) -> bool {
		let value = value.into();
		{
			let mut current = self.inner.value.borrow_mut();
			if *current == value {
				return false;
			}
			*current = value.clone();
		}

		let subscribers: SmallVec<[Subscriber; 4]> = self
			.inner
			.subscribers
			.borrow()
			.iter()
			.map(|(_, f)| Rc::clone(f))
			.collect();

		tracing::trace!(
			domain = "signals",
			signal = ?self.inner.id,
			name = self.inner.name.borrow().as_deref().unwrap_or("<anonymous>"),
			%value,
			subscribers = subscribers.len(),
			"signal changed",
		);

		for subscriber in subscribers {
			subscriber(&value);
		}
		true
	}

	/// Registers a change callback.
	pub fn subscribe(&self, f: impl Fn(&Value) + 'static) -> SubscriptionId {
		let id = SubscriptionId(self.inner.next_subscription.get());
		self.inner.next_subscription.set(id.0 + 1);
		self.inner.subscribers.borrow_mut().push((id, Rc::new(f)));
		id
	}

	/// Removes a callback. Returns `false` if it was not registered.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut subscribers = self.inner.subscribers.borrow_mut();
		let before = subscribers.len();
		subscribers.retain(|(sub, _)| *sub != id);
		subscribers.len() != before
	}

	pub fn subscriber_count(&self) -> usize {
		self.inner.subscribers.borrow().len()
	}

	/// Returns true if both handles refer to the same cell.
	pub fn ptr_eq(&self, other: &Signal) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl fmt::Debug for Signal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("id", &self.inner.id)
			.field("name", &self.inner.name.borrow())
			.field("value", &self.inner.value.borrow())
			.field("subscribers", &self.subscriber_count())
			.finish()
	}
}
