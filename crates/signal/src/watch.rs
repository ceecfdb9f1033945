//! Conditions bound to live signals.

use indexmap::IndexMap;

use crate::condition::SignalLookup;
use crate::{Condition, Signal, SubscriptionId, Value};


struct Watched {
	signal: Signal,
	subscription: SubscriptionId,
}

/// A [`Condition`] plus the named signals it observes.
///
/// Every attached signal carries a subscription that runs the notify
/// callback given to [`ConditionWatch::watch`]. The watch itself never
/// evaluates on its own; the owner re-evaluates from the callback.
///
/// Dropping the watch detaches every subscription.
pub struct ConditionWatch {
	condition: Condition,
	signals: IndexMap<Box<str>, Watched>,
}

impl ConditionWatch {
	pub fn new(condition: Condition) -> Self {
		Self {
			condition,
			signals: IndexMap::new(),
		}
	}

	pub fn condition(&self) -> &Condition {
		&self.condition
	}

	/// Attaches `signal` under `name`.
	///
	/// Returns `false` when the same signal is already watched under that
	/// name. A different signal previously bound to `name` is detached first.
	pub fn watch(&mut self, name: &str, signal: &Signal, notify: impl Fn(&Value) + 'static) -> bool {
		if let Some(existing) = self.signals.get(name) {
			if existing.signal.ptr_eq(signal) {
				return false;
			}
			existing.signal.unsubscribe(existing.subscription);
		}

		signal.with(|current| {
			for literal in self.condition.literals_for(name) {
				if literal.type_name() != current.type_name() {
					tracing::warn!(
						domain = "signals",
						name,
						condition = %self.condition,
						expected = literal.type_name(),
						got = current.type_name(),
						"condition literal type differs from signal value; comparison will not hold",
					);
				}
			}
		});

		let subscription = signal.subscribe(notify);
		self.signals.insert(
			name.into(),
			Watched {
				signal: signal.clone(),
				subscription,
			},
		);
		true
	}

	/// Detaches the signal bound to `name`.
	pub fn unwatch(&mut self, name: &str) -> bool {
		match self.signals.shift_remove(name) {
			Some(watched) => {
				watched.signal.unsubscribe(watched.subscription);
				true
			}
			None => false,
		}
	}

	/// Detaches every watched signal.
	pub fn reset(&mut self) {
		for (_, watched) in self.signals.drain(..) {
			watched.signal.unsubscribe(watched.subscription);
		}
	}

	/// True when the watch can ever fire: it observes at least one signal, or
	/// its condition contains a prebuilt predicate.
	pub fn is_armed(&self) -> bool {
		!self.signals.is_empty() || self.condition.contains_predicate()
	}

	pub fn is_watching(&self, name: &str) -> bool {
		self.signals.contains_key(name)
	}

	/// Names of the watched signals in attachment order.
	pub fn watched(&self) -> impl Iterator<Item = &str> {
		self.signals.keys().map(|k| &**k)
	}

	/// Evaluates the condition against the watched signals' current values.
	pub fn evaluate(&self) -> bool {
		self.condition.evaluate(self)
	}
}

impl SignalLookup for ConditionWatch {
	fn lookup(&self, name: &str) -> Option<Value> {
		self.signals.get(name).map(|w| w.signal.get())
	}
}

impl Drop for ConditionWatch {
	fn drop(&mut self) {
		self.reset();
	}
}

impl std::fmt::Debug for ConditionWatch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConditionWatch")
			.field("condition", &self.condition)
			.field("signals", &self.signals.keys().collect::<Vec<_>>())
			.finish()
	}
}
