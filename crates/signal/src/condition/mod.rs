//! Typed activation conditions.
//!
//! A [`Condition`] is a small boolean combinator over named signals. It is
//! built when a layer is declared, so the set of signals it reads is known
//! up front ([`Condition::referenced_signals`]) and literal comparisons carry
//! their expected value type.
//!
//! # Fail-closed evaluation
//!
//! A reference to a name that the evaluation environment cannot resolve makes
//! the whole condition evaluate to `false`. Evaluation is left to right and
//! short-circuits, so an unresolved name on the right of a decided `All`/`Any`
//! is never looked at.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{Signal, Value};


/// Name resolution for condition evaluation.
pub trait SignalLookup {
	/// Returns the current value bound to `name`, if any.
	fn lookup(&self, name: &str) -> Option<Value>;
}

impl<K, S> SignalLookup for HashMap<K, Value, S>
where
	K: Borrow<str> + Hash + Eq,
	S: BuildHasher,
{
	fn lookup(&self, name: &str) -> Option<Value> {
		self.get(name).cloned()
	}
}

impl<S: BuildHasher> SignalLookup for IndexMap<Box<str>, Signal, S> {
	fn lookup(&self, name: &str) -> Option<Value> {
		self.get(name).map(Signal::get)
	}
}

/// Prebuilt predicate evaluated against the full environment.
pub type PredicateFn = Rc<dyn Fn(&dyn SignalLookup) -> bool>;

/// Boolean expression over named signals.
#[derive(Clone, Default)]
pub enum Condition {
	/// Never holds. The condition of a layer declared without one.
	#[default]
	Never,
	/// Always holds once evaluated.
	Always,
	/// Holds when the named signal's value is truthy.
	Truthy(Box<str>),
	/// Holds when the named signal equals the literal.
	Equals(Box<str>, Value),
	Not(Box<Condition>),
	/// Holds when every operand holds (empty: holds).
	All(Vec<Condition>),
	/// Holds when any operand holds (empty: does not hold).
	Any(Vec<Condition>),
	/// Opaque predicate; evaluated as soon as it is attached.
	Predicate(PredicateFn),
}

impl Condition {
	pub fn never() -> Self {
		Condition::Never
	}

	pub fn always() -> Self {
		Condition::Always
	}

	/// Truthiness test of a named signal.
	pub fn signal(name: impl Into<Box<str>>) -> Self {
		Condition::Truthy(name.into())
	}

	/// Equality test of a named signal against a literal.
	pub fn eq(name: impl Into<Box<str>>, value: impl Into<Value>) -> Self {
		Condition::Equals(name.into(), value.into())
	}

	/// Wraps a prebuilt predicate.
	pub fn predicate(f: impl Fn(&dyn SignalLookup) -> bool + 'static) -> Self {
		Condition::Predicate(Rc::new(f))
	}

	pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
		Condition::All(conditions.into_iter().collect())
	}

	pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
		Condition::Any(conditions.into_iter().collect())
	}

	/// Conjunction, flattening nested `All` operands.
	pub fn and(self, other: Condition) -> Self {
		match (self, other) {
			(Condition::All(mut lhs), Condition::All(rhs)) => {
				lhs.extend(rhs);
				Condition::All(lhs)
			}
			(Condition::All(mut lhs), rhs) => {
				lhs.push(rhs);
				Condition::All(lhs)
			}
			(lhs, rhs) => Condition::All(vec![lhs, rhs]),
		}
	}

	/// Disjunction, flattening nested `Any` operands.
	pub fn or(self, other: Condition) -> Self {
		match (self, other) {
			(Condition::Any(mut lhs), Condition::Any(rhs)) => {
				lhs.extend(rhs);
				Condition::Any(lhs)
			}
			(Condition::Any(mut lhs), rhs) => {
				lhs.push(rhs);
				Condition::Any(lhs)
			}
			(lhs, rhs) => Condition::Any(vec![lhs, rhs]),
		}
	}

	/// Evaluates the condition; unresolved names yield `false`.
	pub fn evaluate(&self, env: &dyn SignalLookup) -> bool {
		self.try_evaluate(env).unwrap_or(false)
	}

	/// Evaluates the condition, returning `None` when evaluation reached a
	/// name the environment cannot resolve.
	pub fn try_evaluate(&self, env: &dyn SignalLookup) -> Option<bool> {
		Some(match self {
			Condition::Never => false,
			Condition::Always => true,
			Condition::Truthy(name) => env.lookup(name)?.is_truthy(),
			Condition::Equals(name, literal) => env.lookup(name)? == *literal,
			Condition::Not(inner) => !inner.try_evaluate(env)?,
			Condition::All(operands) => {
				for operand in operands {
					if !operand.try_evaluate(env)? {
						return Some(false);
					}
				}
				true
			}
			Condition::Any(operands) => {
				for operand in operands {
					if operand.try_evaluate(env)? {
						return Some(true);
					}
				}
				false
			}
			Condition::Predicate(f) => f(env),
		})
	}

	/// Returns true if a prebuilt predicate appears anywhere in the tree.
	pub fn contains_predicate(&self) -> bool {
		match self {
			Condition::Predicate(_) => true,
			Condition::Not(inner) => inner.contains_predicate(),
			Condition::All(operands) | Condition::Any(operands) => {
				operands.iter().any(Condition::contains_predicate)
			}
			_ => false,
		}
	}

	/// Signal names the condition reads, in order of first appearance.
	///
	/// Names read only inside predicates are invisible here.
	pub fn referenced_signals(&self) -> Vec<&str> {
		let mut names = Vec::new();
		self.collect_names(&mut names);
		names
	}

	fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
		match self {
			Condition::Truthy(name) | Condition::Equals(name, _) => {
				if !names.contains(&&**name) {
					names.push(name);
				}
			}
			Condition::Not(inner) => inner.collect_names(names),
			Condition::All(operands) | Condition::Any(operands) => {
				for operand in operands {
					operand.collect_names(names);
				}
			}
			Condition::Never | Condition::Always | Condition::Predicate(_) => {}
		}
	}

	/// Literal comparisons against `name`, used for type checks when a
	/// signal is attached.
	pub fn literals_for<'a>(&'a self, name: &str) -> Vec<&'a Value> {
		let mut out = Vec::new();
		self.collect_literals(name, &mut out);
		out
	}

	fn collect_literals<'a>(&'a self, name: &str, out: &mut Vec<&'a Value>) {
		match self {
			Condition::Equals(n, literal) if &**n == name => out.push(literal),
			Condition::Not(inner) => inner.collect_literals(name, out),
			Condition::All(operands) | Condition::Any(operands) => {
				for operand in operands {
					operand.collect_literals(name, out);
				}
			}
			_ => {}
		}
	}
}

impl std::ops::Not for Condition {
	type Output = Condition;

	fn not(self) -> Condition {
		match self {
			Condition::Not(inner) => *inner,
			other => Condition::Not(Box::new(other)),
		}
	}
}

impl fmt::Display for Condition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Condition::Never => write!(f, "false"),
			Condition::Always => write!(f, "true"),
			Condition::Truthy(name) => write!(f, "{name}"),
			Condition::Equals(name, literal) => write!(f, "{name} == {literal}"),
			Condition::Not(inner) => write!(f, "!({inner})"),
			Condition::All(operands) => write_joined(f, operands, " && ", "true"),
			Condition::Any(operands) => write_joined(f, operands, " || ", "false"),
			Condition::Predicate(_) => write!(f, "<predicate>"),
		}
	}
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Condition], sep: &str, empty: &str) -> fmt::Result {
	if operands.is_empty() {
		return write!(f, "{empty}");
	}
	write!(f, "(")?;
	for (i, operand) in operands.iter().enumerate() {
		if i > 0 {
			write!(f, "{sep}")?;
		}
		write!(f, "{operand}")?;
	}
	write!(f, ")")
}

impl fmt::Debug for Condition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Condition({self})")
	}
}
