//! Observable signals and typed activation conditions.
//!
//! # Mental Model
//!
//! 1. A [`Signal`] is a shared cell holding a [`Value`]. Writing a different
//!    value notifies its subscribers synchronously, in registration order.
//! 2. A [`Condition`] is a boolean combinator over signal *names*, built once
//!    and inspectable ([`Condition::referenced_signals`]).
//! 3. A [`ConditionWatch`] binds names to live signals and lets its owner
//!    re-evaluate the condition whenever one of them changes.
//!
//! # Invariants
//!
//! - Writing the current value again notifies nobody.
//!   - Enforced in: [`Signal::set`].
//! - Unresolved names evaluate to `false`, never to an error.
//!   - Enforced in: [`Condition::evaluate`].
//! - A watch with no signals and no predicate never fires.
//!   - Enforced in: [`ConditionWatch::is_armed`].

pub mod condition;
mod signal;
mod value;
mod watch;

pub use condition::{Condition, PredicateFn, SignalLookup};
pub use signal::{Signal, SignalId, Subscriber, SubscriptionId};
pub use value::Value;
pub use watch::ConditionWatch;
