//! Bookkeeping for refined slots.
//!
//! # Purpose
//!
//! - [`OriginalRegistry`]: the pristine behavior of every refined slot.
//! - [`RefinementRegistry`]: which layer refines which slot, and how.
//!
//! # Invariants
//!
//! - An original is recorded exactly once per (target, method), before the
//!   first refinement of that slot is stored.
//!   - Enforced in: [`OriginalRegistry::capture`]
//!   - Tested by: `registry::tests::original_is_write_once`
//!   - Failure symptom: deactivating every layer leaves a refinement installed.
//! - At most one refinement per (target, method, layer).
//!   - Enforced in: [`RefinementRegistry::insert`]
//!   - Tested by: `registry::tests::reregistering_replaces_function`
//!   - Failure symptom: a layer's old refinement keeps running after it was
//!     replaced.
//! - A refinement entry's installed behavior handle is stable until the entry
//!   is replaced, so reinstalling it is reference-equal.
//!   - Enforced in: [`RefinementRegistry::insert`]
//!   - Tested by: `registry::tests::behavior_handle_is_stable`

mod originals;
mod refinements;

pub(crate) use originals::OriginalRegistry;
pub(crate) use refinements::RefinementRegistry;


/// Result of storing an entry keyed by identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertAction {
	/// Key was new; entry inserted.
	InsertedNew,
	/// Key existed; entry replaced.
	ReplacedExisting,
}
