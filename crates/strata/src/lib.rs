//! Runtime layer composition.
//!
//! Layers bundle alternate method implementations ("refinements") with an
//! activation [`Condition`] over named [`Signal`]s. When a layer's condition
//! starts holding, its refinements are installed into the method tables of
//! their [`Target`]s; when it stops, the tables fall back to the next active
//! refinement or to the original.
//!
//! ```ignore
//! let composer = Composer::new();
//! let enemy = Target::new("Enemy").with_method("hp", |_, _| Ok(1.into()));
//! let hard = LayerSpec::new("HardMode", Condition::eq("difficulty", "hard"));
//!
//! composer.deploy(&hard)?;
//! composer.add_refinement(&hard, &enemy, "hp", |_, _, _| Ok(3.into()))?;
//! composer.exhibit("settings", [("difficulty", Signal::anonymous("normal"))]);
//! ```
//!
//! # Mental Model
//!
//! 1. [`Composer::add_refinement`] records the slot's original once, then
//!    registers the refinement against the layer spec.
//! 2. Signal writes re-evaluate the conditions watching them; a changed
//!    result runs the layer's enter/exit hook and recomputes its slots.
//! 3. [`Composer::call`] runs the installed behavior. Refinements receive a
//!    [`Proceed`] continuation leading to the next layer or the original.
//! 4. In [`DelegationMode::Chain`], resolution orders pick the winning layer
//!    and what `proceed` walks; a resolver can replace both.
//!
//! All state lives in the [`Composer`]. It is single-threaded (`!Send`) and
//! never holds a borrow while user code runs, so hooks and refinements may
//! call back into it.

mod composer;
mod config;
mod error;
mod id;
mod layer;
mod proceed;
mod registry;
mod resolution;
mod scope;
mod target;

pub use composer::Composer;
pub use config::{ComposerConfig, DelegationMode};
pub use error::{ComposeError, Result};
pub use id::{InstanceId, LayerKey, TargetId};
pub use layer::{Hook, LayerInfo, LayerPhase, LayerSpec, LayerSpecBuilder};
pub use proceed::Proceed;
pub use registry::InsertAction;
pub use resolution::Contenders;
pub use strata_signal::{Condition, Signal, SignalLookup, Value};
pub use target::{Behavior, Instance, Instances, MethodFn, RefinementFn, ResolverFn, Target, Targets};
