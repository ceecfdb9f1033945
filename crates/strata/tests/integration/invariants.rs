use std::rc::Rc;

use proptest::prelude::*;
use strata::{Composer, ComposerConfig, Condition, LayerSpec, Signal};

use crate::common::{Trace, composer, enemy};

const LAYERS: [&str; 3] = ["A", "B", "C"];

#[derive(Debug, Clone)]
enum Op {
	Activate(usize),
	Deactivate(usize),
	Set(usize, bool),
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		(0..LAYERS.len()).prop_map(Op::Activate),
		(0..LAYERS.len()).prop_map(Op::Deactivate),
		(0..LAYERS.len(), any::<bool>()).prop_map(|(i, v)| Op::Set(i, v)),
	]
}

/// Expected layer state, driven by the same operations.
#[derive(Default)]
struct Model {
	active: [bool; 3],
	attached: [bool; 3],
	value: [bool; 3],
	activated_at: [u64; 3],
	clock: u64,
}

impl Model {
	fn transition(&mut self, i: usize, to: bool) {
		if self.active[i] != to && to {
			self.clock += 1;
			self.activated_at[i] = self.clock;
		}
		self.active[i] = to;
	}

	fn apply(&mut self, op: &Op) {
		match *op {
			Op::Activate(i) => self.transition(i, true),
			Op::Deactivate(i) => {
				self.transition(i, false);
				self.attached[i] = false;
			}
			Op::Set(i, v) => {
				if self.value[i] != v {
					self.value[i] = v;
					if self.attached[i] {
						self.transition(i, v);
					}
				}
			}
		}
	}

	/// Layers whose refinements a call must run, in execution order.
	fn expected_trace(&self, chain: bool) -> Vec<String> {
		let active = (0..LAYERS.len()).filter(|&i| self.active[i]);
		if chain {
			return active.map(|i| LAYERS[i].to_string()).collect();
		}
		active
			.max_by_key(|&i| self.activated_at[i])
			.map(|i| vec![LAYERS[i].to_string()])
			.unwrap_or_default()
	}
}

struct Fixture {
	composer: Composer,
	target: strata::Target,
	specs: Vec<LayerSpec>,
	signals: Vec<Signal>,
	trace: Trace,
}

fn fixture(chain: bool) -> Fixture {
	let config = if chain { ComposerConfig::chain() } else { ComposerConfig::default() };
	let composer = composer(config);
	let target = enemy();
	let trace = Trace::default();
	let mut specs = Vec::new();
	let mut signals = Vec::new();

	for name in LAYERS {
		let signal_name = format!("{name}_on");
		let spec = LayerSpec::new(name, Condition::signal(signal_name.clone()));
		composer.deploy(&spec).unwrap();
		let trace = trace.clone();
		composer
			.add_refinement(&spec, &target, "hp", move |_, args, proceed| {
				trace.push(name);
				proceed.call(args)
			})
			.unwrap();
		let signal = Signal::anonymous(false);
		composer.exhibit("switches", [(signal_name, signal.clone())]);
		specs.push(spec);
		signals.push(signal);
	}
	composer.set_resolution_order(&target, "hp", &specs).unwrap();

	Fixture {
		composer,
		target,
		specs,
		signals,
		trace,
	}
}

proptest! {
	/// A layer is active exactly when its refinement takes part in dispatch.
	#[test]
	fn active_iff_reachable(chain in any::<bool>(), ops in prop::collection::vec(op(), 1..40)) {
		let f = fixture(chain);
		let pristine = f.composer.original(&f.target, "hp").expect("original recorded");
		let mut model = Model { attached: [true; 3], ..Model::default() };
		let instance = f.target.instantiate();

		for op in &ops {
			match *op {
				Op::Activate(i) => f.composer.activate(&f.specs[i]).unwrap(),
				Op::Deactivate(i) => f.composer.deactivate(&f.specs[i]).unwrap(),
				Op::Set(i, v) => {
					f.signals[i].set(v);
				}
			}
			model.apply(op);

			for (i, spec) in f.specs.iter().enumerate() {
				prop_assert_eq!(f.composer.is_active(spec), model.active[i], "layer {} after {:?}", LAYERS[i], op);
			}

			f.trace.take();
			prop_assert_eq!(f.composer.call(&instance, "hp", &[]).unwrap().as_int(), Some(1));
			prop_assert_eq!(f.trace.take(), model.expected_trace(chain));

			let none_active = !model.active.iter().any(|&a| a);
			let installed = f.composer.installed(&f.target, "hp").unwrap();
			prop_assert_eq!(Rc::ptr_eq(&installed, &pristine), none_active);
		}
	}

	/// Activating an active layer changes nothing.
	#[test]
	fn activate_is_idempotent(chain in any::<bool>(), ops in prop::collection::vec(op(), 0..20), which in 0..LAYERS.len()) {
		let f = fixture(chain);
		for op in &ops {
			match *op {
				Op::Activate(i) => f.composer.activate(&f.specs[i]).unwrap(),
				Op::Deactivate(i) => f.composer.deactivate(&f.specs[i]).unwrap(),
				Op::Set(i, v) => {
					f.signals[i].set(v);
				}
			}
		}

		f.composer.activate(&f.specs[which]).unwrap();
		let before = f.composer.installed(&f.target, "hp").unwrap();
		let states = f.composer.layer_states();
		f.composer.activate(&f.specs[which]).unwrap();

		prop_assert!(Rc::ptr_eq(&before, &f.composer.installed(&f.target, "hp").unwrap()));
		prop_assert_eq!(states, f.composer.layer_states());
	}
}

#[test]
fn deactivate_after_activate_restores_reference() {
	let f = fixture(false);
	let before = f.composer.installed(&f.target, "hp").unwrap();

	f.composer.activate(&f.specs[1]).unwrap();
	assert!(!Rc::ptr_eq(&before, &f.composer.installed(&f.target, "hp").unwrap()));
	f.composer.deactivate(&f.specs[1]).unwrap();

	assert!(Rc::ptr_eq(&before, &f.composer.installed(&f.target, "hp").unwrap()));
}
