//! Common fixtures for composition integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use strata::{Composer, ComposerConfig, Instance, Target, Value};

/// Composer with tracing output enabled for the test run.
pub fn composer(config: ComposerConfig) -> Composer {
	let _ = tracing_subscriber::fmt::try_init();
	Composer::with_config(config)
}

/// `Enemy` target whose `hp` returns 1 and `name` returns its `name` field.
pub fn enemy() -> Target {
	Target::new("Enemy")
		.with_method("hp", |_, _| Ok(Value::Int(1)))
		.with_method("name", |this, _| Ok(this.get("name")))
}

pub fn int(composer: &Composer, instance: &Instance, method: &str) -> i64 {
	composer
		.call(instance, method, &[])
		.expect("call failed")
		.as_int()
		.expect("not an int")
}

/// Ordered record of which behaviors ran.
#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
	pub fn push(&self, entry: &str) {
		self.0.borrow_mut().push(entry.to_string());
	}

	pub fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.0.borrow_mut())
	}
}
