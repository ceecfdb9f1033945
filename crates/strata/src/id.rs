//! Process-unique identities for targets, instances and layer specs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! identity {
	($(#[$meta:meta])* $name:ident, $prefix:literal) => {
		$(#[$meta])*
		#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(u64);

		impl $name {
			pub(crate) fn next() -> Self {
				static NEXT: AtomicU64 = AtomicU64::new(1);
				Self(NEXT.fetch_add(1, Ordering::Relaxed))
			}

			pub fn get(self) -> u64 {
				self.0
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, concat!($prefix, "#{}"), self.0)
			}
		}
	};
}

identity!(
	/// Identity of a [`crate::Target`] method table.
	TargetId,
	"target"
);
identity!(
	/// Identity of an [`crate::Instance`].
	InstanceId,
	"instance"
);
identity!(
	/// Identity of a [`crate::LayerSpec`]; refinements and resolution orders
	/// are keyed by it, so they survive undeploy and redeploy.
	LayerKey,
	"layer"
);
