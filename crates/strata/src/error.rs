//! Error types for composition operations.

/// Result alias for composition operations.
pub type Result<T, E = ComposeError> = std::result::Result<T, E>;

/// Errors raised by the composer, its extensions and dispatched behavior.
///
/// Every variant is synchronous and final: nothing is retried, and a failed
/// call leaves slots and object-scope stacks exactly as they were.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
	#[error("invalid argument: {reason}")]
	InvalidArgument { reason: String },

	#[error("layer {layer:?} is not deployed")]
	NotDeployed { layer: String },

	#[error("layer {layer:?} is already deployed")]
	AlreadyDeployed { layer: String },

	#[error("layer {layer:?} has no refinement for target {target:?}")]
	NoRefinementForType { layer: String, target: String },

	/// `proceed` ran past the end of the chain and the slot had no original.
	#[error("no original implementation of {target}.{method}")]
	MissingOriginal { target: String, method: String },

	#[error("{target} has no method {method:?}")]
	UnknownMethod { target: String, method: String },

	#[error("object scope extension is not installed")]
	ObjectScopeNotInstalled,

	/// Raised by user-supplied method, refinement or resolver code.
	#[error("{method}: {message}")]
	Behavior { method: String, message: String },

	#[error("invalid configuration: {0}")]
	Config(#[from] toml::de::Error),
}

impl ComposeError {
	pub fn invalid(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}

	/// Builds a [`ComposeError::Behavior`] from user code.
	pub fn behavior(method: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Behavior {
			method: method.into(),
			message: message.into(),
		}
	}
}
