//! Composer configuration.
//!
//! Configuration is a plain value: build it in code, or parse it from TOML:
//!
//! ```toml
//! delegation_mode = "chain"
//! ```

use std::str::FromStr;

use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::{ComposeError, Result};


/// How a refinement's `proceed` continues when several layers refine the
/// same method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DelegationMode {
	/// The most recently activated refinement wins; `proceed` goes straight
	/// to the original.
	#[default]
	Original,
	/// Registered resolution orders decide the winner; `proceed` walks the
	/// later active layers of the order before reaching the original.
	Chain,
}

impl DelegationMode {
	/// Parses a mode name, mapping unknown names to
	/// [`ComposeError::InvalidArgument`].
	pub fn parse(s: &str) -> Result<Self> {
		Self::from_str(s).map_err(|_| ComposeError::invalid("delegation mode must be 'original' or 'chain'"))
	}
}

/// Runtime options of a [`crate::Composer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
	pub delegation_mode: DelegationMode,
}

impl ComposerConfig {
	/// Configuration with chained delegation.
	pub fn chain() -> Self {
		Self {
			delegation_mode: DelegationMode::Chain,
		}
	}

	/// Parses configuration from TOML text.
	pub fn from_toml(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}
}
