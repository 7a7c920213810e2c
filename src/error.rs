use thiserror::Error;

use crate::common::{Address, Byte};

/// Every way the core can refuse to start or halt.
///
/// Load-time failures happen before any emulator state is constructed;
/// `UnsupportedOpcode` is raised mid-run and stops the clock. The bus
/// mapping itself is total, so there is no "unmapped address" variant.
#[derive(Debug, Error)]
pub enum CoreError {
  #[error("invalid iNES header: {reason}")]
  InvalidHeader { reason: String },

  #[error("mapper {0} has no implemented variant")]
  UnsupportedMapper(Byte),

  #[error("unsupported opcode {opcode:#04x} at {pc:#06x}")]
  UnsupportedOpcode { opcode: Byte, pc: Address },

  #[error("i/o error while reading cartridge: {0}")]
  Io(#[from] std::io::Error),
}

impl CoreError {
  pub(crate) fn header(reason: impl Into<String>) -> Self {
    Self::InvalidHeader {
      reason: reason.into(),
    }
  }
}
