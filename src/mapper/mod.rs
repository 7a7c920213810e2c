pub mod cn_rom;
pub mod factory;
pub mod n_rom;
pub mod tx_rom;
pub mod ux_rom;

use crate::common::*;
use factory::NameTableMirroring;

/// Cartridge-side address translation and bank switching.
///
/// `read_prg`/`write_prg` cover the CPU window `0x4020..=0xFFFF` (the bus
/// forwards everything it does not own); `read_chr`/`write_chr` cover the
/// PPU pattern-table window `0x0000..0x1FFF`. Bank-select registers live
/// behind `write_prg` in each variant's reserved control range.
///
/// The set of implementations is closed: new mapper kinds are added as new
/// modules and a new arm in `factory::create_mapper`.
pub trait Mapper {
  fn read_prg(&self, addr: Address) -> Byte;
  fn write_prg(&mut self, addr: Address, value: Byte);
  fn read_chr(&self, addr: Address) -> Byte;
  fn write_chr(&mut self, addr: Address, value: Byte);

  fn has_extended_ram(&self) -> bool;

  fn name_table_mirroring(&self) -> NameTableMirroring;

  /// Scanline notch for IRQ-capable variants. The clock invokes this once
  /// per rendered scanline; the default does nothing.
  fn on_scanline(&mut self) {}
}
