use log::warn;

use crate::cartridge::{Cartridge, PRG_BANK_SIZE};
use crate::common::*;
use crate::mapper::factory::NameTableMirroring;
use crate::mapper::Mapper;

/// Mapper 0: no bank switching at all. One or two fixed PRG banks (a
/// single bank is mirrored across the window) and fixed CHR.
pub struct NRom {
  one_bank: bool,
  character_ram: Option<Vec<Byte>>,
  cart: Cartridge,
}

impl NRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.chr_rom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    Self {
      one_bank: cart.prg_rom().len() == PRG_BANK_SIZE,
      character_ram: ram,
      cart,
    }
  }
}

impl Mapper for NRom {
  #[inline]
  fn read_prg(&self, addr: Address) -> Byte {
    if addr < 0x8000 {
      return 0;
    }
    if self.one_bank {
      self.cart.prg_rom()[((addr - 0x8000) & 0x3FFF) as usize]
    } else {
      self.cart.prg_rom()[(addr - 0x8000) as usize]
    }
  }

  #[inline]
  fn write_prg(&mut self, addr: Address, _: Byte) {
    warn!("ROM memory write attempt at {:#x}", addr);
  }

  #[inline]
  fn read_chr(&self, addr: Address) -> Byte {
    match &self.character_ram {
      Some(ram) => ram[(addr & 0x1FFF) as usize],
      None => self.cart.chr_rom()[(addr & 0x1FFF) as usize],
    }
  }

  #[inline]
  fn write_chr(&mut self, addr: Address, value: Byte) {
    match &mut self.character_ram {
      Some(ram) => ram[(addr & 0x1FFF) as usize] = value,
      None => warn!("attempt to write read-only CHR memory at {:#x}", addr),
    }
  }

  fn has_extended_ram(&self) -> bool {
    self.cart.has_extended_ram()
  }

  fn name_table_mirroring(&self) -> NameTableMirroring {
    self.cart.mirroring()
  }
}
