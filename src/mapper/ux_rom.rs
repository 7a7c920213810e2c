use log::warn;

use crate::cartridge::{Cartridge, PRG_BANK_SIZE};
use crate::common::*;
use crate::mapper::factory::NameTableMirroring;
use crate::mapper::Mapper;

/// Mapper 2: a switchable 16KB PRG bank at 0x8000..0xC000 selected by any
/// write into the PRG window, with the last bank fixed at 0xC000 and up.
pub struct UxRom {
  uses_character_ram: bool,
  select_prg: usize,
  prg_banks: usize,
  character_ram: Vec<Byte>,
  cart: Cartridge,
}

impl UxRom {
  pub fn new(cart: Cartridge) -> Self {
    let uses_character_ram = cart.chr_rom().is_empty();
    let character_ram = if uses_character_ram {
      vec![0; 0x2000]
    } else {
      vec![]
    };
    Self {
      uses_character_ram,
      select_prg: 0,
      prg_banks: cart.prg_rom().len() / PRG_BANK_SIZE,
      character_ram,
      cart,
    }
  }

  fn read_last_bank(&self, offset: Address) -> Byte {
    self.cart.prg_rom()[self.cart.prg_rom().len() - PRG_BANK_SIZE + offset as usize]
  }
}

impl Mapper for UxRom {
  fn read_prg(&self, addr: Address) -> Byte {
    if addr < 0x8000 {
      return 0;
    }
    if addr < 0xC000 {
      let offset = ((addr - 0x8000) & 0x3FFF) as usize;
      self.cart.prg_rom()[self.select_prg * PRG_BANK_SIZE + offset]
    } else {
      self.read_last_bank(addr & 0x3FFF)
    }
  }

  fn write_prg(&mut self, _: Address, value: Byte) {
    // Select wraps on the available bank count.
    self.select_prg = value as usize % self.prg_banks;
  }

  fn read_chr(&self, addr: Address) -> Byte {
    if self.uses_character_ram {
      self.character_ram[(addr & 0x1FFF) as usize]
    } else {
      self.cart.chr_rom()[(addr & 0x1FFF) as usize]
    }
  }

  fn write_chr(&mut self, addr: Address, value: Byte) {
    if self.uses_character_ram {
      self.character_ram[(addr & 0x1FFF) as usize] = value;
    } else {
      warn!("attempt to write read-only CHR memory at {:#x}", addr);
    }
  }

  fn has_extended_ram(&self) -> bool {
    self.cart.has_extended_ram()
  }

  fn name_table_mirroring(&self) -> NameTableMirroring {
    self.cart.mirroring()
  }
}
