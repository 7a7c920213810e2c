use log::warn;

use crate::cartridge::{Cartridge, CHR_BANK_SIZE, PRG_BANK_SIZE};
use crate::common::*;
use crate::mapper::factory::NameTableMirroring;
use crate::mapper::Mapper;

/// Mapper 3: fixed PRG, switchable 8KB CHR bank (two select bits).
pub struct CnRom {
  one_bank: bool,
  select_chr: usize,
  chr_banks: usize,
  character_ram: Option<Vec<Byte>>,
  cart: Cartridge,
}

impl CnRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.chr_rom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    Self {
      one_bank: cart.prg_rom().len() == PRG_BANK_SIZE,
      select_chr: 0,
      chr_banks: cart.chr_rom().len() / CHR_BANK_SIZE,
      character_ram: ram,
      cart,
    }
  }
}

impl Mapper for CnRom {
  fn read_prg(&self, addr: Address) -> Byte {
    if addr < 0x8000 {
      return 0;
    }
    let offset = if self.one_bank {
      (addr - 0x8000) & 0x3FFF
    } else {
      addr - 0x8000
    };
    self.cart.prg_rom()[offset as usize]
  }

  fn write_prg(&mut self, _: Address, value: Byte) {
    self.select_chr = (value & 0x3) as usize % self.chr_banks.max(1);
  }

  fn read_chr(&self, addr: Address) -> Byte {
    let offset = (addr & 0x1FFF) as usize;
    match &self.character_ram {
      Some(ram) => ram[offset],
      None => self.cart.chr_rom()[self.select_chr * CHR_BANK_SIZE + offset],
    }
  }

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

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::test_support::build_ines;

  #[test]
  fn chr_bank_select_round_trips() {
    let banks = 4;
    let mut data = build_ines(1, banks, 3, 0, |_| {});
    // Tag the first byte of each CHR bank with its index.
    let chr_start = data.len() - banks * CHR_BANK_SIZE;
    for bank in 0..banks {
      data[chr_start + bank * CHR_BANK_SIZE] = bank as u8;
    }
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mut rom = CnRom::new(cart);
    for v in 0..banks as u8 {
      rom.write_prg(0x8000, v);
      assert_eq!(rom.read_chr(0x0000), v);
    }
  }

  #[test]
  fn chr_ram_backs_a_chr_less_cartridge() {
    let data = build_ines(1, 0, 3, 0, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mut rom = CnRom::new(cart);
    assert_eq!(rom.read_chr(0x0000), 0);
    rom.write_chr(0x0042, 0x99);
    // Bank select has nothing to switch but must stay harmless.
    rom.write_prg(0x8000, 0x3);
    assert_eq!(rom.read_chr(0x0042), 0x99);
  }
}
