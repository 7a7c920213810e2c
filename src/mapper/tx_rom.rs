use crate::cartridge::Cartridge;
use crate::common::*;
use crate::mapper::factory::{IrqCallback, MirrorCallback, NameTableMirroring};
use crate::mapper::Mapper;

/// Mapper 4 (MMC3 subset): 8KB PRG banking in two arrangements, 1KB/2KB
/// CHR banking with inversion, run-time mirroring control and a
/// scanline-counted IRQ.
pub struct TxRom {
  cart: Cartridge,
  target_register: usize,
  prg_bank_mode: bool,
  chr_inversion: bool,

  bank_register: [usize; 8],

  irq_enable: bool,
  irq_counter: Byte,
  irq_latch: Byte,
  irq_reload_pending: bool,

  prg_ram: Vec<Byte>,
  character_ram: Option<Vec<Byte>>,

  // Byte offsets into PRG ROM for the four 8KB windows.
  prg_banks: [usize; 4],
  // Byte offsets into CHR for the eight 1KB windows.
  chr_banks: [usize; 8],

  rom_size: usize,
  four_screen: bool,
  mirroring: NameTableMirroring,

  mirror_cb: MirrorCallback,
  irq_cb: IrqCallback,
}

impl TxRom {
  pub fn new(cart: Cartridge, mirror_cb: MirrorCallback, irq_cb: IrqCallback) -> Self {
    let rom_size = cart.prg_rom().len();
    let character_ram = if cart.chr_rom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    Self {
      target_register: 0,
      prg_bank_mode: false,
      chr_inversion: false,
      bank_register: [0; 8],
      irq_enable: false,
      irq_counter: 0,
      irq_latch: 0,
      irq_reload_pending: false,
      prg_ram: vec![0; 0x2000],
      character_ram,
      prg_banks: [
        rom_size - 0x4000,
        rom_size - 0x2000,
        rom_size - 0x4000,
        rom_size - 0x2000,
      ],
      chr_banks: [0; 8],
      rom_size,
      four_screen: cart.mirroring() == NameTableMirroring::FourScreen,
      mirroring: cart.mirroring(),
      mirror_cb,
      irq_cb,
      cart,
    }
  }

  fn chr_len(&self) -> usize {
    match &self.character_ram {
      Some(ram) => ram.len(),
      None => self.cart.chr_rom().len(),
    }
  }

  fn chr_bank_offset(&self, index: usize) -> usize {
    let banks = self.chr_len() / 0x400;
    (index % banks) * 0x400
  }

  fn prg_bank_offset(&self, index: usize) -> usize {
    let banks = self.rom_size / 0x2000;
    (index % banks) * 0x2000
  }

  fn update_banks(&mut self) {
    let r = self.bank_register;
    if !self.chr_inversion {
      self.chr_banks[0] = self.chr_bank_offset(r[0] & 0xFE);
      self.chr_banks[1] = self.chr_bank_offset((r[0] & 0xFE) | 1);
      self.chr_banks[2] = self.chr_bank_offset(r[1] & 0xFE);
      self.chr_banks[3] = self.chr_bank_offset((r[1] & 0xFE) | 1);
      self.chr_banks[4] = self.chr_bank_offset(r[2]);
      self.chr_banks[5] = self.chr_bank_offset(r[3]);
      self.chr_banks[6] = self.chr_bank_offset(r[4]);
      self.chr_banks[7] = self.chr_bank_offset(r[5]);
    } else {
      self.chr_banks[0] = self.chr_bank_offset(r[2]);
      self.chr_banks[1] = self.chr_bank_offset(r[3]);
      self.chr_banks[2] = self.chr_bank_offset(r[4]);
      self.chr_banks[3] = self.chr_bank_offset(r[5]);
      self.chr_banks[4] = self.chr_bank_offset(r[0] & 0xFE);
      self.chr_banks[5] = self.chr_bank_offset((r[0] & 0xFE) | 1);
      self.chr_banks[6] = self.chr_bank_offset(r[1] & 0xFE);
      self.chr_banks[7] = self.chr_bank_offset((r[1] & 0xFE) | 1);
    }

    if !self.prg_bank_mode {
      self.prg_banks[0] = self.prg_bank_offset(r[6] & 0x3F);
      self.prg_banks[1] = self.prg_bank_offset(r[7] & 0x3F);
      self.prg_banks[2] = self.rom_size - 0x4000;
    } else {
      self.prg_banks[0] = self.rom_size - 0x4000;
      self.prg_banks[1] = self.prg_bank_offset(r[7] & 0x3F);
      self.prg_banks[2] = self.prg_bank_offset(r[6] & 0x3F);
    }
    self.prg_banks[3] = self.rom_size - 0x2000;
  }
}

impl Mapper for TxRom {
  fn read_prg(&self, addr: Address) -> Byte {
    match addr {
      0x6000..=0x7FFF => self.prg_ram[(addr & 0x1FFF) as usize],
      0x8000..=0xFFFF => {
        let window = ((addr - 0x8000) >> 13) as usize;
        self.cart.prg_rom()[self.prg_banks[window] + (addr & 0x1FFF) as usize]
      }
      _ => 0,
    }
  }

  fn write_prg(&mut self, addr: Address, value: Byte) {
    match addr {
      0x6000..=0x7FFF => self.prg_ram[(addr & 0x1FFF) as usize] = value,
      0x8000..=0x9FFF => {
        if !bit_eq(addr, 0x1) {
          // Bank select.
          self.target_register = (value & 0x7) as usize;
          self.prg_bank_mode = bit_eq(value, 0x40);
          self.chr_inversion = bit_eq(value, 0x80);
        } else {
          // Bank data.
          self.bank_register[self.target_register] = value as usize;
        }
        self.update_banks();
      }
      0xA000..=0xBFFF => {
        if !bit_eq(addr, 0x1) {
          // Mirroring; ignored on four-screen boards.
          if !self.four_screen {
            self.mirroring = if bit_eq(value, 0x1) {
              NameTableMirroring::Horizontal
            } else {
              NameTableMirroring::Vertical
            };
            (self.mirror_cb)(self.mirroring);
          }
        }
        // Odd addresses are PRG RAM protect; nothing enforces it here.
      }
      0xC000..=0xDFFF => {
        if !bit_eq(addr, 0x1) {
          self.irq_latch = value;
        } else {
          self.irq_counter = 0;
          self.irq_reload_pending = true;
        }
      }
      0xE000..=0xFFFF => {
        self.irq_enable = bit_eq(addr, 0x1);
      }
      _ => {}
    }
  }

  fn read_chr(&self, addr: Address) -> Byte {
    if addr >= 0x2000 {
      return 0;
    }
    let window = (addr >> 10) as usize;
    let offset = self.chr_banks[window] + (addr & 0x3FF) as usize;
    match &self.character_ram {
      Some(ram) => ram[offset],
      None => self.cart.chr_rom()[offset],
    }
  }

  fn write_chr(&mut self, addr: Address, value: Byte) {
    if addr >= 0x2000 {
      return;
    }
    let window = (addr >> 10) as usize;
    let offset = self.chr_banks[window] + (addr & 0x3FF) as usize;
    if let Some(ram) = &mut self.character_ram {
      ram[offset] = value;
    }
  }

  fn has_extended_ram(&self) -> bool {
    self.cart.has_extended_ram()
  }

  fn name_table_mirroring(&self) -> NameTableMirroring {
    self.mirroring
  }

  fn on_scanline(&mut self) {
    if self.irq_counter == 0 || self.irq_reload_pending {
      self.irq_counter = self.irq_latch;
      self.irq_reload_pending = false;
    } else {
      self.irq_counter -= 1;
      if self.irq_counter == 0 && self.irq_enable {
        (self.irq_cb)();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::test_support::build_ines;
  use std::cell::Cell;
  use std::rc::Rc;

  fn make_tx_rom(irq_count: Rc<Cell<u32>>) -> TxRom {
    let data = build_ines(4, 1, 4, 0, |prg| {
      for bank in 0..8 {
        prg[bank * 0x2000] = bank as u8;
      }
    });
    let cart = Cartridge::load_from_data(&data).unwrap();
    TxRom::new(
      cart,
      Box::new(|_| {}),
      Box::new(move || irq_count.set(irq_count.get() + 1)),
    )
  }

  #[test]
  fn power_on_maps_the_last_banks() {
    let rom = make_tx_rom(Rc::new(Cell::new(0)));
    // 4 x 16KB = 8 x 8KB banks, the last two fixed at 0xC000/0xE000.
    assert_eq!(rom.read_prg(0xC000), 6);
    assert_eq!(rom.read_prg(0xE000), 7);
  }

  #[test]
  fn prg_bank_select_round_trips() {
    let mut rom = make_tx_rom(Rc::new(Cell::new(0)));
    for v in 0..8u8 {
      rom.write_prg(0x8000, 6); // select register R6
      rom.write_prg(0x8001, v); // bank data
      assert_eq!(rom.read_prg(0x8000), v % 8);
    }
  }

  #[test]
  fn prg_ram_is_readable_and_writable() {
    let mut rom = make_tx_rom(Rc::new(Cell::new(0)));
    rom.write_prg(0x6123, 0x5A);
    assert_eq!(rom.read_prg(0x6123), 0x5A);
  }

  #[test]
  fn scanline_counter_fires_irq_after_latch_expires() {
    let fired = Rc::new(Cell::new(0u32));
    let mut rom = make_tx_rom(fired.clone());
    rom.write_prg(0xC000, 3); // latch
    rom.write_prg(0xC001, 0); // reload
    rom.write_prg(0xE001, 0); // enable
    for _ in 0..4 {
      rom.on_scanline();
    }
    assert_eq!(fired.get(), 1);
  }

  #[test]
  fn disabled_counter_stays_silent() {
    let fired = Rc::new(Cell::new(0u32));
    let mut rom = make_tx_rom(fired.clone());
    rom.write_prg(0xC000, 1);
    rom.write_prg(0xC001, 0);
    rom.write_prg(0xE000, 0); // disable
    for _ in 0..8 {
      rom.on_scanline();
    }
    assert_eq!(fired.get(), 0);
  }
}
