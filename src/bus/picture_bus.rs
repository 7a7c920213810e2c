use log::info;
use std::cell::RefCell;
use std::rc::Rc;

use crate::common::*;
use crate::mapper::factory::NameTableMirroring;
use crate::mapper::Mapper;

/// The PPU's 14-bit address space: pattern tables behind the mapper,
/// name tables through the mirroring map, palette RAM on top.
pub struct PictureBus {
  // 4KB so four-screen boards get four distinct tables.
  ram: Vec<Byte>,
  // Byte offsets into `ram` for the four logical name tables.
  name_tables: [usize; 4],
  palette: [Byte; 0x20],
  mapper: Option<Rc<RefCell<dyn Mapper>>>,
}

impl PictureBus {
  pub fn new() -> Self {
    Self {
      ram: vec![0; 0x1000],
      name_tables: [0; 4],
      palette: [0; 0x20],
      mapper: None,
    }
  }

  pub fn set_mapper(&mut self, mapper: Rc<RefCell<dyn Mapper>>) {
    self.mapper = Some(mapper);
    let mode = self.mapper.as_ref().unwrap().borrow().name_table_mirroring();
    self.update_mirroring(mode);
  }

  pub fn update_mirroring(&mut self, mode: NameTableMirroring) {
    self.name_tables = match mode {
      NameTableMirroring::Horizontal => [0, 0, 0x400, 0x400],
      NameTableMirroring::Vertical => [0, 0x400, 0, 0x400],
      NameTableMirroring::OneScreenLower => [0, 0, 0, 0],
      NameTableMirroring::OneScreenHigher => [0x400, 0x400, 0x400, 0x400],
      NameTableMirroring::FourScreen => [0, 0x400, 0x800, 0xC00],
    };
    info!("name table mirroring set to {:?}", mode);
  }

  fn name_table_index(&self, addr: Address) -> usize {
    let table = ((addr >> 10) & 0x3) as usize;
    self.name_tables[table] + (addr & 0x3FF) as usize
  }

  /// The backdrop entries $3F10/$3F14/$3F18/$3F1C alias $3F00/$3F04/...
  fn palette_index(addr: Address) -> usize {
    let index = (addr & 0x1F) as usize;
    if index >= 0x10 && index % 4 == 0 {
      index - 0x10
    } else {
      index
    }
  }

  pub fn read(&self, addr: Address) -> Byte {
    let addr = addr & 0x3FFF;
    if addr < 0x2000 {
      self.mapper.as_ref().unwrap().borrow().read_chr(addr)
    } else if addr < 0x3F00 {
      self.ram[self.name_table_index(addr)]
    } else {
      self.palette[Self::palette_index(addr)]
    }
  }

  pub fn write(&mut self, addr: Address, value: Byte) {
    let addr = addr & 0x3FFF;
    if addr < 0x2000 {
      self
        .mapper
        .as_ref()
        .unwrap()
        .borrow_mut()
        .write_chr(addr, value);
    } else if addr < 0x3F00 {
      let idx = self.name_table_index(addr);
      self.ram[idx] = value;
    } else {
      self.palette[Self::palette_index(addr)] = value;
    }
  }

  pub fn read_palette(&self, palette_addr: Byte) -> Byte {
    self.palette[Self::palette_index(palette_addr as Address)]
  }
}
