use log::{error, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::common::*;
use crate::controller::{Controller, InputSource};
use crate::mapper::Mapper;
use crate::ppu::Ppu;

type IORegister = u16;

pub const PPU_CTRL: IORegister = 0x2000;
pub const PPU_MASK: IORegister = 0x2001;
pub const PPU_STATUS: IORegister = 0x2002;
pub const OAM_ADDR: IORegister = 0x2003;
pub const OAM_DATA: IORegister = 0x2004;
pub const PPU_SCROL: IORegister = 0x2005;
pub const PPU_ADDR: IORegister = 0x2006;
pub const PPU_DATA: IORegister = 0x2007;
pub const OAM_DMA: IORegister = 0x4014;
pub const JOY1: IORegister = 0x4016;
pub const JOY2: IORegister = 0x4017;

/// The CPU's view of the machine: 2KB RAM mirrored to 0x2000, the PPU
/// registers mirrored every 8 bytes up to 0x4000, the I/O block, optional
/// cartridge RAM and finally PRG through the mapper.
pub struct MainBus {
  ram: Vec<Byte>,
  ext_ram: Vec<Byte>,
  mapper: Option<Rc<RefCell<dyn Mapper>>>,
  ppu: Rc<RefCell<Ppu>>,
  control1: Controller,
  control2: Controller,

  // Last value seen on the bus; unmapped reads return it.
  open_bus: Byte,
  skip_dma_cycles: bool,
}

impl MainBus {
  pub fn new(ppu: Rc<RefCell<Ppu>>) -> Self {
    Self {
      ram: vec![0; 0x800],
      ext_ram: vec![],
      mapper: None,
      ppu,
      control1: Controller::default(),
      control2: Controller::default(),

      open_bus: 0,
      skip_dma_cycles: false,
    }
  }

  pub fn set_mapper(&mut self, mapper: Rc<RefCell<dyn Mapper>>) {
    self.mapper = Some(mapper);
    if self.mapper.as_ref().unwrap().borrow().has_extended_ram() {
      self.ext_ram.resize(0x2000, 0);
    }
  }

  pub fn set_input_sources(&mut self, p1: Box<dyn InputSource>, p2: Box<dyn InputSource>) {
    self.control1 = Controller::new(p1);
    self.control2 = Controller::new(p2);
  }

  /// True once after each OAM DMA; the CPU turns it into stall cycles.
  pub fn check_and_reset_dma(&mut self) -> bool {
    let ret = self.skip_dma_cycles;
    self.skip_dma_cycles = false;
    ret
  }

  pub fn write(&mut self, addr: Address, value: Byte) {
    self.open_bus = value;
    if addr < 0x2000 {
      self.ram[(addr & 0x7FF) as usize] = value;
    } else if addr < 0x4020 {
      let mapped_addr = if addr < 0x4000 {
        // PPU registers, mirrored
        addr & PPU_DATA
      } else {
        addr
      };
      match mapped_addr {
        PPU_CTRL => self.ppu.borrow_mut().control(value),
        PPU_MASK => self.ppu.borrow_mut().set_mask(value),
        OAM_ADDR => self.ppu.borrow_mut().set_oam_address(value),
        OAM_DATA => self.ppu.borrow_mut().set_oam_data(value),
        PPU_SCROL => self.ppu.borrow_mut().set_scroll(value),
        PPU_ADDR => self.ppu.borrow_mut().set_data_address(value),
        PPU_DATA => self.ppu.borrow_mut().set_data(value),
        JOY1 => {
          self.control1.strobe(value);
          self.control2.strobe(value);
        }
        OAM_DMA => {
          if let Some(page) = self.copy_page(value) {
            self.skip_dma_cycles = true;
            self.ppu.borrow_mut().do_dma(&page);
          }
        }
        // The APU block is not modelled.
        _ => {}
      }
    } else if addr < 0x6000 {
      warn!("expansion ROM write attempted at {:#06x}", addr);
    } else if addr < 0x8000 {
      if !self.ext_ram.is_empty() {
        self.ext_ram[(addr - 0x6000) as usize] = value;
      }
    } else {
      self
        .mapper
        .as_ref()
        .unwrap()
        .borrow_mut()
        .write_prg(addr, value);
    }
  }

  pub fn read(&mut self, addr: Address) -> Byte {
    let value = if addr < 0x2000 {
      self.ram[(addr & 0x7FF) as usize]
    } else if addr < 0x4020 {
      let mapped_addr = if addr < 0x4000 {
        // PPU registers, mirrored
        addr & PPU_DATA
      } else {
        addr
      };
      match mapped_addr {
        PPU_STATUS => self.ppu.borrow_mut().get_status(),
        OAM_DATA => self.ppu.borrow().get_oam_data(),
        PPU_DATA => self.ppu.borrow_mut().get_data(),
        JOY1 => self.control1.read(),
        JOY2 => self.control2.read(),
        _ => {
          warn!("read from write-only register {:#06x}", addr);
          self.open_bus
        }
      }
    } else if addr < 0x6000 {
      warn!("expansion ROM read attempted at {:#06x}", addr);
      self.open_bus
    } else if addr < 0x8000 {
      if self.ext_ram.is_empty() {
        self.open_bus
      } else {
        self.ext_ram[(addr - 0x6000) as usize]
      }
    } else {
      self.mapper.as_ref().unwrap().borrow().read_prg(addr)
    };
    self.open_bus = value;
    value
  }

  pub fn read_addr(&mut self, addr: Address) -> Address {
    self.read(addr) as Address
  }

  /// Snapshots a 256-byte CPU page for OAM DMA. Pages over the register
  /// file cannot be read without side effects and are rejected.
  fn copy_page(&self, page: Byte) -> Option<[Byte; 256]> {
    let base = (page as usize) << 8;
    let mut out = [0; 256];
    if base < 0x2000 {
      let base = base & 0x7FF;
      out.copy_from_slice(&self.ram[base..base + 256]);
    } else if base >= 0x6000 && base < 0x8000 && !self.ext_ram.is_empty() {
      let base = base - 0x6000;
      out.copy_from_slice(&self.ext_ram[base..base + 256]);
    } else if base >= 0x8000 {
      let mapper = self.mapper.as_ref().unwrap().borrow();
      for (i, value) in out.iter_mut().enumerate() {
        *value = mapper.read_prg((base + i) as Address);
      }
    } else {
      error!("OAM DMA from unreadable page {:#04x}", page);
      return None;
    }
    Some(out)
  }
}
