use log::info;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::bus::main_bus::MainBus;
use crate::bus::message_bus::{Message, MessageBus};
use crate::bus::picture_bus::PictureBus;
use crate::cartridge::Cartridge;
use crate::controller::InputSource;
use crate::cpu::Cpu;
use crate::error::CoreError;
use crate::mapper::factory::create_mapper;
use crate::mapper::Mapper;
use crate::ppu::Ppu;

/// A fully wired machine: CPU, PPU, buses and the mapper, sharing one
/// message queue. Construction fails cleanly on a bad image; afterwards
/// only an illegal opcode can stop it.
pub struct Console {
  cpu: Cpu,
  ppu: Rc<RefCell<Ppu>>,
  mapper: Rc<RefCell<dyn Mapper>>,
  message_bus: Rc<RefCell<MessageBus>>,
}

impl Console {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
    let cartridge = Cartridge::load_from_file(path)?;
    Self::with_cartridge(cartridge)
  }

  pub fn with_cartridge(cartridge: Cartridge) -> Result<Self, CoreError> {
    let message_bus = Rc::new(RefCell::new(MessageBus::new()));

    // The mapper reports mirroring rewires and IRQs through the queue,
    // so it never needs a direct handle on the PPU or CPU.
    let mirror_bus = message_bus.clone();
    let irq_bus = message_bus.clone();
    let mapper = create_mapper(
      cartridge,
      Box::new(move |mode| {
        mirror_bus
          .borrow_mut()
          .push(Message::MirroringChanged(mode))
      }),
      Box::new(move || irq_bus.borrow_mut().push(Message::MapperIrq)),
    )?;

    let mut pic_bus = PictureBus::new();
    pic_bus.set_mapper(mapper.clone());
    let ppu = Rc::new(RefCell::new(Ppu::new(pic_bus, message_bus.clone())));

    let mut main_bus = MainBus::new(ppu.clone());
    main_bus.set_mapper(mapper.clone());

    let mut cpu = Cpu::new(main_bus);
    cpu.reset();
    info!("console powered up");

    Ok(Self {
      cpu,
      ppu,
      mapper,
      message_bus,
    })
  }

  pub fn set_input_sources(&mut self, p1: Box<dyn InputSource>, p2: Box<dyn InputSource>) {
    self.cpu.main_bus_mut().set_input_sources(p1, p2);
  }

  pub fn cpu_mut(&mut self) -> &mut Cpu {
    &mut self.cpu
  }

  pub fn ppu(&self) -> &Rc<RefCell<Ppu>> {
    &self.ppu
  }

  pub fn mapper(&self) -> &Rc<RefCell<dyn Mapper>> {
    &self.mapper
  }

  pub fn message_bus(&self) -> &Rc<RefCell<MessageBus>> {
    &self.message_bus
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::test_support::build_ines;

  #[test]
  fn boots_from_an_in_memory_image() {
    let data = build_ines(1, 1, 0, 0, |prg| {
      prg[0x0000] = 0xEA;
      prg[0x3FFC] = 0x00;
      prg[0x3FFD] = 0x80;
    });
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mut console = Console::with_cartridge(cart).unwrap();
    // The reset vector reaches the CPU through the whole bus stack and
    // the first fetch executes the NOP planted at 0x8000.
    assert_eq!(console.cpu_mut().step().unwrap(), 2);
  }

  #[test]
  fn refuses_an_unsupported_mapper() {
    let data = build_ines(1, 1, 11, 0, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    assert!(matches!(
      Console::with_cartridge(cart),
      Err(CoreError::UnsupportedMapper(11))
    ));
  }
}
