use num_enum::{FromPrimitive, IntoPrimitive};
use std::cell::RefCell;
use std::rc::Rc;

use crate::cartridge::Cartridge;
use crate::common::Byte;
use crate::error::CoreError;
use crate::mapper::cn_rom::CnRom;
use crate::mapper::n_rom::NRom;
use crate::mapper::tx_rom::TxRom;
use crate::mapper::ux_rom::UxRom;
use crate::mapper::Mapper;

type MapperType = u8;
pub(crate) const NROM: MapperType = 0;
pub(crate) const UXROM: MapperType = 2;
pub(crate) const CNROM: MapperType = 3;
pub(crate) const TXROM: MapperType = 4;

/// Invoked when a mapper rewires its name-table mirroring at run time.
pub type MirrorCallback = Box<dyn FnMut(NameTableMirroring)>;
/// Invoked when an IRQ-capable mapper's counter expires.
pub type IrqCallback = Box<dyn FnMut()>;

#[derive(Default, Debug, Clone, Copy, IntoPrimitive, FromPrimitive, PartialEq, Eq)]
#[repr(u8)]
pub enum NameTableMirroring {
  #[default]
  Horizontal = 0,
  Vertical = 1,
  FourScreen = 8,
  OneScreenLower = 9,
  OneScreenHigher = 10,
}

pub fn create_mapper(
  cartridge: Cartridge,
  mirror_cb: MirrorCallback,
  irq_cb: IrqCallback,
) -> Result<Rc<RefCell<dyn Mapper>>, CoreError> {
  let mapper_type = cartridge.mapper_number();
  let mapper: Rc<RefCell<dyn Mapper>> = match mapper_type {
    NROM => Rc::new(RefCell::new(NRom::new(cartridge))),
    UXROM => Rc::new(RefCell::new(UxRom::new(cartridge))),
    CNROM => Rc::new(RefCell::new(CnRom::new(cartridge))),
    TXROM => Rc::new(RefCell::new(TxRom::new(cartridge, mirror_cb, irq_cb))),
    _ => return Err(CoreError::UnsupportedMapper(mapper_type)),
  };
  Ok(mapper)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::test_support::build_ines;

  fn noop_callbacks() -> (MirrorCallback, IrqCallback) {
    (Box::new(|_| {}), Box::new(|| {}))
  }

  #[test]
  fn rejects_unknown_mapper_ids() {
    let data = build_ines(1, 1, 7, 0, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    let (mirror_cb, irq_cb) = noop_callbacks();
    assert!(matches!(
      create_mapper(cart, mirror_cb, irq_cb),
      Err(CoreError::UnsupportedMapper(7))
    ));
  }

  #[test]
  fn builds_each_supported_variant() {
    for id in [NROM, UXROM, CNROM, TXROM] {
      let data = build_ines(2, 1, id, 0, |_| {});
      let cart = Cartridge::load_from_data(&data).unwrap();
      let (mirror_cb, irq_cb) = noop_callbacks();
      assert!(create_mapper(cart, mirror_cb, irq_cb).is_ok());
    }
  }
}
