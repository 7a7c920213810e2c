use num_enum::IntoPrimitive;

use crate::common::*;

/// Host-side input seam. The core asks for one snapshot byte per strobe;
/// how keys map onto buttons is the host's business.
pub trait InputSource {
  /// Current button states, one bit per `Button`, LSB = A.
  fn latch(&mut self) -> Byte;
}

/// Default source with nothing pressed.
pub struct NullInput;

impl InputSource for NullInput {
  fn latch(&mut self) -> Byte {
    0
  }
}

/// Bit positions in the snapshot byte, in shift-out order.
#[derive(Debug, Clone, Copy, IntoPrimitive)]
#[repr(u8)]
pub enum Button {
  A = 0,
  B,
  Select,
  Start,
  Up,
  Down,
  Left,
  Right,
}

impl Button {
  pub fn mask(self) -> Byte {
    1 << u8::from(self)
  }
}

/// The joypad shift register behind $4016/$4017. A strobe write reloads
/// it from the input source; each read shifts one bit out, LSB first,
/// and exhausted reads return 1. Bit 6 rides along on every read the way
/// the open bus leaves it on real hardware.
pub struct Controller {
  strobe: bool,
  snapshot: Byte,
  read_count: u8,
  source: Box<dyn InputSource>,
}

impl Default for Controller {
  fn default() -> Self {
    Self::new(Box::new(NullInput))
  }
}

impl Controller {
  pub fn new(source: Box<dyn InputSource>) -> Self {
    Self {
      strobe: false,
      snapshot: 0,
      read_count: 0,
      source,
    }
  }

  pub fn strobe(&mut self, value: Byte) {
    let high = bit_eq(value, 1);
    if self.strobe && !high {
      // Falling edge latches the snapshot and restarts the shift-out.
      self.snapshot = self.source.latch();
      self.read_count = 0;
    }
    self.strobe = high;
  }

  pub fn read(&mut self) -> Byte {
    if self.strobe {
      // While the strobe is held the A button is re-latched every read.
      return 0x40 | (self.source.latch() & 1);
    }
    if self.read_count >= 8 {
      return 0x41;
    }
    let bit = (self.snapshot >> self.read_count) & 1;
    self.read_count += 1;
    0x40 | bit
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct FixedInput(Byte);

  impl InputSource for FixedInput {
    fn latch(&mut self) -> Byte {
      self.0
    }
  }

  #[test]
  fn shifts_out_lsb_first_then_ones() {
    let pressed = Button::A.mask() | Button::Start.mask() | Button::Right.mask();
    let mut pad = Controller::new(Box::new(FixedInput(pressed)));
    pad.strobe(1);
    pad.strobe(0);
    let bits: Vec<Byte> = (0..8).map(|_| pad.read() & 1).collect();
    assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1]);
    // Exhausted reads are constant 1 until the next strobe.
    assert_eq!(pad.read(), 0x41);
    assert_eq!(pad.read(), 0x41);
  }

  #[test]
  fn strobe_high_repeats_the_a_button() {
    let mut pad = Controller::new(Box::new(FixedInput(Button::A.mask())));
    pad.strobe(1);
    assert_eq!(pad.read() & 1, 1);
    assert_eq!(pad.read() & 1, 1);
  }

  #[test]
  fn restrobe_restarts_the_sequence() {
    let mut pad = Controller::new(Box::new(FixedInput(Button::B.mask())));
    pad.strobe(1);
    pad.strobe(0);
    for _ in 0..8 {
      pad.read();
    }
    pad.strobe(1);
    pad.strobe(0);
    assert_eq!(pad.read() & 1, 0); // A
    assert_eq!(pad.read() & 1, 1); // B
  }
}
