use std::collections::VecDeque;

use crate::mapper::factory::NameTableMirroring;
use crate::ppu::Frame;

/// Events the core raises while stepping: interrupt lines for the CPU,
/// mirroring rewires from the mapper and finished frames for the display
/// sink. Drained by the clock between steps, so nothing inside a step
/// ever blocks.
pub enum Message {
  CpuNmi,
  MapperIrq,
  MirroringChanged(NameTableMirroring),
  FrameReady(Frame),
}

#[derive(Default)]
pub struct MessageBus {
  queue: VecDeque<Message>,
}

impl MessageBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, msg: Message) {
    self.queue.push_back(msg);
  }

  pub fn pop(&mut self) -> Option<Message> {
    self.queue.pop_front()
  }
}
