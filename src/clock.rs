use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bus::message_bus::Message;
use crate::console::Console;
use crate::cpu::InterruptType;
use crate::error::CoreError;
use crate::ppu::Frame;

// NTSC frame cadence, 60.0988 Hz.
const FRAME_PERIOD: Duration = Duration::from_nanos(16_639_263);

// The mapper's scanline hook fires once per rendered line, at the dot
// where MMC3 boards clock their counter.
const SCANLINE_NOTCH_DOT: usize = 260;

/// Receives finished frames. The core hands each frame off by value, so
/// a sink may keep it without blocking the next one.
pub trait DisplaySink {
  fn display(&mut self, frame: Frame);
}

/// Drives the whole machine at the fixed 1:3 CPU-to-PPU ratio: one CPU
/// instruction, then three PPU dots per CPU cycle, then the message
/// queue. The stop flag is only polled between frames, so a frame is
/// never torn.
pub struct Clock {
  stop: Arc<AtomicBool>,
}

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  pub fn new() -> Self {
    Self {
      stop: Arc::new(AtomicBool::new(false)),
    }
  }

  /// A handle another thread (or a sink) may set to end `run`.
  pub fn stop_handle(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }

  /// Runs frames at the NTSC cadence until the stop flag is raised or
  /// the CPU halts on an illegal opcode.
  pub fn run(&self, console: &mut Console, sink: &mut dyn DisplaySink) -> Result<(), CoreError> {
    while !self.stop.load(Ordering::Relaxed) {
      let deadline = Instant::now() + FRAME_PERIOD;
      self.run_frame(console, sink)?;
      if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
        std::thread::sleep(wait);
      }
    }
    Ok(())
  }

  /// Advances the machine until exactly one frame has been delivered.
  pub fn run_frame(
    &self,
    console: &mut Console,
    sink: &mut dyn DisplaySink,
  ) -> Result<(), CoreError> {
    loop {
      let cycles = console.cpu_mut().step()?;
      {
        let mut ppu = console.ppu().borrow_mut();
        for _ in 0..cycles * 3 {
          ppu.step();
          if ppu.dot() == SCANLINE_NOTCH_DOT
            && ppu.rendering_enabled()
            && (ppu.scanline() < 240 || ppu.scanline() == 261)
          {
            console.mapper().borrow_mut().on_scanline();
          }
        }
      }

      let mut frame_done = false;
      let message_bus = console.message_bus().clone();
      loop {
        let msg = message_bus.borrow_mut().pop();
        let Some(msg) = msg else { break };
        match msg {
          Message::CpuNmi => console.cpu_mut().trigger_interrupt(InterruptType::Nmi),
          Message::MapperIrq => console.cpu_mut().trigger_interrupt(InterruptType::Irq),
          Message::MirroringChanged(mode) => console.ppu().borrow_mut().update_mirroring(mode),
          Message::FrameReady(frame) => {
            sink.display(frame);
            frame_done = true;
          }
        }
      }
      if frame_done {
        return Ok(());
      }
    }
  }
}
