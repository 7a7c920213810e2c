use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use famicore::clock::{Clock, DisplaySink};
use famicore::console::Console;
use famicore::logger;
use famicore::ppu::Frame;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
  #[clap(short, long)]
  rom_path: PathBuf,

  /// Stop after this many frames instead of running until interrupted.
  #[clap(short, long)]
  frames: Option<u64>,
}

/// Headless sink: counts frames, reports the pace, and raises the stop
/// flag once the requested frame budget is spent.
struct HeadlessSink {
  rendered: u64,
  limit: Option<u64>,
  stop: Arc<AtomicBool>,
  window_start: Instant,
}

impl DisplaySink for HeadlessSink {
  fn display(&mut self, _frame: Frame) {
    self.rendered += 1;
    if self.rendered % 60 == 0 {
      info!(
        "{} frames rendered, last 60 took {:.1?}",
        self.rendered,
        self.window_start.elapsed()
      );
      self.window_start = Instant::now();
    }
    if let Some(limit) = self.limit {
      if self.rendered >= limit {
        self.stop.store(true, Ordering::Relaxed);
      }
    }
  }
}

fn main() -> Result<()> {
  logger::init()?;
  let args = Args::parse();

  let mut console = Console::load(&args.rom_path)?;
  let clock = Clock::new();
  let mut sink = HeadlessSink {
    rendered: 0,
    limit: args.frames,
    stop: clock.stop_handle(),
    window_start: Instant::now(),
  };
  clock.run(&mut console, &mut sink)?;
  info!("stopped after {} frames", sink.rendered);
  Ok(())
}
