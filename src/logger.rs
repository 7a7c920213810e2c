use log::{Level, LevelFilter, Metadata, SetLoggerError};

struct SimpleLogger {
  level: Level,
}

impl log::Log for SimpleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, rec: &log::Record) {
    if !self.enabled(rec.metadata()) {
      return;
    }
    println!(
      "[{}] {}:{} {}",
      rec.level(),
      rec.file().unwrap_or("unknown file"),
      rec.line().unwrap_or(0),
      rec.args()
    );
  }

  fn flush(&self) {}
}

pub fn init() -> Result<(), SetLoggerError> {
  let logger = SimpleLogger { level: Level::Info };
  log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(LevelFilter::Info))
}
