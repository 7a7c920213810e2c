pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod common;
pub mod console;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod logger;
pub mod mapper;
pub mod ppu;

pub use crate::clock::{Clock, DisplaySink};
pub use crate::console::Console;
pub use crate::error::CoreError;
pub use crate::ppu::Frame;
