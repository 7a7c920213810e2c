use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

pub mod palette;

use crate::bus::message_bus::{Message, MessageBus};
use crate::bus::picture_bus::PictureBus;
use crate::common::*;
use crate::mapper::factory::NameTableMirroring;

pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;

pub const DOTS_PER_SCANLINE: usize = 341;
pub const SCANLINES_PER_FRAME: usize = 262;
const VISIBLE_SCANLINES: usize = 240;
const VBLANK_SCANLINE: usize = 241;
const PRE_RENDER_SCANLINE: usize = 261;

/// One finished picture, row major, one palette index per pixel. A
/// display sink resolves indices through `palette::PALETTE`.
#[derive(Clone)]
pub struct Frame {
  pixels: Box<[Byte]>,
}

impl Default for Frame {
  fn default() -> Self {
    Self {
      pixels: vec![0; FRAME_WIDTH * FRAME_HEIGHT].into_boxed_slice(),
    }
  }
}

impl Frame {
  pub fn pixel(&self, x: usize, y: usize) -> Byte {
    self.pixels[y * FRAME_WIDTH + x]
  }

  fn set_pixel(&mut self, x: usize, y: usize, index: Byte) {
    self.pixels[y * FRAME_WIDTH + x] = index;
  }

  pub fn pixels(&self) -> &[Byte] {
    &self.pixels
  }
}

#[derive(Copy, Clone, PartialEq)]
enum CharacterPage {
  Low,
  High,
}

// pixel processing unit
pub struct Ppu {
  bus: PictureBus,
  sprite_memory: [Byte; 64 * 4],
  scanline_sprites: Vec<Byte>,

  dot: usize,
  scanline: usize,

  vblank: bool,
  sprite_zero_hit: bool,
  sprite_overflow: bool,

  // Registers
  data_address: Address,
  temp_address: Address,
  fine_x_scroll: Byte,
  first_write: bool,
  data_buffer: Byte,

  sprite_data_address: usize,

  // Setup flags and variables
  long_sprites: bool,
  generate_interrupt: bool,

  grey_scale_mode: bool,
  show_sprites: bool,
  show_background: bool,
  hide_edge_sprites: bool,
  hide_edge_background: bool,

  background_page: CharacterPage,
  sprite_page: CharacterPage,

  data_address_increment: Address,

  frame: Frame,
  message_bus: Rc<RefCell<MessageBus>>,
}

impl Ppu {
  pub fn new(pic_bus: PictureBus, message_bus: Rc<RefCell<MessageBus>>) -> Self {
    Self {
      bus: pic_bus,
      sprite_memory: [0; 64 * 4],
      scanline_sprites: vec![],

      dot: 0,
      scanline: 0,

      vblank: false,
      sprite_zero_hit: false,
      sprite_overflow: false,

      data_address: 0,
      temp_address: 0,
      fine_x_scroll: 0,
      first_write: true,
      data_buffer: 0,

      sprite_data_address: 0,

      long_sprites: false,
      generate_interrupt: false,

      grey_scale_mode: false,
      show_sprites: false,
      show_background: false,
      hide_edge_sprites: true,
      hide_edge_background: true,

      background_page: CharacterPage::Low,
      sprite_page: CharacterPage::Low,

      data_address_increment: 1,

      frame: Frame::default(),
      message_bus,
    }
  }

  pub fn update_mirroring(&mut self, mode: NameTableMirroring) {
    self.bus.update_mirroring(mode);
  }

  pub fn dot(&self) -> usize {
    self.dot
  }

  pub fn scanline(&self) -> usize {
    self.scanline
  }

  pub fn rendering_enabled(&self) -> bool {
    self.show_background || self.show_sprites
  }

  /// Advances the pipeline by one dot. Every frame is exactly
  /// 341 x 262 dots; there is no shortened odd frame.
  pub fn step(&mut self) {
    match self.scanline {
      s if s < VISIBLE_SCANLINES => self.visible_scanline(),
      VISIBLE_SCANLINES => self.post_render(),
      PRE_RENDER_SCANLINE => self.pre_render(),
      _ => self.vertical_blank(),
    }

    self.dot += 1;
    if self.dot == DOTS_PER_SCANLINE {
      self.dot = 0;
      self.scanline += 1;
      if self.scanline == SCANLINES_PER_FRAME {
        self.scanline = 0;
      }
    }
  }

  fn visible_scanline(&mut self) {
    if self.dot >= 1 && self.dot <= FRAME_WIDTH {
      self.render_pixel();
    } else if self.dot == FRAME_WIDTH + 1 {
      if self.show_background {
        self.increment_vertical();
      }
    } else if self.dot == FRAME_WIDTH + 2 {
      if self.rendering_enabled() {
        // Copy bits related to horizontal position
        self.data_address &= !0x041F;
        self.data_address |= self.temp_address & 0x041F;
      }
    } else if self.dot == DOTS_PER_SCANLINE - 1 {
      self.evaluate_sprites();
    }
  }

  fn post_render(&mut self) {
    if self.dot == DOTS_PER_SCANLINE - 1 {
      // The picture is complete; hand it off and start a fresh buffer.
      let frame = mem::take(&mut self.frame);
      self.message_bus.borrow_mut().push(Message::FrameReady(frame));
    }
  }

  fn vertical_blank(&mut self) {
    if self.scanline == VBLANK_SCANLINE && self.dot == 1 {
      self.vblank = true;
      if self.generate_interrupt {
        self.message_bus.borrow_mut().push(Message::CpuNmi);
      }
    }
  }

  fn pre_render(&mut self) {
    if self.dot == 1 {
      self.vblank = false;
      self.sprite_zero_hit = false;
      self.sprite_overflow = false;
    } else if self.rendering_enabled() {
      if self.dot == FRAME_WIDTH + 2 {
        // Copy bits related to horizontal position
        self.data_address &= !0x041F;
        self.data_address |= self.temp_address & 0x041F;
      } else if self.dot > 280 && self.dot <= 304 {
        // Copy bits related to vertical position
        self.data_address &= !0x7BE0;
        self.data_address |= self.temp_address & 0x7BE0;
      }
    }
    if self.dot == DOTS_PER_SCANLINE - 1 {
      // OAM y holds the line above the sprite top, so no sprite can
      // land on line 0; the previous frame's selection must not either.
      self.scanline_sprites.clear();
    }
  }

  /// Indexes the sprites overlapping the next scanline, at most eight.
  /// A ninth candidate only raises the overflow flag.
  fn evaluate_sprites(&mut self) {
    self.scanline_sprites.clear();
    let range = if self.long_sprites { 16 } else { 8 };

    for i in self.sprite_data_address / 4..64 {
      let diff = self.scanline.overflowing_sub(self.sprite_memory[i * 4] as usize);
      if diff.1 || diff.0 >= range {
        continue;
      }
      if self.scanline_sprites.len() >= 8 {
        self.sprite_overflow = true;
        break;
      }
      self.scanline_sprites.push(i as Byte);
    }
  }

  fn render_pixel(&mut self) {
    let mut bg_color = 0;
    let mut spr_color = 0;
    let mut bg_opaque = false;
    let mut spr_opaque = false;
    let mut sprite_foreground = false;

    let x = (self.dot - 1) as u8;
    let y = self.scanline;

    if self.show_background {
      let x_fine = (self.fine_x_scroll + x % 8) % 8;
      if !self.hide_edge_background || x >= 8 {
        // Fetch tile
        let mut addr = 0x2000 | (self.data_address & 0x0FFF);
        let tile = self.bus.read(addr) as Address;

        // Fetch pattern; each one occupies 16 bytes, fine y picks the row
        addr = tile * 16 + ((self.data_address >> 12) & 0x7);
        addr |= (self.background_page as Address) << 12;
        // Bit (7 - x_fine) of the two planes gives the low color bits
        bg_color = (self.bus.read(addr) >> (7 ^ x_fine)) & 1;
        bg_color |= ((self.bus.read(addr + 8) >> (7 ^ x_fine)) & 1) << 1;

        bg_opaque = bg_color != 0;

        // Fetch attribute for the upper two palette bits
        addr = 0x23C0
          | (self.data_address & 0x0C00)
          | ((self.data_address >> 4) & 0x38)
          | ((self.data_address >> 2) & 0x07);
        let attribute = self.bus.read(addr);
        let shift = ((self.data_address >> 4) & 4) | (self.data_address & 2);
        bg_color |= ((attribute >> shift) & 0x3) << 2;
      }
      // Increment/wrap coarse X
      if x_fine == 7 {
        if self.data_address & 0x1F == 31 {
          self.data_address &= !0x1F;
          // Switch horizontal name table
          self.data_address ^= 0x0400;
        } else {
          self.data_address += 1;
        }
      }
    }

    if self.show_sprites && (!self.hide_edge_sprites || x >= 8) {
      for i in &self.scanline_sprites {
        let idx = (i * 4) as usize;
        let spr_x = self.sprite_memory[idx + 3];
        let diff_x = x.overflowing_sub(spr_x);
        if diff_x.1 || diff_x.0 >= 8 {
          continue;
        }

        // OAM stores the line above the top row.
        let spr_y = self.sprite_memory[idx] as usize + 1;
        let tile = self.sprite_memory[idx + 1] as Address;
        let attribute = self.sprite_memory[idx + 2];

        let length = if self.long_sprites { 16 } else { 8 };
        // The selection is a line old; re-check the vertical range the
        // same way the horizontal one is checked above.
        let diff_y = y.overflowing_sub(spr_y);
        if diff_y.1 || diff_y.0 >= length {
          continue;
        }
        let mut x_shift = diff_x.0;
        let mut y_offset = diff_y.0;

        if !bit_eq(attribute, 0x40) {
          // Not flipped horizontally
          x_shift ^= 7;
        }
        if bit_eq(attribute, 0x80) {
          // Flipped vertically
          y_offset ^= length - 1;
        }

        let mut addr: Address;
        if !self.long_sprites {
          addr = tile * 16 + y_offset as Address;
          if self.sprite_page == CharacterPage::High {
            addr += 0x1000;
          }
        } else {
          // 8x16 sprites: bit 3 of the offset selects the bottom tile,
          // bit 0 of the tile index selects the pattern bank
          y_offset = (y_offset & 7) | ((y_offset & 8) << 1);
          addr = (tile >> 1) * 32 + y_offset as Address;
          addr |= (tile & 1) << 12;
        }

        let color = ((self.bus.read(addr) >> x_shift) & 1)
          | (((self.bus.read(addr + 8) >> x_shift) & 1) << 1);
        if color == 0 {
          continue;
        }

        spr_color = 0x10 | ((attribute & 0x3) << 2) | color;
        spr_opaque = true;
        sprite_foreground = !bit_eq(attribute, 0x20);

        self.sprite_zero_hit |= self.show_background && *i == 0 && bg_opaque;
        break;
      }
    }

    let palette_addr = if spr_opaque && (!bg_opaque || sprite_foreground) {
      spr_color
    } else if bg_opaque {
      bg_color
    } else {
      0
    };
    let mut index = self.bus.read_palette(palette_addr) & 0x3F;
    if self.grey_scale_mode {
      index &= 0x30;
    }
    self.frame.set_pixel(x as usize, y, index);
  }

  fn increment_vertical(&mut self) {
    if !bit_eq(self.data_address, 0x7000) {
      // Increment fine Y
      self.data_address += 0x1000;
    } else {
      self.data_address &= !0x7000;
      let mut y = (self.data_address & 0x03E0) >> 5;
      if y == 29 {
        y = 0;
        // Switch vertical name table
        self.data_address ^= 0x0800;
      } else if y == 31 {
        y = 0;
      } else {
        y += 1;
      }
      self.data_address = (self.data_address & !0x03E0) | (y << 5);
    }
  }

  // 0x2002 PPUSTATUS
  pub fn get_status(&mut self) -> Byte {
    let status = ((self.sprite_overflow as Byte) << 5)
      | ((self.sprite_zero_hit as Byte) << 6)
      | ((self.vblank as Byte) << 7);
    self.vblank = false;
    self.first_write = true;
    status
  }

  // 0x2007 PPUDATA (read)
  pub fn get_data(&mut self) -> Byte {
    let addr = self.data_address & 0x3FFF;
    let mut data = self.bus.read(addr);
    self.data_address = self.data_address.wrapping_add(self.data_address_increment) & 0x7FFF;
    // Reads below the palette go through a one-byte buffer
    if addr < 0x3F00 {
      mem::swap(&mut self.data_buffer, &mut data);
    }
    data
  }

  // 0x2004 OAMDATA (read)
  pub fn get_oam_data(&self) -> Byte {
    self.sprite_memory[self.sprite_data_address]
  }

  // 0x2006 PPUADDR
  pub fn set_data_address(&mut self, addr: Byte) {
    let addr = addr as Address;
    if self.first_write {
      self.temp_address = (self.temp_address & 0x00FF) | ((addr & 0x3F) << 8);
    } else {
      self.temp_address = (self.temp_address & 0xFF00) | addr;
      self.data_address = self.temp_address;
    }
    self.first_write = !self.first_write;
  }

  // 0x2003 OAMADDR
  pub fn set_oam_address(&mut self, addr: Byte) {
    self.sprite_data_address = addr as usize;
  }

  // 0x2004 OAMDATA (write)
  pub fn set_oam_data(&mut self, value: Byte) {
    self.sprite_memory[self.sprite_data_address] = value;
    self.sprite_data_address = (self.sprite_data_address + 1) & 0xFF;
  }

  // 0x2007 PPUDATA (write)
  pub fn set_data(&mut self, value: Byte) {
    self.bus.write(self.data_address & 0x3FFF, value);
    self.data_address = self.data_address.wrapping_add(self.data_address_increment) & 0x7FFF;
  }

  // 0x2005 PPUSCROLL
  pub fn set_scroll(&mut self, scroll: Byte) {
    let scroll = scroll as Address;
    if self.first_write {
      self.temp_address &= !0x001F;
      self.temp_address |= (scroll >> 3) & 0x001F;
      self.fine_x_scroll = scroll as Byte & 0x7;
    } else {
      self.temp_address &= !0x73E0;
      self.temp_address |= ((scroll & 0x7) << 12) | ((scroll & 0xF8) << 2);
    }
    self.first_write = !self.first_write;
  }

  // 0x2001 PPUMASK
  pub fn set_mask(&mut self, mask: Byte) {
    self.grey_scale_mode = bit_eq(mask, 0x1);
    self.hide_edge_background = !bit_eq(mask, 0x2);
    self.hide_edge_sprites = !bit_eq(mask, 0x4);
    self.show_background = bit_eq(mask, 0x8);
    self.show_sprites = bit_eq(mask, 0x10);
  }

  // 0x2000 PPUCTRL
  pub fn control(&mut self, ctrl: Byte) {
    self.generate_interrupt = bit_eq(ctrl, 0x80);
    self.long_sprites = bit_eq(ctrl, 0x20);
    self.background_page = if bit_eq(ctrl, 0x10) {
      CharacterPage::High
    } else {
      CharacterPage::Low
    };
    self.sprite_page = if bit_eq(ctrl, 0x8) {
      CharacterPage::High
    } else {
      CharacterPage::Low
    };
    self.data_address_increment = if bit_eq(ctrl, 0x4) { 0x20 } else { 1 };
    // The name table bits land in the temp address and reach the data
    // address during rendering
    self.temp_address = (self.temp_address & !0xC00) | ((ctrl as Address & 0x3) << 10);
  }

  /// 0x4014 OAMDMA. Fills sprite memory from a CPU page, starting at the
  /// current OAM address and wrapping around.
  pub fn do_dma(&mut self, page: &[Byte]) {
    debug_assert_eq!(page.len(), 256);
    let start = self.sprite_data_address;
    for (i, value) in page.iter().enumerate() {
      self.sprite_memory[(start + i) & 0xFF] = *value;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::test_support::build_ines;
  use crate::cartridge::Cartridge;
  use crate::mapper::n_rom::NRom;

  fn make_ppu() -> (Ppu, Rc<RefCell<MessageBus>>) {
    // CHR-less NROM cartridge, so the pattern tables are writable RAM.
    let data = build_ines(1, 0, 0, 0, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mut bus = PictureBus::new();
    bus.set_mapper(Rc::new(RefCell::new(NRom::new(cart))));
    let message_bus = Rc::new(RefCell::new(MessageBus::new()));
    (Ppu::new(bus, message_bus.clone()), message_bus)
  }

  fn run_frame(ppu: &mut Ppu) {
    for _ in 0..DOTS_PER_SCANLINE * SCANLINES_PER_FRAME {
      ppu.step();
    }
  }

  // Runs through the whole visible region and the frame hand-off, but
  // stops short of the pre-render line so the status flags survive.
  fn run_visible_frame(ppu: &mut Ppu) {
    for _ in 0..DOTS_PER_SCANLINE * (VISIBLE_SCANLINES + 1) {
      ppu.step();
    }
  }

  fn drain(bus: &Rc<RefCell<MessageBus>>) -> Vec<Message> {
    let mut out = vec![];
    while let Some(msg) = bus.borrow_mut().pop() {
      out.push(msg);
    }
    out
  }

  /// Writes an all-ones plane-0 row set for tile 0, so every pixel of
  /// the tile has color 1, and sets distinct backdrop/bg/sprite colors.
  fn paint_tile_zero(ppu: &mut Ppu) {
    for row in 0..8 {
      ppu.set_data_address(0x00);
      ppu.set_data_address(row);
      ppu.set_data(0xFF);
    }
    for (entry, color) in [(0x00, 0x0F), (0x01, 0x21), (0x11, 0x16)] {
      ppu.set_data_address(0x3F);
      ppu.set_data_address(entry);
      ppu.set_data(color);
    }
  }

  #[test]
  fn one_frame_is_published_per_341_by_262_dots() {
    let (mut ppu, messages) = make_ppu();
    run_frame(&mut ppu);
    let frames = drain(&messages)
      .into_iter()
      .filter(|m| matches!(m, Message::FrameReady(_)))
      .count();
    assert_eq!(frames, 1);
    assert_eq!(ppu.scanline(), 0);
    assert_eq!(ppu.dot(), 0);

    // And with rendering enabled the cadence is identical.
    ppu.set_mask(0x1E);
    run_frame(&mut ppu);
    let frames = drain(&messages)
      .into_iter()
      .filter(|m| matches!(m, Message::FrameReady(_)))
      .count();
    assert_eq!(frames, 1);
    assert_eq!(ppu.scanline(), 0);
    assert_eq!(ppu.dot(), 0);
  }

  #[test]
  fn vblank_raises_one_nmi_per_frame_when_enabled() {
    let (mut ppu, messages) = make_ppu();
    ppu.control(0x80);
    run_frame(&mut ppu);
    let nmis = drain(&messages)
      .into_iter()
      .filter(|m| matches!(m, Message::CpuNmi))
      .count();
    assert_eq!(nmis, 1);
  }

  #[test]
  fn status_reports_and_clears_vblank() {
    let (mut ppu, _messages) = make_ppu();
    // Step to just past (241, 1).
    for _ in 0..DOTS_PER_SCANLINE * (VBLANK_SCANLINE + 1) {
      ppu.step();
    }
    assert!(bit_eq(ppu.get_status(), 0x80));
    assert!(!bit_eq(ppu.get_status(), 0x80));
  }

  #[test]
  fn sprite_behind_background_loses_to_opaque_pixels() {
    let (mut ppu, messages) = make_ppu();
    paint_tile_zero(&mut ppu);
    // Sprite 0 at (20, 10), tile 0, behind the background.
    for value in [9, 0, 0x20, 20] {
      ppu.set_oam_data(value);
    }
    ppu.set_oam_address(0);
    ppu.set_mask(0x1E);
    run_visible_frame(&mut ppu);

    let frame = drain(&messages)
      .into_iter()
      .find_map(|m| match m {
        Message::FrameReady(frame) => Some(frame),
        _ => None,
      })
      .unwrap();
    // The opaque background wins, but the overlap still flags sprite 0.
    assert_eq!(frame.pixel(20, 10), 0x21);
    assert!(bit_eq(ppu.get_status(), 0x40));
  }

  #[test]
  fn foreground_sprite_covers_the_background() {
    let (mut ppu, messages) = make_ppu();
    paint_tile_zero(&mut ppu);
    for value in [9, 0, 0x00, 20] {
      ppu.set_oam_data(value);
    }
    ppu.set_oam_address(0);
    ppu.set_mask(0x1E);
    run_visible_frame(&mut ppu);

    let frame = drain(&messages)
      .into_iter()
      .find_map(|m| match m {
        Message::FrameReady(frame) => Some(frame),
        _ => None,
      })
      .unwrap();
    assert_eq!(frame.pixel(20, 10), 0x16);
    // Just outside the sprite the background shows through.
    assert_eq!(frame.pixel(28, 10), 0x21);
  }

  #[test]
  fn bottom_edge_sprite_does_not_carry_into_the_next_frame() {
    let (mut ppu, messages) = make_ppu();
    paint_tile_zero(&mut ppu);
    // Sprite 0 hugging the bottom edge, clipped at scanline 239.
    for value in [233, 0, 0x00, 20] {
      ppu.set_oam_data(value);
    }
    ppu.set_oam_address(0);
    ppu.set_mask(0x1E);
    run_frame(&mut ppu);
    // The selection left over from the bottom rows must not reach the
    // first line of the next frame.
    for _ in 0..DOTS_PER_SCANLINE {
      ppu.step();
    }
    let frame = drain(&messages)
      .into_iter()
      .find_map(|m| match m {
        Message::FrameReady(frame) => Some(frame),
        _ => None,
      })
      .unwrap();
    assert_eq!(frame.pixel(20, 235), 0x16);
    assert_eq!(frame.pixel(20, 100), 0x21);
  }

  #[test]
  fn nine_sprites_on_a_line_set_the_overflow_flag() {
    let (mut ppu, _messages) = make_ppu();
    // Nine sprites all covering scanline 50.
    for i in 0..9 {
      ppu.set_oam_address(i * 4);
      ppu.set_oam_data(49);
    }
    ppu.set_oam_address(0);
    ppu.set_mask(0x1E);
    for _ in 0..DOTS_PER_SCANLINE * 60 {
      ppu.step();
    }
    assert!(bit_eq(ppu.get_status(), 0x20));
  }

  #[test]
  fn data_reads_are_buffered_below_the_palette() {
    let (mut ppu, _messages) = make_ppu();
    ppu.set_data_address(0x20);
    ppu.set_data_address(0x00);
    ppu.set_data(0xAB);
    ppu.set_data_address(0x20);
    ppu.set_data_address(0x00);
    // First read returns the stale buffer, the second the real byte.
    ppu.get_data();
    assert_eq!(ppu.get_data(), 0xAB);
  }

  #[test]
  fn oam_dma_wraps_around_the_current_address() {
    let (mut ppu, _messages) = make_ppu();
    let mut page = [0u8; 256];
    for (i, v) in page.iter_mut().enumerate() {
      *v = i as u8;
    }
    ppu.set_oam_address(0xF0);
    ppu.do_dma(&page);
    ppu.set_oam_address(0xF0);
    assert_eq!(ppu.get_oam_data(), 0);
    ppu.set_oam_address(0x00);
    assert_eq!(ppu.get_oam_data(), 0x10);
  }
}
