use crate::bus::main_bus::MainBus;
use crate::common::*;
use crate::error::CoreError;

pub mod opcodes;

use opcodes::{AddrMode, Operation, OPCODE_TABLE};

#[derive(Default, PartialEq, Debug, Clone, Copy)]
pub enum InterruptType {
  Irq,
  Nmi,
  #[default]
  None,
}

// 256 read + 256 write + 1 dummy read
const DMA_CYCLES: u32 = 513;
const INTERRUPT_CYCLES: u32 = 7;

mod flag_const {
  use crate::common::Byte;
  // 7 6 5 4 3 2 1 0
  // N V - B D I Z C

  pub const NEGATIVE: Byte = 1 << 7;
  pub const OVERFLOW: Byte = 1 << 6;
  pub const UNUSED: Byte = 1 << 5;
  pub const BREAK: Byte = 1 << 4;
  pub const DECIMAL: Byte = 1 << 3;
  pub const INTERRUPT: Byte = 1 << 2;
  pub const ZERO: Byte = 1 << 1;
  pub const CARRY: Byte = 1;
}

#[derive(Copy, Clone)]
struct Flag(Byte);

impl Flag {
  fn clear(&mut self) {
    self.0 = flag_const::UNUSED;
  }

  fn set_at(&mut self, pos: Byte, v: bool) {
    if v {
      self.0 |= pos;
    } else {
      self.0 &= !pos;
    }
  }

  fn get_at(&self, pos: Byte) -> bool {
    bit_eq(self.0, pos)
  }

  /// Bits 4 and 5 have no storage on the 6502; pulls force them.
  fn set_all(&mut self, v: Byte) {
    self.0 = (v | flag_const::UNUSED) & !flag_const::BREAK;
  }
}

impl From<Flag> for Byte {
  fn from(flag: Flag) -> Byte {
    flag.0
  }
}

/// Where an instruction's operand lives after address resolution.
enum Operand {
  None,
  Accumulator,
  Address(Address),
}

pub struct Cpu {
  cycles: u32,

  // registers
  r_pc: Address, // program counter
  r_sp: Byte,    // stack pointer
  r_a: Byte,     // accumulator
  r_x: Byte,
  r_y: Byte,

  flag: Flag,
  interrupt: InterruptType,
  page_crossed: bool,
  main_bus: MainBus,
}

impl Cpu {
  pub fn new(main_bus: MainBus) -> Self {
    Self {
      cycles: 0,
      r_pc: 0,
      r_sp: 0,
      r_a: 0,
      r_x: 0,
      r_y: 0,
      flag: Flag(0),
      interrupt: InterruptType::None,
      page_crossed: false,
      main_bus,
    }
  }

  pub fn main_bus(&self) -> &MainBus {
    &self.main_bus
  }

  pub fn main_bus_mut(&mut self) -> &mut MainBus {
    &mut self.main_bus
  }

  pub fn reset(&mut self) {
    self.cycles = 0;
    self.r_a = 0;
    self.r_x = 0;
    self.r_y = 0;
    self.flag.clear();
    self.flag.set_at(flag_const::INTERRUPT, true);
    self.r_pc = self.read_address(opcodes::RESET_VECTOR);
    // documented startup state
    self.r_sp = 0xFD;
    self.interrupt = InterruptType::None;
  }

  /// Latches an interrupt line. IRQ is ignored while the I flag is set;
  /// NMI always lands.
  pub fn trigger_interrupt(&mut self, i_type: InterruptType) {
    if i_type == InterruptType::Irq && self.flag.get_at(flag_const::INTERRUPT) {
      return;
    }
    // NMI outranks a pending IRQ.
    if self.interrupt != InterruptType::Nmi {
      self.interrupt = i_type;
    }
  }

  /// Executes one instruction, servicing a pending interrupt first, and
  /// returns the cycles consumed.
  pub fn step(&mut self) -> Result<u32, CoreError> {
    let mut cycles = 0;

    if self.interrupt != InterruptType::None {
      let vector = match self.interrupt {
        InterruptType::Nmi => opcodes::NMI_VECTOR,
        _ => opcodes::IRQ_VECTOR,
      };
      self.interrupt = InterruptType::None;
      self.interrupt_sequence(vector, false);
      cycles += INTERRUPT_CYCLES;
    }

    let pc = self.r_pc;
    let opcode = self.read_and_forward_pc() as Byte;
    let entry =
      OPCODE_TABLE[opcode as usize].ok_or(CoreError::UnsupportedOpcode { opcode, pc })?;

    self.page_crossed = false;
    let operand = self.resolve_operand(entry.mode);
    cycles += entry.cycles;
    if self.page_crossed {
      cycles += entry.page_cycles;
    }
    cycles += self.execute(entry.op, entry.page_cycles, operand);

    if self.main_bus.check_and_reset_dma() {
      // The stall takes one cycle longer when it starts on an odd cycle.
      cycles += DMA_CYCLES + ((self.cycles + cycles) & 1);
    }
    self.cycles = self.cycles.wrapping_add(cycles);
    Ok(cycles)
  }

  fn interrupt_sequence(&mut self, vector: Address, from_brk: bool) {
    self.push_stack((self.r_pc >> 8) as Byte);
    self.push_stack(self.r_pc as Byte);
    let mut flags: Byte = self.flag.into();
    if from_brk {
      flags |= flag_const::BREAK;
    }
    self.push_stack(flags);
    self.flag.set_at(flag_const::INTERRUPT, true);
    self.r_pc = self.read_address(vector);
  }

  fn resolve_operand(&mut self, mode: AddrMode) -> Operand {
    match mode {
      AddrMode::Implied | AddrMode::Relative => Operand::None,
      AddrMode::Accumulator => Operand::Accumulator,
      AddrMode::Immediate => {
        let addr = self.r_pc;
        self.r_pc = self.r_pc.wrapping_add(1);
        Operand::Address(addr)
      }
      AddrMode::ZeroPage => Operand::Address(self.read_and_forward_pc()),
      AddrMode::ZeroPageX => {
        let zp = self.read_and_forward_pc();
        Operand::Address((zp + self.r_x as Address) & 0xFF)
      }
      AddrMode::ZeroPageY => {
        let zp = self.read_and_forward_pc();
        Operand::Address((zp + self.r_y as Address) & 0xFF)
      }
      AddrMode::Absolute => {
        let addr = self.read_address(self.r_pc);
        self.r_pc = self.r_pc.wrapping_add(2);
        Operand::Address(addr)
      }
      AddrMode::AbsoluteX => {
        let base = self.read_address(self.r_pc);
        self.r_pc = self.r_pc.wrapping_add(2);
        let addr = base.wrapping_add(self.r_x as Address);
        self.set_page_crossed(base, addr);
        Operand::Address(addr)
      }
      AddrMode::AbsoluteY => {
        let base = self.read_address(self.r_pc);
        self.r_pc = self.r_pc.wrapping_add(2);
        let addr = base.wrapping_add(self.r_y as Address);
        self.set_page_crossed(base, addr);
        Operand::Address(addr)
      }
      AddrMode::Indirect => {
        let location = self.read_address(self.r_pc);
        self.r_pc = self.r_pc.wrapping_add(2);
        // The 6502 fetches the high byte from the start of the same page
        // when the pointer sits on a page boundary.
        let page = location & 0xFF00;
        let low = self.main_bus.read_addr(location);
        let high = self.main_bus.read_addr(page | (location.wrapping_add(1) & 0xFF));
        Operand::Address((high << 8) | low)
      }
      AddrMode::IndexedIndirect => {
        let zp = self.read_and_forward_pc().wrapping_add(self.r_x as Address);
        let low = self.main_bus.read_addr(zp & 0xFF);
        let high = self.main_bus.read_addr((zp + 1) & 0xFF);
        Operand::Address((high << 8) | low)
      }
      AddrMode::IndirectIndexed => {
        let zp = self.read_and_forward_pc();
        let low = self.main_bus.read_addr(zp & 0xFF);
        let high = self.main_bus.read_addr((zp + 1) & 0xFF);
        let base = (high << 8) | low;
        let addr = base.wrapping_add(self.r_y as Address);
        self.set_page_crossed(base, addr);
        Operand::Address(addr)
      }
    }
  }

  fn execute(&mut self, op: Operation, page_cycles: u32, operand: Operand) -> u32 {
    use Operation::*;
    match op {
      Adc => {
        let src = self.read_operand(&operand);
        self.add_with_carry(src);
      }
      Sbc => {
        let src = self.read_operand(&operand);
        self.add_with_carry(!src);
      }
      And => {
        self.r_a &= self.read_operand(&operand);
        self.set_zn(self.r_a);
      }
      Ora => {
        self.r_a |= self.read_operand(&operand);
        self.set_zn(self.r_a);
      }
      Eor => {
        self.r_a ^= self.read_operand(&operand);
        self.set_zn(self.r_a);
      }
      Asl => {
        let src = self.read_operand(&operand);
        self.flag.set_at(flag_const::CARRY, bit_eq(src, 0x80));
        let result = src << 1;
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Lsr => {
        let src = self.read_operand(&operand);
        self.flag.set_at(flag_const::CARRY, bit_eq(src, 0x1));
        let result = src >> 1;
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Rol => {
        let src = self.read_operand(&operand);
        let old_carry = self.flag.get_at(flag_const::CARRY) as Byte;
        self.flag.set_at(flag_const::CARRY, bit_eq(src, 0x80));
        let result = (src << 1) | old_carry;
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Ror => {
        let src = self.read_operand(&operand);
        let old_carry = self.flag.get_at(flag_const::CARRY) as Byte;
        self.flag.set_at(flag_const::CARRY, bit_eq(src, 0x1));
        let result = (src >> 1) | (old_carry << 7);
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Bit => {
        let src = self.read_operand(&operand);
        self.flag.set_at(flag_const::OVERFLOW, bit_eq(src, 0x40));
        self.flag.set_at(flag_const::ZERO, src & self.r_a == 0);
        self.flag.set_at(flag_const::NEGATIVE, bit_eq(src, 0x80));
      }
      Cmp => {
        let src = self.read_operand(&operand);
        self.compare(self.r_a, src);
      }
      Cpx => {
        let src = self.read_operand(&operand);
        self.compare(self.r_x, src);
      }
      Cpy => {
        let src = self.read_operand(&operand);
        self.compare(self.r_y, src);
      }
      Inc => {
        let result = self.read_operand(&operand).wrapping_add(1);
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Dec => {
        let result = self.read_operand(&operand).wrapping_sub(1);
        self.set_zn(result);
        self.write_operand(&operand, result);
      }
      Inx => {
        self.r_x = self.r_x.wrapping_add(1);
        self.set_zn(self.r_x);
      }
      Iny => {
        self.r_y = self.r_y.wrapping_add(1);
        self.set_zn(self.r_y);
      }
      Dex => {
        self.r_x = self.r_x.wrapping_sub(1);
        self.set_zn(self.r_x);
      }
      Dey => {
        self.r_y = self.r_y.wrapping_sub(1);
        self.set_zn(self.r_y);
      }
      Lda => {
        self.r_a = self.read_operand(&operand);
        self.set_zn(self.r_a);
      }
      Ldx => {
        self.r_x = self.read_operand(&operand);
        self.set_zn(self.r_x);
      }
      Ldy => {
        self.r_y = self.read_operand(&operand);
        self.set_zn(self.r_y);
      }
      Sta => self.write_operand(&operand, self.r_a),
      Stx => self.write_operand(&operand, self.r_x),
      Sty => self.write_operand(&operand, self.r_y),
      Tax => {
        self.r_x = self.r_a;
        self.set_zn(self.r_x);
      }
      Tay => {
        self.r_y = self.r_a;
        self.set_zn(self.r_y);
      }
      Txa => {
        self.r_a = self.r_x;
        self.set_zn(self.r_a);
      }
      Tya => {
        self.r_a = self.r_y;
        self.set_zn(self.r_a);
      }
      Tsx => {
        self.r_x = self.r_sp;
        self.set_zn(self.r_x);
      }
      Txs => self.r_sp = self.r_x,
      Pha => self.push_stack(self.r_a),
      Pla => {
        self.r_a = self.pull_stack();
        self.set_zn(self.r_a);
      }
      Php => {
        // PHP always pushes with the break bit visible.
        let flags: Byte = self.flag.into();
        self.push_stack(flags | flag_const::BREAK);
      }
      Plp => {
        let flags = self.pull_stack();
        self.flag.set_all(flags);
      }
      Jmp => {
        if let Operand::Address(addr) = operand {
          self.r_pc = addr;
        }
      }
      Jsr => {
        if let Operand::Address(addr) = operand {
          // The return address is the last byte of this instruction.
          let ret = self.r_pc.wrapping_sub(1);
          self.push_stack((ret >> 8) as Byte);
          self.push_stack(ret as Byte);
          self.r_pc = addr;
        }
      }
      Rts => {
        self.r_pc = self.pull_stack_16().wrapping_add(1);
      }
      Rti => {
        let flags = self.pull_stack();
        self.flag.set_all(flags);
        self.r_pc = self.pull_stack_16();
      }
      Brk => {
        // BRK pushes the address after its padding byte.
        self.r_pc = self.r_pc.wrapping_add(1);
        self.interrupt_sequence(opcodes::IRQ_VECTOR, true);
      }
      Bcc => return self.branch(!self.flag.get_at(flag_const::CARRY), page_cycles),
      Bcs => return self.branch(self.flag.get_at(flag_const::CARRY), page_cycles),
      Beq => return self.branch(self.flag.get_at(flag_const::ZERO), page_cycles),
      Bne => return self.branch(!self.flag.get_at(flag_const::ZERO), page_cycles),
      Bmi => return self.branch(self.flag.get_at(flag_const::NEGATIVE), page_cycles),
      Bpl => return self.branch(!self.flag.get_at(flag_const::NEGATIVE), page_cycles),
      Bvs => return self.branch(self.flag.get_at(flag_const::OVERFLOW), page_cycles),
      Bvc => return self.branch(!self.flag.get_at(flag_const::OVERFLOW), page_cycles),
      Clc => self.flag.set_at(flag_const::CARRY, false),
      Sec => self.flag.set_at(flag_const::CARRY, true),
      Cli => self.flag.set_at(flag_const::INTERRUPT, false),
      Sei => self.flag.set_at(flag_const::INTERRUPT, true),
      Cld => self.flag.set_at(flag_const::DECIMAL, false),
      Sed => self.flag.set_at(flag_const::DECIMAL, true),
      Clv => self.flag.set_at(flag_const::OVERFLOW, false),
      Nop => (),
    }
    0
  }

  /// Consumes the offset byte and takes the branch when `cond` holds.
  /// Taken branches cost one extra cycle, one more across a page.
  fn branch(&mut self, cond: bool, page_cycles: u32) -> u32 {
    let offset = self.read_and_forward_pc() as Byte as i8;
    if !cond {
      return 0;
    }
    let target = self.r_pc.wrapping_add(offset as Address);
    let mut extra = 1;
    if (target & 0xFF00) != (self.r_pc & 0xFF00) {
      extra += page_cycles;
    }
    self.r_pc = target;
    extra
  }

  fn add_with_carry(&mut self, src: Byte) {
    let carry = self.flag.get_at(flag_const::CARRY) as u16;
    let sum = self.r_a as u16 + src as u16 + carry;
    self.flag.set_at(flag_const::CARRY, sum > 0xFF);
    let result = sum as Byte;
    // Overflow when both operands share a sign the result does not.
    self.flag.set_at(
      flag_const::OVERFLOW,
      bit_eq(!(self.r_a ^ src) & (self.r_a ^ result), 0x80),
    );
    self.r_a = result;
    self.set_zn(self.r_a);
  }

  fn compare(&mut self, reg: Byte, src: Byte) {
    self.flag.set_at(flag_const::CARRY, reg >= src);
    self.set_zn(reg.wrapping_sub(src));
  }

  fn read_operand(&mut self, operand: &Operand) -> Byte {
    match operand {
      Operand::Accumulator => self.r_a,
      Operand::Address(addr) => self.main_bus.read(*addr),
      Operand::None => 0,
    }
  }

  fn write_operand(&mut self, operand: &Operand, value: Byte) {
    match operand {
      Operand::Accumulator => self.r_a = value,
      Operand::Address(addr) => self.main_bus.write(*addr, value),
      Operand::None => (),
    }
  }

  #[inline]
  fn push_stack(&mut self, value: Byte) {
    self.main_bus.write(0x100 | self.r_sp as Address, value);
    // Hardware stacks grow downward!
    self.r_sp = self.r_sp.wrapping_sub(1);
  }

  #[inline]
  fn pull_stack(&mut self) -> Byte {
    self.r_sp = self.r_sp.wrapping_add(1);
    self.main_bus.read(0x100 | self.r_sp as Address)
  }

  #[inline]
  fn pull_stack_16(&mut self) -> Address {
    self.pull_stack() as Address | (self.pull_stack() as Address) << 8
  }

  #[inline]
  fn set_zn(&mut self, value: Byte) {
    self.flag.set_at(flag_const::ZERO, value == 0);
    self
      .flag
      .set_at(flag_const::NEGATIVE, bit_eq(value, flag_const::NEGATIVE));
  }

  #[inline]
  fn set_page_crossed(&mut self, addr_a: Address, addr_b: Address) {
    self.page_crossed = (addr_a & 0xFF00) != (addr_b & 0xFF00);
  }

  #[inline]
  fn read_address(&mut self, addr: Address) -> Address {
    self.main_bus.read_addr(addr) | self.main_bus.read_addr(addr.wrapping_add(1)) << 8
  }

  #[inline]
  fn read_and_forward_pc(&mut self) -> Address {
    let res = self.main_bus.read_addr(self.r_pc);
    self.r_pc = self.r_pc.wrapping_add(1);
    res
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bus::message_bus::MessageBus;
  use crate::bus::picture_bus::PictureBus;
  use crate::cartridge::test_support::build_ines;
  use crate::cartridge::Cartridge;
  use crate::mapper::n_rom::NRom;
  use crate::ppu::Ppu;
  use std::cell::RefCell;
  use std::rc::Rc;

  // Boots a CPU with `program` at 0x8000 and vectors pointing into the
  // single mirrored PRG bank.
  fn make_cpu(program: &[Byte]) -> Cpu {
    let data = build_ines(1, 0, 0, 0, |prg| {
      prg[..program.len()].copy_from_slice(program);
      prg[0x3FFC] = 0x00;
      prg[0x3FFD] = 0x80;
      // NMI and IRQ land on a NOP at 0x8100.
      prg[0x0100] = 0xEA;
      prg[0x3FFA] = 0x00;
      prg[0x3FFB] = 0x81;
      prg[0x3FFE] = 0x00;
      prg[0x3FFF] = 0x81;
    });
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mapper: Rc<RefCell<dyn crate::mapper::Mapper>> = Rc::new(RefCell::new(NRom::new(cart)));
    let mut pic_bus = PictureBus::new();
    pic_bus.set_mapper(mapper.clone());
    let message_bus = Rc::new(RefCell::new(MessageBus::new()));
    let ppu = Rc::new(RefCell::new(Ppu::new(pic_bus, message_bus)));
    let mut main_bus = MainBus::new(ppu);
    main_bus.set_mapper(mapper);
    let mut cpu = Cpu::new(main_bus);
    cpu.reset();
    cpu
  }

  #[test]
  fn reset_loads_the_reset_vector() {
    let cpu = make_cpu(&[]);
    assert_eq!(cpu.r_pc, 0x8000);
    assert_eq!(cpu.r_sp, 0xFD);
    assert!(cpu.flag.get_at(flag_const::INTERRUPT));
  }

  #[test]
  fn lda_immediate_sets_registers_and_flags() {
    let mut cpu = make_cpu(&[0xA9, 0x42, 0xA9, 0x00, 0xA9, 0x80]);
    assert_eq!(cpu.step().unwrap(), 2);
    assert_eq!(cpu.r_a, 0x42);
    assert!(!cpu.flag.get_at(flag_const::ZERO));
    cpu.step().unwrap();
    assert!(cpu.flag.get_at(flag_const::ZERO));
    cpu.step().unwrap();
    assert!(cpu.flag.get_at(flag_const::NEGATIVE));
  }

  #[test]
  fn adc_sets_overflow_on_signed_wrap() {
    // LDA #$50; ADC #$50 -> 0xA0, positive + positive = negative.
    let mut cpu = make_cpu(&[0xA9, 0x50, 0x69, 0x50]);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.r_a, 0xA0);
    assert!(cpu.flag.get_at(flag_const::OVERFLOW));
    assert!(cpu.flag.get_at(flag_const::NEGATIVE));
    assert!(!cpu.flag.get_at(flag_const::CARRY));
  }

  #[test]
  fn sbc_borrows_through_the_carry() {
    // SEC; LDA #$40; SBC #$41 -> 0xFF with a borrow.
    let mut cpu = make_cpu(&[0x38, 0xA9, 0x40, 0xE9, 0x41]);
    for _ in 0..3 {
      cpu.step().unwrap();
    }
    assert_eq!(cpu.r_a, 0xFF);
    assert!(!cpu.flag.get_at(flag_const::CARRY));
    assert!(!cpu.flag.get_at(flag_const::OVERFLOW));
  }

  #[test]
  fn stack_round_trips_through_pha_pla() {
    let mut cpu = make_cpu(&[0xA9, 0x37, 0x48, 0xA9, 0x00, 0x68]);
    for _ in 0..4 {
      cpu.step().unwrap();
    }
    assert_eq!(cpu.r_a, 0x37);
    assert_eq!(cpu.r_sp, 0xFD);
    assert!(!cpu.flag.get_at(flag_const::ZERO));
  }

  #[test]
  fn jsr_and_rts_agree_on_the_return_address() {
    // JSR $8005; (NOPs); at $8005: RTS. Next instruction is at $8003.
    let mut cpu = make_cpu(&[0x20, 0x05, 0x80, 0xEA, 0xEA, 0x60]);
    assert_eq!(cpu.step().unwrap(), 6);
    assert_eq!(cpu.r_pc, 0x8005);
    assert_eq!(cpu.step().unwrap(), 6);
    assert_eq!(cpu.r_pc, 0x8003);
  }

  #[test]
  fn indirect_jmp_wraps_within_the_page() {
    let mut cpu = make_cpu(&[0x6C, 0xFF, 0x02]);
    cpu.main_bus_mut().write(0x02FF, 0x34);
    cpu.main_bus_mut().write(0x0200, 0x12);
    // High byte comes from 0x0200, not 0x0300.
    cpu.step().unwrap();
    assert_eq!(cpu.r_pc, 0x1234);
  }

  #[test]
  fn branch_cycles_depend_on_outcome() {
    // Z is clear after reset, so BNE is taken and BEQ is not.
    let mut cpu = make_cpu(&[0xD0, 0x02, 0xEA, 0xEA, 0xF0, 0x10]);
    assert_eq!(cpu.step().unwrap(), 3);
    assert_eq!(cpu.r_pc, 0x8004);
    assert_eq!(cpu.step().unwrap(), 2);
  }

  #[test]
  fn taken_branch_across_a_page_costs_four() {
    // BNE -3 at 0x80FE: the target 0x80FD is on the other page from
    // the fall-through address 0x8100.
    let data = build_ines(1, 0, 0, 0, |prg| {
      prg[0x00FE] = 0xD0;
      prg[0x00FF] = 0xFD;
      prg[0x3FFC] = 0xFE;
      prg[0x3FFD] = 0x80;
    });
    let cart = Cartridge::load_from_data(&data).unwrap();
    let mapper: Rc<RefCell<dyn crate::mapper::Mapper>> = Rc::new(RefCell::new(NRom::new(cart)));
    let mut pic_bus = PictureBus::new();
    pic_bus.set_mapper(mapper.clone());
    let message_bus = Rc::new(RefCell::new(MessageBus::new()));
    let ppu = Rc::new(RefCell::new(Ppu::new(pic_bus, message_bus)));
    let mut main_bus = MainBus::new(ppu);
    main_bus.set_mapper(mapper);
    let mut cpu = Cpu::new(main_bus);
    cpu.reset();
    assert_eq!(cpu.step().unwrap(), 4);
    assert_eq!(cpu.r_pc, 0x80FD);
  }

  #[test]
  fn absolute_x_page_cross_adds_a_cycle() {
    // LDX #$01; LDA $00FF,X crosses into page 1.
    let mut cpu = make_cpu(&[0xA2, 0x01, 0xBD, 0xFF, 0x00]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 5);
  }

  #[test]
  fn illegal_opcode_reports_its_location() {
    let mut cpu = make_cpu(&[0xEA, 0x02]);
    cpu.step().unwrap();
    match cpu.step() {
      Err(CoreError::UnsupportedOpcode { opcode, pc }) => {
        assert_eq!(opcode, 0x02);
        assert_eq!(pc, 0x8001);
      }
      other => panic!("expected an unsupported opcode error, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn infinite_loop_spins_in_place() {
    // JMP $8000.
    let mut cpu = make_cpu(&[0x4C, 0x00, 0x80]);
    for _ in 0..10 {
      assert_eq!(cpu.step().unwrap(), 3);
      assert_eq!(cpu.r_pc, 0x8000);
    }
  }

  #[test]
  fn nmi_vectors_and_sets_interrupt_disable() {
    let mut cpu = make_cpu(&[0xEA]);
    cpu.trigger_interrupt(InterruptType::Nmi);
    // Interrupt entry plus the NOP at the handler.
    assert_eq!(cpu.step().unwrap(), INTERRUPT_CYCLES + 2);
    assert_eq!(cpu.r_pc, 0x8101);
    assert!(cpu.flag.get_at(flag_const::INTERRUPT));
  }

  #[test]
  fn irq_is_masked_by_the_interrupt_flag() {
    // I is set after reset; CLI lets the next IRQ through.
    let mut cpu = make_cpu(&[0x58, 0xEA]);
    cpu.trigger_interrupt(InterruptType::Irq);
    assert_eq!(cpu.interrupt, InterruptType::None);
    cpu.step().unwrap();
    cpu.trigger_interrupt(InterruptType::Irq);
    cpu.step().unwrap();
    assert_eq!(cpu.r_pc, 0x8101);
  }

  #[test]
  fn brk_pushes_the_break_bit_and_rti_returns() {
    // BRK at 0x8000; the handler at 0x8101 runs RTI... the vector points
    // at a NOP, so inspect the stack instead.
    let mut cpu = make_cpu(&[0x00]);
    cpu.step().unwrap();
    assert_eq!(cpu.r_pc, 0x8100);
    // Stack holds PC 0x8002 then the flags with B set.
    let flags = cpu.main_bus_mut().read(0x100 | 0xFB);
    assert!(bit_eq(flags, flag_const::BREAK));
    let lo = cpu.main_bus_mut().read(0x100 | 0xFC) as Address;
    let hi = cpu.main_bus_mut().read(0x100 | 0xFD) as Address;
    assert_eq!((hi << 8) | lo, 0x8002);
    assert!(cpu.flag.get_at(flag_const::INTERRUPT));
  }

  #[test]
  fn oam_dma_stalls_the_cpu() {
    // LDA #$02; STA $4014.
    let mut cpu = make_cpu(&[0xA9, 0x02, 0x8D, 0x14, 0x40]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 4 + DMA_CYCLES);
  }
}
