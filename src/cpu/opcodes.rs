use lazy_static::lazy_static;

use crate::common::Address;

pub const RESET_VECTOR: Address = 0xFFFC;
pub const NMI_VECTOR: Address = 0xFFFA;
pub const IRQ_VECTOR: Address = 0xFFFE;

/// The 56 documented 6502 operations. Anything outside this set is an
/// illegal opcode and halts execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Adc,
  And,
  Asl,
  Bcc,
  Bcs,
  Beq,
  Bit,
  Bmi,
  Bne,
  Bpl,
  Brk,
  Bvc,
  Bvs,
  Clc,
  Cld,
  Cli,
  Clv,
  Cmp,
  Cpx,
  Cpy,
  Dec,
  Dex,
  Dey,
  Eor,
  Inc,
  Inx,
  Iny,
  Jmp,
  Jsr,
  Lda,
  Ldx,
  Ldy,
  Lsr,
  Nop,
  Ora,
  Pha,
  Php,
  Pla,
  Plp,
  Rol,
  Ror,
  Rti,
  Rts,
  Sbc,
  Sec,
  Sed,
  Sei,
  Sta,
  Stx,
  Sty,
  Tax,
  Tay,
  Tsx,
  Txa,
  Txs,
  Tya,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
  Implied,
  Accumulator,
  Immediate,
  ZeroPage,
  ZeroPageX,
  ZeroPageY,
  Relative,
  Absolute,
  AbsoluteX,
  AbsoluteY,
  Indirect,
  IndexedIndirect,
  IndirectIndexed,
}

#[derive(Clone, Copy)]
pub struct OpcodeEntry {
  pub op: Operation,
  pub mode: AddrMode,
  pub cycles: u32,
  // Extra cycles when an indexed access crosses a page, or a taken
  // branch lands on a different page.
  pub page_cycles: u32,
}

lazy_static! {
  /// Dispatch table indexed by opcode byte; `None` marks illegal opcodes.
  pub static ref OPCODE_TABLE: [Option<OpcodeEntry>; 256] = build_table();
}

fn build_table() -> [Option<OpcodeEntry>; 256] {
  use AddrMode::*;
  use Operation::*;

  let mut table = [None; 256];
  {
    let mut set = |code: usize, op, mode, cycles, page_cycles| {
      table[code] = Some(OpcodeEntry {
        op,
        mode,
        cycles,
        page_cycles,
      });
    };

    set(0x00, Brk, Implied, 7, 0);
    set(0x01, Ora, IndexedIndirect, 6, 0);
    set(0x05, Ora, ZeroPage, 3, 0);
    set(0x06, Asl, ZeroPage, 5, 0);
    set(0x08, Php, Implied, 3, 0);
    set(0x09, Ora, Immediate, 2, 0);
    set(0x0A, Asl, Accumulator, 2, 0);
    set(0x0D, Ora, Absolute, 4, 0);
    set(0x0E, Asl, Absolute, 6, 0);
    set(0x10, Bpl, Relative, 2, 1);
    set(0x11, Ora, IndirectIndexed, 5, 1);
    set(0x15, Ora, ZeroPageX, 4, 0);
    set(0x16, Asl, ZeroPageX, 6, 0);
    set(0x18, Clc, Implied, 2, 0);
    set(0x19, Ora, AbsoluteY, 4, 1);
    set(0x1D, Ora, AbsoluteX, 4, 1);
    set(0x1E, Asl, AbsoluteX, 7, 0);
    set(0x20, Jsr, Absolute, 6, 0);
    set(0x21, And, IndexedIndirect, 6, 0);
    set(0x24, Bit, ZeroPage, 3, 0);
    set(0x25, And, ZeroPage, 3, 0);
    set(0x26, Rol, ZeroPage, 5, 0);
    set(0x28, Plp, Implied, 4, 0);
    set(0x29, And, Immediate, 2, 0);
    set(0x2A, Rol, Accumulator, 2, 0);
    set(0x2C, Bit, Absolute, 4, 0);
    set(0x2D, And, Absolute, 4, 0);
    set(0x2E, Rol, Absolute, 6, 0);
    set(0x30, Bmi, Relative, 2, 1);
    set(0x31, And, IndirectIndexed, 5, 1);
    set(0x35, And, ZeroPageX, 4, 0);
    set(0x36, Rol, ZeroPageX, 6, 0);
    set(0x38, Sec, Implied, 2, 0);
    set(0x39, And, AbsoluteY, 4, 1);
    set(0x3D, And, AbsoluteX, 4, 1);
    set(0x3E, Rol, AbsoluteX, 7, 0);
    set(0x40, Rti, Implied, 6, 0);
    set(0x41, Eor, IndexedIndirect, 6, 0);
    set(0x45, Eor, ZeroPage, 3, 0);
    set(0x46, Lsr, ZeroPage, 5, 0);
    set(0x48, Pha, Implied, 3, 0);
    set(0x49, Eor, Immediate, 2, 0);
    set(0x4A, Lsr, Accumulator, 2, 0);
    set(0x4C, Jmp, Absolute, 3, 0);
    set(0x4D, Eor, Absolute, 4, 0);
    set(0x4E, Lsr, Absolute, 6, 0);
    set(0x50, Bvc, Relative, 2, 1);
    set(0x51, Eor, IndirectIndexed, 5, 1);
    set(0x55, Eor, ZeroPageX, 4, 0);
    set(0x56, Lsr, ZeroPageX, 6, 0);
    set(0x58, Cli, Implied, 2, 0);
    set(0x59, Eor, AbsoluteY, 4, 1);
    set(0x5D, Eor, AbsoluteX, 4, 1);
    set(0x5E, Lsr, AbsoluteX, 7, 0);
    set(0x60, Rts, Implied, 6, 0);
    set(0x61, Adc, IndexedIndirect, 6, 0);
    set(0x65, Adc, ZeroPage, 3, 0);
    set(0x66, Ror, ZeroPage, 5, 0);
    set(0x68, Pla, Implied, 4, 0);
    set(0x69, Adc, Immediate, 2, 0);
    set(0x6A, Ror, Accumulator, 2, 0);
    set(0x6C, Jmp, Indirect, 5, 0);
    set(0x6D, Adc, Absolute, 4, 0);
    set(0x6E, Ror, Absolute, 6, 0);
    set(0x70, Bvs, Relative, 2, 1);
    set(0x71, Adc, IndirectIndexed, 5, 1);
    set(0x75, Adc, ZeroPageX, 4, 0);
    set(0x76, Ror, ZeroPageX, 6, 0);
    set(0x78, Sei, Implied, 2, 0);
    set(0x79, Adc, AbsoluteY, 4, 1);
    set(0x7D, Adc, AbsoluteX, 4, 1);
    set(0x7E, Ror, AbsoluteX, 7, 0);
    set(0x81, Sta, IndexedIndirect, 6, 0);
    set(0x84, Sty, ZeroPage, 3, 0);
    set(0x85, Sta, ZeroPage, 3, 0);
    set(0x86, Stx, ZeroPage, 3, 0);
    set(0x88, Dey, Implied, 2, 0);
    set(0x8A, Txa, Implied, 2, 0);
    set(0x8C, Sty, Absolute, 4, 0);
    set(0x8D, Sta, Absolute, 4, 0);
    set(0x8E, Stx, Absolute, 4, 0);
    set(0x90, Bcc, Relative, 2, 1);
    set(0x91, Sta, IndirectIndexed, 6, 0);
    set(0x94, Sty, ZeroPageX, 4, 0);
    set(0x95, Sta, ZeroPageX, 4, 0);
    set(0x96, Stx, ZeroPageY, 4, 0);
    set(0x98, Tya, Implied, 2, 0);
    set(0x99, Sta, AbsoluteY, 5, 0);
    set(0x9A, Txs, Implied, 2, 0);
    set(0x9D, Sta, AbsoluteX, 5, 0);
    set(0xA0, Ldy, Immediate, 2, 0);
    set(0xA1, Lda, IndexedIndirect, 6, 0);
    set(0xA2, Ldx, Immediate, 2, 0);
    set(0xA4, Ldy, ZeroPage, 3, 0);
    set(0xA5, Lda, ZeroPage, 3, 0);
    set(0xA6, Ldx, ZeroPage, 3, 0);
    set(0xA8, Tay, Implied, 2, 0);
    set(0xA9, Lda, Immediate, 2, 0);
    set(0xAA, Tax, Implied, 2, 0);
    set(0xAC, Ldy, Absolute, 4, 0);
    set(0xAD, Lda, Absolute, 4, 0);
    set(0xAE, Ldx, Absolute, 4, 0);
    set(0xB0, Bcs, Relative, 2, 1);
    set(0xB1, Lda, IndirectIndexed, 5, 1);
    set(0xB4, Ldy, ZeroPageX, 4, 0);
    set(0xB5, Lda, ZeroPageX, 4, 0);
    set(0xB6, Ldx, ZeroPageY, 4, 0);
    set(0xB8, Clv, Implied, 2, 0);
    set(0xB9, Lda, AbsoluteY, 4, 1);
    set(0xBA, Tsx, Implied, 2, 0);
    set(0xBC, Ldy, AbsoluteX, 4, 1);
    set(0xBD, Lda, AbsoluteX, 4, 1);
    set(0xBE, Ldx, AbsoluteY, 4, 1);
    set(0xC0, Cpy, Immediate, 2, 0);
    set(0xC1, Cmp, IndexedIndirect, 6, 0);
    set(0xC4, Cpy, ZeroPage, 3, 0);
    set(0xC5, Cmp, ZeroPage, 3, 0);
    set(0xC6, Dec, ZeroPage, 5, 0);
    set(0xC8, Iny, Implied, 2, 0);
    set(0xC9, Cmp, Immediate, 2, 0);
    set(0xCA, Dex, Implied, 2, 0);
    set(0xCC, Cpy, Absolute, 4, 0);
    set(0xCD, Cmp, Absolute, 4, 0);
    set(0xCE, Dec, Absolute, 6, 0);
    set(0xD0, Bne, Relative, 2, 1);
    set(0xD1, Cmp, IndirectIndexed, 5, 1);
    set(0xD5, Cmp, ZeroPageX, 4, 0);
    set(0xD6, Dec, ZeroPageX, 6, 0);
    set(0xD8, Cld, Implied, 2, 0);
    set(0xD9, Cmp, AbsoluteY, 4, 1);
    set(0xDD, Cmp, AbsoluteX, 4, 1);
    set(0xDE, Dec, AbsoluteX, 7, 0);
    set(0xE0, Cpx, Immediate, 2, 0);
    set(0xE1, Sbc, IndexedIndirect, 6, 0);
    set(0xE4, Cpx, ZeroPage, 3, 0);
    set(0xE5, Sbc, ZeroPage, 3, 0);
    set(0xE6, Inc, ZeroPage, 5, 0);
    set(0xE8, Inx, Implied, 2, 0);
    set(0xE9, Sbc, Immediate, 2, 0);
    set(0xEA, Nop, Implied, 2, 0);
    set(0xEC, Cpx, Absolute, 4, 0);
    set(0xED, Sbc, Absolute, 4, 0);
    set(0xEE, Inc, Absolute, 6, 0);
    set(0xF0, Beq, Relative, 2, 1);
    set(0xF1, Sbc, IndirectIndexed, 5, 1);
    set(0xF5, Sbc, ZeroPageX, 4, 0);
    set(0xF6, Inc, ZeroPageX, 6, 0);
    set(0xF8, Sed, Implied, 2, 0);
    set(0xF9, Sbc, AbsoluteY, 4, 1);
    set(0xFD, Sbc, AbsoluteX, 4, 1);
    set(0xFE, Inc, AbsoluteX, 7, 0);
  }
  table
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn documented_opcode_count() {
    let count = OPCODE_TABLE.iter().filter(|e| e.is_some()).count();
    assert_eq!(count, 151);
  }

  #[test]
  fn known_illegal_opcodes_are_absent() {
    for code in [0x02usize, 0x03, 0x1A, 0x80, 0xEB, 0xFF] {
      assert!(OPCODE_TABLE[code].is_none());
    }
  }
}
