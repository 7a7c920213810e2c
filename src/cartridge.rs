use log::info;
use std::path::Path;

use crate::common::*;
use crate::error::CoreError;
use crate::mapper::factory::NameTableMirroring;

pub const PRG_BANK_SIZE: usize = 0x4000;
pub const CHR_BANK_SIZE: usize = 0x2000;

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const MAGIC: [u8; 4] = *b"NES\x1A";

/// An iNES image after header interpretation: immutable PRG/CHR banks plus
/// the metadata the mapper and picture bus need. Owned by the mapper for
/// the lifetime of one loaded ROM.
pub struct Cartridge {
  prg_rom: Vec<Byte>,
  chr_rom: Vec<Byte>,
  mirroring: NameTableMirroring,
  mapper_number: Byte,
  extended_ram: bool,
}

impl Cartridge {
  pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
    info!("reading ROM content from {}", path.as_ref().display());
    let data = std::fs::read(path)?;
    Self::load_from_data(&data)
  }

  pub fn load_from_data(data: &[u8]) -> Result<Self, CoreError> {
    if data.len() < HEADER_SIZE {
      return Err(CoreError::header(format!(
        "file is {} bytes, shorter than the 16 byte header",
        data.len()
      )));
    }
    let header = &data[..HEADER_SIZE];
    if header[..4] != MAGIC {
      return Err(CoreError::header(format!(
        "bad magic {:02x} {:02x} {:02x} {:02x}, expected NES\\x1A",
        header[0], header[1], header[2], header[3]
      )));
    }
    let prg_banks = header[4] as usize;
    let chr_banks = header[5] as usize;
    if prg_banks == 0 {
      return Err(CoreError::header("ROM declares no PRG-ROM banks"));
    }

    let flags6 = header[6];
    let mirroring = if bit_eq(flags6, 0x8) {
      NameTableMirroring::FourScreen
    } else if bit_eq(flags6, 0x1) {
      NameTableMirroring::Vertical
    } else {
      NameTableMirroring::Horizontal
    };
    let mapper_number = ((flags6 >> 4) & 0xF) | (header[7] & 0xF0);
    let extended_ram = bit_eq(flags6, 0x2);
    let has_trainer = bit_eq(flags6, 0x4);

    let prg_size = prg_banks * PRG_BANK_SIZE;
    let chr_size = chr_banks * CHR_BANK_SIZE;
    let trainer_size = if has_trainer { TRAINER_SIZE } else { 0 };
    let expected = HEADER_SIZE + trainer_size + prg_size + chr_size;
    if data.len() < expected {
      return Err(CoreError::header(format!(
        "file is {} bytes but the header declares {} ({} PRG + {} CHR banks)",
        data.len(),
        expected,
        prg_banks,
        chr_banks
      )));
    }

    // The trainer is obsolete loader code; skip over it.
    let prg_start = HEADER_SIZE + trainer_size;
    let prg_rom = data[prg_start..prg_start + prg_size].to_vec();
    let chr_rom = data[prg_start + prg_size..prg_start + prg_size + chr_size].to_vec();

    info!(
      "loaded header: {} 16KB PRG-ROM banks, {} 8KB CHR-ROM banks",
      prg_banks, chr_banks
    );
    info!(
      "name table mirroring: {:?}, mapper: {}, extended (CPU) RAM: {}",
      mirroring, mapper_number, extended_ram
    );
    if chr_banks == 0 {
      info!("cartridge with CHR-RAM");
    }

    Ok(Self {
      prg_rom,
      chr_rom,
      mirroring,
      mapper_number,
      extended_ram,
    })
  }

  pub fn prg_rom(&self) -> &[Byte] {
    &self.prg_rom
  }

  pub fn chr_rom(&self) -> &[Byte] {
    &self.chr_rom
  }

  pub fn mapper_number(&self) -> Byte {
    self.mapper_number
  }

  pub fn mirroring(&self) -> NameTableMirroring {
    self.mirroring
  }

  pub fn has_extended_ram(&self) -> bool {
    self.extended_ram
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  use super::*;

  /// Builds an iNES image in memory. `patch` edits the PRG banks before
  /// the image is assembled.
  pub fn build_ines(
    prg_banks: usize,
    chr_banks: usize,
    mapper: Byte,
    flags6_low: Byte,
    patch: impl FnOnce(&mut [Byte]),
  ) -> Vec<u8> {
    let mut prg = vec![0u8; prg_banks * PRG_BANK_SIZE];
    patch(&mut prg);
    let mut data = Vec::new();
    data.extend_from_slice(b"NES\x1A");
    data.push(prg_banks as u8);
    data.push(chr_banks as u8);
    data.push((mapper << 4) | flags6_low);
    data.push(mapper & 0xF0);
    data.extend_from_slice(&[0u8; 8]);
    data.extend_from_slice(&prg);
    data.extend_from_slice(&vec![0u8; chr_banks * CHR_BANK_SIZE]);
    data
  }
}

#[cfg(test)]
mod tests {
  use super::test_support::build_ines;
  use super::*;

  #[test]
  fn parses_a_minimal_image() {
    let data = build_ines(1, 1, 0, 0, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    assert_eq!(cart.prg_rom().len(), PRG_BANK_SIZE);
    assert_eq!(cart.chr_rom().len(), CHR_BANK_SIZE);
    assert_eq!(cart.mapper_number(), 0);
    assert_eq!(cart.mirroring(), NameTableMirroring::Horizontal);
    assert!(!cart.has_extended_ram());
  }

  #[test]
  fn rejects_bad_magic() {
    let mut data = build_ines(1, 1, 0, 0, |_| {});
    data[0] = b'X';
    assert!(matches!(
      Cartridge::load_from_data(&data),
      Err(CoreError::InvalidHeader { .. })
    ));
  }

  #[test]
  fn rejects_zero_prg_banks() {
    let mut data = build_ines(1, 0, 0, 0, |_| {});
    data[4] = 0;
    assert!(matches!(
      Cartridge::load_from_data(&data),
      Err(CoreError::InvalidHeader { .. })
    ));
  }

  #[test]
  fn rejects_truncated_banks() {
    let mut data = build_ines(2, 1, 0, 0, |_| {});
    data.truncate(data.len() - 100);
    assert!(matches!(
      Cartridge::load_from_data(&data),
      Err(CoreError::InvalidHeader { .. })
    ));
  }

  #[test]
  fn skips_a_trainer() {
    let mut data = build_ines(1, 0, 0, 0x4, |prg| prg[0] = 0xAB);
    // Splice 512 trainer bytes between header and PRG.
    let trainer = vec![0xEEu8; 512];
    data.splice(16..16, trainer);
    let cart = Cartridge::load_from_data(&data).unwrap();
    assert_eq!(cart.prg_rom()[0], 0xAB);
  }

  #[test]
  fn decodes_mirroring_and_mapper_bits() {
    let data = build_ines(1, 1, 3, 0x1, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    assert_eq!(cart.mirroring(), NameTableMirroring::Vertical);
    assert_eq!(cart.mapper_number(), 3);

    let data = build_ines(1, 1, 0, 0x8, |_| {});
    let cart = Cartridge::load_from_data(&data).unwrap();
    assert_eq!(cart.mirroring(), NameTableMirroring::FourScreen);
  }
}
