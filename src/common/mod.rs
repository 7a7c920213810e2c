pub type Byte = u8;
pub type Address = u16;

/// True iff every bit of `b` is set in `a`.
pub fn bit_eq<T: std::ops::BitAnd<Output = T> + PartialEq + Copy>(a: T, b: T) -> bool {
  (a & b) == b
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bit_eq_matches_full_mask_only() {
    assert!(bit_eq(0b1011u8, 0b0011));
    assert!(!bit_eq(0b1011u8, 0b0101));
    assert!(bit_eq(0xFFu8, 0x80));
  }
}
