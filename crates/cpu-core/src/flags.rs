//! Flag computations shared by the instruction handlers.
//!
//! Handlers compute a full candidate flag byte and merge it under the mask of
//! flags their opcode defines, so undefined flags are never touched.

/// Replaces the bits of `current` selected by `mask` with those of `new`.
#[must_use]
pub const fn merge(current: u8, mask: u8, new: u8) -> u8 {
    (current & !mask) | (new & mask)
}

/// Returns `flag` when `condition` holds, otherwise zero.
#[must_use]
pub const fn flag_if(condition: bool, flag: u8) -> u8 {
    if condition {
        flag
    } else {
        0
    }
}

/// Carry out of bit 3 for `a + b + carry_in`.
#[must_use]
pub const fn half_carry_add(a: u8, b: u8, carry_in: bool) -> bool {
    (a & 0x0F) + (b & 0x0F) + carry_in as u8 > 0x0F
}

/// Borrow into bit 4 for `a - b - borrow_in`.
#[must_use]
pub const fn half_borrow_sub(a: u8, b: u8, borrow_in: bool) -> bool {
    ((a & 0x0F) as i16) - ((b & 0x0F) as i16) - (borrow_in as i16) < 0
}

/// Carry out of bit 11 for a 16-bit add.
#[must_use]
pub const fn half_carry_add16(a: u16, b: u16) -> bool {
    (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF
}

#[cfg(test)]
mod tests {
    use super::{flag_if, half_borrow_sub, half_carry_add, half_carry_add16, merge};

    #[test]
    fn merge_only_touches_masked_bits() {
        assert_eq!(merge(0b1010_0000, 0b0110_0000, 0b0100_0000), 0b1100_0000);
        assert_eq!(merge(0xFF, 0x00, 0x00), 0xFF);
    }

    #[test]
    fn nibble_carries() {
        assert!(half_carry_add(0x0F, 0x01, false));
        assert!(!half_carry_add(0x0E, 0x01, false));
        assert!(half_carry_add(0x0E, 0x01, true));
        assert!(half_borrow_sub(0x10, 0x01, false));
        assert!(!half_borrow_sub(0x11, 0x01, false));
        assert!(half_borrow_sub(0x11, 0x01, true));
        assert!(half_carry_add16(0x0FFF, 0x0001));
        assert_eq!(flag_if(true, 0x80), 0x80);
        assert_eq!(flag_if(false, 0x80), 0);
    }
}
