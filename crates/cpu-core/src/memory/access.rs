//! Setup-time space validation and multi-unit access helpers.

use super::{Endianness, SpaceConfig};
use crate::ConfigError;

/// Checks a supplied space against what a core needs.
///
/// The address bus must be at least `min_address_width` bits and the data
/// width must match exactly.
///
/// # Errors
///
/// Returns [`ConfigError::SpaceMismatch`] describing the first mismatch.
pub fn require_space(
    role: &'static str,
    actual: SpaceConfig,
    min_address_width: u8,
    data_width: u8,
) -> Result<(), ConfigError> {
    if actual.address_width < min_address_width || actual.address_width > 32 {
        return Err(ConfigError::SpaceMismatch {
            space: role,
            expected: format!("{min_address_width}..=32 address bits"),
            actual: format!("{} address bits", actual.address_width),
        });
    }
    if actual.data_width != data_width {
        return Err(ConfigError::SpaceMismatch {
            space: role,
            expected: format!("{data_width}-bit data"),
            actual: format!("{}-bit data", actual.data_width),
        });
    }
    Ok(())
}

/// Combines units read in address order into one value.
#[must_use]
pub fn assemble(units: &[u8], data_width: u8, endianness: Endianness) -> u32 {
    let shift = u32::from(data_width.min(8));
    let fold = |acc: u32, unit: &u8| (acc << shift) | u32::from(*unit);
    match endianness {
        Endianness::Little => units.iter().rev().fold(0, fold),
        Endianness::Big => units.iter().fold(0, fold),
    }
}

/// Splits a value into `count` units in address order.
#[must_use]
pub fn split(value: u32, count: u32, data_width: u8, endianness: Endianness) -> Vec<u8> {
    let shift = u32::from(data_width.min(8));
    let mask = (1u32 << shift) - 1;
    let mut units: Vec<u8> = (0..count)
        .map(|index| {
            let bits = value.checked_shr(index * shift).unwrap_or(0);
            (bits & mask) as u8
        })
        .collect();
    if endianness == Endianness::Big {
        units.reverse();
    }
    units
}
