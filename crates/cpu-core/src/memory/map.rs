//! Range-mapped address space built from RAM, ROM and device handlers.

use std::fmt;

use super::access::{assemble, split};
use super::{AccessWidth, AddressSpace, SpaceConfig};
use crate::ConfigError;

/// Device read callback, given the masked address.
pub type ReadHandler = Box<dyn FnMut(u32) -> u8>;
/// Device write callback, given the masked address and value.
pub type WriteHandler = Box<dyn FnMut(u32, u8)>;

enum Backing {
    Ram(Vec<u8>),
    Rom(Vec<u8>),
    Device {
        read: ReadHandler,
        write: WriteHandler,
    },
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ram(cells) => write!(f, "Ram({} cells)", cells.len()),
            Self::Rom(cells) => write!(f, "Rom({} cells)", cells.len()),
            Self::Device { .. } => f.write_str("Device"),
        }
    }
}

#[derive(Debug)]
struct Region {
    start: u32,
    end: u32,
    wait_states: u32,
    backing: Backing,
}

impl Region {
    const fn contains(&self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }
}

/// Address space assembled from non-overlapping regions.
///
/// Each unit is stored in one byte and masked to the space's data width.
/// Word and double-word accesses are split into unit accesses in ascending
/// address order and assembled per the space's endianness.
#[derive(Debug)]
pub struct AddressMap {
    config: SpaceConfig,
    regions: Vec<Region>,
    unmapped_fill: u8,
    pending_wait_states: u32,
}

impl AddressMap {
    /// Creates an empty map; every address is unmapped and reads as `0xFF`
    /// masked to the data width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] when the space has no
    /// address bits, more than 32, or units wider than eight bits.
    pub fn new(config: SpaceConfig) -> Result<Self, ConfigError> {
        if config.address_width == 0 || config.address_width > 32 {
            return Err(ConfigError::InvalidParameter {
                parameter: "address_width",
                reason: format!("{} is outside 1..=32", config.address_width),
            });
        }
        if config.data_width == 0 || config.data_width > 8 {
            return Err(ConfigError::InvalidParameter {
                parameter: "data_width",
                reason: format!("{} is outside 1..=8", config.data_width),
            });
        }
        Ok(Self {
            config,
            regions: Vec::new(),
            unmapped_fill: 0xFF,
            pending_wait_states: 0,
        })
    }

    /// Sets the value unmapped reads return.
    #[must_use]
    pub const fn with_unmapped_fill(mut self, fill: u8) -> Self {
        self.unmapped_fill = fill;
        self
    }

    fn check_region(&self, start: u32, end: u32) -> Result<(), ConfigError> {
        let mask = self.config.address_mask();
        let overlaps = self
            .regions
            .iter()
            .any(|region| start <= region.end && region.start <= end);
        if start > end || end > mask || overlaps {
            return Err(ConfigError::InvalidRegion { start, end });
        }
        Ok(())
    }

    fn insert(&mut self, start: u32, end: u32, backing: Backing) -> Result<&mut Self, ConfigError> {
        self.check_region(start, end)?;
        self.regions.push(Region {
            start,
            end,
            wait_states: 0,
            backing,
        });
        Ok(self)
    }

    /// Maps zero-filled RAM over `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegion`] when the range is empty, leaves
    /// the space, or overlaps an existing region.
    pub fn map_ram(&mut self, start: u32, end: u32) -> Result<&mut Self, ConfigError> {
        self.check_region(start, end)?;
        let len = (end - start) as usize + 1;
        self.insert(start, end, Backing::Ram(vec![0; len]))
    }

    /// Maps read-only `image` at `start`. Writes to it are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegion`] for an empty image or an image
    /// that does not fit.
    pub fn map_rom(&mut self, start: u32, image: &[u8]) -> Result<&mut Self, ConfigError> {
        let Some(last) = u32::try_from(image.len())
            .ok()
            .and_then(|len| len.checked_sub(1))
            .and_then(|offset| start.checked_add(offset))
        else {
            return Err(ConfigError::InvalidRegion { start, end: start });
        };
        let mask = self.config.data_mask() as u8;
        let cells = image.iter().map(|byte| byte & mask).collect();
        self.insert(start, last, Backing::Rom(cells))
    }

    /// Maps a device over `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegion`] like [`Self::map_ram`].
    pub fn map_device(
        &mut self,
        start: u32,
        end: u32,
        read: ReadHandler,
        write: WriteHandler,
    ) -> Result<&mut Self, ConfigError> {
        self.insert(start, end, Backing::Device { read, write })
    }

    /// Charges `cycles` extra cycles per unit accessed in the region holding
    /// `address`. Returns `false` when `address` is unmapped.
    pub fn set_wait_states(&mut self, address: u32, cycles: u32) -> bool {
        let address = address & self.config.address_mask();
        self.regions
            .iter_mut()
            .find(|region| region.contains(address))
            .map(|region| region.wait_states = cycles)
            .is_some()
    }

    /// Writes `bytes` into RAM or ROM backing, ignoring ROM protection and
    /// skipping devices. Used to preload programs and fixtures.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let mask = self.config.address_mask();
        let data_mask = self.config.data_mask() as u8;
        let mut address = address;
        for byte in bytes {
            let masked = address & mask;
            if let Some(region) = self.regions.iter_mut().find(|region| region.contains(masked)) {
                let offset = (masked - region.start) as usize;
                match &mut region.backing {
                    Backing::Ram(cells) | Backing::Rom(cells) => cells[offset] = byte & data_mask,
                    Backing::Device { .. } => {}
                }
            }
            address = address.wrapping_add(1);
        }
    }

    /// Reads a unit without side effects. Devices and unmapped addresses
    /// return the fill value.
    #[must_use]
    pub fn peek(&self, address: u32) -> u8 {
        let masked = address & self.config.address_mask();
        self.regions
            .iter()
            .find(|region| region.contains(masked))
            .and_then(|region| match &region.backing {
                Backing::Ram(cells) | Backing::Rom(cells) => {
                    cells.get((masked - region.start) as usize).copied()
                }
                Backing::Device { .. } => None,
            })
            .unwrap_or_else(|| self.fill())
    }

    const fn fill(&self) -> u8 {
        self.unmapped_fill & (self.config.data_mask() as u8)
    }

    fn read_unit(&mut self, address: u32) -> u8 {
        let masked = address & self.config.address_mask();
        let data_mask = self.config.data_mask() as u8;
        let fill = self.fill();
        let Some(region) = self.regions.iter_mut().find(|region| region.contains(masked)) else {
            return fill;
        };
        self.pending_wait_states = self.pending_wait_states.saturating_add(region.wait_states);
        let offset = masked - region.start;
        match &mut region.backing {
            Backing::Ram(cells) | Backing::Rom(cells) => cells[offset as usize],
            Backing::Device { read, .. } => read(masked) & data_mask,
        }
    }

    fn write_unit(&mut self, address: u32, value: u8) {
        let masked = address & self.config.address_mask();
        let value = value & (self.config.data_mask() as u8);
        let Some(region) = self.regions.iter_mut().find(|region| region.contains(masked)) else {
            return;
        };
        self.pending_wait_states = self.pending_wait_states.saturating_add(region.wait_states);
        let offset = masked - region.start;
        match &mut region.backing {
            Backing::Ram(cells) => cells[offset as usize] = value,
            Backing::Rom(_) => {}
            Backing::Device { write, .. } => write(masked, value),
        }
    }
}

impl AddressSpace for AddressMap {
    fn config(&self) -> SpaceConfig {
        self.config
    }

    fn read(&mut self, width: AccessWidth, address: u32) -> u32 {
        if width == AccessWidth::Byte {
            return u32::from(self.read_unit(address));
        }
        let units: Vec<u8> = (0..width.units())
            .map(|index| self.read_unit(address.wrapping_add(index)))
            .collect();
        assemble(&units, self.config.data_width, self.config.endianness)
    }

    fn write(&mut self, width: AccessWidth, address: u32, value: u32) {
        if width == AccessWidth::Byte {
            self.write_unit(address, (value & 0xFF) as u8);
            return;
        }
        let units = split(
            value,
            width.units(),
            self.config.data_width,
            self.config.endianness,
        );
        for (index, unit) in (0u32..).zip(units) {
            self.write_unit(address.wrapping_add(index), unit);
        }
    }

    fn take_wait_states(&mut self) -> u32 {
        std::mem::take(&mut self.pending_wait_states)
    }
}
