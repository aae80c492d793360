//! Address-space contract consumed by the cores.
//!
//! A core never owns memory: it receives boxed [`AddressSpace`] handles at
//! construction and issues every bus cycle through them, in the order and
//! count the real part does.

use std::cell::RefCell;
use std::rc::Rc;

/// Width-validation and byte-assembly helpers.
pub mod access;
/// Range-mapped backing store.
pub mod map;

pub use access::{assemble, require_space, split};
pub use map::{AddressMap, ReadHandler, WriteHandler};

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    /// One addressable unit.
    Byte,
    /// Two units.
    Word,
    /// Four units.
    DWord,
}

impl AccessWidth {
    /// Number of addressable units touched.
    #[must_use]
    pub const fn units(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::DWord => 4,
        }
    }
}

/// Byte order for multi-unit accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Lowest address holds the least significant unit.
    #[default]
    Little,
    /// Lowest address holds the most significant unit.
    Big,
}

/// Shape of an address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SpaceConfig {
    /// Name used in logs.
    pub name: &'static str,
    /// Address bus width in bits.
    pub address_width: u8,
    /// Bits per addressable unit.
    pub data_width: u8,
    /// Order of units in multi-unit accesses.
    pub endianness: Endianness,
}

impl SpaceConfig {
    /// Creates a little-endian space description.
    #[must_use]
    pub const fn new(name: &'static str, address_width: u8, data_width: u8) -> Self {
        Self {
            name,
            address_width,
            data_width,
            endianness: Endianness::Little,
        }
    }

    /// Returns a copy with a different byte order.
    #[must_use]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Mask applied to every address.
    #[must_use]
    pub const fn address_mask(&self) -> u32 {
        if self.address_width >= 32 {
            u32::MAX
        } else {
            (1 << self.address_width) - 1
        }
    }

    /// Mask applied to every unit of data.
    #[must_use]
    pub const fn data_mask(&self) -> u32 {
        if self.data_width >= 32 {
            u32::MAX
        } else {
            (1 << self.data_width) - 1
        }
    }
}

/// Memory-mapped view a core reads and writes through.
///
/// Reads take `&mut self` because device reads may have side effects.
/// Unmapped locations read back a fill value and swallow writes; they never
/// produce an error.
pub trait AddressSpace {
    /// Shape of this space.
    fn config(&self) -> SpaceConfig;

    /// Reads `width` units starting at `address`.
    fn read(&mut self, width: AccessWidth, address: u32) -> u32;

    /// Writes `width` units starting at `address`.
    fn write(&mut self, width: AccessWidth, address: u32, value: u32);

    /// Reads one unit.
    fn read_byte(&mut self, address: u32) -> u8 {
        (self.read(AccessWidth::Byte, address) & 0xFF) as u8
    }

    /// Writes one unit.
    fn write_byte(&mut self, address: u32, value: u8) {
        self.write(AccessWidth::Byte, address, u32::from(value));
    }

    /// Drains wait states accumulated by accesses since the last call.
    fn take_wait_states(&mut self) -> u32 {
        0
    }
}

impl<T: AddressSpace + ?Sized> AddressSpace for Box<T> {
    fn config(&self) -> SpaceConfig {
        (**self).config()
    }

    fn read(&mut self, width: AccessWidth, address: u32) -> u32 {
        (**self).read(width, address)
    }

    fn write(&mut self, width: AccessWidth, address: u32, value: u32) {
        (**self).write(width, address, value);
    }

    fn take_wait_states(&mut self) -> u32 {
        (**self).take_wait_states()
    }
}

/// Space shared between several cores or devices.
///
/// Only one core runs at a time under the scheduler, so the inner borrow is
/// never contended. Handlers mapped into the space must not access the same
/// shared space recursively.
#[derive(Debug, Default)]
pub struct SharedSpace<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for SharedSpace<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> SharedSpace<T> {
    /// Wraps a space for sharing.
    #[must_use]
    pub fn new(space: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(space)),
        }
    }

    /// Runs `f` with exclusive access to the wrapped space.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}

impl<T: AddressSpace> AddressSpace for SharedSpace<T> {
    fn config(&self) -> SpaceConfig {
        self.inner.borrow().config()
    }

    fn read(&mut self, width: AccessWidth, address: u32) -> u32 {
        self.inner.borrow_mut().read(width, address)
    }

    fn write(&mut self, width: AccessWidth, address: u32, value: u32) {
        self.inner.borrow_mut().write(width, address, value);
    }

    fn take_wait_states(&mut self) -> u32 {
        self.inner.borrow_mut().take_wait_states()
    }
}
