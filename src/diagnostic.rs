//! Read-after-write memory checks, run on RAM before anything is loaded into it.

use crate::{Address, fmt::warn};

/// Read-after-write checker for one bus width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostician {
    Bus8,
    Bus16,
    Bus32,
}

const DIAGNOSTICIANS: [(usize, Diagnostician); 3] = [
    (1, Diagnostician::Bus8),
    (2, Diagnostician::Bus16),
    (4, Diagnostician::Bus32),
];

impl Diagnostician {
    /// Checker for a bus of `bus_width` bytes, if there is one.
    pub fn for_bus_width(bus_width: usize) -> Option<Self> {
        DIAGNOSTICIANS
            .iter()
            .find(|(width, _)| *width == bus_width)
            .map(|(_, diagnostician)| *diagnostician)
    }

    pub const fn bus_width(self) -> usize {
        match self {
            Diagnostician::Bus8 => 1,
            Diagnostician::Bus16 => 2,
            Diagnostician::Bus32 => 4,
        }
    }

    /// Fill `[top, top + size)` with `pattern` unit by unit, then read everything back.
    ///
    /// Only whole units are tested, a tail shorter than the bus width is left alone.
    /// Fails without touching memory if the range wraps the address space or `pattern`
    /// does not fit the bus width.
    ///
    /// # Safety
    /// The range must be writable RAM, aligned to the bus width, that nothing else uses
    /// while the check runs. Its contents are destroyed.
    pub unsafe fn read_after_write(self, top: Address, size: usize, pattern: u32) -> bool {
        if top.checked_add(size).is_none() {
            return false;
        }

        let passed = match self {
            Diagnostician::Bus8 => match u8::try_from(pattern) {
                Ok(pattern) => unsafe { check(top as *mut u8, size, pattern) },
                Err(_) => false,
            },
            Diagnostician::Bus16 => match u16::try_from(pattern) {
                Ok(pattern) => unsafe { check(top as *mut u16, size / 2, pattern) },
                Err(_) => false,
            },
            Diagnostician::Bus32 => unsafe { check(top as *mut u32, size / 4, pattern) },
        };
        if !passed {
            warn!("memory check failed at {:#x} ({} bytes)", top, size);
        }
        passed
    }
}

unsafe fn check<T: Copy + PartialEq>(base: *mut T, count: usize, pattern: T) -> bool {
    for i in 0..count {
        unsafe { core::ptr::write_volatile(base.add(i), pattern) };
    }
    (0..count).all(|i| unsafe { core::ptr::read_volatile(base.add(i)) } == pattern)
}
