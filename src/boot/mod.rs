//! Transfer of control into a validated image.

#[cfg(feature = "cortex_m")]
pub mod cortex_m;

pub mod call;

use crate::{Address, Status};

/// Bootload mechanism that at the least jumps to the entry address of an image.
///
/// Production implementations never return. Test doubles may record the jump and return
/// a status instead.
pub trait Boot {
    /// Jump to `entry`, the first instruction (or vector table) of an image.
    ///
    /// # Safety
    /// `entry` must point at code valid for this target.
    unsafe fn boot(&mut self, entry: Address) -> Status;
}

impl<T: Boot + ?Sized> Boot for &mut T {
    unsafe fn boot(&mut self, entry: Address) -> Status {
        unsafe { (**self).boot(entry) }
    }
}

/// Stop for good: nothing bootable is left.
pub fn halt() -> ! {
    loop {
        #[cfg(feature = "cortex_m")]
        ::cortex_m::asm::wfi();
        #[cfg(not(feature = "cortex_m"))]
        core::hint::spin_loop();
    }
}

/// Restart the system for a new boot attempt.
pub fn reboot() -> ! {
    #[cfg(feature = "cortex_m")]
    {
        ::cortex_m::peripheral::SCB::sys_reset()
    }
    #[cfg(not(feature = "cortex_m"))]
    {
        halt()
    }
}
