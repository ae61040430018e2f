use crate::{Address, Status, boot::Boot};

/// Simple bootload mechanism for Cortex-M without support for TrustZone.
///
/// The entry address of the image is its vector table. Never returns, so no [`Status`]
/// ever reaches the caller.
pub struct SimpleCortexM;

impl Boot for SimpleCortexM {
    unsafe fn boot(&mut self, entry: Address) -> Status {
        unsafe { ::cortex_m::asm::bootload(entry as *const u32) }
    }
}
