use crate::{Address, Status, boot::Boot, file::ENTRY_ARGUMENT};

/// Signature of an image entry point called directly.
pub type EntryFn = extern "C" fn(i32) -> i32;

/// Calls the entry address as a C function taking the boot argument.
///
/// Images normally do not return. If one does, its return value is passed back.
pub struct EntryCall;

impl Boot for EntryCall {
    unsafe fn boot(&mut self, entry: Address) -> Status {
        // Safety: the caller guarantees `entry` points at a function of this signature.
        let entry = unsafe { core::mem::transmute::<Address, EntryFn>(entry) };
        entry(ENTRY_ARGUMENT)
    }
}
