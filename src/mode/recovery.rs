use crate::{
    Address,
    mode::{BootMode, ModeImage},
    registry::AddressKey,
};

/// Recovery firmware, last resort before halting.
pub struct Recovery;

impl ModeImage for Recovery {
    const MODE: BootMode = BootMode::Recovery;
    const DEFAULT_ADDRESS: Address = 0xFFF0_0000;
    const ADDRESS_KEY: Option<AddressKey> = None;
}
