use crate::{
    Address,
    mode::{BootMode, ModeImage},
    registry::AddressKey,
};

/// Factory or user firmware, the image booted in normal operation.
pub struct User;

impl ModeImage for User {
    const MODE: BootMode = BootMode::User;
    const DEFAULT_ADDRESS: Address = 0xFF80_0000;
    const ADDRESS_KEY: Option<AddressKey> = Some(AddressKey::CoreFileAddress);
}
