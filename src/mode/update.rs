use crate::{
    Address,
    mode::{BootMode, ModeImage},
    registry::AddressKey,
};

/// Field-update firmware.
pub struct Update;

impl ModeImage for Update {
    const MODE: BootMode = BootMode::Update;
    const DEFAULT_ADDRESS: Address = 0xFFC0_0000;
    const ADDRESS_KEY: Option<AddressKey> = Some(AddressKey::UpdaterFileAddress);
}
