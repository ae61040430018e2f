use crate::{
    Address,
    mode::{BootMode, ModeImage},
    registry::AddressKey,
};

pub struct Developer;

impl ModeImage for Developer {
    const MODE: BootMode = BootMode::Developer;
    const DEFAULT_ADDRESS: Address = 0xFF40_0000;
    const ADDRESS_KEY: Option<AddressKey> = None;
}
