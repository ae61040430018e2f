//! Registry compiled into the loader.

use crate::{
    Address, Error,
    registry::{AddressKey, IntKey, Registry, Runlevels},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRegistry {
    runlevels: Runlevels,
    core_file_address: Option<Address>,
    updater_file_address: Option<Address>,
}

impl FixedRegistry {
    /// Default runlevel numbering, booting user mode, without image addresses.
    pub const fn new() -> Self {
        Self {
            runlevels: Runlevels::DEFAULT,
            core_file_address: None,
            updater_file_address: None,
        }
    }

    pub const fn with_runlevels(mut self, runlevels: Runlevels) -> Self {
        self.runlevels = runlevels;
        self
    }

    pub const fn with_default_runlevel(mut self, runlevel: i32) -> Self {
        self.runlevels.default = runlevel;
        self
    }

    pub const fn with_address(mut self, key: AddressKey, address: Address) -> Self {
        match key {
            AddressKey::CoreFileAddress => self.core_file_address = Some(address),
            AddressKey::UpdaterFileAddress => self.updater_file_address = Some(address),
        }
        self
    }
}

impl Default for FixedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for FixedRegistry {
    fn int_value(&self, key: IntKey) -> Result<i32, Error> {
        Ok(self.runlevels.get(key))
    }

    fn address_value(&self, key: AddressKey) -> Result<Address, Error> {
        match key {
            AddressKey::CoreFileAddress => self.core_file_address,
            AddressKey::UpdaterFileAddress => self.updater_file_address,
        }
        .ok_or(Error::RegistryUnavailable)
    }
}
