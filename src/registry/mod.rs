//! Read-only view of the boot configuration registry.

use serde::{Deserialize, Serialize};

use crate::{Address, Error};

pub mod fixed;
#[cfg(feature = "stored_registry")]
pub mod stored;

/// Where the registry image is placed.
pub const REGISTRY_FILE_ADDRESS: Address = 0xFFFF_C000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntKey {
    /// Runlevel to boot into.
    DefaultRunlevel,
    LowestRunlevel,
    HighestRunlevel,
    NumOfRunlevels,
    HaltModeRunlevel,
    RecoveryModeRunlevel,
    UpdateModeRunlevel,
    UserModeRunlevel,
    DeveloperModeRunlevel,
    RebootModeRunlevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKey {
    /// Image run in user mode.
    CoreFileAddress,
    /// Image run in update mode.
    UpdaterFileAddress,
}

/// Key-value store for boot policy and image addresses.
///
/// A missing key is reported as [`Error::RegistryUnavailable`].
pub trait Registry {
    fn int_value(&self, key: IntKey) -> Result<i32, Error>;

    fn address_value(&self, key: AddressKey) -> Result<Address, Error>;
}

impl<T: Registry + ?Sized> Registry for &T {
    fn int_value(&self, key: IntKey) -> Result<i32, Error> {
        (**self).int_value(key)
    }

    fn address_value(&self, key: AddressKey) -> Result<Address, Error> {
        (**self).address_value(key)
    }
}

/// The runlevel numbering of the system, and which one to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runlevels {
    pub default: i32,
    pub lowest: i32,
    pub highest: i32,
    pub halt: i32,
    pub recovery: i32,
    pub update: i32,
    pub user: i32,
    pub developer: i32,
    pub reboot: i32,
}

impl Runlevels {
    pub const DEFAULT: Runlevels = Runlevels {
        default: 3,
        lowest: 0,
        highest: 5,
        halt: 0,
        recovery: 1,
        update: 2,
        user: 3,
        developer: 4,
        reboot: 5,
    };

    pub const fn get(&self, key: IntKey) -> i32 {
        match key {
            IntKey::DefaultRunlevel => self.default,
            IntKey::LowestRunlevel => self.lowest,
            IntKey::HighestRunlevel => self.highest,
            IntKey::NumOfRunlevels => self.highest - self.lowest + 1,
            IntKey::HaltModeRunlevel => self.halt,
            IntKey::RecoveryModeRunlevel => self.recovery,
            IntKey::UpdateModeRunlevel => self.update,
            IntKey::UserModeRunlevel => self.user,
            IntKey::DeveloperModeRunlevel => self.developer,
            IntKey::RebootModeRunlevel => self.reboot,
        }
    }
}

impl Default for Runlevels {
    fn default() -> Self {
        Self::DEFAULT
    }
}
