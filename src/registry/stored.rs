//! Registry stored as a data image, its body a `postcard` encoded [`RegistryTable`].

use serde::{Deserialize, Serialize};

use crate::{
    Address, Error,
    file::FileHandle,
    fmt::{info, warn},
    header::{FileType, HEADER_SIZE, ImageHeader, Permission, Platform, seal},
    memory::Memory,
    registry::{AddressKey, IntKey, Registry, Runlevels},
};

/// Largest encoded table accepted.
pub const MAX_TABLE_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTable {
    pub runlevels: Runlevels,
    pub core_file_address: Option<u64>,
    pub updater_file_address: Option<u64>,
}

impl RegistryTable {
    /// Write a sealed registry image for `address` into `buffer`, returning its length.
    pub fn write_image(
        &self,
        platform: &Platform,
        address: Address,
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        let body = buffer.get_mut(HEADER_SIZE..).ok_or(Error::MalformedHeader)?;
        let body_len = postcard::to_slice(self, body)
            .map_err(|_| Error::MalformedHeader)?
            .len();
        let len = HEADER_SIZE + body_len;

        let header = ImageHeader::new(
            platform,
            FileType::Data,
            Permission::READ,
            address,
            0,
            len,
            "registry",
        );
        buffer[..HEADER_SIZE].copy_from_slice(&header.encode());
        seal(&mut buffer[..len])?;
        Ok(len)
    }
}

pub struct StoredRegistry {
    table: RegistryTable,
}

impl StoredRegistry {
    /// Validate and decode the registry image at `address`.
    ///
    /// Any failure is reported as [`Error::RegistryUnavailable`].
    pub fn load<M: Memory>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
    ) -> Result<Self, Error> {
        let result = Self::read_table(memory, address, platform);
        match &result {
            Ok(_) => info!("registry loaded from {:#x}", address),
            Err(e) => warn!("registry at {:#x} unavailable: {:?}", address, e),
        }
        result
            .map(|table| Self { table })
            .map_err(|_| Error::RegistryUnavailable)
    }

    fn read_table<M: Memory>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
    ) -> Result<RegistryTable, Error> {
        let file = FileHandle::open_with(memory, address, platform, |header| {
            match header.file_type {
                FileType::Data => Ok(()),
                _ => Err(Error::MalformedHeader),
            }
        })
        .ok_or(Error::MalformedHeader)?;

        let len = file.body_len();
        if len > MAX_TABLE_SIZE {
            return Err(Error::MalformedHeader);
        }
        let mut buffer = [0u8; MAX_TABLE_SIZE];
        file.read_body(memory, 0, &mut buffer[..len])?;

        postcard::from_bytes(&buffer[..len]).map_err(|_| Error::MalformedHeader)
    }

    pub fn table(&self) -> &RegistryTable {
        &self.table
    }
}

impl Registry for StoredRegistry {
    fn int_value(&self, key: IntKey) -> Result<i32, Error> {
        Ok(self.table.runlevels.get(key))
    }

    fn address_value(&self, key: AddressKey) -> Result<Address, Error> {
        let address = match key {
            AddressKey::CoreFileAddress => self.table.core_file_address,
            AddressKey::UpdaterFileAddress => self.table.updater_file_address,
        }
        .ok_or(Error::RegistryUnavailable)?;
        Address::try_from(address).map_err(|_| Error::RegistryUnavailable)
    }
}
