use std::vec::Vec;

use embedded_storage::ReadStorage;

use crate::{
    Address, Error, Status,
    boot::Boot,
    header::{FileType, ImageHeader, Permission, Platform, seal},
    registry::{AddressKey, IntKey, Registry, Runlevels},
};

/// Flash device backed by a vector, keeping a log of every read.
#[derive(Debug)]
pub struct MockFlash {
    pub data: Vec<u8>,
    pub reads: Vec<(usize, usize)>,
}

impl MockFlash {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: Vec::new(),
        }
    }

    pub fn erased(size: usize) -> Self {
        Self::new(std::vec![0xff; size])
    }

    pub fn place(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Number of reads of exactly `len` bytes at `offset`.
    pub fn reads_at(&self, offset: usize, len: usize) -> usize {
        self.reads.iter().filter(|read| **read == (offset, len)).count()
    }
}

impl ReadStorage for MockFlash {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), ()> {
        let offset = offset as usize;
        self.reads.push((offset, bytes.len()));
        let source = self.data.get(offset..offset + bytes.len()).ok_or(())?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Boot backend that records the jump and comes back.
#[derive(Debug, Default)]
pub struct RecordingBoot {
    pub entries: Vec<Address>,
}

impl RecordingBoot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Boot for RecordingBoot {
    unsafe fn boot(&mut self, entry: Address) -> Status {
        self.entries.push(entry);
        0
    }
}

/// Registry with the default runlevels, except for one key it cannot read.
pub struct BrokenRegistry {
    missing: IntKey,
}

impl BrokenRegistry {
    pub fn missing(key: IntKey) -> Self {
        Self { missing: key }
    }
}

impl Registry for BrokenRegistry {
    fn int_value(&self, key: IntKey) -> Result<i32, Error> {
        if key == self.missing {
            return Err(Error::RegistryUnavailable);
        }
        Ok(Runlevels::DEFAULT.get(key))
    }

    fn address_value(&self, _key: AddressKey) -> Result<Address, Error> {
        Err(Error::RegistryUnavailable)
    }
}

/// Builds sealed images for tests.
pub struct ImageBuilder {
    address: Address,
    entry: Address,
    file_type: FileType,
    permission: Permission,
    body: Vec<u8>,
}

impl ImageBuilder {
    pub fn executable(address: Address, entry: Address) -> Self {
        Self {
            address,
            entry,
            file_type: FileType::Executable,
            permission: Permission::RX,
            body: Vec::new(),
        }
        .body_len(64)
    }

    /// Body of `len` bytes, none of them zero.
    pub fn body_len(mut self, len: usize) -> Self {
        self.body = (0..len).map(|i| (i % 251) as u8 + 1).collect();
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    pub fn file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header = ImageHeader::new(
            &Platform::DEFAULT,
            self.file_type,
            self.permission,
            self.address,
            self.entry,
            crate::header::HEADER_SIZE + self.body.len(),
            "test image",
        );
        let mut image = header.encode().to_vec();
        image.extend_from_slice(&self.body);
        seal(&mut image).unwrap();
        image
    }
}

pub fn flip_bit(bytes: &mut [u8], bit: usize) {
    bytes[bit / 8] ^= 1 << (bit % 8);
}
