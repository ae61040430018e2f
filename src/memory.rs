//! Bounds-checked reads of the memory images live in.

use embedded_storage::ReadStorage;

use crate::{Address, Error};

/// Read access to the address space holding candidate images.
///
/// Reads outside of what is mapped must fail with [`Error::Unmapped`], never fault.
pub trait Memory {
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> Result<(), Error>;
}

impl<T: Memory + ?Sized> Memory for &mut T {
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> Result<(), Error> {
        (**self).read(address, bytes)
    }
}

/// Offset of `[address, address + len)` inside a region of `size` bytes mapped at `base`.
pub fn checked_offset(base: Address, size: usize, address: Address, len: usize) -> Result<usize, Error> {
    let offset = address.checked_sub(base).ok_or(Error::Unmapped)?;
    let end = offset.checked_add(len).ok_or(Error::Unmapped)?;
    if end > size {
        return Err(Error::Unmapped);
    }
    Ok(offset)
}

/// A storage device mapped into the address space at `base`.
pub struct Region<S> {
    base: Address,
    storage: S,
}

impl<S: ReadStorage> Region<S> {
    pub fn new(base: Address, storage: S) -> Self {
        Self { base, storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: ReadStorage> Memory for Region<S> {
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> Result<(), Error> {
        let offset = checked_offset(self.base, self.storage.capacity(), address, bytes.len())?;
        let offset = u32::try_from(offset).map_err(|_| Error::Unmapped)?;
        self.storage
            .read(offset, bytes)
            .map_err(|_| Error::Unmapped)
    }
}

/// A byte slice pretending to live at `base`, for host-side tools and tests.
pub struct SliceMemory<'a> {
    base: Address,
    bytes: &'a [u8],
}

impl<'a> SliceMemory<'a> {
    pub const fn new(base: Address, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }
}

impl Memory for SliceMemory<'_> {
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> Result<(), Error> {
        let offset = checked_offset(self.base, self.bytes.len(), address, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[offset..offset + bytes.len()]);
        Ok(())
    }
}

/// Window onto physical memory, for images executed in place.
pub struct PhysicalMemory {
    base: Address,
    size: usize,
}

impl PhysicalMemory {
    /// # Safety
    /// The whole range `[base, base + size)` must be mapped and readable for the lifetime
    /// of this value.
    pub const unsafe fn new(base: Address, size: usize) -> Self {
        Self { base, size }
    }
}

impl Memory for PhysicalMemory {
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> Result<(), Error> {
        checked_offset(self.base, self.size, address, bytes.len())?;
        for (i, byte) in bytes.iter_mut().enumerate() {
            // Safety: the range was checked against the window promised readable in `new`.
            *byte = unsafe { core::ptr::read_volatile((address + i) as *const u8) };
        }
        Ok(())
    }
}
