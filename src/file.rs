//! Handles over validated images, executed or read in place.

use crate::{
    Address, Error, Status,
    boot::Boot,
    fmt::{debug, warn},
    header::{FileType, HEADER_SIZE, ImageHeader, Permission, Platform},
    memory::Memory,
};

/// An open image: its validated header plus metadata `X` attached by the kind of file.
///
/// Only the header is copied out of memory, the image itself stays where it is.
#[derive(Debug)]
pub struct FileHandle<X = ()> {
    address: Address,
    header: ImageHeader,
    extra: X,
}

impl FileHandle<()> {
    /// Open the image at `address`. `None` if its header does not validate.
    pub fn open<M: Memory>(memory: &mut M, address: Address, platform: &Platform) -> Option<Self> {
        Self::open_with(memory, address, platform, |_| Ok(()))
    }
}

impl<X> FileHandle<X> {
    /// Open the image at `address` and derive the extra metadata from its header.
    ///
    /// Nothing is kept when either the header or `extra` fails.
    pub fn open_with<M, F>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
        extra: F,
    ) -> Option<Self>
    where
        M: Memory,
        F: FnOnce(&ImageHeader) -> Result<X, Error>,
    {
        let header = ImageHeader::validate(memory, address, platform).ok()?;
        match extra(&header) {
            Ok(extra) => {
                debug!("opened image at {:#x} ({} bytes)", address, header.file_size);
                Some(Self {
                    address,
                    header,
                    extra,
                })
            }
            Err(e) => {
                warn!("image at {:#x} unusable: {:?}", address, e);
                None
            }
        }
    }

    /// Release the handle and leave `None` behind. Closing `None` does nothing.
    pub fn close(handle: &mut Option<Self>) {
        if let Some(file) = handle.take() {
            debug!("closed image at {:#x}", file.address);
        }
    }

    pub fn version(&self) -> u64 {
        self.header.format_version
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn extra(&self) -> &X {
        &self.extra
    }

    /// Size of the image body following the header.
    pub fn body_len(&self) -> usize {
        self.header.file_size as usize - HEADER_SIZE
    }

    /// Read `bytes.len()` bytes of the body starting `offset` bytes past the header.
    pub fn read_body<M: Memory>(
        &self,
        memory: &mut M,
        offset: usize,
        bytes: &mut [u8],
    ) -> Result<(), Error> {
        let end = offset.checked_add(bytes.len()).ok_or(Error::Unmapped)?;
        if end > self.body_len() {
            return Err(Error::Unmapped);
        }
        memory.read(self.address + HEADER_SIZE + offset, bytes)
    }
}

/// Metadata of an executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub entry: Address,
}

pub type ExecutableFile = FileHandle<EntryPoint>;

/// Argument handed to the entry point of an executable image.
pub const ENTRY_ARGUMENT: i32 = 0;

impl FileHandle<EntryPoint> {
    /// Open the image at `address` as an executable: it must be of the executable type,
    /// carry execute permission and an entry address representable on this target.
    pub fn open_executable<M: Memory>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
    ) -> Option<Self> {
        Self::open_with(memory, address, platform, |header| {
            if header.file_type != FileType::Executable
                || !header.permission.contains(Permission::EXECUTE)
            {
                return Err(Error::MalformedHeader);
            }
            let entry = Address::try_from(header.entry_address).map_err(|_| Error::MalformedHeader)?;
            Ok(EntryPoint { entry })
        })
    }

    pub fn entry(&self) -> Address {
        self.extra.entry
    }

    /// Hand control to the entry point.
    ///
    /// # Safety
    /// The validated image must actually contain code for this target at its entry address.
    pub unsafe fn execute<B: Boot>(&self, boot: &mut B) -> Status {
        unsafe { boot.boot(self.extra.entry) }
    }
}
