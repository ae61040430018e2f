//! Fixed-layout image header found at offset 0 of every candidate image.
//!
//! All fields are little-endian, matching the `DATA_LSB` tag in the identification bytes.
//!
//! | offset | size | field            |
//! |-------:|-----:|------------------|
//! |      0 |    8 | identification   |
//! |      8 |    2 | file type        |
//! |     10 |    2 | permission       |
//! |     12 |    4 | reserved         |
//! |     16 |    4 | header size      |
//! |     20 |    4 | reserved         |
//! |     24 |    8 | format version   |
//! |     32 |    8 | file size        |
//! |     40 |    8 | file address     |
//! |     48 |    8 | entry address    |
//! |     56 |    4 | checksum         |
//! |     60 |    4 | reserved         |
//! |     64 |   64 | description      |
//!
//! The checksum is the [`modular_sum`](crate::checksum::modular_sum) over the first
//! `file_size` bytes of the image with the checksum field read as zero.

use bitflags::bitflags;

use crate::{
    Address, Error,
    checksum::ModularSum,
    fmt::debug,
    memory::Memory,
};

pub const HEADER_SIZE: usize = 128;
pub const DESCRIPTION_SIZE: usize = 64;

pub const CLASS_64: u8 = 2;
pub const DATA_LSB: u8 = 1;
pub const IDENT_VERSION: u8 = 1;
pub const IDENTIFICATION: [u8; 8] = [0x7f, b'S', b'I', b'F', CLASS_64, DATA_LSB, IDENT_VERSION, 0];

const CHECKSUM_OFFSET: usize = 56;
const CHECKSUM_FIELD: core::ops::Range<usize> = CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4;

/// Granularity at which image bodies are streamed through the checksum.
const CHUNK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum FileType {
    None = 0,
    Executable = 1,
    Data = 2,
}

impl TryFrom<u16> for FileType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Error> {
        match value {
            0 => Ok(FileType::None),
            1 => Ok(FileType::Executable),
            2 => Ok(FileType::Data),
            _ => Err(Error::MalformedHeader),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permission: u16 {
        const EXECUTE = 0b001;
        const WRITE = 0b010;
        const READ = 0b100;
    }
}

impl Permission {
    pub const RX: Permission = Permission::READ.union(Permission::EXECUTE);
}

/// Expectations compiled into the loader that every image must be stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub format_version: u64,
    /// Upper bound for `file_size`, the size of the largest image region.
    pub max_image_size: usize,
}

impl Platform {
    pub const DEFAULT: Platform = Platform {
        format_version: 0x0000_0001_0000_0000,
        max_image_size: 16 * 1024 * 1024,
    };
}

impl Default for Platform {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub identification: [u8; 8],
    pub file_type: FileType,
    pub permission: Permission,
    pub header_size: u32,
    pub format_version: u64,
    pub file_size: u64,
    /// Address this header is expected to reside at.
    pub file_address: u64,
    pub entry_address: u64,
    pub checksum: u32,
    pub description: [u8; DESCRIPTION_SIZE],
}

impl ImageHeader {
    /// Header for a new image of `file_size` bytes placed at `file_address`, checksum unset.
    ///
    /// The description is truncated to fit on a character boundary and always NUL terminated.
    pub fn new(
        platform: &Platform,
        file_type: FileType,
        permission: Permission,
        file_address: Address,
        entry_address: Address,
        file_size: usize,
        description: &str,
    ) -> Self {
        let mut text = [0u8; DESCRIPTION_SIZE];
        let mut len = description.len().min(DESCRIPTION_SIZE - 1);
        while !description.is_char_boundary(len) {
            len -= 1;
        }
        text[..len].copy_from_slice(&description.as_bytes()[..len]);

        Self {
            identification: IDENTIFICATION,
            file_type,
            permission,
            header_size: HEADER_SIZE as u32,
            format_version: platform.format_version,
            file_size: file_size as u64,
            file_address: file_address as u64,
            entry_address: entry_address as u64,
            checksum: 0,
            description: text,
        }
    }

    /// Decode the raw layout. Only enumerated fields are checked here, see [`Self::check`].
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Result<Self, Error> {
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let u32_at = |at: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&raw[at..at + 4]);
            u32::from_le_bytes(word)
        };
        let u64_at = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&raw[at..at + 8]);
            u64::from_le_bytes(word)
        };

        let mut identification = [0u8; 8];
        identification.copy_from_slice(&raw[0..8]);
        let mut description = [0u8; DESCRIPTION_SIZE];
        description.copy_from_slice(&raw[64..64 + DESCRIPTION_SIZE]);

        Ok(Self {
            identification,
            file_type: FileType::try_from(u16_at(8))?,
            permission: Permission::from_bits(u16_at(10)).ok_or(Error::MalformedHeader)?,
            header_size: u32_at(16),
            format_version: u64_at(24),
            file_size: u64_at(32),
            file_address: u64_at(40),
            entry_address: u64_at(48),
            checksum: u32_at(CHECKSUM_OFFSET),
            description,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..8].copy_from_slice(&self.identification);
        raw[8..10].copy_from_slice(&(self.file_type as u16).to_le_bytes());
        raw[10..12].copy_from_slice(&self.permission.bits().to_le_bytes());
        raw[16..20].copy_from_slice(&self.header_size.to_le_bytes());
        raw[24..32].copy_from_slice(&self.format_version.to_le_bytes());
        raw[32..40].copy_from_slice(&self.file_size.to_le_bytes());
        raw[40..48].copy_from_slice(&self.file_address.to_le_bytes());
        raw[48..56].copy_from_slice(&self.entry_address.to_le_bytes());
        raw[CHECKSUM_FIELD].copy_from_slice(&self.checksum.to_le_bytes());
        raw[64..64 + DESCRIPTION_SIZE].copy_from_slice(&self.description);
        raw
    }

    /// Structural checks against the compiled expectations and the address read from.
    pub fn check(&self, address: Address, platform: &Platform) -> Result<(), Error> {
        if self.identification != IDENTIFICATION
            || self.header_size as usize != HEADER_SIZE
            || self.format_version != platform.format_version
            || self.file_size < HEADER_SIZE as u64
            || self.file_size > platform.max_image_size as u64
            || self.file_address != address as u64
        {
            return Err(Error::MalformedHeader);
        }
        Ok(())
    }

    /// Validate the image whose header sits at `address`, returning the decoded header.
    ///
    /// Never writes to memory. Anything unreadable, out of range or inconsistent is an error.
    pub fn validate<M: Memory>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
    ) -> Result<Self, Error> {
        let result = Self::read_and_verify(memory, address, platform);
        if let Err(e) = result {
            debug!("header at {:#x} rejected: {:?}", address, e);
        }
        result
    }

    /// Boolean form of [`Self::validate`].
    pub fn is_valid<M: Memory>(memory: &mut M, address: Address, platform: &Platform) -> bool {
        Self::validate(memory, address, platform).is_ok()
    }

    fn read_and_verify<M: Memory>(
        memory: &mut M,
        address: Address,
        platform: &Platform,
    ) -> Result<Self, Error> {
        let mut raw = [0u8; HEADER_SIZE];
        memory.read(address, &mut raw)?;

        let header = Self::decode(&raw)?;
        header.check(address, platform)?;

        // Bounded by `max_image_size` in `check`.
        let file_size = header.file_size as usize;
        let mut sum = ModularSum::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut offset = 0;
        while offset < file_size {
            let len = CHUNK_SIZE.min(file_size - offset);
            let at = address.checked_add(offset).ok_or(Error::Unmapped)?;
            memory.read(at, &mut chunk[..len])?;
            mask_checksum(offset, &mut chunk[..len]);
            sum.update(&chunk[..len]);
            offset += len;
        }

        if sum.finish() != header.checksum {
            return Err(Error::ChecksumMismatch);
        }
        Ok(header)
    }

    /// Description up to the first NUL, empty if it is not UTF-8.
    pub fn description(&self) -> &str {
        let len = self
            .description
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DESCRIPTION_SIZE);
        core::str::from_utf8(&self.description[..len]).unwrap_or("")
    }
}

/// Zero the bytes of `chunk`, found at `offset` in the image, that belong to the checksum field.
fn mask_checksum(offset: usize, chunk: &mut [u8]) {
    for (i, byte) in chunk.iter_mut().enumerate() {
        if CHECKSUM_FIELD.contains(&(offset + i)) {
            *byte = 0;
        }
    }
}

/// Checksum of a complete image with the checksum field read as zero.
pub fn image_checksum(image: &[u8]) -> u32 {
    let mut sum = ModularSum::new();
    for (index, chunk) in image.chunks(CHUNK_SIZE).enumerate() {
        let mut buf = [0u8; CHUNK_SIZE];
        let buf = &mut buf[..chunk.len()];
        buf.copy_from_slice(chunk);
        mask_checksum(index * CHUNK_SIZE, buf);
        sum.update(buf);
    }
    sum.finish()
}

/// Compute and embed the checksum of a complete image in place.
///
/// `image` must be exactly `file_size` bytes long, starting with an encoded header.
pub fn seal(image: &mut [u8]) -> Result<u32, Error> {
    let raw: &[u8; HEADER_SIZE] = image
        .get(..HEADER_SIZE)
        .and_then(|head| head.try_into().ok())
        .ok_or(Error::MalformedHeader)?;
    let header = ImageHeader::decode(raw)?;
    if header.file_size != image.len() as u64 {
        return Err(Error::MalformedHeader);
    }

    let checksum = image_checksum(image);
    image[CHECKSUM_FIELD].copy_from_slice(&checksum.to_le_bytes());
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::SliceMemory,
        mock::{ImageBuilder, flip_bit},
    };

    const AT: Address = 0x4000;

    #[test]
    fn sealed_image_validates() {
        let image = ImageBuilder::executable(AT, 0x4100).body_len(200).build();
        let mut memory = SliceMemory::new(AT, &image);

        let header = ImageHeader::validate(&mut memory, AT, &Platform::DEFAULT).unwrap();
        assert_eq!(header.entry_address, 0x4100);
        assert_eq!(header.file_size, image.len() as u64);
        assert_eq!(header.description(), "test image");
        assert_eq!(header.checksum, image_checksum(&image));
    }

    #[test]
    fn encode_matches_declared_layout() {
        let header = ImageHeader::new(
            &Platform::DEFAULT,
            FileType::Executable,
            Permission::RX,
            0xffc0_0000,
            0xffc0_0080,
            0x200,
            "updater",
        );
        let raw = header.encode();

        assert_eq!(&raw[0..4], &[0x7f, b'S', b'I', b'F']);
        assert_eq!(raw[8], 1);
        assert_eq!(raw[10], 0b101);
        assert_eq!(&raw[16..20], &128u32.to_le_bytes());
        assert_eq!(&raw[24..32], &0x0000_0001_0000_0000u64.to_le_bytes());
        assert_eq!(&raw[40..48], &0xffc0_0000u64.to_le_bytes());
        assert_eq!(&raw[64..71], b"updater");
        assert_eq!(ImageHeader::decode(&raw), Ok(header));
    }

    #[test]
    fn long_description_is_cut_on_char_boundary() {
        let text = "é".repeat(40);
        let header = ImageHeader::new(
            &Platform::DEFAULT,
            FileType::Executable,
            Permission::RX,
            AT,
            AT,
            HEADER_SIZE,
            &text,
        );

        assert_eq!(header.description(), "é".repeat(31));
        assert_eq!(header.description[DESCRIPTION_SIZE - 1], 0);
    }

    #[test]
    fn odd_sized_image_is_zero_padded() {
        let image = ImageBuilder::executable(AT, AT).body_len(3).build();
        assert_eq!(image.len() % 4, 3);

        let mut memory = SliceMemory::new(AT, &image);
        assert!(ImageHeader::is_valid(&mut memory, AT, &Platform::DEFAULT));
    }

    #[test]
    fn rejects_wrong_placement() {
        let image = ImageBuilder::executable(AT, AT).build();
        let mut memory = SliceMemory::new(AT + 0x10, &image);

        assert_eq!(
            ImageHeader::validate(&mut memory, AT + 0x10, &Platform::DEFAULT),
            Err(Error::MalformedHeader)
        );
    }

    #[test]
    fn rejects_each_corrupted_field() {
        let image = ImageBuilder::executable(AT, AT).body_len(32).build();

        // magic, class, file type, permission, header size, version, file size,
        // checksum, description
        for (bit, expected) in [
            (8, Error::MalformedHeader),
            (32, Error::MalformedHeader),
            (72, Error::MalformedHeader),
            (88, Error::MalformedHeader),
            (128, Error::MalformedHeader),
            (224, Error::MalformedHeader),
            (263, Error::MalformedHeader),
            (456, Error::ChecksumMismatch),
            (800, Error::ChecksumMismatch),
        ] {
            let mut corrupted = image.clone();
            flip_bit(&mut corrupted, bit);
            let mut memory = SliceMemory::new(AT, &corrupted);
            assert_eq!(
                ImageHeader::validate(&mut memory, AT, &Platform::DEFAULT),
                Err(expected),
                "bit {bit}"
            );
        }
    }

    #[test]
    fn truncated_file_size_fails() {
        let mut image = ImageBuilder::executable(AT, AT).body_len(64).build();
        let shorter = (image.len() as u64 - 4).to_le_bytes();
        image[32..40].copy_from_slice(&shorter);

        let mut memory = SliceMemory::new(AT, &image);
        assert!(!ImageHeader::is_valid(&mut memory, AT, &Platform::DEFAULT));
    }

    #[test]
    fn oversized_file_size_fails_without_reading() {
        let platform = Platform {
            max_image_size: 256,
            ..Platform::DEFAULT
        };
        let image = ImageBuilder::executable(AT, AT).body_len(512).build();
        let mut memory = SliceMemory::new(AT, &image);

        assert_eq!(
            ImageHeader::validate(&mut memory, AT, &platform),
            Err(Error::MalformedHeader)
        );
    }

    #[test]
    fn garbage_and_unmapped_memory_fail_cleanly() {
        let garbage = [0xa5u8; 300];
        let mut memory = SliceMemory::new(AT, &garbage);
        assert!(!ImageHeader::is_valid(&mut memory, AT, &Platform::DEFAULT));
        assert_eq!(
            ImageHeader::validate(&mut memory, AT + 250, &Platform::DEFAULT),
            Err(Error::Unmapped)
        );
        assert!(!ImageHeader::is_valid(&mut memory, usize::MAX - 8, &Platform::DEFAULT));
    }

    #[test]
    fn image_running_past_mapped_memory_fails() {
        let image = ImageBuilder::executable(AT, AT).body_len(64).build();
        let mut memory = SliceMemory::new(AT, &image[..image.len() - 1]);

        assert_eq!(
            ImageHeader::validate(&mut memory, AT, &Platform::DEFAULT),
            Err(Error::Unmapped)
        );
    }

    #[test]
    fn seal_rejects_length_mismatch() {
        let mut image = ImageBuilder::executable(AT, AT).body_len(8).build();
        image.push(0);
        assert_eq!(seal(&mut image), Err(Error::MalformedHeader));
        assert_eq!(seal(&mut [0u8; 16]), Err(Error::MalformedHeader));
    }
}
