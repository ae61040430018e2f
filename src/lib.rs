//! Boot-time image chaining: validate a firmware image in place and hand control to it.
//!
//! Images start with a fixed [`header::ImageHeader`]. A [`file::FileHandle`] wraps a validated
//! header, each boot mode owns one lazily opened [`mode::ModeExecutable`], and the
//! [`selector::BootContext`] picks the mode from the [`registry::Registry`] and runs it,
//! falling back to safer modes when an image does not validate.
#![no_std]

pub mod boot;
pub mod checksum;
pub mod diagnostic;
pub mod file;
pub mod header;
pub mod memory;
pub mod mode;
pub mod registry;
pub mod selector;

mod fmt;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod mock;

/// Physical address on the target.
pub type Address = usize;

/// Value returned by an entry point that chose to return.
pub type Status = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Identification, version, size, type or placement of a header did not match.
    MalformedHeader,
    /// Recomputed checksum differs from the stored one.
    ChecksumMismatch,
    /// Boot mode policy value is outside the defined set of modes.
    UnresolvedMode,
    /// Operation on a handle or executable in a state that does not allow it.
    HandleMisuse,
    /// Registry key is missing or the registry could not be read.
    RegistryUnavailable,
    /// Read outside of the mapped memory region.
    Unmapped,
    /// The mode resolved to no valid image, so there is nothing to execute.
    InvalidImage,
}

pub use file::{ExecutableFile, FileHandle};
pub use header::{ImageHeader, Platform};
pub use mode::{BootMode, Executable, ModeExecutable};
pub use selector::{BootContext, Outcome};
