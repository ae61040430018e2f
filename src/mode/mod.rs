//! Boot modes and the executable owned by each image-backed mode.
//!
//! A [`ModeExecutable`] goes through three states within one boot attempt:
//!
//! * unresolved: nothing opened yet, only a target address is configured;
//! * resolved: the image at the then-current target was opened, possibly yielding no handle;
//! * executed: control was handed to the image.
//!
//! Resolution happens once. Redirecting the target with [`ModeExecutable::change`] only
//! affects the next boot attempt, see [`ModeExecutable::restart`].
//!
//! Under multiple cores the unresolved to resolved transition would need to be a single
//! compare-and-set, and a `change` must happen-before the resolution it is meant to affect.
//! The boot path runs on one core without preemption, so `&mut` access is sufficient.

use core::marker::PhantomData;

use crate::{
    Address, Error, Status,
    boot::Boot,
    file::ExecutableFile,
    fmt::{debug, error, info, warn},
    header::Platform,
    memory::Memory,
    registry::{AddressKey, IntKey, Registry},
};

pub mod developer;
pub mod recovery;
pub mod update;
pub mod user;

pub use developer::Developer;
pub use recovery::Recovery;
pub use update::Update;
pub use user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    Halt,
    Recovery,
    Update,
    User,
    Developer,
    Reboot,
}

/// Where each image-backed mode goes when its image does not validate.
///
/// Modes absent from this table fall back to [`BootMode::Halt`].
pub const FALLBACK: [(BootMode, BootMode); 4] = [
    (BootMode::Developer, BootMode::User),
    (BootMode::Update, BootMode::User),
    (BootMode::User, BootMode::Recovery),
    (BootMode::Recovery, BootMode::Halt),
];

impl BootMode {
    /// Every mode with the registry key holding its runlevel.
    pub const ALL: [(BootMode, IntKey); 6] = [
        (BootMode::Halt, IntKey::HaltModeRunlevel),
        (BootMode::Recovery, IntKey::RecoveryModeRunlevel),
        (BootMode::Update, IntKey::UpdateModeRunlevel),
        (BootMode::User, IntKey::UserModeRunlevel),
        (BootMode::Developer, IntKey::DeveloperModeRunlevel),
        (BootMode::Reboot, IntKey::RebootModeRunlevel),
    ];

    pub fn fallback(self) -> BootMode {
        FALLBACK
            .iter()
            .find(|(mode, _)| *mode == self)
            .map_or(BootMode::Halt, |(_, next)| *next)
    }

    /// Mode matching the runlevel the registry asks to boot into.
    ///
    /// The runlevel has to lie within the registry's bounds and match the runlevel of
    /// one of the modes. Modes whose runlevel key is missing are skipped.
    pub fn current<R: Registry>(registry: &R) -> Result<BootMode, Error> {
        let runlevel = registry.int_value(IntKey::DefaultRunlevel)?;
        let lowest = registry.int_value(IntKey::LowestRunlevel)?;
        let highest = registry.int_value(IntKey::HighestRunlevel)?;

        if runlevel < lowest || runlevel > highest {
            return Err(Error::UnresolvedMode);
        }

        Self::ALL
            .iter()
            .find(|(_, key)| registry.int_value(*key) == Ok(runlevel))
            .map(|(mode, _)| *mode)
            .ok_or(Error::UnresolvedMode)
    }
}

/// Compile-time description of an image-backed mode.
pub trait ModeImage {
    const MODE: BootMode;
    /// Address of the image unless configured otherwise.
    const DEFAULT_ADDRESS: Address;
    /// Registry key overriding the default address, if any.
    const ADDRESS_KEY: Option<AddressKey>;
}

/// Something that can be handed control.
pub trait Executable {
    /// Transfer control. Only returns if the boot backend returns.
    fn execute<B: Boot>(&mut self, boot: &mut B) -> Result<Status, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Unresolved,
    Resolved,
    Executed,
}

#[derive(Debug)]
enum Resolution {
    Unresolved,
    Resolved(Option<ExecutableFile>),
    Executed(ExecutableFile),
}

/// The executable of one boot mode, owning at most one open image.
#[derive(Debug)]
pub struct ModeExecutable<K> {
    target: Option<Address>,
    resolution: Resolution,
    _kind: PhantomData<K>,
}

impl<K: ModeImage> ModeExecutable<K> {
    pub const fn new() -> Self {
        Self {
            target: Some(K::DEFAULT_ADDRESS),
            resolution: Resolution::Unresolved,
            _kind: PhantomData,
        }
    }

    /// Address the next resolution will open, `None` if the registry had none.
    pub fn target_address(&self) -> Option<Address> {
        self.target
    }

    /// Point future resolutions at `address`. An already resolved image stays in use.
    pub fn change(&mut self, address: Address) {
        info!("{:?} image redirected to {:#x}", K::MODE, address);
        self.target = Some(address);
    }

    /// Take the target address from the registry, if this mode has a key there.
    ///
    /// A missing key leaves the mode without a target, so it resolves to no image.
    pub fn configure<R: Registry>(&mut self, registry: &R) {
        let Some(key) = K::ADDRESS_KEY else {
            return;
        };
        match registry.address_value(key) {
            Ok(address) => self.target = Some(address),
            Err(e) => {
                warn!("{:?} image address unavailable: {:?}", K::MODE, e);
                self.target = None;
            }
        }
    }

    pub fn state(&self) -> State {
        match self.resolution {
            Resolution::Unresolved => State::Unresolved,
            Resolution::Resolved(_) => State::Resolved,
            Resolution::Executed(_) => State::Executed,
        }
    }

    /// Resolve on first use and return the executable for this boot attempt.
    ///
    /// Later calls return the same executable without touching memory again.
    pub fn get_instance<M: Memory>(&mut self, memory: &mut M, platform: &Platform) -> &mut Self {
        if let Resolution::Unresolved = self.resolution {
            let file = self
                .target
                .and_then(|address| ExecutableFile::open_executable(memory, address, platform));
            match &file {
                Some(file) => debug!("{:?} resolved to image at {:#x}", K::MODE, file.address()),
                None => warn!("{:?} resolved to no valid image", K::MODE),
            }
            self.resolution = Resolution::Resolved(file);
        }
        self
    }

    /// The open image, if resolved to a valid one.
    pub fn file(&self) -> Option<&ExecutableFile> {
        match &self.resolution {
            Resolution::Resolved(file) => file.as_ref(),
            Resolution::Executed(file) => Some(file),
            Resolution::Unresolved => None,
        }
    }

    /// Start over for a new boot attempt, keeping the configured target.
    pub fn restart(&mut self) {
        self.resolution = Resolution::Unresolved;
    }
}

impl<K: ModeImage> Default for ModeExecutable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ModeImage> Executable for ModeExecutable<K> {
    fn execute<B: Boot>(&mut self, boot: &mut B) -> Result<Status, Error> {
        let state = self.state();
        let file = match &mut self.resolution {
            Resolution::Resolved(file) => file.take().ok_or(Error::InvalidImage)?,
            _ => {
                error!("{:?} executed while {:?}", K::MODE, state);
                return Err(Error::HandleMisuse);
            }
        };

        info!("{:?} jumping to {:#x}", K::MODE, file.entry());
        // Safety: the image header and checksum were validated when resolving.
        let status = unsafe { file.execute(boot) };
        self.resolution = Resolution::Executed(file);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        header::HEADER_SIZE,
        memory::Region,
        mock::{BrokenRegistry, ImageBuilder, MockFlash, RecordingBoot},
        registry::fixed::FixedRegistry,
    };

    const BASE: Address = 0x100_0000;
    const FIRST: Address = BASE;
    const SECOND: Address = BASE + 0x1000;

    fn flash() -> Region<MockFlash> {
        let mut flash = MockFlash::erased(0x2000);
        flash.place(0, &ImageBuilder::executable(FIRST, 0xaaaa).build());
        flash.place(0x1000, &ImageBuilder::executable(SECOND, 0xbbbb).build());
        Region::new(BASE, flash)
    }

    fn user_at(address: Address) -> ModeExecutable<User> {
        let mut exe = ModeExecutable::new();
        exe.change(address);
        exe
    }

    #[test]
    fn defaults_to_compiled_address() {
        let exe = ModeExecutable::<Update>::new();
        assert_eq!(exe.target_address(), Some(0xFFC0_0000));
        assert_eq!(exe.state(), State::Unresolved);
    }

    #[test]
    fn instance_is_stable_and_opened_once() {
        let mut memory = flash();
        let mut exe = user_at(FIRST);

        let first = exe.get_instance(&mut memory, &Platform::DEFAULT) as *const _;
        let second = exe.get_instance(&mut memory, &Platform::DEFAULT) as *const _;

        assert!(core::ptr::eq(first, second));
        assert_eq!(exe.state(), State::Resolved);
        assert_eq!(memory.storage().reads_at(0, HEADER_SIZE), 1);
    }

    #[test]
    fn executes_resolved_image_once() {
        let mut memory = flash();
        let mut boot = RecordingBoot::new();
        let mut exe = user_at(FIRST);

        let status = exe
            .get_instance(&mut memory, &Platform::DEFAULT)
            .execute(&mut boot);
        assert_eq!(status, Ok(0));
        assert_eq!(boot.entries, [0xaaaa]);
        assert_eq!(exe.state(), State::Executed);
        assert_eq!(exe.file().map(|f| f.entry()), Some(0xaaaa));

        assert_eq!(exe.execute(&mut boot), Err(Error::HandleMisuse));
        assert_eq!(boot.entries.len(), 1);
    }

    #[test]
    fn invalid_image_does_not_jump() {
        let mut memory = flash();
        let mut boot = RecordingBoot::new();
        let mut exe = user_at(FIRST + 0x10);

        let exe = exe.get_instance(&mut memory, &Platform::DEFAULT);
        assert!(exe.file().is_none());
        assert_eq!(exe.execute(&mut boot), Err(Error::InvalidImage));
        assert!(boot.entries.is_empty());
    }

    #[test]
    fn unresolved_execute_is_misuse() {
        let mut boot = RecordingBoot::new();
        let mut exe = user_at(FIRST);
        assert_eq!(exe.execute(&mut boot), Err(Error::HandleMisuse));
    }

    #[test]
    fn change_is_deferred_to_next_attempt() {
        let mut memory = flash();
        let mut boot = RecordingBoot::new();
        let mut exe = user_at(FIRST);

        exe.get_instance(&mut memory, &Platform::DEFAULT);
        exe.change(SECOND);
        exe.get_instance(&mut memory, &Platform::DEFAULT)
            .execute(&mut boot)
            .unwrap();
        assert_eq!(boot.entries, [0xaaaa]);

        exe.restart();
        assert_eq!(exe.target_address(), Some(SECOND));
        exe.get_instance(&mut memory, &Platform::DEFAULT)
            .execute(&mut boot)
            .unwrap();
        assert_eq!(boot.entries, [0xaaaa, 0xbbbb]);
    }

    #[test]
    fn registry_configures_address() {
        let registry = FixedRegistry::new().with_address(AddressKey::CoreFileAddress, SECOND);
        let mut user = ModeExecutable::<User>::new();
        let mut update = ModeExecutable::<Update>::new();
        let mut recovery = ModeExecutable::<Recovery>::new();

        user.configure(&registry);
        update.configure(&registry);
        recovery.configure(&registry);

        assert_eq!(user.target_address(), Some(SECOND));
        assert_eq!(update.target_address(), None);
        assert_eq!(recovery.target_address(), Some(Recovery::DEFAULT_ADDRESS));

        let mut memory = flash();
        assert!(
            update
                .get_instance(&mut memory, &Platform::DEFAULT)
                .file()
                .is_none()
        );
    }

    #[test]
    fn fallback_order_ends_in_halt() {
        assert_eq!(BootMode::Update.fallback(), BootMode::User);
        assert_eq!(BootMode::Developer.fallback(), BootMode::User);
        assert_eq!(BootMode::User.fallback(), BootMode::Recovery);
        assert_eq!(BootMode::Recovery.fallback(), BootMode::Halt);
        assert_eq!(BootMode::Halt.fallback(), BootMode::Halt);
    }

    #[test]
    fn current_mode_from_runlevels() {
        let registry = FixedRegistry::new();
        assert_eq!(BootMode::current(&registry), Ok(BootMode::User));
        assert_eq!(
            BootMode::current(&registry.with_default_runlevel(2)),
            Ok(BootMode::Update)
        );
        assert_eq!(
            BootMode::current(&registry.with_default_runlevel(5)),
            Ok(BootMode::Reboot)
        );
        assert_eq!(
            BootMode::current(&registry.with_default_runlevel(6)),
            Err(Error::UnresolvedMode)
        );
        assert_eq!(
            BootMode::current(&registry.with_default_runlevel(-1)),
            Err(Error::UnresolvedMode)
        );
    }

    #[test]
    fn unreadable_runlevels_are_unavailable() {
        for key in [
            IntKey::DefaultRunlevel,
            IntKey::LowestRunlevel,
            IntKey::HighestRunlevel,
        ] {
            assert_eq!(
                BootMode::current(&BrokenRegistry::missing(key)),
                Err(Error::RegistryUnavailable)
            );
        }
    }

    #[test]
    fn unreadable_mode_runlevel_skips_that_mode() {
        assert_eq!(
            BootMode::current(&BrokenRegistry::missing(IntKey::UserModeRunlevel)),
            Err(Error::UnresolvedMode)
        );
        assert_eq!(
            BootMode::current(&BrokenRegistry::missing(IntKey::UpdateModeRunlevel)),
            Ok(BootMode::User)
        );
    }
}
