//! Pick the boot mode from the registry and run its image, falling back to safer modes.

use crate::{
    Address, Error, Status,
    boot::{self, Boot},
    fmt::{error, info, warn},
    header::Platform,
    memory::Memory,
    mode::{BootMode, Developer, Executable, ModeExecutable, Recovery, Update, User},
    registry::Registry,
};

/// How a boot attempt ended, if control came back at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The image of `mode` was entered and returned `status`.
    Executed { mode: BootMode, status: Status },
    /// No mode could be booted.
    Halt,
    /// The registry asked for a restart.
    Reboot,
}

/// Everything one boot attempt works with, constructed once at boot entry.
pub struct BootContext<M, B> {
    memory: M,
    boot: B,
    platform: Platform,
    recovery: ModeExecutable<Recovery>,
    update: ModeExecutable<Update>,
    user: ModeExecutable<User>,
    developer: ModeExecutable<Developer>,
}

impl<M: Memory, B: Boot> BootContext<M, B> {
    /// Context with every mode pointing at its compiled-in image address.
    pub fn new(memory: M, boot: B, platform: Platform) -> Self {
        Self {
            memory,
            boot,
            platform,
            recovery: ModeExecutable::new(),
            update: ModeExecutable::new(),
            user: ModeExecutable::new(),
            developer: ModeExecutable::new(),
        }
    }

    /// Take the image addresses the registry provides.
    pub fn load_addresses<R: Registry>(&mut self, registry: &R) {
        self.recovery.configure(registry);
        self.update.configure(registry);
        self.user.configure(registry);
        self.developer.configure(registry);
    }

    /// Redirect the image of `mode` for the next boot attempt.
    pub fn change(&mut self, mode: BootMode, address: Address) -> Result<(), Error> {
        match mode {
            BootMode::Recovery => self.recovery.change(address),
            BootMode::Update => self.update.change(address),
            BootMode::User => self.user.change(address),
            BootMode::Developer => self.developer.change(address),
            BootMode::Halt | BootMode::Reboot => return Err(Error::UnresolvedMode),
        }
        Ok(())
    }

    /// Resolve and execute the image of `mode`.
    fn execute(&mut self, mode: BootMode) -> Result<Status, Error> {
        let Self {
            memory,
            boot,
            platform,
            recovery,
            update,
            user,
            developer,
        } = self;

        match mode {
            BootMode::Recovery => recovery.get_instance(memory, platform).execute(boot),
            BootMode::Update => update.get_instance(memory, platform).execute(boot),
            BootMode::User => user.get_instance(memory, platform).execute(boot),
            BootMode::Developer => developer.get_instance(memory, platform).execute(boot),
            BootMode::Halt | BootMode::Reboot => Err(Error::UnresolvedMode),
        }
    }

    /// Boot the mode the registry selects.
    ///
    /// An unreadable or out of range mode halts. A mode whose image does not validate falls
    /// back along [`FALLBACK`](crate::mode::FALLBACK) until something runs or nothing is left.
    /// A mode that was already executed in this boot attempt halts instead of falling back.
    pub fn select_and_run<R: Registry>(&mut self, registry: &R) -> Outcome {
        let mut mode = match BootMode::current(registry) {
            Ok(mode) => mode,
            Err(e) => {
                error!("boot mode unresolved: {:?}", e);
                return Outcome::Halt;
            }
        };
        info!("boot mode {:?}", mode);

        loop {
            match mode {
                BootMode::Halt => {
                    error!("nothing left to boot");
                    return Outcome::Halt;
                }
                BootMode::Reboot => return Outcome::Reboot,
                _ => {}
            }

            match self.execute(mode) {
                Ok(status) => return Outcome::Executed { mode, status },
                Err(Error::InvalidImage) => {
                    let next = mode.fallback();
                    warn!("{:?} has no valid image, falling back to {:?}", mode, next);
                    mode = next;
                }
                Err(e) => {
                    error!("{:?} cannot run: {:?}", mode, e);
                    return Outcome::Halt;
                }
            }
        }
    }

    /// Boot for real: halt or reboot when no image took over.
    pub fn run<R: Registry>(mut self, registry: &R) -> ! {
        match self.select_and_run(registry) {
            Outcome::Reboot => boot::reboot(),
            Outcome::Executed { mode, status } => {
                error!("{:?} image returned {}", mode, status);
                boot::halt()
            }
            Outcome::Halt => boot::halt(),
        }
    }

    /// Begin a new boot attempt: configured addresses stay, every mode is unresolved again.
    pub fn next_attempt(mut self) -> Self {
        self.recovery.restart();
        self.update.restart();
        self.user.restart();
        self.developer.restart();
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn boot(&self) -> &B {
        &self.boot
    }

    pub fn recovery(&self) -> &ModeExecutable<Recovery> {
        &self.recovery
    }

    pub fn update(&self) -> &ModeExecutable<Update> {
        &self.update
    }

    pub fn user(&self) -> &ModeExecutable<User> {
        &self.user
    }

    pub fn developer(&self) -> &ModeExecutable<Developer> {
        &self.developer
    }
}
