//! Logging backend selection: `defmt`, `log`, or nothing at all.
#![allow(unused_imports, unused_macros)]

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, error, info, warn};

#[cfg(all(feature = "log", not(feature = "defmt")))]
pub(crate) use log::{debug, error, info, warn};

#[cfg(not(any(feature = "log", feature = "defmt")))]
mod noop {
    macro_rules! noop_debug {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    macro_rules! noop_info {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    macro_rules! noop_warn {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    macro_rules! noop_error {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }

    pub(crate) use noop_debug as debug;
    pub(crate) use noop_error as error;
    pub(crate) use noop_info as info;
    pub(crate) use noop_warn as warn;
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
pub(crate) use noop::{debug, error, info, warn};
