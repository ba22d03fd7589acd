//! Boot-selection register
//!
//! One 32-bit word that survives reset and deep sleep but not power loss.
//! The launcher writes it right before the handoff; the early-boot stage
//! reads it once, clears it and either jumps into the selected package or
//! continues the normal boot.
//!
//! Encoding:
//!
//! ```text
//!   0x0000_0000          Normal
//!   0xA500_00hh          BootPackage(hh)
//!   anything else        Normal (stale or garbage)
//! ```

mod retained;

pub use retained::RetainedWord;

/// Marker in the upper bits of a boot request.
pub const BOOT_MARKER: u32 = 0xA500_0000;

const HANDLE_MASK: u32 = 0xFF;

/// What the early-boot stage should do after the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootSelection {
    /// Boot the launcher firmware as usual
    #[default]
    Normal,
    /// Map and jump into the package with this handle
    BootPackage(u8),
}

impl BootSelection {
    /// Selection for a handle requested by the caller.
    ///
    /// Handles outside 0..=255 cannot be encoded and fall back to `Normal`.
    pub fn for_handle(handle: i32) -> Self {
        match u8::try_from(handle) {
            Ok(h) => Self::BootPackage(h),
            Err(_) => {
                log::warn!("[BOOTSEL] handle {} out of range, booting normally", handle);
                Self::Normal
            }
        }
    }

    pub const fn encode(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::BootPackage(h) => BOOT_MARKER | h as u32,
        }
    }

    /// Decode a raw register value. Only an exact marker match selects a
    /// package.
    pub const fn decode(raw: u32) -> Self {
        if raw & !HANDLE_MASK == BOOT_MARKER {
            Self::BootPackage((raw & HANDLE_MASK) as u8)
        } else {
            Self::Normal
        }
    }
}

impl core::fmt::Display for BootSelection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal boot"),
            Self::BootPackage(h) => write!(f, "package #{}", h),
        }
    }
}

/// A word of reset-retained state.
///
/// Implementations must make `write` visible to the early-boot stage once it
/// returns and a subsequent `read` reports.
pub trait RetainedRegister {
    fn read(&self) -> u32;

    fn write(&mut self, value: u32);

    /// Backend name for logging
    fn name(&self) -> &str;
}

impl<R: RetainedRegister + ?Sized> RetainedRegister for &mut R {
    fn read(&self) -> u32 {
        (**self).read()
    }

    fn write(&mut self, value: u32) {
        (**self).write(value)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Early-boot side: read the pending selection and clear the register so
/// the next reset boots normally.
pub fn take_boot_selection<R: RetainedRegister + ?Sized>(register: &mut R) -> BootSelection {
    let raw = register.read();
    let selection = BootSelection::decode(raw);
    if raw != 0 && selection == BootSelection::Normal {
        log::warn!("[BOOTSEL] ignoring stale value {:#010x} in {}", raw, register.name());
    }
    register.write(BootSelection::Normal.encode());
    selection
}
