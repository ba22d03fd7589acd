// In-memory retained word
//
// Placed in a `.rtc.data`-style section on hardware without a dedicated
// store register; on the host it backs the handoff tests.

use core::sync::atomic::{AtomicU32, Ordering};

use super::RetainedRegister;

pub struct RetainedWord(AtomicU32);

impl RetainedWord {
    pub const fn new(value: u32) -> Self {
        Self(AtomicU32::new(value))
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u32) {
        self.0.store(value, Ordering::SeqCst)
    }
}

impl Default for RetainedWord {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RetainedRegister for RetainedWord {
    fn read(&self) -> u32 {
        self.get()
    }

    fn write(&mut self, value: u32) {
        self.set(value)
    }

    fn name(&self) -> &str {
        "retained-word"
    }
}

// Shared statics: the handoff writes through a shared reference
impl RetainedRegister for &RetainedWord {
    fn read(&self) -> u32 {
        self.get()
    }

    fn write(&mut self, value: u32) {
        self.set(value)
    }

    fn name(&self) -> &str {
        "retained-word"
    }
}
