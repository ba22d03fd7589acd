// Host-side fakes shared by the launcher tests

use std::boxed::Box;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec;
use std::vec::Vec;

use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use gpt_disk_io::BlockIoAdapter;
use gpt_disk_types::BlockSize;
use launchpad_core::flash::emulated::EMULATED_ERASE_SIZE;
use launchpad_core::flash::{EmulatedFlash, FlashFault};
use launchpad_core::{Handle, PackageStore, StoreConfig};
use launchpad_persistent::SleepControl;

use crate::boot::BootTarget;
use crate::installer::{LoadError, PackageFile, PackageSource, PayloadHeap, StatusDisplay};
use crate::menu::{InputEvent, InputQueue, TextStyle, TextSurface};

pub type TestFlash<'a> = EmulatedFlash<BlockIoAdapter<&'a mut [u8]>>;

/// Store with 4 KiB blocks and 8 table entries on a RAM image.
pub fn store_on(image: &mut [u8]) -> PackageStore<TestFlash<'_>> {
    let flash = EmulatedFlash::new(BlockIoAdapter::new(image, BlockSize::BS_512)).unwrap();
    PackageStore::mount(flash, StoreConfig::new(4096, 8)).unwrap()
}

/// Create, erase, write and mark a package installed.
pub fn install(store: &mut PackageStore<TestFlash<'_>>, name: &str, title: &str, payload: &[u8]) -> Handle {
    let handle = store.create(name, title, 1, payload.len() as u32).unwrap();
    let capacity = store.payload_capacity(handle).unwrap();
    store.erase_payload(handle, 0, capacity).unwrap();
    store.write_payload(handle, 0, payload).unwrap();
    store.mark_installed(handle).unwrap();
    handle
}

/// Both table slots of a `store_on` store; payload regions start here.
pub const TABLE_AREA: u32 = 2 * 4096;

/// Flash operation a [`FaultyFlash`] refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Erasing any payload block
    PayloadErase,
    /// Programming any payload byte
    PayloadWrite,
    /// Table commits once a payload write has landed
    CommitAfterPayload,
}

/// Test flash that fails the operations selected by a shared switch.
pub struct FaultyFlash<'a> {
    inner: TestFlash<'a>,
    fault: Rc<Cell<Fault>>,
    payload_written: bool,
}

impl FaultyFlash<'_> {
    fn refuses(&self, offset: u32, payload_op: Fault) -> bool {
        match self.fault.get() {
            Fault::None => false,
            Fault::CommitAfterPayload => self.payload_written && offset < TABLE_AREA,
            fault => fault == payload_op && offset >= TABLE_AREA,
        }
    }
}

impl ErrorType for FaultyFlash<'_> {
    type Error = FlashFault;
}

impl ReadNorFlash for FaultyFlash<'_> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), FlashFault> {
        self.inner.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl NorFlash for FaultyFlash<'_> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = EMULATED_ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), FlashFault> {
        if self.refuses(from, Fault::PayloadErase) {
            return Err(FlashFault::Device);
        }
        self.inner.erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashFault> {
        if self.refuses(offset, Fault::PayloadWrite) {
            return Err(FlashFault::Device);
        }
        self.inner.write(offset, bytes)?;
        if offset >= TABLE_AREA {
            self.payload_written = true;
        }
        Ok(())
    }
}

/// `store_on` geometry over a [`FaultyFlash`], plus its fault switch.
pub fn faulty_store_on(image: &mut [u8]) -> (PackageStore<FaultyFlash<'_>>, Rc<Cell<Fault>>) {
    let fault = Rc::new(Cell::new(Fault::None));
    let flash = FaultyFlash {
        inner: EmulatedFlash::new(BlockIoAdapter::new(image, BlockSize::BS_512)).unwrap(),
        fault: Rc::clone(&fault),
        payload_written: false,
    };
    let store = PackageStore::mount(flash, StoreConfig::new(4096, 8)).unwrap();
    (store, fault)
}

pub fn payload_heap(size: usize) -> PayloadHeap {
    PayloadHeap::from_static(Box::leak(vec![0u8; size].into_boxed_slice()))
}

/// Replays a fixed list of events, then panics so a runaway loop fails.
pub struct ScriptedQueue {
    events: VecDeque<InputEvent>,
    pub timeouts: Vec<u32>,
}

impl ScriptedQueue {
    pub fn new(events: &[InputEvent]) -> Self {
        Self {
            events: events.iter().copied().collect(),
            timeouts: Vec::new(),
        }
    }
}

impl InputQueue for ScriptedQueue {
    fn receive(&mut self, timeout_ms: u32) -> Option<InputEvent> {
        self.timeouts.push(timeout_ms);
        match self.events.pop_front() {
            Some(event) => Some(event),
            None => panic!("input script exhausted"),
        }
    }
}

/// Character grid standing in for the display.
pub struct GridSurface {
    pub rows: Vec<Vec<char>>,
    pub flushes: usize,
}

impl GridSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            rows: vec![vec![' '; width]; height],
            flushes: 0,
        }
    }

    pub fn text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TextSurface for GridSurface {
    fn width(&self) -> usize {
        self.rows[0].len()
    }

    fn height(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(' ');
        }
    }

    fn put_str_at(&mut self, x: usize, y: usize, text: &str, _style: TextStyle) {
        let Some(row) = self.rows.get_mut(y) else { return };
        for (i, c) in text.chars().enumerate() {
            if let Some(cell) = row.get_mut(x + i) {
                *cell = c;
            }
        }
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

/// Boot target that records the handle and unwinds instead of rebooting.
#[derive(Default)]
pub struct RecordingTarget {
    pub booted: Option<Handle>,
}

impl BootTarget for RecordingTarget {
    fn boot(&mut self, handle: Handle) -> ! {
        self.booted = Some(handle);
        panic!("reboot into {}", handle);
    }
}

/// Deep-sleep fake: records the power calls, then unwinds.
#[derive(Default)]
pub struct SleepFake {
    pub calls: Vec<&'static str>,
}

impl SleepControl for SleepFake {
    fn retain_slow_memory(&mut self) {
        self.calls.push("retain");
    }

    fn arm_timer_wakeup(&mut self, _delay_us: u64) {
        self.calls.push("arm");
    }

    fn deep_sleep(&mut self) -> ! {
        self.calls.push("sleep");
        panic!("deep sleep");
    }
}

#[derive(Default)]
pub struct StatusLog {
    pub messages: Vec<String>,
    pub holds: Vec<u32>,
}

impl StatusLog {
    pub fn last(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

impl StatusDisplay for StatusLog {
    fn show(&mut self, message: &str) {
        self.messages.push(message.into());
    }

    fn hold(&mut self, ms: u32) {
        self.holds.push(ms);
    }
}

/// In-memory file with a configurable read chunk and announced size.
pub struct MemoryFile {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    announced: usize,
}

impl MemoryFile {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            chunk: usize::MAX,
            announced: data.len(),
        }
    }

    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Report a size different from the real content.
    pub fn claiming(mut self, len: usize) -> Self {
        self.announced = len;
        self
    }
}

impl PackageFile for MemoryFile {
    fn len(&self) -> usize {
        self.announced
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LoadError> {
        let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Default)]
pub struct MemorySource {
    files: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn with_file(path: &str, data: &[u8]) -> Self {
        Self {
            files: vec![(path.into(), data.to_vec())],
        }
    }
}

impl PackageSource for MemorySource {
    type File = MemoryFile;

    fn open(&mut self, path: &str) -> Option<MemoryFile> {
        self.files
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| MemoryFile::new(data))
    }
}
