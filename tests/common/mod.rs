#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use gb_host::display::DisplayError;
use gb_host::dmg::{header_checksum, DmgModule};
use gb_host::{Button, Engine, EngineFault, EngineModule, InitializationError, Presenter, ProgramImage, Scheduler, FRAME_BYTES};

/// 32 KiB ROM with a valid header whose code spins forever.
pub fn spin_rom(title: &[u8]) -> ProgramImage {
    let mut rom = vec![0u8; 0x8000];
    rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]); // NOP; JP 0150
    rom[0x134..0x134 + title.len()].copy_from_slice(title);
    rom[0x150..0x152].copy_from_slice(&[0x18, 0xFE]); // JR -2
    rom[0x14D] = header_checksum(&rom);
    ProgramImage::new(String::from_utf8_lossy(title), rom)
}

#[derive(Default)]
pub struct Ticks(pub usize);

impl Scheduler for Ticks {
    fn request_tick(&mut self) {
        self.0 += 1;
    }
}

pub struct Canvas {
    pub pixels: Vec<u8>,
    pub shown: usize,
    /// Make the next `show` fail, as a lost GPU surface would.
    pub fail_next: bool,
}

impl Canvas {
    pub fn new(len: usize) -> Self {
        Self { pixels: vec![0; len], shown: 0, fail_next: false }
    }
}

impl Presenter for Canvas {
    fn surface_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn show(&mut self) -> Result<(), DisplayError> {
        if std::mem::take(&mut self.fail_next) {
            let len = self.pixels.len();
            return Err(DisplayError::ContractViolation { expected: len, actual: 0 });
        }
        self.shown += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct TrackLog {
    pub created: usize,
    pub dropped: usize,
    /// Engine id of every step, in order.
    pub steps: Vec<usize>,
    pub buttons: Vec<(Button, bool)>,
}

/// Wraps the DMG module and records what the loop does with its engines.
#[derive(Clone, Default)]
pub struct Tracker {
    pub log: Arc<Mutex<TrackLog>>,
    /// Fault on this step number (1-based) of every engine.
    pub fault_at: Option<usize>,
}

impl Tracker {
    pub fn log(&self) -> std::sync::MutexGuard<'_, TrackLog> {
        self.log.lock().unwrap()
    }
}

struct TrackedEngine {
    id: usize,
    steps: usize,
    fault_at: Option<usize>,
    inner: Box<dyn Engine>,
    log: Arc<Mutex<TrackLog>>,
}

impl Engine for TrackedEngine {
    fn step(&mut self, frame: &mut [u8; FRAME_BYTES]) -> Result<(), EngineFault> {
        self.steps += 1;
        self.log.lock().unwrap().steps.push(self.id);
        if self.fault_at == Some(self.steps) {
            return Err(EngineFault::Internal("injected fault".into()));
        }
        self.inner.step(frame)
    }

    fn set_button(&mut self, button: Button, pressed: bool) {
        self.log.lock().unwrap().buttons.push((button, pressed));
        self.inner.set_button(button, pressed);
    }

    fn title(&self) -> Option<&str> {
        self.inner.title()
    }
}

impl Drop for TrackedEngine {
    fn drop(&mut self) {
        self.log.lock().unwrap().dropped += 1;
    }
}

impl EngineModule for Tracker {
    fn create(&self, image: &ProgramImage) -> Result<Box<dyn Engine>, InitializationError> {
        let inner = DmgModule.create(image)?;
        let mut log = self.log.lock().unwrap();
        log.created += 1;
        Ok(Box::new(TrackedEngine {
            id: log.created,
            steps: 0,
            fault_at: self.fault_at,
            inner,
            log: Arc::clone(&self.log),
        }))
    }
}
