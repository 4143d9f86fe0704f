//! Built-in DMG engine.
//!
//! A small Game Boy core so the front-end runs on its own. It validates the
//! cartridge header, runs a subset of the SM83 instruction set and draws the
//! background and window layers. Anything it cannot execute surfaces as an
//! [`EngineFault`].

mod bus;
mod cart;
mod cpu;
mod ppu;

use crate::acquire::ProgramImage;
use crate::engine::{Button, Engine, EngineFault, EngineModule, InitializationError};
use crate::FRAME_BYTES;

pub use cart::header_checksum;

// DMG: 70224 cycles per frame
const CYCLES_PER_FRAME: u32 = 70224;

pub struct Dmg {
    cpu: cpu::Cpu,
    bus: bus::Bus,
}

impl Dmg {
    pub fn new(image: &ProgramImage) -> Result<Self, InitializationError> {
        let cart = cart::Cartridge::parse(image.bytes())?;
        log::debug!("cartridge \"{}\" type 0x{:02X}", cart.title, cart.kind);
        let bus = bus::Bus::new(cart);
        let cpu = cpu::Cpu::new();

        Ok(Self { cpu, bus })
    }

    fn run_frame(&mut self) -> Result<(), EngineFault> {
        let mut cycles = 0u32;
        while cycles < CYCLES_PER_FRAME {
            let c = self.cpu.step(&mut self.bus)?;
            self.bus.step(c);
            cycles += c as u32;
        }
        Ok(())
    }
}

impl Engine for Dmg {
    fn step(&mut self, frame: &mut [u8; FRAME_BYTES]) -> Result<(), EngineFault> {
        self.run_frame()?;
        frame.copy_from_slice(self.bus.ppu.framebuffer_rgba());
        Ok(())
    }

    fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.set_button(button, pressed);
    }

    fn title(&self) -> Option<&str> {
        Some(&self.bus.cart.title)
    }
}

/// Creates [`Dmg`] engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct DmgModule;

impl EngineModule for DmgModule {
    fn create(&self, image: &ProgramImage) -> Result<Box<dyn Engine>, InitializationError> {
        Ok(Box::new(Dmg::new(image)?))
    }
}
