//! Engine binding.
//!
//! The emulation engine is opaque: it is created from a [`ProgramImage`],
//! fills one RGBA frame per [`Engine::step`] and accepts button edges. The
//! [`EngineBinding`] in front of it owns the button state so repeated edges
//! never reach the engine twice.

use std::fmt;

use log::trace;
use thiserror::Error;

use crate::acquire::ProgramImage;
use crate::FRAME_BYTES;

/// Logical Game Boy button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Up => 1 << 0,
            Self::Down => 1 << 1,
            Self::Left => 1 << 2,
            Self::Right => 1 << 3,
            Self::A => 1 << 4,
            Self::B => 1 << 5,
            Self::Start => 1 << 6,
            Self::Select => 1 << 7,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pressed/released state of all eight buttons.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputState(u8);

impl InputState {
    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    /// Apply an edge; returns `false` when the state already matched.
    pub fn apply(&mut self, button: Button, pressed: bool) -> bool {
        let before = self.0;
        if pressed {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
        before != self.0
    }
}

/// One RGBA frame, allocated once per session and reused for every step.
pub struct FrameBuffer(Box<[u8; FRAME_BYTES]>);

impl FrameBuffer {
    pub fn new() -> Self {
        Self(Box::new([0; FRAME_BYTES]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    pub fn as_mut_array(&mut self) -> &mut [u8; FRAME_BYTES] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("ROM image is empty")]
    EmptyImage,
    #[error("invalid ROM image: {0}")]
    InvalidImage(String),
    #[error("engine bootstrap failed: {0}")]
    Bootstrap(String),
}

/// Fault raised by the engine mid-frame. The engine state is not
/// trustworthy afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineFault {
    #[error("unimplemented opcode 0x{opcode:02X} at PC=0x{pc:04X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },
    #[error("engine fault: {0}")]
    Internal(String),
}

pub trait Engine: Send {
    /// Run one video frame, overwriting all of `frame`.
    fn step(&mut self, frame: &mut [u8; FRAME_BYTES]) -> Result<(), EngineFault>;

    fn set_button(&mut self, button: Button, pressed: bool);

    /// Cartridge title, when the image carries one.
    fn title(&self) -> Option<&str> {
        None
    }
}

/// Instantiates engines from program images.
pub trait EngineModule: Send + Sync {
    fn create(&self, image: &ProgramImage) -> Result<Box<dyn Engine>, InitializationError>;
}

pub struct EngineBinding {
    engine: Box<dyn Engine>,
    input: InputState,
}

impl EngineBinding {
    pub fn create(module: &dyn EngineModule, image: &ProgramImage) -> Result<Self, InitializationError> {
        if image.is_empty() {
            return Err(InitializationError::EmptyImage);
        }
        let engine = module.create(image)?;
        Ok(Self { engine, input: InputState::default() })
    }

    pub fn step(&mut self, frame: &mut FrameBuffer) -> Result<(), EngineFault> {
        self.engine.step(frame.as_mut_array())
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if self.input.apply(button, pressed) {
            trace!("{button} {}", if pressed { "down" } else { "up" });
            self.engine.set_button(button, pressed);
        }
    }

    pub fn input(&self) -> InputState {
        self.input
    }

    pub fn title(&self) -> Option<&str> {
        self.engine.title()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<(Button, bool)>>>;

    struct Recorder(Calls);

    impl Engine for Recorder {
        fn step(&mut self, frame: &mut [u8; FRAME_BYTES]) -> Result<(), EngineFault> {
            frame.fill(0x11);
            Ok(())
        }

        fn set_button(&mut self, button: Button, pressed: bool) {
            self.0.lock().unwrap().push((button, pressed));
        }
    }

    struct RecorderModule(Calls);

    impl EngineModule for RecorderModule {
        fn create(&self, _image: &ProgramImage) -> Result<Box<dyn Engine>, InitializationError> {
            Ok(Box::new(Recorder(Arc::clone(&self.0))))
        }
    }

    fn binding() -> (EngineBinding, Calls) {
        let calls = Calls::default();
        let module = RecorderModule(Arc::clone(&calls));
        let image = ProgramImage::new("test", vec![0u8; 32]);
        (EngineBinding::create(&module, &image).unwrap(), calls)
    }

    #[test]
    fn repeated_press_reaches_engine_once() {
        let (mut binding, calls) = binding();
        binding.set_button(Button::A, true);
        binding.set_button(Button::A, true);
        assert_eq!(*calls.lock().unwrap(), vec![(Button::A, true)]);
        assert!(binding.input().is_pressed(Button::A));
    }

    #[test]
    fn release_without_press_is_a_no_op() {
        let (mut binding, calls) = binding();
        binding.set_button(Button::Start, false);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn buttons_are_independent() {
        let mut state = InputState::default();
        for button in Button::ALL {
            assert!(state.apply(button, true));
        }
        assert!(state.apply(Button::Left, false));
        assert!(!state.is_pressed(Button::Left));
        assert!(state.is_pressed(Button::Right));
    }

    #[test]
    fn empty_image_is_rejected_before_module() {
        let module = RecorderModule(Calls::default());
        let image = ProgramImage::new("empty", Vec::new());
        assert!(matches!(
            EngineBinding::create(&module, &image),
            Err(InitializationError::EmptyImage)
        ));
    }

    #[test]
    fn step_reuses_frame_buffer() {
        let (mut binding, _) = binding();
        let mut frame = FrameBuffer::new();
        let ptr = frame.as_ptr();
        for _ in 0..3 {
            binding.step(&mut frame).unwrap();
            assert_eq!(frame.len(), FRAME_BYTES);
            assert_eq!(frame.as_ptr(), ptr);
        }
        assert!(frame.as_bytes().iter().all(|&b| b == 0x11));
    }
}
