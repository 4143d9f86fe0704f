//! Host front-end for a frame-stepped Game Boy engine.
//!
//! The [`session::SessionLoop`] drives an [`engine::Engine`] one frame per
//! redraw, pushes the frame through the [`display::DisplayPipeline`] and maps
//! keyboard and gamepad edges onto the engine's eight buttons via [`input`]
//! and [`gamepad`].

pub mod acquire;
pub mod display;
pub mod dmg;
pub mod engine;
pub mod gamepad;
pub mod input;
pub mod session;
pub mod task;

/// Logical screen width in pixels.
pub const WIDTH: usize = 160;
/// Logical screen height in pixels.
pub const HEIGHT: usize = 144;
/// Size of one RGBA frame in bytes.
pub const FRAME_BYTES: usize = WIDTH * HEIGHT * 4;

pub use acquire::{AcquisitionError, ImageSource, ProgramImage};
pub use display::{DisplayError, DisplayPipeline, Presenter};
pub use engine::{Button, Engine, EngineBinding, EngineFault, EngineModule, FrameBuffer, InitializationError};
pub use input::KeyEdge;
pub use session::{Scheduler, Session, SessionEvent, SessionLoop, SessionState};
