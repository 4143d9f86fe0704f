//! Session loop.
//!
//! A [`Session`] is one loaded image plus the engine created from it and the
//! frame buffer it renders into. The [`SessionLoop`] owns at most one running
//! session, swaps it out when a new image arrives and drives it one tick per
//! host redraw:
//!
//! ```text
//! Idle ──image booted──▶ Running ──new image──▶ Reloading ──booted──▶ Running
//!   ▲                       │                       │
//!   └──── engine fault ─────┘◀──── boot failed ─────┘
//! ```
//!
//! Ticks are re-armed only after the current one has finished, so two ticks
//! never overlap. The redraw cadence is whatever the host display runs at;
//! nothing here compensates when that differs from the Game Boy's ~59.7 Hz.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use winit::event::VirtualKeyCode;
use winit::window::Window;

use crate::acquire::{self, AcquisitionError, ImageSource, ProgramImage};
use crate::display::{DisplayError, DisplayPipeline, Presenter};
use crate::engine::{Button, EngineBinding, EngineFault, EngineModule, FrameBuffer, InitializationError, InputState};
use crate::input::{self, KeyEdge};
use crate::task::{Task, TaskLost};

/// Host hook that schedules the next tick on the next display refresh.
pub trait Scheduler {
    fn request_tick(&mut self);
}

impl Scheduler for Window {
    fn request_tick(&mut self) {
        self.request_redraw();
    }
}

pub struct Session {
    generation: u64,
    image: ProgramImage,
    engine: EngineBinding,
    frame: FrameBuffer,
    frames: u64,
}

impl Session {
    pub fn new(generation: u64, image: ProgramImage, module: &dyn EngineModule) -> Result<Self, InitializationError> {
        let engine = EngineBinding::create(module, &image)?;
        Ok(Self {
            generation,
            image,
            engine,
            frame: FrameBuffer::new(),
            frames: 0,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frames stepped so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn input(&self) -> InputState {
        self.engine.input()
    }

    /// Cartridge title, falling back to the image origin.
    pub fn title(&self) -> String {
        match self.engine.title() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => self.image.origin().to_string(),
        }
    }

    pub fn step(&mut self) -> Result<(), EngineFault> {
        self.engine.step(&mut self.frame)?;
        self.frames += 1;
        Ok(())
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.engine.set_button(button, pressed);
    }
}

pub enum SessionState {
    /// No image loaded, nothing scheduled.
    Idle,
    Running(Session),
    /// Previous session dropped, replacement still booting.
    Reloading,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running(_) => "running",
            Self::Reloading => "reloading",
        }
    }
}

/// Something the front-end should tell the user about.
#[derive(Debug)]
pub enum SessionEvent {
    Started { generation: u64, title: String },
    AcquisitionFailed(AcquisitionError),
    InitializationFailed(InitializationError),
    Halted { generation: u64, fault: EngineFault },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { title, .. } => write!(f, "{title}"),
            Self::AcquisitionFailed(e) => write!(f, "{e}"),
            Self::InitializationFailed(e) => write!(f, "failed to load ROM: {e}"),
            Self::Halted { fault, .. } => write!(f, "halted: {fault}"),
        }
    }
}

struct PendingBoot {
    generation: u64,
    task: Task<Result<Session, InitializationError>>,
}

pub struct SessionLoop {
    module: Arc<dyn EngineModule>,
    display: DisplayPipeline,
    state: SessionState,
    acquiring: Option<Task<Result<ProgramImage, AcquisitionError>>>,
    booting: Option<PendingBoot>,
    events: Vec<SessionEvent>,
    next_generation: u64,
    armed: bool,
}

impl SessionLoop {
    pub fn new(module: Arc<dyn EngineModule>, display: DisplayPipeline) -> Self {
        Self {
            module,
            display,
            state: SessionState::Idle,
            acquiring: None,
            booting: None,
            events: Vec::new(),
            next_generation: 1,
            armed: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Running(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    /// Whether an acquisition or bootstrap is still in flight.
    pub fn is_busy(&self) -> bool {
        self.acquiring.is_some() || self.booting.is_some()
    }

    /// Whether a tick has been requested and not yet run.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn display(&self) -> &DisplayPipeline {
        &self.display
    }

    /// Start reading an image. A newer request replaces one still in flight.
    pub fn load(&mut self, source: ImageSource) {
        info!("loading {source}");
        match acquire::acquire(source) {
            Ok(task) => self.acquiring = Some(task),
            Err(e) => self.acquisition_failed(e),
        }
    }

    /// Boot an engine for `image`, replacing any running session.
    pub fn start(&mut self, image: ProgramImage) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let next = match self.state {
            SessionState::Idle => SessionState::Idle,
            _ => SessionState::Reloading,
        };
        if let SessionState::Running(old) = self.set_state(next) {
            info!("reloading: dropping session {} after {} frames", old.generation, old.frames);
        }
        if let Some(stale) = self.booting.take() {
            debug!("discarding superseded bootstrap {}", stale.generation);
        }

        info!("booting session {generation} from {} ({} bytes)", image.origin(), image.len());
        let module = Arc::clone(&self.module);
        match Task::spawn("engine-boot", move || Session::new(generation, image, &*module)) {
            Ok(task) => self.booting = Some(PendingBoot { generation, task }),
            Err(e) => self.boot_failed(InitializationError::Bootstrap(e.to_string())),
        }
    }

    /// Collect finished acquisition and bootstrap work.
    pub fn poll(&mut self, scheduler: &mut dyn Scheduler) -> Vec<SessionEvent> {
        if let Some(result) = self.acquiring.as_ref().and_then(Task::poll) {
            self.acquiring = None;
            self.acquired(result);
        }
        if let Some(result) = self.booting.as_ref().and_then(|b| b.task.poll()) {
            self.booted(result, scheduler);
        }
        mem::take(&mut self.events)
    }

    /// Block until pending work completes or `timeout` passes.
    pub fn settle(&mut self, scheduler: &mut dyn Scheduler, timeout: Duration) -> Vec<SessionEvent> {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("pending work did not settle within {timeout:?}");
                break;
            }
            if let Some(task) = &self.acquiring {
                if let Some(result) = task.wait_timeout(remaining) {
                    self.acquiring = None;
                    self.acquired(result);
                }
            } else if let Some(boot) = &self.booting {
                if let Some(result) = boot.task.wait_timeout(remaining) {
                    self.booted(result, scheduler);
                }
            }
        }
        mem::take(&mut self.events)
    }

    /// Run one tick: step, present, re-arm.
    ///
    /// Only a redraw this loop asked for steps the engine. Redraws the host
    /// sends on its own (expose, resize) show the last frame again.
    pub fn tick(&mut self, presenter: &mut dyn Presenter, scheduler: &mut dyn Scheduler) -> Result<(), DisplayError> {
        let armed = mem::replace(&mut self.armed, false);
        let SessionState::Running(session) = &mut self.state else {
            return Ok(());
        };
        if !armed {
            return self.display.repaint(presenter);
        }

        if let Err(fault) = session.step() {
            let generation = session.generation;
            error!("session {generation} halted: {fault}");
            self.set_state(SessionState::Idle);
            self.events.push(SessionEvent::Halted { generation, fault });
            return Ok(());
        }
        self.display.present(&session.frame, presenter)?;
        self.arm(scheduler);
        Ok(())
    }

    /// Show the last presented frame again without stepping.
    pub fn repaint(&mut self, presenter: &mut dyn Presenter) -> Result<(), DisplayError> {
        if !self.is_running() {
            return Ok(());
        }
        self.display.repaint(presenter)
    }

    /// Forward a physical key edge to the running engine.
    pub fn key(&mut self, key: VirtualKeyCode, edge: KeyEdge) {
        if let Some((button, pressed)) = input::translate(key, edge) {
            self.button(button, pressed);
        }
    }

    /// Forward a button edge from any input device to the running engine.
    pub fn button(&mut self, button: Button, pressed: bool) {
        if let SessionState::Running(session) = &mut self.state {
            session.set_button(button, pressed);
        }
    }

    fn set_state(&mut self, next: SessionState) -> SessionState {
        debug!("session loop {} -> {}", self.state.name(), next.name());
        mem::replace(&mut self.state, next)
    }

    fn arm(&mut self, scheduler: &mut dyn Scheduler) {
        if !self.armed {
            self.armed = true;
            scheduler.request_tick();
        }
    }

    fn acquired(&mut self, result: Result<Result<ProgramImage, AcquisitionError>, TaskLost>) {
        match result.map_err(AcquisitionError::from).and_then(|r| r) {
            Ok(image) => self.start(image),
            Err(e) => self.acquisition_failed(e),
        }
    }

    fn booted(&mut self, result: Result<Result<Session, InitializationError>, TaskLost>, scheduler: &mut dyn Scheduler) {
        let Some(boot) = self.booting.take() else {
            return;
        };
        match result {
            Ok(Ok(session)) => {
                let title = session.title();
                info!("session {} running: {title}", boot.generation);
                self.set_state(SessionState::Running(session));
                self.events.push(SessionEvent::Started { generation: boot.generation, title });
                self.arm(scheduler);
            }
            Ok(Err(e)) => self.boot_failed(e),
            Err(lost) => self.boot_failed(InitializationError::Bootstrap(lost.to_string())),
        }
    }

    fn acquisition_failed(&mut self, e: AcquisitionError) {
        warn!("{e}");
        self.events.push(SessionEvent::AcquisitionFailed(e));
    }

    fn boot_failed(&mut self, e: InitializationError) {
        error!("failed to start engine: {e}");
        self.set_state(SessionState::Idle);
        self.events.push(SessionEvent::InitializationFailed(e));
    }
}
