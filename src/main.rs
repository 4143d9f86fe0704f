use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use gilrs::Gilrs;
use log::{debug, error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use winit::{
    dpi::LogicalSize,
    event::{Event, KeyboardInput, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

use gb_host::acquire::{self, ImageSource};
use gb_host::display::{DisplayPipeline, Zoom, SCALE_X, SCALE_Y};
use gb_host::dmg::DmgModule;
use gb_host::gamepad::PadInput;
use gb_host::input::{self, HostKeys, Hotkey};
use gb_host::{KeyEdge, SessionEvent, SessionLoop};

// how often pending loads are checked while nothing is being drawn
const IDLE_POLL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
struct Args {
    /// Path to .gb ROM file (use your own/homebrew ROM)
    rom: Option<PathBuf>,

    /// ROM loaded when no path is given
    #[arg(long, default_value = "assets/demo.gb")]
    demo: PathBuf,

    /// Integer window zoom on top of the fixed presentation scale (E doubles, R halves)
    #[arg(long, default_value_t = 2)]
    scale: u32,

    /// Window title prefix
    #[arg(long, default_value = "GB Host")]
    title: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let display = DisplayPipeline::new(SCALE_X, SCALE_Y);
    let (width, height) = display.presentation_size();
    let mut zoom = Zoom::new(args.scale);
    let (window_width, window_height) = zoom.window_size((width, height));

    let event_loop = EventLoop::new();
    let mut window = WindowBuilder::new()
        .with_title(format!("{} - drop a ROM or press F1", args.title))
        .with_inner_size(LogicalSize::new(window_width as f64, window_height as f64))
        .with_min_inner_size(LogicalSize::new(width as f64, height as f64))
        .build(&event_loop)?;

    let window_size = window.inner_size();
    let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
    let mut pixels = Pixels::new(width, height, surface_texture)?;
    display.check(&mut pixels).context("presentation surface")?;

    let mut session = SessionLoop::new(Arc::new(DmgModule), display);
    match args.rom {
        Some(path) => session.load(ImageSource::Selected(path)),
        None => session.load(ImageSource::Bundled(args.demo)),
    }

    let mut gilrs = match Gilrs::new() {
        Ok(gilrs) => Some(gilrs),
        Err(e) => {
            warn!("gamepad input unavailable: {e}");
            None
        }
    };
    let mut pad = PadInput::default();
    let mut hotkeys = HostKeys::default();

    let title = args.title;
    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,

                WindowEvent::Resized(size) => {
                    if let Err(e) = pixels.resize_surface(size.width, size.height) {
                        warn!("resize failed: {e}");
                    }
                    if let Err(e) = session.repaint(&mut pixels) {
                        warn!("{e}");
                    }
                }

                WindowEvent::Focused(false) => hotkeys.clear(),

                WindowEvent::DroppedFile(path) => session.load(ImageSource::Dropped(path)),

                WindowEvent::KeyboardInput {
                    input: KeyboardInput { state, virtual_keycode: Some(key), .. },
                    ..
                } => {
                    let edge = KeyEdge::from(state);
                    match input::map_hotkey(key) {
                        None => session.key(key, edge),
                        Some(hotkey) if !hotkeys.fresh(hotkey, edge) => {}
                        Some(Hotkey::Open) if session.is_busy() => debug!("load already in progress"),
                        Some(Hotkey::Open) => match acquire::select_file() {
                            Ok(source) => session.load(source),
                            Err(e) => info!("{e}"),
                        },
                        Some(hotkey) => {
                            let changed = match hotkey {
                                Hotkey::Expand => zoom.expand(),
                                _ => zoom.collapse(),
                            };
                            if changed {
                                let (w, h) = zoom.window_size((width, height));
                                info!("zoom {}x", zoom.factor());
                                window.set_inner_size(LogicalSize::new(w as f64, h as f64));
                            }
                        }
                    }
                }

                _ => {}
            },

            Event::RedrawRequested(_) => {
                if let Err(e) = session.tick(&mut pixels, &mut window) {
                    error!("{e}");
                    *control_flow = ControlFlow::Exit;
                    return;
                }
            }

            Event::MainEventsCleared => {
                if let Some(gilrs) = gilrs.as_mut() {
                    while let Some(gilrs::Event { event, .. }) = gilrs.next_event() {
                        for (button, pressed) in pad.translate(event) {
                            session.button(button, pressed);
                        }
                    }
                }
                for ev in session.poll(&mut window) {
                    match &ev {
                        SessionEvent::Started { .. } => window.set_title(&format!("{title} - {ev}")),
                        SessionEvent::AcquisitionFailed(_) => {
                            if !session.is_running() {
                                window.set_title(&format!("{title} - {ev}"));
                            }
                        }
                        SessionEvent::InitializationFailed(_) | SessionEvent::Halted { .. } => {
                            window.set_title(&format!("{title} - {ev}"));
                        }
                    }
                }
            }

            _ => {}
        }

        if *control_flow != ControlFlow::Exit {
            *control_flow = if session.is_busy() {
                ControlFlow::WaitUntil(Instant::now() + IDLE_POLL)
            } else {
                ControlFlow::Wait
            };
        }
    });

    // unreachable
}
