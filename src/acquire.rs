//! Program image acquisition.
//!
//! Images come from the command line, the file dialog, a dropped file or the
//! bundled demo path. Reading happens on a worker thread; the caller polls the
//! returned [`Task`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::task::{Task, TaskLost};

const ROM_EXTENSIONS: [&str; 2] = ["gb", "gbc"];

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no ROM was selected")]
    NoPayload,
    #[error("{0} is not a Game Boy ROM (expected .gb or .gbc)")]
    Unsupported(PathBuf),
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start loader thread: {0}")]
    Spawn(#[source] io::Error),
    #[error(transparent)]
    Lost(#[from] TaskLost),
}

/// Where a program image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Picked by the user (command line or file dialog).
    Selected(PathBuf),
    /// Dropped onto the window.
    Dropped(PathBuf),
    /// Demo image shipped next to the binary.
    Bundled(PathBuf),
}

impl ImageSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Selected(p) | Self::Dropped(p) | Self::Bundled(p) => p,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selected(p) => write!(f, "selected {}", p.display()),
            Self::Dropped(p) => write!(f, "dropped {}", p.display()),
            Self::Bundled(p) => write!(f, "demo {}", p.display()),
        }
    }
}

/// Immutable ROM bytes plus a human readable origin.
#[derive(Clone)]
pub struct ProgramImage {
    origin: String,
    bytes: Arc<[u8]>,
}

impl ProgramImage {
    pub fn new(origin: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { origin: origin.into(), bytes: bytes.into() }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramImage")
            .field("origin", &self.origin)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Start reading `source` in the background.
pub fn acquire(source: ImageSource) -> Result<Task<Result<ProgramImage, AcquisitionError>>, AcquisitionError> {
    Task::spawn("rom-loader", move || read_image(&source)).map_err(AcquisitionError::Spawn)
}

/// Read an image synchronously.
pub fn read_image(source: &ImageSource) -> Result<ProgramImage, AcquisitionError> {
    let path = source.path();
    // The demo path is ours; user supplied files must look like ROMs.
    if !matches!(source, ImageSource::Bundled(_)) && !has_rom_extension(path) {
        return Err(AcquisitionError::Unsupported(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|source| AcquisitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AcquisitionError::Empty(path.to_path_buf()));
    }
    debug!("read {} bytes from {source}", bytes.len());

    Ok(ProgramImage::new(path.display().to_string(), bytes))
}

/// Ask the user for a ROM with the native file dialog.
pub fn select_file() -> Result<ImageSource, AcquisitionError> {
    rfd::FileDialog::new()
        .set_title("Open Game Boy ROM")
        .add_filter("Game Boy ROM", &ROM_EXTENSIONS)
        .pick_file()
        .map(ImageSource::Selected)
        .ok_or(AcquisitionError::NoPayload)
}

fn has_rom_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ROM_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gb_host_acquire_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_dropped_rom() {
        let path = temp_file("game.gb", &[1, 2, 3]);
        let image = read_image(&ImageSource::Dropped(path)).unwrap();
        assert_eq!(image.bytes(), &[1, 2, 3]);
        assert!(image.origin().ends_with("game.gb"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let path = temp_file("GAME.GBC", &[0xAA]);
        assert!(read_image(&ImageSource::Selected(path)).is_ok());
    }

    #[test]
    fn rejects_non_rom_extension() {
        let path = temp_file("notes.txt", b"hello");
        let err = read_image(&ImageSource::Dropped(path)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Unsupported(_)));
    }

    #[test]
    fn bundled_path_skips_extension_check() {
        let path = temp_file("demo.bin", &[7; 16]);
        assert_eq!(read_image(&ImageSource::Bundled(path)).unwrap().len(), 16);
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = temp_file("empty.gb", &[]);
        let err = read_image(&ImageSource::Selected(path)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Empty(_)));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let err = read_image(&ImageSource::Selected(PathBuf::from("/nonexistent/x.gb"))).unwrap_err();
        assert!(matches!(err, AcquisitionError::Read { .. }));
    }

    #[test]
    fn acquire_delivers_through_task() {
        let path = temp_file("async.gb", &[9; 4]);
        let task = acquire(ImageSource::Dropped(path)).unwrap();
        let image = task.wait_timeout(Duration::from_secs(5)).unwrap().unwrap().unwrap();
        assert_eq!(image.len(), 4);
    }
}
