// Ranges, defaults, and output location.
//
// Manual entry accepts the wide ranges; the dice roller stays inside the
// narrower "musically useful" ones.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::error::ExportError;

pub const TEMPO_RANGE: RangeInclusive<u32> = 40..=240;
pub const BAR_RANGE: RangeInclusive<u32> = 1..=16;
pub const DENSITY_RANGE: RangeInclusive<f64> = 0.0..=1.0;

pub const ROLL_TEMPO_RANGE: RangeInclusive<u32> = 60..=180;
pub const ROLL_BARS: u32 = 8;
pub const ROLL_DENSITY_RANGE: RangeInclusive<f64> = 0.3..=1.0;

pub const DEFAULT_ROOT_NOTE: &str = "C";
pub const DEFAULT_SCALE: &str = "major";
pub const DEFAULT_GENRE: &str = "Funk";
pub const DEFAULT_TEMPO: u32 = 120;
pub const DEFAULT_BARS: u32 = 4;
pub const DEFAULT_DENSITY: f64 = 1.0;
pub const DEFAULT_INSTRUMENT: &str = "Synth Bass 1";

/// Environment variable that overrides where MIDI files are written.
pub const OUTPUT_DIR_ENV: &str = "BASSLINE_OUTPUT_DIR";

/// File the terminal UI sends log output to, inside the temp dir.
pub const TUI_LOG_FILE: &str = "basslinegen.log";

/// Pick the directory exported files land in.
///
/// An explicit directory is used as given (and created). Otherwise the
/// Desktop: the platform's, then `~/OneDrive/Desktop`, then `~/Desktop`,
/// which is created when missing.
pub fn resolve_output_dir(explicit: Option<&Path>) -> Result<PathBuf, ExportError> {
    if let Some(dir) = explicit {
        std::fs::create_dir_all(dir)?;
        return Ok(dir.to_path_buf());
    }

    if let Some(desktop) = dirs::desktop_dir().filter(|path| path.is_dir()) {
        return Ok(desktop);
    }

    let home = dirs::home_dir().ok_or(ExportError::NoOutputDirectory)?;
    desktop_under_home(&home)
}

fn desktop_under_home(home: &Path) -> Result<PathBuf, ExportError> {
    let desktop = home.join("Desktop");
    if desktop.is_dir() {
        return Ok(desktop);
    }

    let onedrive = home.join("OneDrive").join("Desktop");
    if onedrive.is_dir() {
        return Ok(onedrive);
    }

    std::fs::create_dir_all(&desktop)?;
    Ok(desktop)
}

/// Where the terminal UI log goes.
pub fn tui_log_path() -> PathBuf {
    std::env::temp_dir().join(TUI_LOG_FILE)
}
