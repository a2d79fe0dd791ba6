//! User-visible exception log written when the settings file cannot be saved.
use chrono::{DateTime, Local};
use std::fmt::Display;
use std::fs;
use std::path::Path;

const HEADER: &str = "RegionKeeper hit an error while saving its settings.\n\
Include this file when reporting the problem.";

/// Render the log body: header, game version, timestamp and the error.
#[must_use]
pub fn render_exception_log(game_version: &str, at: DateTime<Local>, error: &dyn Display) -> String {
    format!(
        "{HEADER}\n\nGame version: {game_version}\nTime: {}\n\n{error}\n",
        at.format("%m/%d/%Y %H:%M:%S")
    )
}

/// Write the exception log, replacing any previous one.
///
/// Failure to write the log itself is only logged; the original error is
/// what the caller reports.
pub fn write_exception_log(path: &Path, game_version: &str, error: &dyn Display) {
    let body = render_exception_log(game_version, Local::now(), error);
    if let Err(err) = fs::write(path, body) {
        log::error!("could not write exception log {}: {err}", path.display());
    }
}
