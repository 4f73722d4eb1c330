use env_logger::{Env, Target};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "manga-reader-tui.log";

/// Sends log output to `<dir>/manga-reader-tui.log`. The terminal belongs to the UI.
///
/// `RUST_LOG` overrides `default_level`.
pub fn init(dir: &Path, default_level: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .map_err(io::Error::other)?;

    Ok(path)
}
