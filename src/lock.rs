// Lock program module
// Hands the finished composite to i3lock or swaylock

use crate::error::LockError;
use anyhow::{Context, Result};
use clap::ValueEnum;
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Screen locker the composite is handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LockProgram {
    I3lock,
    Swaylock,
    /// Only print the composite path
    None,
}

impl LockProgram {
    pub fn binary(self) -> Option<&'static str> {
        match self {
            LockProgram::I3lock => Some("i3lock"),
            LockProgram::Swaylock => Some("swaylock"),
            LockProgram::None => None,
        }
    }

    /// Arguments that show `image` as the lock background, in the foreground
    pub fn args(self, image: &Path) -> Vec<String> {
        let image = image.display().to_string();
        match self {
            LockProgram::I3lock => vec!["--nofork".into(), "--image".into(), image],
            LockProgram::Swaylock => vec!["--image".into(), image],
            LockProgram::None => Vec::new(),
        }
    }
}

/// Look `name` up in `PATH`
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Fail early when the chosen locker is not installed
pub fn check_available(program: LockProgram) -> Result<(), LockError> {
    match program.binary() {
        Some(name) if find_in_path(name).is_none() => {
            Err(LockError::LockProgramMissing(name.to_string()))
        }
        _ => Ok(()),
    }
}

/// Run the locker with `image` and wait until the screen is unlocked
pub fn lock_screen(program: LockProgram, image: &Path) -> Result<()> {
    let Some(name) = program.binary() else {
        println!("{}", image.display());
        return Ok(());
    };

    info!("Locking screen with {} using {}", name, image.display());
    let status = Command::new(name)
        .args(program.args(image))
        .status()
        .with_context(|| format!("Failed to start {}", name))?;

    if !status.success() {
        return Err(LockError::LockFailed {
            program: name.to_string(),
            status: status.to_string(),
        }
        .into());
    }
    Ok(())
}
