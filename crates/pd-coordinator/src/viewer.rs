//! External console viewer launch

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::OperationResult;

/// Write the console payload to the temp directory and hand it to the
/// viewer, detached.
///
/// The child's lifetime is independent of the application; its handle is
/// dropped immediately and never reaped.
pub fn launch_viewer(command: &str, vmid: u32, payload: &str) -> OperationResult<PathBuf> {
    let path = std::env::temp_dir().join(format!("proxdeck-spice-{}.vv", vmid));
    fs::write(&path, payload)?;

    Command::new(command)
        .arg(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(path)
}
