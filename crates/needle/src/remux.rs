//! Repackaging of the decrypted stream with the ffmpeg CLI.
//!
//! The audio essence is copied as is, container level metadata is dropped.

use std::{path::Path, process::Stdio};

use tokio::process::Command;

use crate::error::{NeedleError, NeedleResult};

/// Whether `ffmpeg` can be found in `PATH`.
pub fn ffmpeg_installed() -> bool {
    which::which("ffmpeg").is_ok()
}

pub async fn remux<I, O>(input: I, output: O) -> NeedleResult<()>
where
    I: AsRef<Path>,
    O: AsRef<Path>,
{
    let ffmpeg = which::which("ffmpeg")?;
    tracing::debug!(
        "Remuxing {} into {} with ffmpeg CLI...",
        input.as_ref().display(),
        output.as_ref().display()
    );

    let status = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input.as_ref())
        .args(["-map_metadata", "-1", "-c:a", "copy"])
        .arg(output.as_ref())
        .stdin(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        return Err(NeedleError::RemuxFailed(status));
    }
    Ok(())
}
