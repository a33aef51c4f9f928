//! Streams an installer image to a local file.

use crate::error::{Result, UpdateError};
use crate::progress::ProgressEvent;
use std::io::{Read, Write};
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// Download `url` into `dest`, reporting progress through `on_progress`.
///
/// No timeout governs this phase. Blocking; call from a worker thread.
/// A partially written `dest` is left behind on failure.
///
/// # Errors
///
/// - [`UpdateError::HttpStatus`] for non-2xx responses
/// - [`UpdateError::Transport`] for network failures while connecting or reading
/// - [`UpdateError::Io`] if the destination cannot be written
pub fn download_asset(
    url: &str,
    dest: &Path,
    user_agent: &str,
    on_progress: &dyn Fn(ProgressEvent),
) -> Result<u64> {
    let agent = ureq::AgentBuilder::new().user_agent(user_agent).build();

    tracing::info!("downloading update from {url}");
    let resp = match agent.get(url).call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(status, _)) => return Err(UpdateError::http_status(status)),
        Err(ureq::Error::Transport(t)) => {
            return Err(UpdateError::Transport(format!("download failed: {t}")));
        }
    };

    if !(200..300).contains(&resp.status()) {
        return Err(UpdateError::http_status(resp.status()));
    }

    let total_bytes = resp
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok());
    let filename = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    on_progress(ProgressEvent::DownloadStarted {
        filename,
        total_bytes,
    });

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(dest).map_err(|e| {
        UpdateError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot create {}: {e}", dest.display()),
        ))
    })?;

    let mut reader = resp.into_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| UpdateError::Transport(format!("download interrupted: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        written += n as u64;
        on_progress(ProgressEvent::DownloadProgress {
            bytes_downloaded: written,
            total_bytes,
        });
    }
    file.flush()?;

    on_progress(ProgressEvent::DownloadComplete {
        bytes_downloaded: written,
    });
    tracing::info!("downloaded {written} bytes to {}", dest.display());
    Ok(written)
}
