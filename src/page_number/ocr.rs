//! OCR engine boundary
//!
//! The extractor only needs "recognise this small image with this
//! segmentation mode and character whitelist". [`TesseractCli`] does that by
//! running the `tesseract` executable on a temporary PNG with a deadline.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::GrayImage;
use thiserror::Error;
use tracing::{debug, warn};

/// Interval between exit checks while waiting for the engine
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A single failed OCR invocation
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Failed to write OCR input image: {0}")]
    TempImage(String),

    #[error("Failed to start OCR engine: {0}")]
    Spawn(#[source] io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),
}

/// Text recognition over a prepared grayscale image
pub trait OcrEngine: Send + Sync {
    /// Recognise `image` using segmentation mode `psm`, restricted to `whitelist`.
    fn recognize(&self, image: &GrayImage, psm: u32, whitelist: &str) -> Result<String, OcrError>;
}

/// Locate the `tesseract` executable on `PATH`
pub fn which_tesseract() -> Option<PathBuf> {
    which::which("tesseract").ok()
}

/// `tesseract` command-line engine
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Engine for the `tesseract` found on `PATH`, if any
    pub fn locate(timeout: Duration) -> Option<Self> {
        let executable = which_tesseract()?;
        debug!(path = %executable.display(), "found tesseract");
        Some(Self::new(executable, timeout))
    }

    /// Engine for an explicit executable path or name, if it resolves to an executable
    pub fn from_path(executable: impl AsRef<Path>, timeout: Duration) -> Option<Self> {
        let executable = executable.as_ref();
        match which::which(executable) {
            Ok(resolved) => Some(Self::new(resolved, timeout)),
            Err(e) => {
                debug!(path = %executable.display(), error = %e, "tesseract path does not resolve");
                None
            }
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run(&self, input: &Path, psm: u32, whitelist: &str) -> Result<String, OcrError> {
        // tesseract input.png stdout --psm 7 -c tessedit_char_whitelist=0123456789
        let mut child = Command::new(&self.executable)
            .arg(input)
            .arg("stdout")
            .arg("--psm")
            .arg(psm.to_string())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={whitelist}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(OcrError::Spawn)?;

        // A full pipe stalls the engine, so both are drained while waiting.
        let stdout = child.stdout.take().map(drain_pipe);
        let stderr = child.stderr.take().map(drain_pipe);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(psm, timeout = ?self.timeout, "tesseract timed out, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers are left detached; a grandchild may still hold the pipes.
                    return Err(OcrError::Timeout(self.timeout));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OcrError::Spawn(e));
                }
            }
        };

        let stdout = collect_pipe(stdout);
        let stderr = collect_pipe(stderr);
        if !status.success() {
            return Err(OcrError::Exit {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect_pipe(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &GrayImage, psm: u32, whitelist: &str) -> Result<String, OcrError> {
        let temp = tempfile::Builder::new()
            .prefix("spreadcrop_ocr_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::TempImage(e.to_string()))?;
        image
            .save_with_format(temp.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::TempImage(e.to_string()))?;

        // `temp` removes the file when dropped.
        self.run(temp.path(), psm, whitelist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let engine = TesseractCli::new(
            "/nonexistent/spreadcrop-tesseract",
            Duration::from_secs(1),
        );
        let image = GrayImage::from_pixel(8, 8, Luma([255]));
        let result = engine.recognize(&image, 7, "0123456789");
        assert!(matches!(result, Err(OcrError::Spawn(_))));
    }

    #[test]
    fn test_from_path_rejects_missing_executable() {
        assert!(TesseractCli::from_path("/nonexistent/spreadcrop-tesseract", Duration::from_secs(1)).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_accepts_executable_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-tesseract");
        std::fs::write(&script, "#!/bin/sh\necho 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = TesseractCli::from_path(&script, Duration::from_secs(1)).unwrap();
        assert!(engine.executable().ends_with("fake-tesseract"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_engine_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-tesseract");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = TesseractCli::new(&script, Duration::from_millis(200));
        let image = GrayImage::from_pixel(8, 8, Luma([255]));
        let started = Instant::now();
        let result = engine.recognize(&image, 7, "0123456789");
        assert!(matches!(result, Err(OcrError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_engine_output_and_exit_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok-tesseract");
        std::fs::write(&ok, "#!/bin/sh\necho \"$4 $6\"\n").unwrap();
        std::fs::set_permissions(&ok, std::fs::Permissions::from_mode(0o755)).unwrap();
        let failing = dir.path().join("bad-tesseract");
        std::fs::write(&failing, "#!/bin/sh\necho boom >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&failing, std::fs::Permissions::from_mode(0o755)).unwrap();

        let image = GrayImage::from_pixel(8, 8, Luma([255]));
        let text = TesseractCli::new(&ok, Duration::from_secs(5))
            .recognize(&image, 8, "IVX")
            .unwrap();
        assert_eq!(text.trim(), "8 tessedit_char_whitelist=IVX");

        let err = TesseractCli::new(&failing, Duration::from_secs(5))
            .recognize(&image, 7, "0123456789")
            .unwrap_err();
        match err {
            OcrError::Exit { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_large_engine_output_does_not_block() {
        use std::os::unix::fs::PermissionsExt;

        // 200 KB of stderr noise is far more than a pipe buffer holds.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noisy-tesseract");
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 204800 /dev/zero | tr '\\0' 'x' >&2\nhead -c 204800 /dev/zero | tr '\\0' ' '\necho 42\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let image = GrayImage::from_pixel(8, 8, Luma([255]));
        let text = TesseractCli::new(&script, Duration::from_secs(5))
            .recognize(&image, 7, "0123456789")
            .unwrap();
        assert_eq!(text.trim(), "42");
    }
}
