use std::path::Path;

use crate::foundation::error::{PeekabooError, PeekabooResult};

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> PeekabooResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PeekabooError::audio(format!(
                "failed to create audio output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(out_path, f32le_bytes(samples_interleaved)).map_err(|e| {
        PeekabooError::audio(format!(
            "failed to write audio file '{}': {e}",
            out_path.display()
        ))
    })
}

/// Samples as little-endian f32 bytes.
pub fn f32le_bytes(samples_interleaved: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Temporary audio file removed on drop.
#[derive(Debug)]
pub struct TempPcmFile {
    path: std::path::PathBuf,
}

impl TempPcmFile {
    /// Write `samples` to a fresh file in the system temp directory.
    pub fn create(tag: &str, samples_interleaved: &[f32]) -> PeekabooResult<Self> {
        let path = std::env::temp_dir().join(format!(
            "peekaboo_{tag}_{}_{}.f32le",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        write_f32le_file(samples_interleaved, &path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPcmFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
