//! JPEG file replay camera
//!
//! Stands in for a sensor: loads every `.jpg`/`.jpeg` file in a directory,
//! in name order, and hands them out in a loop.

use std::path::Path;

use bytes::Bytes;

use super::{Camera, CameraError};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Replays a fixed set of frames forever
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    frames: Vec<Bytes>,
    next: usize,
}

impl ReplayCamera {
    /// Replay the given frames
    pub fn from_frames<I, B>(frames: I) -> Result<Self, CameraError>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let frames: Vec<Bytes> = frames.into_iter().map(Into::into).collect();
        if frames.is_empty() {
            return Err(CameraError::Device("no frames to replay".into()));
        }
        Ok(Self { frames, next: 0 })
    }

    /// Load every JPEG file in `dir`
    ///
    /// Files that do not start with a JPEG start-of-image marker are skipped
    /// with a warning.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
            if is_jpeg && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let data = std::fs::read(&path)?;
            if !data.starts_with(&JPEG_SOI) {
                tracing::warn!(path = %path.display(), "Skipping file without JPEG header");
                continue;
            }
            frames.push(Bytes::from(data));
        }

        tracing::info!(dir = %dir.display(), frames = frames.len(), "Replay camera loaded");
        Self::from_frames(frames)
    }

    /// Number of distinct frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; construction rejects an empty set
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Camera for ReplayCamera {
    fn capture(&mut self) -> Result<&[u8], CameraError> {
        let idx = self.next;
        self.next = (self.next + 1) % self.frames.len();

        let frame = &self.frames[idx];
        if frame.is_empty() {
            return Err(CameraError::EmptyFrame);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_a_loop() {
        let mut camera = ReplayCamera::from_frames(vec![&b"a"[..], &b"b"[..]]).unwrap();

        assert_eq!(camera.capture().unwrap(), b"a");
        assert_eq!(camera.capture().unwrap(), b"b");
        assert_eq!(camera.capture().unwrap(), b"a");
    }

    #[test]
    fn test_empty_set_rejected() {
        let result = ReplayCamera::from_frames(Vec::<Bytes>::new());
        assert!(matches!(result, Err(CameraError::Device(_))));
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let mut camera = ReplayCamera::from_frames(vec![Bytes::new()]).unwrap();
        assert!(matches!(camera.capture(), Err(CameraError::EmptyFrame)));
    }

    #[test]
    fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), [0xFF, 0xD8, 2]).unwrap();
        std::fs::write(dir.path().join("a.JPEG"), [0xFF, 0xD8, 1]).unwrap();
        std::fs::write(dir.path().join("c.jpg"), b"not a jpeg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut camera = ReplayCamera::open(dir.path()).unwrap();
        assert_eq!(camera.len(), 2);
        assert_eq!(camera.capture().unwrap(), [0xFF, 0xD8, 1]);
        assert_eq!(camera.capture().unwrap(), [0xFF, 0xD8, 2]);
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReplayCamera::open(dir.path().join("nope"));
        assert!(matches!(result, Err(CameraError::Io(_))));
    }
}
