//! Frame sources for the tracking pipeline.

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::tracker::Frame;

/// Trait for sequential access to decoded video frames.
///
/// Implement this trait to connect any decoder to the pipeline.
///
/// Sources yield frames in order with sequential indices starting at 0.
/// `frame_count_hint` may under- or over-shoot the number of frames the
/// source actually yields (container metadata is often approximate); the
/// pipeline tolerates both.
pub trait FrameSource {
    /// Error type for decode failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode and return the next frame, or None when exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;

    /// Reported total frame count; approximate.
    fn frame_count_hint(&self) -> usize;
}

/// In-memory frame source, mainly for tests and replaying decoded clips.
pub struct BufferedSource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl BufferedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl FrameSource for BufferedSource {
    type Error = std::convert::Infallible;

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        if self.cursor >= self.frames.len() {
            return Ok(None);
        }
        let mut frame = self.frames[self.cursor].clone();
        frame.index = self.cursor;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn frame_count_hint(&self) -> usize {
        self.frames.len()
    }
}

/// Error type for image-sequence decoding failures.
#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("failed to read frame directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no decodable frames found in {0}")]
    EmptyDirectory(PathBuf),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Frame source reading a directory of sequentially named image files.
///
/// Files are ordered by name, so zero-padded frame numbers (`frame_0001.png`)
/// decode in the intended order.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, ImageSourceError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ImageSourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        FRAME_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
                    })
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(ImageSourceError::EmptyDirectory(dir.to_path_buf()));
        }
        debug!("found {} frame images in {}", paths.len(), dir.display());

        Ok(Self { paths, cursor: 0 })
    }
}

impl FrameSource for ImageSequenceSource {
    type Error = ImageSourceError;

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let gray = image::open(path)
            .map_err(|source| ImageSourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_luma8();

        let (width, height) = gray.dimensions();
        let data = gray.into_raw().into_iter().map(|v| v as f32).collect();
        let frame = Frame::new(self.cursor, width as usize, height as usize, data);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn frame_count_hint(&self) -> usize {
        self.paths.len()
    }
}
