//! Clip files: a JSON header followed by length-prefixed JPEG frames (MJPEG).
//!
//! Layout:
//! ```text
//! magic "STRKCLP1" | u32 LE header length | header JSON
//! repeated: u32 LE frame length | JPEG bytes
//! ```

use super::frame::Frame;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const CLIP_EXTENSION: &str = "clip";
pub const CLIP_VERSION: u32 = 1;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

const CLIP_MAGIC: &[u8; 8] = b"STRKCLP1";
const MAX_HEADER_BYTES: u32 = 64 * 1024;
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("clip i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("frame encode/decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid clip header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("not a clip file")]
    BadMagic,
    #[error("clip header of {0} bytes is too large")]
    HeaderTooLarge(u32),
    #[error("unsupported clip version {0}")]
    UnsupportedVersion(u32),
}

/// Geometry and rate for a clip about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMeta {
    pub stream: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipHeader {
    pub version: u32,
    pub stream: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u32,
    pub created_at: String,
}

/// Summary of a clip that was written successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub path: PathBuf,
    pub frame_count: u32,
    pub fps: f64,
}

/// `<dir>/<stream> <YYYY-MM-DD HH-MM-SS>.clip`
pub fn clip_path(dir: &Path, stream: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{stream} {}.{CLIP_EXTENSION}",
        at.format("%Y-%m-%d %H-%M-%S")
    ))
}

pub struct ClipWriter {
    out: BufWriter<File>,
    path: PathBuf,
    quality: u8,
    written: u32,
    fps: f64,
    scratch: Vec<u8>,
}

impl ClipWriter {
    /// Create the file (and its directory) and write the header.
    pub fn create(path: &Path, meta: &ClipMeta, frame_count: u32) -> Result<Self, ClipError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let header = ClipHeader {
            version: CLIP_VERSION,
            stream: meta.stream.clone(),
            width: meta.width,
            height: meta.height,
            fps: meta.fps,
            frame_count,
            created_at: Local::now().to_rfc3339(),
        };
        let header_bytes = serde_json::to_vec(&header)?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(CLIP_MAGIC)?;
        out.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
        out.write_all(&header_bytes)?;
        Ok(Self {
            out,
            path: path.to_path_buf(),
            quality: meta.jpeg_quality.clamp(1, 100),
            written: 0,
            fps: meta.fps,
            scratch: Vec::new(),
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), ClipError> {
        self.scratch.clear();
        {
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut self.scratch,
                self.quality,
            );
            encoder.encode(
                frame.as_rgb(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )?;
        }
        self.out.write_all(&(self.scratch.len() as u32).to_le_bytes())?;
        self.out.write_all(&self.scratch)?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<ClipInfo, ClipError> {
        self.out.flush()?;
        Ok(ClipInfo {
            path: self.path,
            frame_count: self.written,
            fps: self.fps,
        })
    }
}

/// Result of reading the next record.
#[derive(Debug)]
pub enum ClipRead {
    Frame(Frame),
    /// The record was empty or could not be decoded.
    Skipped,
    End,
}

pub struct ClipReader {
    input: BufReader<File>,
    header: ClipHeader,
    payload: Vec<u8>,
}

impl ClipReader {
    pub fn open(path: &Path) -> Result<Self, ClipError> {
        let mut input = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic)?;
        if &magic != CLIP_MAGIC {
            return Err(ClipError::BadMagic);
        }
        let header_len = read_u32(&mut input)?;
        if header_len > MAX_HEADER_BYTES {
            return Err(ClipError::HeaderTooLarge(header_len));
        }
        let mut header_bytes = vec![0u8; header_len as usize];
        input.read_exact(&mut header_bytes)?;
        let header: ClipHeader = serde_json::from_slice(&header_bytes)?;
        if header.version != CLIP_VERSION {
            return Err(ClipError::UnsupportedVersion(header.version));
        }
        Ok(Self {
            input,
            header,
            payload: Vec::new(),
        })
    }

    pub fn header(&self) -> &ClipHeader {
        &self.header
    }

    /// Read the next frame. A truncated trailing record counts as the end,
    /// which is what a save interrupted by a write failure leaves behind.
    pub fn next_frame(&mut self) -> Result<ClipRead, ClipError> {
        let len = match read_u32(&mut self.input) {
            Ok(len) => len,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(ClipRead::End),
            Err(err) => return Err(err.into()),
        };
        if len == 0 {
            return Ok(ClipRead::Skipped);
        }
        if len > MAX_FRAME_BYTES {
            tracing::warn!("clip frame record of {len} bytes is implausible; ending playback pass");
            return Ok(ClipRead::End);
        }
        self.payload.resize(len as usize, 0);
        match self.input.read_exact(&mut self.payload) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(ClipRead::End),
            Err(err) => return Err(err.into()),
        }
        match image::load_from_memory_with_format(&self.payload, image::ImageFormat::Jpeg) {
            Ok(decoded) => {
                let frame = Frame::new(decoded.to_rgb8());
                if frame.is_empty() {
                    Ok(ClipRead::Skipped)
                } else {
                    Ok(ClipRead::Frame(frame))
                }
            }
            Err(err) => {
                tracing::debug!("skipping undecodable clip frame: {err}");
                Ok(ClipRead::Skipped)
            }
        }
    }
}

fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
