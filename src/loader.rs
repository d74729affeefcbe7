use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use miette::Result;

use crate::error;
use crate::state::Memory;

/// Where an image landed in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub origin: u16,
    /// Amount of words written, which may be less than the image holds.
    pub len: usize,
}

/// Problems with the contents of an image stream.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    /// Stream ended before a complete origin word.
    TooShort,
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Copy an object image from `reader` into memory.
///
/// The first big-endian word is the origin, every following word is placed contiguously from
/// there. Reading stops at the end of the stream or once the top of memory is filled, whichever
/// comes first.
pub fn load_image(mem: &mut Memory, mut reader: impl Read) -> Result<ImageInfo, LoadError> {
    let mut origin = [0; 2];
    reader.read_exact(&mut origin).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => LoadError::TooShort,
        _ => LoadError::Io(e),
    })?;
    let origin = u16::from_be_bytes(origin);

    let dest = mem.tail_mut(origin);
    let capacity = dest.len() * 2;
    // One byte past what fits tells an overrun apart from an exact fit
    let mut buffer = Vec::with_capacity(capacity + 1);
    reader
        .take(capacity as u64 + 1)
        .read_to_end(&mut buffer)?;

    if buffer.len() > capacity {
        buffer.truncate(capacity);
        log::warn!("image at origin {origin:#06x} overruns memory, dropping the rest");
    } else if buffer.len() % 2 != 0 {
        log::warn!("image is not aligned to 16 bits, ignoring trailing byte");
    }

    let words = buffer
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]));
    let mut len = 0;
    for (slot, word) in dest.iter_mut().zip(words) {
        *slot = word;
        len += 1;
    }

    Ok(ImageInfo { origin, len })
}

/// Load the image file at `path`, with a diagnostic naming the file on failure.
pub fn load_image_file(mem: &mut Memory, path: &Path) -> Result<ImageInfo> {
    let file = File::open(path).map_err(|e| error::load_open(path, e))?;
    let info = load_image(mem, io::BufReader::new(file)).map_err(|e| match e {
        LoadError::Io(e) => error::load_read(path, e),
        LoadError::TooShort => error::load_short(path),
    })?;
    log::debug!(
        "loaded {} words from {} at {:#06x}",
        info.len,
        path.display(),
        info.origin
    );
    Ok(info)
}

/// Expand command line image arguments.
///
/// Existing paths are used as given. Anything else containing glob metacharacters is expanded
/// in sorted order, and must match at least one file.
pub fn expand_image_paths(args: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(args.len());
    for arg in args {
        let pattern = arg.to_string_lossy();
        if arg.exists() || !pattern.contains(['*', '?', '[']) {
            paths.push(arg.clone());
            continue;
        }

        let entries =
            glob::glob(&pattern).map_err(|e| error::load_glob(&pattern, &e.to_string()))?;
        let mut matched = entries
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| error::load_glob(&pattern, &e.to_string()))?;
        if matched.is_empty() {
            return Err(error::load_glob(&pattern, "pattern matched no files"));
        }
        matched.sort();
        paths.extend(matched);
    }
    Ok(paths)
}
