//! Archive detection, entry enumeration and per-entry data streams.
//!
//! Enumeration reads only the archive index (the zip central directory, or the
//! tar headers). Entry data is located by offset so an entry can be re-opened
//! later as an owned stream without holding a borrow on any archive reader.

use crate::error::{VfsError, VfsResult};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::{CompressionMethod, ZipArchive};

/// Compression wrapping a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

/// Archive formats the VFS can expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar(TarCompression),
}

impl ArchiveKind {
    /// Detect the archive kind from a file name, case-insensitively.
    ///
    /// Multi-part suffixes such as `.tar.gz` are recognized as a whole.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar(TarCompression::None))
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::Tar(TarCompression::Gzip))
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Some(Self::Tar(TarCompression::Bzip2))
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::Tar(TarCompression::Xz))
        } else {
            None
        }
    }
}

/// An open archive shared by all of its entries.
///
/// Reads go through the mutex and always seek first, so any number of entry
/// streams can be interleaved over the one descriptor.
#[derive(Debug)]
pub(crate) struct ArchiveHandle {
    path: PathBuf,
    kind: ArchiveKind,
    file: Mutex<File>,
}

impl ArchiveHandle {
    pub(crate) fn open(path: &Path, kind: ArchiveKind) -> VfsResult<(Arc<Self>, Vec<ArchiveEntry>)> {
        let file = File::open(path)?;
        let entries = match kind {
            ArchiveKind::Zip => list_zip(&file)?,
            ArchiveKind::Tar(compression) => list_tar(&file, compression)?,
        };
        tracing::debug!(archive = %path.display(), entries = entries.len(), "enumerated archive");
        let handle = Arc::new(Self { path: path.to_path_buf(), kind, file: Mutex::new(file) });
        Ok((handle, entries))
    }

    pub(crate) fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other(VfsError::Poisoned(self.path.display().to_string())))?;
        file.seek(SeekFrom::Start(pos))?;
        file.read(buf)
    }
}

/// Where an entry's bytes live inside its archive.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EntryLocator {
    /// Uncompressed bytes at a fixed span of the archive file.
    Span { offset: u64, len: u64 },
    /// Raw deflate stream at a fixed span of the archive file.
    Deflate { offset: u64, compressed_len: u64 },
    /// Zip entry in a method we don't stream directly; decoded by the zip reader.
    ZipIndex(usize),
    /// Span of a compressed tar stream; reached by decoding from the start.
    Decoded { offset: u64, len: u64 },
}

#[derive(Debug)]
pub(crate) struct ArchiveEntry {
    pub(crate) path_in_archive: String,
    pub(crate) locator: EntryLocator,
}

/// Open an owned, readable stream over one entry's data.
pub(crate) fn open_entry(handle: &Arc<ArchiveHandle>, locator: EntryLocator) -> VfsResult<Box<dyn Read + Send>> {
    match locator {
        EntryLocator::Span { offset, len } => Ok(Box::new(SpanReader::new(handle, offset, len))),
        EntryLocator::Deflate { offset, compressed_len } => Ok(Box::new(flate2::read::DeflateDecoder::new(
            SpanReader::new(handle, offset, compressed_len),
        ))),
        EntryLocator::ZipIndex(index) => {
            let mut archive = ZipArchive::new(File::open(handle.path())?)?;
            let mut entry = archive.by_index(index)?;
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            Ok(Box::new(Cursor::new(buf)))
        }
        EntryLocator::Decoded { offset, len } => {
            let ArchiveKind::Tar(compression) = handle.kind() else {
                return Err(VfsError::UnsupportedArchive(handle.path().display().to_string()));
            };
            let mut stream = decoder(compression, File::open(handle.path())?);
            io::copy(&mut stream.by_ref().take(offset), &mut io::sink())?;
            Ok(Box::new(stream.take(len)))
        }
    }
}

/// Bounded reader over `[pos, end)` of the shared archive file.
struct SpanReader {
    handle: Arc<ArchiveHandle>,
    pos: u64,
    end: u64,
}

impl SpanReader {
    fn new(handle: &Arc<ArchiveHandle>, offset: u64, len: u64) -> Self {
        Self { handle: Arc::clone(handle), pos: offset, end: offset + len }
    }
}

impl Read for SpanReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.end || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min((self.end - self.pos) as usize);
        let n = self.handle.read_at(self.pos, &mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive {} is truncated", self.handle.path().display()),
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

fn decoder<'a, R: Read + Send + 'a>(compression: TarCompression, reader: R) -> Box<dyn Read + Send + 'a> {
    match compression {
        TarCompression::None => Box::new(reader),
        TarCompression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        TarCompression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        TarCompression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}

fn list_zip(file: &File) -> VfsResult<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(file)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }
        let locator = match entry.compression() {
            CompressionMethod::Stored => EntryLocator::Span { offset: entry.data_start(), len: entry.compressed_size() },
            CompressionMethod::Deflated => {
                EntryLocator::Deflate { offset: entry.data_start(), compressed_len: entry.compressed_size() }
            }
            _ => EntryLocator::ZipIndex(index),
        };
        entries.push(ArchiveEntry { path_in_archive: entry.name().to_string(), locator });
    }
    Ok(entries)
}

fn list_tar(file: &File, compression: TarCompression) -> VfsResult<Vec<ArchiveEntry>> {
    if compression == TarCompression::None {
        let mut archive = tar::Archive::new(file);
        return collect_tar_entries(archive.entries_with_seek()?, |offset, len| EntryLocator::Span { offset, len });
    }
    let mut archive = tar::Archive::new(decoder(compression, file));
    collect_tar_entries(archive.entries()?, |offset, len| EntryLocator::Decoded { offset, len })
}

fn collect_tar_entries<R: Read>(
    entries: tar::Entries<'_, R>,
    locate: impl Fn(u64, u64) -> EntryLocator,
) -> VfsResult<Vec<ArchiveEntry>> {
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry?;
        // Regular files only; directories, links and devices are skipped.
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path_in_archive = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        out.push(ArchiveEntry { path_in_archive, locator: locate(entry.raw_file_position(), entry.size()) });
    }
    Ok(out)
}
