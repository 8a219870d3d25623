//! Writing output archives.

use crate::error::{ValohaiError, ValohaiResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Suffixes that are already compressed, or compress poorly.
const INCOMPRESSIBLE_SUFFIXES: &[&str] = &[
    "7z", "avi", "bz2", "flac", "gif", "gz", "jpeg", "jpg", "mkv", "mp3", "mp4", "mpg", "npz", "ogg", "png", "rar",
    "tgz", "webp", "xz", "zip", "zst",
];

/// Whether deflating a file with this name is likely to pay off.
pub fn guess_compressible(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_none_or(|ext| !INCOMPRESSIBLE_SUFFIXES.contains(&ext.as_str()))
}

/// An archive being written. Call [`OutputArchive::finish`] to complete it.
pub enum OutputArchive {
    Zip(ZipWriter<File>),
    Tar(tar::Builder<File>),
    TarGz(tar::Builder<GzEncoder<File>>),
}

impl OutputArchive {
    /// Create an archive at `path`; the format follows the file name.
    pub fn create(path: &Path) -> ValohaiResult<Self> {
        let name = path.to_string_lossy().to_ascii_lowercase();
        let format = if name.ends_with(".zip") {
            Format::Zip
        } else if name.ends_with(".tar") {
            Format::Tar
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Format::TarGz
        } else {
            return Err(ValohaiError::Config(format!(
                "Unrecognized compression format for {}; use .zip, .tar, .tar.gz or .tgz",
                path.display()
            )));
        };

        let file = File::create(path)?;
        Ok(match format {
            Format::Zip => Self::Zip(ZipWriter::new(file)),
            Format::Tar => Self::Tar(tar::Builder::new(file)),
            Format::TarGz => Self::TarGz(tar::Builder::new(GzEncoder::new(file, Compression::default()))),
        })
    }

    /// Add the file at `source` as `archive_name`.
    pub fn put(&mut self, archive_name: &str, source: &Path) -> ValohaiResult<()> {
        match self {
            Self::Zip(zip) => {
                let method =
                    if guess_compressible(archive_name) { CompressionMethod::Deflated } else { CompressionMethod::Stored };
                let options = SimpleFileOptions::default()
                    .compression_method(method)
                    .compression_level(Some(1))
                    .unix_permissions(0o600);
                zip.start_file(archive_name, options)?;
                io::copy(&mut File::open(source)?, zip)?;
            }
            Self::Tar(builder) => builder.append_path_with_name(source, archive_name)?,
            Self::TarGz(builder) => builder.append_path_with_name(source, archive_name)?,
        }
        Ok(())
    }

    pub fn finish(self) -> ValohaiResult<()> {
        match self {
            Self::Zip(zip) => {
                zip.finish()?;
            }
            Self::Tar(builder) => {
                builder.into_inner()?;
            }
            Self::TarGz(builder) => {
                builder.into_inner()?.finish()?;
            }
        }
        Ok(())
    }
}

enum Format {
    Zip,
    Tar,
    TarGz,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_guess_compressible() {
        assert!(guess_compressible("model.bin"));
        assert!(guess_compressible("notes.TXT"));
        assert!(guess_compressible("Makefile"));
        assert!(!guess_compressible("photo.JPG"));
        assert!(!guess_compressible("data.tar.gz"));
    }

    #[test]
    fn test_unknown_format_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = OutputArchive::create(&temp.path().join("out.rar")).err().unwrap();
        assert!(matches!(err, ValohaiError::Config(_)));
    }

    #[test]
    fn test_zip_stores_incompressible_names() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("a.txt");
        let image = temp.path().join("b.png");
        std::fs::write(&text, "hello ".repeat(100)).unwrap();
        std::fs::write(&image, [1u8, 2, 3]).unwrap();

        let archive_path = temp.path().join("out.zip");
        let mut archive = OutputArchive::create(&archive_path).unwrap();
        archive.put("a.txt", &text).unwrap();
        archive.put("img/b.png", &image).unwrap();
        archive.finish().unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(zip.by_name("a.txt").unwrap().compression(), CompressionMethod::Deflated);
        let mut png = zip.by_name("img/b.png").unwrap();
        assert_eq!(png.compression(), CompressionMethod::Stored);
        let mut bytes = Vec::new();
        png.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_tar_gz_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("x.txt");
        std::fs::write(&source, "x").unwrap();

        let archive_path = temp.path().join("out.tgz");
        let mut archive = OutputArchive::create(&archive_path).unwrap();
        archive.put("dir/x.txt", &source).unwrap();
        archive.finish().unwrap();

        let decoder = flate2::read::GzDecoder::new(File::open(&archive_path).unwrap());
        let mut tar = tar::Archive::new(decoder);
        let names: Vec<String> =
            tar.entries().unwrap().map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["dir/x.txt"]);
    }
}
