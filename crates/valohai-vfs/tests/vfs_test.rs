//! Integration tests for reading plain files and archive entries through the VFS.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use valohai_vfs::{Vfs, VirtualFile};
use zip::write::SimpleFileOptions;

fn write_zip(path: &Path, entries: &[(&str, &[u8])], options: SimpleFileOptions) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
    }
    zip.finish().unwrap();
}

fn append_tar_file<W: Write>(builder: &mut tar::Builder<W>, name: &str, content: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, content).unwrap();
}

fn append_tar_dir<W: Write>(builder: &mut tar::Builder<W>, name: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    builder.append_data(&mut header, name, std::io::empty()).unwrap();
}

fn expected_contents() -> BTreeMap<String, Vec<u8>> {
    [
        ("0quux.txt", "Maista uudet maut"),
        ("dir1/1hello.txt", "Hernekeitto"),
        ("dir1/2world.txt", "Viina"),
        ("dir2/3spam.txt", "Teline"),
        ("dir2/4eggs.txt", "Johannes"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
    .collect()
}

fn make_vfs_files(root: &Path) {
    fs::create_dir_all(root.join("dir1")).unwrap();
    fs::create_dir_all(root.join("dir2")).unwrap();

    write_zip(
        &root.join("dir1").join("example.zip"),
        &[("1hello.txt", b"Hernekeitto"), ("2world.txt", b"Viina")],
        SimpleFileOptions::default(),
    );

    let mut tar = tar::Builder::new(File::create(root.join("dir2").join("esimerkki.tar")).unwrap());
    append_tar_file(&mut tar, "3spam.txt", b"Teline");
    append_tar_file(&mut tar, "4eggs.txt", b"Johannes");
    tar.finish().unwrap();

    fs::write(root.join("0quux.txt"), "Maista uudet maut").unwrap();
}

#[test]
fn test_open_read_and_concrete_agree() {
    let temp = TempDir::new().unwrap();
    make_vfs_files(temp.path());

    let mut cleaned = Vec::new();
    {
        let mut vfs = Vfs::new();
        vfs.find_files(temp.path(), true).unwrap();

        let mut direct = BTreeMap::new();
        let mut opened = BTreeMap::new();
        let mut concrete = BTreeMap::new();
        for file in &vfs {
            direct.insert(file.name().to_string(), file.read().unwrap());

            let mut buf = Vec::new();
            file.open().unwrap().read_to_end(&mut buf).unwrap();
            opened.insert(file.name().to_string(), buf);

            match file {
                VirtualFile::Disk(disk) => {
                    concrete.insert(file.name().to_string(), fs::read(disk.path()).unwrap());
                }
                VirtualFile::Entry(entry) => {
                    let handle = entry.open_concrete(true).unwrap();
                    concrete.insert(file.name().to_string(), fs::read(handle.path()).unwrap());
                    cleaned.push(handle.path().to_path_buf());
                }
            }
        }

        assert_eq!(direct, expected_contents());
        assert_eq!(opened, expected_contents());
        assert_eq!(concrete, expected_contents());
    }

    assert!(!cleaned.is_empty());
    assert!(cleaned.iter().all(|p| !p.is_file()));
}

#[test]
fn test_archives_expand_one_level_and_skip_directories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let mut inner = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut inner));
        zip.start_file("deep.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"deep").unwrap();
        zip.finish().unwrap();
    }
    write_zip(
        &root.join("outer.zip"),
        &[("blerp/", b""), ("blerp/3katt.txt", b"Johannes"), ("nested.zip", &inner)],
        SimpleFileOptions::default(),
    );

    let mut tar = tar::Builder::new(File::create(root.join("bundle.tar")).unwrap());
    append_tar_dir(&mut tar, "folder/");
    append_tar_file(&mut tar, "folder/a.txt", b"A");
    tar.finish().unwrap();

    fs::write(root.join("loose.txt"), b"loose").unwrap();

    let mut vfs = Vfs::new();
    vfs.find_files(root, true).unwrap();

    let mut names: Vec<_> = vfs.iter().map(|f| f.name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["blerp/3katt.txt", "folder/a.txt", "loose.txt", "nested.zip"]);

    let nested = vfs.iter().find(|f| f.name() == "nested.zip").unwrap();
    assert!(nested.is_container_entry());
    assert_eq!(nested.read().unwrap(), inner);
}

#[test]
fn test_compressed_tar_entries_stream() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("data.tar.gz");
    {
        let encoder = flate2::write::GzEncoder::new(File::create(&archive).unwrap(), flate2::Compression::default());
        let mut tar = tar::Builder::new(encoder);
        append_tar_file(&mut tar, "one.txt", b"first");
        append_tar_file(&mut tar, "sub/two.txt", &[7u8; 4096]);
        append_tar_file(&mut tar, "three.txt", b"third");
        tar.into_inner().unwrap().finish().unwrap();
    }

    let mut vfs = Vfs::new();
    vfs.add_disk_file("input/data.tar.gz", &archive, true).unwrap();

    let names: Vec<_> = vfs.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["input/one.txt", "input/sub/two.txt", "input/three.txt"]);
    assert_eq!(vfs.files()[2].read().unwrap(), b"third");
    assert_eq!(vfs.files()[1].read().unwrap(), vec![7u8; 4096]);
    assert_eq!(vfs.files()[0].read().unwrap(), b"first");
}

#[test]
fn test_deflated_zip_entries_stream() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("packed.zip");
    let big = "Hernekeitto ".repeat(2000);
    write_zip(
        &archive,
        &[("big.txt", big.as_bytes()), ("small.txt", b"Viina")],
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated),
    );

    let mut vfs = Vfs::new();
    vfs.add_disk_file("packed.zip", &archive, true).unwrap();

    // Interleave two streams over the same archive handle.
    let mut big_stream = vfs.files()[0].open().unwrap();
    let mut small_stream = vfs.files()[1].open().unwrap();
    let mut head = [0u8; 11];
    big_stream.read_exact(&mut head).unwrap();
    let mut small = Vec::new();
    small_stream.read_to_end(&mut small).unwrap();
    let mut rest = Vec::new();
    big_stream.read_to_end(&mut rest).unwrap();

    assert_eq!(&head, b"Hernekeitto");
    assert_eq!(small, b"Viina");
    assert_eq!(head.len() + rest.len(), big.len());
}

#[test]
fn test_glob_filter_matches_nested_directories() {
    let temp = TempDir::new().unwrap();
    for label in ["label1", "label2"] {
        let dir = temp.path().join("hello").join(label).join("hello");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("foo.jpg"), [0u8; 16]).unwrap();
    }
    fs::write(temp.path().join("hello").join("readme.txt"), b"x").unwrap();

    let mut vfs = Vfs::new();
    vfs.find_files(temp.path(), true).unwrap();

    let expected = vec!["hello/label1/hello/foo.jpg", "hello/label2/hello/foo.jpg"];
    for pattern in ["hello/**/hello/*.jpg", "**/*.jpg"] {
        let names: Vec<_> = vfs.filter(pattern).unwrap().iter().map(|f| f.name()).collect();
        assert_eq!(names, expected, "pattern {pattern}");
    }
    // Filtering does not consume or reorder the VFS.
    assert_eq!(vfs.len(), 3);
    assert_eq!(vfs.filter("hello/*.txt").unwrap().len(), 1);
}

#[test]
fn test_non_ascii_names_are_preserved() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("archive.zip");
    write_zip(&archive, &[("blerp/blonk/4blöf.txt", b"Teline")], SimpleFileOptions::default());

    let mut vfs = Vfs::new();
    vfs.add_disk_file("input_with_archive/archive.zip", &archive, true).unwrap();

    assert_eq!(vfs.files()[0].name(), "input_with_archive/blerp/blonk/4blöf.txt");
    assert_eq!(vfs.filter("**/*blöf.txt").unwrap().len(), 1);
}

#[test]
fn test_kept_materialization_outlives_vfs() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("keep.zip");
    write_zip(&archive, &[("a.txt", b"kept"), ("b.txt", b"dropped")], SimpleFileOptions::default());

    let (kept, dropped): (PathBuf, PathBuf);
    {
        let mut vfs = Vfs::new();
        vfs.add_disk_file("keep.zip", &archive, true).unwrap();
        let VirtualFile::Entry(a) = &vfs.files()[0] else { panic!("expected archive entry") };
        let VirtualFile::Entry(b) = &vfs.files()[1] else { panic!("expected archive entry") };

        kept = a.open_concrete(false).unwrap().into_path();
        let again = a.open_concrete(false).unwrap();
        assert_eq!(again.path(), kept);

        // Still open when the VFS closes: cleanup owns its removal.
        let handle = b.open_concrete(true).unwrap();
        dropped = handle.path().to_path_buf();
        std::mem::forget(handle);
        vfs.close().unwrap();
    }

    assert_eq!(fs::read(&kept).unwrap(), b"kept");
    assert!(!dropped.exists());
    fs::remove_dir_all(kept.parent().unwrap()).unwrap();
}

#[test]
fn test_deleting_handle_spares_a_path_kept_meanwhile() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("shared.zip");
    write_zip(&archive, &[("a.txt", b"alpha"), ("b.txt", b"beta")], SimpleFileOptions::default());

    let (via_entry, via_path): (PathBuf, PathBuf);
    {
        let mut vfs = Vfs::new();
        vfs.add_disk_file("shared.zip", &archive, true).unwrap();
        let VirtualFile::Entry(a) = &vfs.files()[0] else { panic!("expected archive entry") };

        let deleting = a.open_concrete(true).unwrap();
        via_entry = a.open_concrete(false).unwrap().into_path();
        assert_eq!(deleting.path(), via_entry);
        drop(deleting);
        assert_eq!(fs::read(&via_entry).unwrap(), b"alpha");

        let deleting = match &vfs.files()[1] {
            VirtualFile::Entry(b) => b.open_concrete(true).unwrap(),
            VirtualFile::Disk(_) => panic!("expected archive entry"),
        };
        via_path = vfs.files()[1].concrete_path().unwrap();
        vfs.close().unwrap();
        drop(deleting);
    }

    assert_eq!(fs::read(&via_entry).unwrap(), b"alpha");
    assert_eq!(fs::read(&via_path).unwrap(), b"beta");
    fs::remove_dir_all(via_entry.parent().unwrap()).unwrap();
}

#[test]
fn test_unkept_deleting_handle_removes_its_file() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("gone.zip");
    write_zip(&archive, &[("a.txt", b"alpha")], SimpleFileOptions::default());

    let mut vfs = Vfs::new();
    vfs.add_disk_file("gone.zip", &archive, true).unwrap();
    let VirtualFile::Entry(a) = &vfs.files()[0] else { panic!("expected archive entry") };
    let handle = a.open_concrete(true).unwrap();
    let path = handle.path().to_path_buf();
    drop(handle);

    assert!(!path.exists());
    assert!(a.materialized_path().is_none());
    vfs.close().unwrap();
}

#[test]
fn test_corrupt_archive_surfaces_at_open() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.tar");
    {
        let mut tar = tar::Builder::new(File::create(&archive).unwrap());
        append_tar_file(&mut tar, "payload.bin", &[1u8; 8192]);
        tar.finish().unwrap();
    }

    let mut vfs = Vfs::new();
    vfs.add_disk_file("broken.tar", &archive, true).unwrap();
    assert_eq!(vfs.len(), 1);

    // Truncate the data area after enumeration.
    File::options().write(true).open(&archive).unwrap().set_len(1024).unwrap();

    let err = vfs.files()[0].read().unwrap_err();
    assert!(matches!(err, valohai_vfs::VfsError::Io(_)));
}
