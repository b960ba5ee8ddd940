//! Archive extraction for source packages.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use pydist_domain::ArchiveKind;

use crate::core::fetch::FetchError;

/// Extract `archive` into `dest` and return the effective source root (the
/// first directory that is more than a single-directory wrapper).
pub fn unpack_archive(
    archive: &Path,
    kind: ArchiveKind,
    dest: &Path,
) -> Result<PathBuf, FetchError> {
    fs::create_dir_all(dest)?;
    let location = archive.display().to_string();
    let file = File::open(archive)?;
    let result = match kind {
        ArchiveKind::Tar => tar::Archive::new(file).unpack(dest),
        ArchiveKind::TarGz => tar::Archive::new(flate2::read::GzDecoder::new(file)).unpack(dest),
        ArchiveKind::TarBz2 => tar::Archive::new(bzip2::read::BzDecoder::new(file)).unpack(dest),
        ArchiveKind::Zip => unpack_zip(file, dest),
    };
    result.map_err(|err| FetchError::unreadable(&location, err))?;
    Ok(first_nontrivial_dir(dest))
}

fn unpack_zip(file: File, dest: &Path) -> io::Result<()> {
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let Some(enclosed) = entry.enclosed_name().map(|path| dest.join(path)) else {
            continue;
        };
        if entry.name().ends_with('/') || entry.is_dir() {
            fs::create_dir_all(&enclosed)?;
            continue;
        }
        if let Some(parent) = enclosed.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&enclosed)?;
        io::copy(&mut entry, &mut outfile)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&enclosed, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}

/// Descend through single-directory wrappers (the usual `pkg-1.0/` top level
/// of a source archive) to the real tree root.
pub fn first_nontrivial_dir(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    loop {
        let Ok(entries) = fs::read_dir(&current) else {
            return current;
        };
        let entries: Vec<_> = entries.flatten().collect();
        if entries.len() == 1 && entries[0].path().is_dir() {
            current = entries[0].path();
        } else {
            return current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
        let file = File::create(path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options)?;
            writer.write_all(contents)?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn unpacks_zip_and_descends_the_wrapper_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("demo-1.0.zip");
        write_zip(
            &archive,
            &[
                ("demo-1.0/setup.py", b"print('hi')".as_slice()),
                ("demo-1.0/demo/__init__.py", b"".as_slice()),
            ],
        )?;

        let root = unpack_archive(&archive, ArchiveKind::Zip, &temp.path().join("out"))?;
        assert!(root.ends_with("demo-1.0"));
        assert!(root.join("setup.py").is_file());
        assert!(root.join("demo/__init__.py").is_file());
        Ok(())
    }

    #[test]
    fn corrupt_archive_is_an_unreadable_link() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("demo-1.0.zip");
        fs::write(&archive, b"this is not a zip")?;

        let err = unpack_archive(&archive, ArchiveKind::Zip, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, FetchError::Unreadable { .. }));
        Ok(())
    }

    #[test]
    fn nontrivial_dir_stops_at_multi_entry_levels() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let nested = temp.path().join("a/b");
        fs::create_dir_all(nested.join("c"))?;
        fs::write(nested.join("file.txt"), b"x")?;

        assert_eq!(first_nontrivial_dir(temp.path()), nested);
        Ok(())
    }
}
