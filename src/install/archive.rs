//! tar.gz and zip extraction

use std::fs;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use crate::install::error::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Zip => "zip",
        }
    }
}

/// Unpack `archive` into `target_dir`. With `strip_top_dir` the leading path
/// component of every entry is dropped, like `tar --strip-components=1`.
pub fn extract(
    archive: &Path,
    kind: ArchiveKind,
    target_dir: &Path,
    strip_top_dir: bool,
) -> Result<(), InstallError> {
    fs::create_dir_all(target_dir)?;
    let result = match kind {
        ArchiveKind::TarGz => extract_tar_gz(archive, target_dir, strip_top_dir),
        ArchiveKind::Zip => extract_zip(archive, target_dir, strip_top_dir),
    };
    result.map_err(|details| InstallError::Extract {
        archive: archive.to_path_buf(),
        details,
    })
}

fn extract_tar_gz(archive: &Path, target_dir: &Path, strip_top_dir: bool) -> Result<(), String> {
    let file = fs::File::open(archive).map_err(|err| err.to_string())?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);

    for entry in archive.entries().map_err(|err| err.to_string())? {
        let mut entry = entry.map_err(|err| err.to_string())?;
        let entry_path = entry.path().map_err(|err| err.to_string())?.to_path_buf();
        let Some(relative) = output_path(&entry_path, strip_top_dir) else {
            continue;
        };
        let out_path = target_dir.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        entry.unpack(&out_path).map_err(|err| err.to_string())?;
    }

    Ok(())
}

fn extract_zip(archive: &Path, target_dir: &Path, strip_top_dir: bool) -> Result<(), String> {
    let file = fs::File::open(archive).map_err(|err| err.to_string())?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|err| err.to_string())?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|err| err.to_string())?;
        let Some(enclosed) = file.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        let Some(relative) = output_path(&enclosed, strip_top_dir) else {
            continue;
        };
        let out_path = target_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&out_path).map_err(|err| err.to_string())?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        let mut outfile = fs::File::create(&out_path).map_err(|err| err.to_string())?;
        std::io::copy(&mut file, &mut outfile).map_err(|err| err.to_string())?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                .map_err(|err| err.to_string())?;
        }
    }

    Ok(())
}

/// Entry path relative to the target, or `None` for entries to skip
/// (the stripped top directory itself, or anything escaping the target)
fn output_path(entry: &Path, strip_top_dir: bool) -> Option<PathBuf> {
    let mut components = entry.components().filter(|c| *c != Component::CurDir);
    if strip_top_dir {
        components.next()?;
    }

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            _ => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Build a tar.gz in memory from `(path, contents, mode)` entries
    pub fn tar_gz(entries: &[(&str, &str, u32)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Build a zip in memory from `(path, contents, mode)` entries
    pub fn zip(entries: &[(&str, &str, u32)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (path, contents, mode) in entries {
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(*mode);
            writer.start_file(*path, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub fn write(path: &Path, bytes: &[u8]) {
        std::fs::write(path, bytes).unwrap();
    }
}
