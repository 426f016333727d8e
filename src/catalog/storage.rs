//! Byte access to a pack, independent of whether it is a directory or a zip archive.
//!
//! All paths are pack-relative and `/`-separated (`assets/alpha/music/calm.ogg`).

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use walkdir::WalkDir;

/// Readable stream over one pack entry.
pub type EntryReader = Box<dyn Read + Send>;

pub trait PackStorage: Send + Sync + fmt::Debug {
    /// Human-readable location (directory or archive path) for logs.
    fn label(&self) -> &str;

    /// Whether a regular file exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Every file under `prefix` (recursively), sorted.
    fn list_entries(&self, prefix: &str) -> io::Result<Vec<String>>;

    /// Names of the immediate subdirectories of `prefix`, sorted.
    fn child_directories(&self, prefix: &str) -> io::Result<Vec<String>>;

    fn open_entry(&self, path: &str) -> io::Result<EntryReader>;

    fn read_entry(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut reader = self.open_entry(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

fn with_trailing_slash(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// A pack unpacked into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: Utf8PathBuf,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Utf8Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> io::Result<Utf8PathBuf> {
        if !is_safe_relative(path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing pack path '{}'", path),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl PackStorage for DirectoryStorage {
    fn label(&self) -> &str {
        self.root.as_str()
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn list_entries(&self, prefix: &str) -> io::Result<Vec<String>> {
        let prefix = with_trailing_slash(prefix);
        let start = self.root.join(&prefix);
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&start)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Broken links and loops only lose the affected entry
                    tracing::warn!("Skipping unreadable entry in {}: {}", self.root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(self.root.as_std_path()) else {
                continue;
            };
            match Utf8Path::from_path(relative) {
                Some(relative) => {
                    let joined = relative
                        .components()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join("/");
                    entries.push(joined);
                }
                None => {
                    tracing::warn!(
                        "Skipping non UTF-8 file name in {}: {}",
                        self.root,
                        relative.display()
                    );
                }
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn child_directories(&self, prefix: &str) -> io::Result<Vec<String>> {
        let dir = self.root.join(with_trailing_slash(prefix));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in dir.read_dir_utf8()? {
            let Ok(entry) = entry else {
                continue;
            };
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn open_entry(&self, path: &str) -> io::Result<EntryReader> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full)?;
        Ok(Box::new(io::BufReader::new(file)))
    }
}

/// A zip archive pack. The archive bytes stay in memory for the lifetime of
/// the catalog generation that references it.
pub struct ArchiveStorage {
    label: String,
    archive: rawzip::ZipSliceArchive<Arc<[u8]>>,
    /// Normalized file path → location of its data in `archive`.
    files: BTreeMap<String, ArchiveEntry>,
    directories: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
struct ArchiveEntry {
    wayfinder: rawzip::ZipArchiveEntryWayfinder,
    method: rawzip::CompressionMethod,
}

impl fmt::Debug for ArchiveStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveStorage")
            .field("label", &self.label)
            .field("bytes", &self.archive.as_bytes().len())
            .field("files", &self.files.len())
            .finish()
    }
}

fn zip_error(context: &str, e: rawzip::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{}: {:?}", context, e))
}

impl ArchiveStorage {
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::from_bytes(path.as_str(), bytes)
    }

    /// Parse the central directory once and remember where each file lives.
    pub fn from_bytes(label: &str, bytes: Vec<u8>) -> io::Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let archive = rawzip::ZipArchive::from_slice(bytes)
            .map_err(|e| zip_error("invalid zip archive", e))?;

        let mut files = BTreeMap::new();
        let mut directories = BTreeSet::new();
        for entry in archive.entries() {
            let entry = entry.map_err(|e| zip_error("zip entry error", e))?;
            let name = match entry.file_path().try_normalize() {
                Ok(name) => name.as_ref().trim_end_matches('/').to_string(),
                Err(e) => {
                    tracing::warn!("Skipping malformed zip path in {}: {:?}", label, e);
                    continue;
                }
            };
            if !is_safe_relative(&name) {
                tracing::warn!("Skipping unsafe zip path in {}: {}", label, name);
                continue;
            }

            // Parent directories are implied even without explicit entries.
            let mut parent = name.as_str();
            while let Some((dir, _)) = parent.rsplit_once('/') {
                directories.insert(dir.to_string());
                parent = dir;
            }
            if entry.is_dir() {
                directories.insert(name);
            } else {
                files.insert(
                    name,
                    ArchiveEntry {
                        wayfinder: entry.wayfinder(),
                        method: entry.compression_method(),
                    },
                );
            }
        }

        Ok(Self {
            label: label.to_string(),
            archive,
            files,
            directories,
        })
    }

    fn decode(&self, path: &str, entry: ArchiveEntry) -> io::Result<Vec<u8>> {
        let slice_entry = self
            .archive
            .get_entry(entry.wayfinder)
            .map_err(|e| zip_error(&format!("failed to read {}", path), e))?;
        let data = slice_entry.data();

        let mut out = Vec::new();
        match entry.method {
            rawzip::CompressionMethod::Store => out.extend_from_slice(data),
            rawzip::CompressionMethod::Deflate => {
                let mut decoder = flate2::read::DeflateDecoder::new(data);
                decoder.read_to_end(&mut out)?;
            }
            method => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported compression method: {:?}", method),
                ));
            }
        }
        Ok(out)
    }
}

impl PackStorage for ArchiveStorage {
    fn label(&self) -> &str {
        &self.label
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn list_entries(&self, prefix: &str) -> io::Result<Vec<String>> {
        let prefix = with_trailing_slash(prefix);
        Ok(self
            .files
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn child_directories(&self, prefix: &str) -> io::Result<Vec<String>> {
        let prefix = with_trailing_slash(prefix);
        Ok(self
            .directories
            .iter()
            .filter_map(|dir| dir.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect())
    }

    fn open_entry(&self, path: &str) -> io::Result<EntryReader> {
        let Some(entry) = self.files.get(path).copied() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found in {}", path, self.label),
            ));
        };
        Ok(Box::new(Cursor::new(self.decode(path, entry)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_directory_listing_is_sorted_and_relative() {
        let temp = TempDir::new().unwrap();
        let root = utf8(&temp);
        fs::create_dir_all(root.join("assets/alpha/conditions/sub")).unwrap();
        fs::write(root.join("assets/alpha/conditions/b.json"), "{}").unwrap();
        fs::write(root.join("assets/alpha/conditions/a.json"), "{}").unwrap();
        fs::write(root.join("assets/alpha/conditions/sub/c.json"), "{}").unwrap();

        let storage = DirectoryStorage::new(&root);
        let entries = storage.list_entries("assets/alpha/conditions").unwrap();
        assert_eq!(
            entries,
            vec![
                "assets/alpha/conditions/a.json",
                "assets/alpha/conditions/b.json",
                "assets/alpha/conditions/sub/c.json",
            ]
        );
        assert_eq!(storage.child_directories("assets").unwrap(), vec!["alpha"]);
    }

    #[test]
    fn test_directory_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let storage = DirectoryStorage::new(utf8(&temp));
        assert!(!storage.exists("../secret"));
        assert!(storage.open_entry("a/../../secret").is_err());
    }

    #[test]
    fn test_missing_prefix_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let storage = DirectoryStorage::new(utf8(&temp));
        assert!(storage.list_entries("assets/none").unwrap().is_empty());
        assert!(storage.child_directories("assets").unwrap().is_empty());
    }

    fn zip_with(files: &[(&str, &[u8], rawzip::CompressionMethod)]) -> Vec<u8> {
        use std::io::Write;

        let mut output = Cursor::new(Vec::new());
        let mut archive = rawzip::ZipArchiveWriter::new(&mut output);
        for (name, data, method) in files {
            let mut file = archive
                .new_file(name)
                .compression_method(*method)
                .create()
                .unwrap();
            if *method == rawzip::CompressionMethod::Deflate {
                let encoder =
                    flate2::write::DeflateEncoder::new(&mut file, flate2::Compression::default());
                let mut writer = rawzip::ZipDataWriter::new(encoder);
                writer.write_all(data).unwrap();
                let (encoder, descriptor) = writer.finish().unwrap();
                encoder.finish().unwrap();
                file.finish(descriptor).unwrap();
            } else {
                let mut writer = rawzip::ZipDataWriter::new(&mut file);
                writer.write_all(data).unwrap();
                let (_, descriptor) = writer.finish().unwrap();
                file.finish(descriptor).unwrap();
            }
        }
        archive.finish().unwrap();
        output.into_inner()
    }

    #[test]
    fn test_archive_reads_stored_and_deflated_entries() {
        let deflated = b"la la la la la la la la la la la la".repeat(8);
        let bytes = zip_with(&[
            ("assets/alpha/a.ogg", &b"stored bytes"[..], rawzip::CompressionMethod::Store),
            ("assets/alpha/b.ogg", &deflated[..], rawzip::CompressionMethod::Deflate),
        ]);
        let storage = ArchiveStorage::from_bytes("pack.zip", bytes).unwrap();

        // Repeated reads go through the remembered entry locations
        for _ in 0..2 {
            assert_eq!(storage.read_entry("assets/alpha/a.ogg").unwrap(), b"stored bytes");
            assert_eq!(storage.read_entry("assets/alpha/b.ogg").unwrap(), deflated);
        }
        assert_eq!(
            storage.list_entries("assets").unwrap(),
            vec!["assets/alpha/a.ogg", "assets/alpha/b.ogg"]
        );
        assert_eq!(storage.child_directories("assets").unwrap(), vec!["alpha"]);

        let missing = storage.open_entry("assets/alpha/c.ogg").err().unwrap();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_listing_skips_broken_links() {
        let temp = TempDir::new().unwrap();
        let root = utf8(&temp);
        let conditions = root.join("assets/alpha/conditions");
        fs::create_dir_all(&conditions).unwrap();
        fs::write(conditions.join("a.json"), "{}").unwrap();
        std::os::unix::fs::symlink(root.join("missing.json"), conditions.join("dangling.json"))
            .unwrap();
        std::os::unix::fs::symlink(&conditions, conditions.join("loop")).unwrap();

        let storage = DirectoryStorage::new(&root);

        assert_eq!(
            storage.list_entries("assets/alpha/conditions").unwrap(),
            vec!["assets/alpha/conditions/a.json"]
        );
    }

    #[test]
    fn test_invalid_archive_rejected() {
        let result = ArchiveStorage::from_bytes("broken.zip", b"not a zip".to_vec());
        assert!(result.is_err());
    }
}
