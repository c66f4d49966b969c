//! Key-value and blob persistence used for progress, preferences and recent files.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use tracing::warn;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

pub trait BlobStore: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn list_keys(&self) -> Result<Vec<String>>;
    /// Removes every blob whose name is not in `keep`.
    fn delete_except(&self, keep: &[String]) -> Result<()>;
}

/// Bytes kept verbatim in file stems. A leading `.` is escaped separately.
const STEM_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Maps an arbitrary key onto a portable file stem; reversible via [`decode_name`].
fn encode_name(name: &str) -> String {
    match name.strip_prefix('.') {
        Some(rest) => format!("%2E{}", utf8_percent_encode(rest, STEM_SAFE)),
        None => utf8_percent_encode(name, STEM_SAFE).to_string(),
    }
}

fn decode_name(stem: &str) -> Option<String> {
    percent_decode_str(stem)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut file =
        File::create(&tmp).with_context(|| format!("failed to open temp file {:?}", tmp))?;
    file.write_all(bytes)?;
    file.flush()?;
    fs::rename(&tmp, path).with_context(|| format!("failed to move {:?} into place", tmp))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {:?}", path)),
    }
}

/// One pretty-printed JSON file per key.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_name(key)))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to decode state file {:?}", path))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let payload = serde_json::to_vec_pretty(&value)?;
        write_atomically(&self.key_path(key), &payload)
    }
}

pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    const EXTENSION: &'static str = "blob";

    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create blob directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_name(name), Self::EXTENSION))
    }
}

impl BlobStore for FileBlobStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomically(&self.blob_path(name), bytes)
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.blob_path(name))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list blob directory {:?}", self.root))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match decode_name(stem) {
                Some(name) => keys.push(name),
                None => warn!(?path, "skipping blob with undecodable name"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete_except(&self, keep: &[String]) -> Result<()> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        for name in self.list_keys()? {
            if keep.contains(name.as_str()) {
                continue;
            }
            let path = self.blob_path(&name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to delete blob {:?}", path))
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    inner: Mutex<BTreeMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.inner.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().get(name).cloned())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().keys().cloned().collect())
    }

    fn delete_except(&self, keep: &[String]) -> Result<()> {
        self.inner.lock().retain(|name, _| keep.contains(name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn names_survive_encoding() {
        let names = [
            "plain.pdf",
            "with space.pdf",
            "../escape",
            ".hidden.pdf",
            "progress:1234",
            "日本語.pdf",
        ];
        for name in names {
            let encoded = encode_name(name);
            assert!(!encoded.contains('/'));
            assert!(!encoded.starts_with('.'));
            assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        }
        assert_eq!(decode_name("bad%FF"), None);
    }

    #[test]
    fn file_key_value_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("state")).unwrap();
        assert!(store.get("theme").unwrap().is_none());

        store.set("theme", json!("light")).unwrap();
        store.set("progress:abc", json!({"page": 4})).unwrap();
        assert_eq!(store.get("theme").unwrap(), Some(json!("light")));
        assert_eq!(store.get("progress:abc").unwrap(), Some(json!({"page": 4})));

        let reopened = FileKeyValueStore::new(dir.path().join("state")).unwrap();
        assert_eq!(reopened.get("theme").unwrap(), Some(json!("light")));
    }

    #[test]
    fn corrupt_value_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("theme.json"), b"{nope").unwrap();
        assert!(store.get("theme").is_err());
    }

    #[test]
    fn file_blob_store_keeps_only_named_blobs() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("blobs")).unwrap();
        store.save("a.pdf", b"aaa").unwrap();
        store.save("b c.pdf", b"bbb").unwrap();
        store.save("d.pdf", b"ddd").unwrap();
        assert_eq!(
            store.list_keys().unwrap(),
            vec!["a.pdf".to_string(), "b c.pdf".to_string(), "d.pdf".to_string()]
        );

        store
            .delete_except(&["b c.pdf".to_string(), "missing.pdf".to_string()])
            .unwrap();
        assert_eq!(store.list_keys().unwrap(), vec!["b c.pdf".to_string()]);
        assert_eq!(store.load("b c.pdf").unwrap().as_deref(), Some(&b"bbb"[..]));
        assert!(store.load("a.pdf").unwrap().is_none());
    }

    #[test]
    fn memory_blob_store_delete_except() {
        let store = MemoryBlobStore::new();
        store.save("x", b"1").unwrap();
        store.save("y", b"2").unwrap();
        store.delete_except(&["y".to_string()]).unwrap();
        assert_eq!(store.list_keys().unwrap(), vec!["y".to_string()]);
    }
}
