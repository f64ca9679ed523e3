// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Persistent per-folder cache of `MakeItem`s.
//!
//! Each distinct source folder gets its own cache file whose name is derived
//! from a hash of the folder's absolute path. The files hold a map from
//! pathname to item, so they need a format that round-trips maps losslessly.

use std::collections::btree_map::{self, BTreeMap};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, ErrorKind, MakeError, ResultExt};
use crate::item::MakeItem;
use crate::util::Sha256;

/// The items belonging to one source folder.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
pub struct FolderState {
    pub items: BTreeMap<PathBuf, MakeItem>,
}

impl FolderState {
    /// Reads the state from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<FolderState, Error> {
        let path = path.as_ref();
        let f = fs::File::open(path)?;
        Self::from_reader(f).map_err(|err| {
            log::debug!("Failed parsing {:?}: {}", path, err);
            MakeError::from(ErrorKind::CorruptCache(path.to_path_buf())).into()
        })
    }

    /// Reads the state from a stream.
    ///
    /// The whole stream is read first so that length prefixes are checked
    /// against the bytes actually present.
    pub fn from_reader<R: io::Read>(
        mut reader: R,
    ) -> Result<FolderState, bincode::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        bincode::deserialize(&bytes)
    }

    /// Writes the state to a stream, flushing it before returning.
    pub fn write_to<W: io::Write>(
        &self,
        writer: W,
    ) -> Result<(), bincode::Error> {
        let mut writer = io::BufWriter::new(writer);
        bincode::serialize_into(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the state to a file. Note that the file is atomically updated
    /// using a temporary file.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();

        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tempfile = NamedTempFile::new_in(dir)?;

        self.write_to(&mut tempfile)?;

        tempfile.persist(path)?;

        Ok(())
    }
}

/// Returns the name of the cache file for a folder.
pub fn cache_file_name(folder: &Path) -> String {
    let key = Sha256::from_bytes(folder.to_string_lossy().as_bytes());
    format!("{}.bin", key)
}

/// The cache of every folder taking part in a run.
#[derive(Debug)]
pub struct Cache {
    /// Directory holding the cache files.
    dir: PathBuf,

    folders: BTreeMap<PathBuf, FolderState>,
}

impl Cache {
    /// Creates an empty cache backed by the given directory.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Cache {
        Cache {
            dir: dir.into(),
            folders: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the cache file for a folder.
    pub fn path_for(&self, folder: &Path) -> PathBuf {
        self.dir.join(cache_file_name(folder))
    }

    /// Loads the cache file of every given folder. Folders without a cache
    /// file start out empty. A cache file that exists but cannot be parsed is
    /// an error.
    pub fn load<P, I>(dir: P, folders: I) -> Result<Cache, Error>
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = PathBuf>,
    {
        let mut cache = Cache::new(dir);

        for folder in folders {
            let path = cache.path_for(&folder);

            let state = if path.is_file() {
                log::debug!("Loading cache {:?} for {:?}", path, folder);
                FolderState::from_path(&path).with_context(|_| {
                    format!("Failed loading the cache for {:?}", folder)
                })?
            } else {
                FolderState::default()
            };

            cache.folders.insert(folder, state);
        }

        Ok(cache)
    }

    /// Writes the cache file of every loaded folder.
    pub fn save(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).with_context(|_| {
            format!("Failed creating cache directory {:?}", self.dir)
        })?;

        for (folder, state) in &self.folders {
            let path = self.path_for(folder);
            log::debug!("Saving cache {:?} for {:?}", path, folder);
            state.write_to_path(&path).with_context(|_| {
                format!("Failed saving the cache for {:?}", folder)
            })?;
        }

        Ok(())
    }

    /// Deletes the cache file of a folder, if any. Returns `true` if a file
    /// was deleted.
    pub fn remove_file(&self, folder: &Path) -> Result<bool, Error> {
        let path = self.path_for(folder);

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn folders(&self) -> btree_map::Iter<'_, PathBuf, FolderState> {
        self.folders.iter()
    }

    pub fn get(&self, pathname: &Path) -> Option<&MakeItem> {
        let folder = pathname.parent()?;
        self.folders.get(folder)?.items.get(pathname)
    }

    pub fn get_mut(&mut self, pathname: &Path) -> Option<&mut MakeItem> {
        let folder = pathname.parent()?;
        self.folders.get_mut(folder)?.items.get_mut(pathname)
    }

    /// Adds an item, creating its folder's state if needed.
    pub fn insert(&mut self, item: MakeItem) {
        let folder = item
            .pathname()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.folders
            .entry(folder)
            .or_insert_with(FolderState::default)
            .items
            .insert(item.pathname().to_path_buf(), item);
    }

    /// Keeps only the items for which the predicate returns `true`. Returns
    /// the removed items.
    pub fn retain<F>(&mut self, mut f: F) -> Vec<MakeItem>
    where
        F: FnMut(&MakeItem) -> bool,
    {
        let mut removed = Vec::new();

        for state in self.folders.values_mut() {
            let gone: Vec<_> = state
                .items
                .values()
                .filter(|item| !f(item))
                .map(|item| item.pathname().to_path_buf())
                .collect();

            for path in gone {
                if let Some(item) = state.items.remove(&path) {
                    removed.push(item);
                }
            }
        }

        removed
    }

    /// Iterates over every item of every folder.
    pub fn items(&self) -> impl Iterator<Item = &MakeItem> {
        self.folders.values().flat_map(|state| state.items.values())
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut MakeItem> {
        self.folders
            .values_mut()
            .flat_map(|state| state.items.values_mut())
    }

    pub fn len(&self) -> usize {
        self.folders.values().map(|state| state.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_kind;
    use tempfile::TempDir;

    fn item(path: &str, body: &str) -> MakeItem {
        MakeItem::from_contents(PathBuf::from(path), body.as_bytes())
    }

    #[test]
    fn round_trip() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let folders = vec![PathBuf::from("/sql/a"), PathBuf::from("/sql/b")];

        let mut cache = Cache::load(dir.path(), folders.clone())?;
        assert!(cache.is_empty());

        cache.insert(item("/sql/a/One.sql", "CREATE VIEW One AS SELECT 1"));
        cache.insert(item("/sql/b/Two.sql", "CREATE VIEW Two AS SELECT 2"));
        cache.save()?;

        assert!(cache.path_for(Path::new("/sql/a")).is_file());
        assert_ne!(
            cache_file_name(Path::new("/sql/a")),
            cache_file_name(Path::new("/sql/b"))
        );

        let loaded = Cache::load(dir.path(), folders)?;
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get(Path::new("/sql/b/Two.sql")),
            cache.get(Path::new("/sql/b/Two.sql"))
        );

        Ok(())
    }

    #[test]
    fn corrupt_cache_is_fatal() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let folder = PathBuf::from("/sql/a");

        let cache = Cache::new(dir.path());
        fs::write(cache.path_for(&folder), b"\xff\xff\xff\xff\xff\xff\xff")?;

        let err = Cache::load(dir.path(), vec![folder.clone()]).unwrap_err();
        assert!(match find_kind(&err) {
            Some(ErrorKind::CorruptCache(_)) => true,
            _ => false,
        });

        // A length prefix far larger than the file.
        fs::write(cache.path_for(&folder), b"\xff\xff\xff\xff not a cache")?;

        let err = Cache::load(dir.path(), vec![folder]).unwrap_err();
        assert!(match find_kind(&err) {
            Some(ErrorKind::CorruptCache(_)) => true,
            _ => false,
        });

        Ok(())
    }

    #[test]
    fn short_write_is_an_error() {
        let mut state = FolderState::default();
        let one = item("/sql/a/One.sql", "CREATE VIEW One AS SELECT 1");
        state.items.insert(one.pathname().to_path_buf(), one);

        let mut buf = [0u8; 16];
        assert!(state.write_to(&mut buf[..]).is_err());

        let mut buf = Vec::new();
        state.write_to(&mut buf).unwrap();
        assert_eq!(FolderState::from_reader(&buf[..]).unwrap(), state);
    }

    #[test]
    fn retain_and_remove() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let mut cache = Cache::new(dir.path());
        cache.insert(item("/sql/a/One.sql", "x"));
        cache.insert(item("/sql/a/Two.sql", "y"));

        let removed = cache.retain(|i| i.filename() != "One.sql");
        assert_eq!(removed.len(), 1);
        assert_eq!(cache.len(), 1);

        cache.save()?;
        assert!(cache.remove_file(Path::new("/sql/a"))?);
        assert!(!cache.remove_file(Path::new("/sql/a"))?);

        Ok(())
    }
}
