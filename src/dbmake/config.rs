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

//! The project description, `dbmake.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json as json;

use crate::error::{Error, MakeError, ResultExt};
use crate::server::sqlcmd::SqlcmdSettings;
use crate::sources::Sources;

/// Where the cache lives when the project does not say.
pub const DEFAULT_CACHE_DIR: &str = ".dbmake/cache";

fn default_mask() -> String {
    "*.sql".into()
}

/// One entry of the `sources` list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceSpec {
    /// Every file in a folder matching a filemask.
    Folder {
        folder: PathBuf,

        #[serde(default = "default_mask")]
        mask: String,

        #[serde(default)]
        recursive: bool,
    },

    /// A single file.
    File { file: PathBuf },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub connection: SqlcmdSettings,

    #[serde(default)]
    pub sources: Vec<SourceSpec>,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();

        let f = fs::File::open(path)
            .with_context(|_| format!("Failed opening {:?}", path))?;

        Ok(Self::from_reader(io::BufReader::new(f))
            .with_context(|_| format!("Failed parsing {:?}", path))?)
    }

    pub fn from_reader<R>(reader: R) -> Result<Config, MakeError>
    where
        R: io::Read,
    {
        Ok(json::from_reader(reader)?)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Config, MakeError> {
        Ok(json::from_str(s)?)
    }

    /// The cache directory, resolved against the project root.
    pub fn cache_dir(&self, root: &Path) -> PathBuf {
        root.join(
            self.cache_dir
                .as_ref()
                .map_or_else(|| Path::new(DEFAULT_CACHE_DIR), PathBuf::as_path),
        )
    }

    /// Registers every configured source, resolving relative paths against
    /// the project root. Returns the number of files registered.
    pub fn register(
        &self,
        root: &Path,
        sources: &mut Sources,
    ) -> Result<usize, Error> {
        let mut count = 0;

        for spec in &self.sources {
            match spec {
                SourceSpec::Folder {
                    folder,
                    mask,
                    recursive,
                } => {
                    count += sources.add_folder(
                        root.join(folder),
                        mask,
                        *recursive,
                    )?;
                }
                SourceSpec::File { file } => {
                    if sources.add_file(root.join(file))? {
                        count += 1;
                    }
                }
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse() -> Result<(), Error> {
        let config = Config::from_str(
            r#"{
                "connection": {
                    "server": "localhost",
                    "database": "App",
                    "user": "sa"
                },
                "sources": [
                    { "folder": "sql", "recursive": true },
                    { "folder": "types", "mask": "*.type.sql" },
                    { "file": "extra/Special.sql" }
                ]
            }"#,
        )?;

        assert_eq!(config.connection.user.as_ref().map(String::as_str), Some("sa"));
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::Folder {
                    folder: "sql".into(),
                    mask: "*.sql".into(),
                    recursive: true,
                },
                SourceSpec::Folder {
                    folder: "types".into(),
                    mask: "*.type.sql".into(),
                    recursive: false,
                },
                SourceSpec::File {
                    file: "extra/Special.sql".into(),
                },
            ]
        );
        assert_eq!(
            config.cache_dir(Path::new("/project")),
            PathBuf::from("/project/.dbmake/cache")
        );

        Ok(())
    }

    #[test]
    fn missing_connection_is_an_error() {
        assert!(Config::from_str(r#"{"sources": []}"#).is_err());
    }

    #[test]
    fn register_relative_to_root() -> Result<(), Error> {
        let root = TempDir::new()?;
        fs::create_dir_all(root.path().join("sql/nested"))?;
        fs::write(root.path().join("sql/A.sql"), "SELECT 1")?;
        fs::write(root.path().join("sql/B.txt"), "SELECT 1")?;
        fs::write(root.path().join("sql/nested/C.sql"), "SELECT 1")?;

        let config = Config::from_str(
            r#"{
                "connection": { "server": ".", "database": "App" },
                "sources": [
                    { "folder": "sql" },
                    { "file": "sql/nested/C.sql" },
                    { "file": "sql/A.sql" }
                ],
                "cache_dir": "state"
            }"#,
        )?;

        let mut sources = Sources::new();
        assert_eq!(config.register(root.path(), &mut sources)?, 2);
        assert!(sources.contains(&root.path().join("sql/A.sql")));
        assert!(sources.contains(&root.path().join("sql/nested/C.sql")));
        assert_eq!(config.cache_dir(root.path()), root.path().join("state"));

        let missing = Config::from_str(
            r#"{
                "connection": { "server": ".", "database": "App" },
                "sources": [{ "folder": "nowhere" }]
            }"#,
        )?;
        assert!(missing.register(root.path(), &mut sources).is_err());

        Ok(())
    }
}
