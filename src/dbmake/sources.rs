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

//! Registration of the source files to make.
//!
//! Paths are checked when they are registered, not when the make runs, so a
//! typo in a project description fails immediately.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;

use crate::error::{Error, ErrorKind, MakeError, ResultExt};
use crate::util::PathExt;

/// A file name pattern supporting `*` (any run of characters) and `?` (any
/// single character). Matching is case-insensitive and covers the whole file
/// name.
#[derive(Clone, Debug)]
pub struct Filemask {
    mask: String,
    regex: Regex,
}

impl Filemask {
    pub fn new(mask: &str) -> Result<Filemask, MakeError> {
        if mask.is_empty() {
            return Err(ErrorKind::InvalidFilemask(mask.to_string()).into());
        }

        let mut pattern = String::with_capacity(mask.len() * 2 + 2);
        pattern.push('^');

        for c in mask.chars() {
            match c {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                c => pattern.push_str(&regex::escape(&c.to_string())),
            }
        }

        pattern.push('$');

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;

        Ok(Filemask {
            mask: mask.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl fmt::Display for Filemask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mask)
    }
}

/// The deduplicated list of absolute source file paths to process on the
/// next run, in registration order.
#[derive(Default, Debug)]
pub struct Sources {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Sources {
    pub fn new() -> Sources {
        Sources::default()
    }

    /// Registers a single file. Returns `true` if it was not already
    /// registered.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<bool, Error> {
        let path = path.as_ref().absolutize()?;

        if !path.is_file() {
            return Err(MakeError::from(ErrorKind::FileNotFound(path)).into());
        }

        Ok(self.insert(path))
    }

    /// Registers every file in `folder` whose name matches `mask`. Returns the
    /// number of newly registered files.
    pub fn add_folder<P: AsRef<Path>>(
        &mut self,
        folder: P,
        mask: &str,
        recursive: bool,
    ) -> Result<usize, Error> {
        let folder = folder.as_ref().absolutize()?;

        if !folder.is_dir() {
            return Err(
                MakeError::from(ErrorKind::FolderNotFound(folder)).into()
            );
        }

        let mask = Filemask::new(mask)?;

        let walker = WalkDir::new(&folder)
            .min_depth(1)
            .max_depth(if recursive { usize::max_value() } else { 1 })
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        let mut added = 0;

        for entry in walker {
            let entry = entry
                .map_err(MakeError::from)
                .with_context(|_| format!("Failed listing {:?}", folder))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let matched = entry
                .file_name()
                .to_str()
                .map_or(false, |name| mask.is_match(name));

            if matched && self.insert(entry.path().normalize()) {
                added += 1;
            }
        }

        Ok(added)
    }

    fn insert(&mut self, path: PathBuf) -> bool {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The distinct folders holding the registered files, sorted.
    pub fn folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<_> = self
            .paths
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        folders.sort();
        folders.dedup();
        folders
    }
}
