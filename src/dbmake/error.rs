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

use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

use failure::{Backtrace, Context, Fail};

pub use failure::{Error, ResultExt};

/// An error that can occur while making database objects.
#[derive(Fail, Debug)]
pub enum ErrorKind {
    /// An io error.
    #[fail(display = "{}", _0)]
    Io(io::Error),

    /// A JSON parsing error.
    #[fail(display = "{}", _0)]
    Json(serde_json::error::Error),

    /// A bincode error.
    #[fail(display = "{}", _0)]
    Bincode(bincode::Error),

    /// A tempfile error.
    #[fail(display = "{}", _0)]
    TempFile(tempfile::PersistError),

    /// A regular expression failed to compile.
    #[fail(display = "{}", _0)]
    Regex(regex::Error),

    /// Walking a source folder failed.
    #[fail(display = "{}", _0)]
    Walk(walkdir::Error),

    /// A registered source file does not exist.
    #[fail(display = "File not found: {:?}", _0)]
    FileNotFound(PathBuf),

    /// A registered source folder does not exist.
    #[fail(display = "Folder not found: {:?}", _0)]
    FolderNotFound(PathBuf),

    /// A filemask could not be turned into a pattern.
    #[fail(display = "Invalid filemask '{}'", _0)]
    InvalidFilemask(String),

    /// A cache file exists but could not be parsed.
    #[fail(display = "Cache file {:?} is corrupt", _0)]
    CorruptCache(PathBuf),

    /// The server returned a row for a pathname that is not being tracked.
    #[fail(display = "Server returned untracked pathname {:?}", _0)]
    UntrackedPathname(PathBuf),

    /// The server reported a tracked source file as missing.
    #[fail(display = "Server reported source file {:?} as missing", _0)]
    MissingSource(PathBuf),

    /// A server object type code with no known DROP statement.
    #[fail(display = "Unknown object type code '{}'", _0)]
    UnknownObjectType(String),

    /// A server object type that is deliberately never dropped.
    #[fail(display = "Dropping objects of type '{}' is not supported", _0)]
    UnsupportedObjectType(String),

    /// A statement or query failed on the server.
    #[fail(display = "{}", _0)]
    Sql(String),

    /// A plain old string. Useful for attaching a context to one of these
    /// errors.
    #[fail(display = "{}", _0)]
    Custom(String),
}

#[derive(Debug)]
pub struct MakeError {
    inner: Context<ErrorKind>,
}

impl Fail for MakeError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for MakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl MakeError {
    pub fn kind(&self) -> &ErrorKind {
        &*self.inner.get_context()
    }
}

/// Finds the first `ErrorKind` in an error's chain of causes.
pub fn find_kind(error: &Error) -> Option<&ErrorKind> {
    error.iter_chain().find_map(|cause| {
        cause
            .downcast_ref::<MakeError>()
            .map(MakeError::kind)
            .or_else(|| cause.downcast_ref::<ErrorKind>())
    })
}

/// An error concerning a single source file.
#[derive(Fail, Debug)]
#[fail(display = "{:?}: {}", pathname, error)]
pub struct ItemError {
    pub pathname: PathBuf,
    pub error: Error,
}

impl ItemError {
    pub fn new<E: Into<Error>>(pathname: PathBuf, error: E) -> ItemError {
        ItemError {
            pathname,
            error: error.into(),
        }
    }
}

impl From<ErrorKind> for MakeError {
    fn from(kind: ErrorKind) -> Self {
        MakeError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for MakeError {
    fn from(inner: Context<ErrorKind>) -> Self {
        MakeError { inner }
    }
}

impl<'a> From<Context<&'a str>> for MakeError {
    fn from(inner: Context<&'a str>) -> Self {
        MakeError {
            inner: inner.map(|x| ErrorKind::Custom(x.to_string())),
        }
    }
}

impl From<Context<String>> for MakeError {
    fn from(inner: Context<String>) -> Self {
        MakeError {
            inner: inner.map(ErrorKind::Custom),
        }
    }
}

impl From<io::Error> for MakeError {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err).into()
    }
}

impl From<serde_json::error::Error> for MakeError {
    fn from(err: serde_json::error::Error) -> Self {
        ErrorKind::Json(err).into()
    }
}

impl From<bincode::Error> for MakeError {
    fn from(err: bincode::Error) -> Self {
        ErrorKind::Bincode(err).into()
    }
}

impl From<tempfile::PersistError> for MakeError {
    fn from(err: tempfile::PersistError) -> Self {
        ErrorKind::TempFile(err).into()
    }
}

impl From<regex::Error> for MakeError {
    fn from(err: regex::Error) -> Self {
        ErrorKind::Regex(err).into()
    }
}

impl From<walkdir::Error> for MakeError {
    fn from(err: walkdir::Error) -> Self {
        ErrorKind::Walk(err).into()
    }
}
