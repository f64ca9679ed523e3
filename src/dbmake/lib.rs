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

//! An incremental build system for server-side database objects.
//!
//! Source files defining stored procedures, functions, views, table types and
//! the like are tracked by content hash. On every run, only the objects whose
//! definition changed (or that vanished from the server, or that depend on
//! something being rebuilt) are dropped and compiled again, in an order that
//! respects their dependencies.
#[macro_use]
extern crate failure_derive;

#[macro_use]
pub mod events;

pub mod cache;
pub mod compile;
pub mod config;
pub mod drops;
pub mod error;
pub mod item;
pub mod make;
pub mod server;
pub mod sources;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use crate::cache::Cache;
pub use crate::config::Config;
pub use crate::error::{Error, ErrorKind, MakeError, ResultExt};
pub use crate::item::{MakeItem, ObjectName, TypeCode};
pub use crate::make::{Make, RunFailure, RunReport, Stage, StageError};
pub use crate::server::{Connection, ServerRow};
pub use crate::sources::{Filemask, Sources};
