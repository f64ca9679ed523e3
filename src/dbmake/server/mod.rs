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

//! The SQL execution collaborator.
//!
//! The make engine never opens or closes connections itself. It is handed an
//! already-open `Connection` and uses it serially for the whole run.

pub mod metadata;
pub mod sqlcmd;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json as json;

use crate::error::{Error, ResultExt};
use crate::item::{MakeItem, TypeCode};

pub use self::sqlcmd::Sqlcmd;

/// What the engine tells the server about one tracked item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemHint {
    pub pathname: PathBuf,

    /// Whether the source file exists as the hint is made. The server echoes
    /// it back.
    pub source_exists: bool,

    pub schema_name: String,
    pub object_name: String,
    pub type_code: TypeCode,
    pub needs_to_be_compiled: bool,
    pub drop_order: i32,
}

impl<'a> From<&'a MakeItem> for ItemHint {
    fn from(item: &'a MakeItem) -> ItemHint {
        let object = item.object();

        ItemHint {
            pathname: item.pathname().to_path_buf(),
            source_exists: item.pathname().is_file(),
            schema_name: object.schema,
            object_name: object.name,
            type_code: item.type_code.clone(),
            needs_to_be_compiled: item.needs_to_be_compiled,
            drop_order: if item.type_code.is_table_type() { 1 } else { 0 },
        }
    }
}

/// The server's view of one tracked item.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServerRow {
    pub pathname: PathBuf,

    /// Echo of whether the row refers to a source file the engine sent.
    pub source_exists: bool,

    pub schema_name: Option<String>,

    pub object_name: Option<String>,

    #[serde(rename = "Type")]
    pub type_code: Option<String>,

    pub needs_to_be_compiled: bool,

    pub is_present_on_server: bool,

    pub drop_order: i32,

    pub needs_to_be_dropped: bool,
}

/// An open connection to a database server.
pub trait Connection {
    /// Returns the name of the currently selected database.
    fn database(&mut self) -> Result<String, Error>;

    /// Executes a single batch that returns no rows.
    fn execute(&mut self, sql: &str) -> Result<(), Error>;

    /// Executes a single batch and returns its rows, one JSON object per row.
    fn query(&mut self, sql: &str) -> Result<Vec<json::Value>, Error>;

    /// Asks the server about every given item in a single round trip.
    fn describe(&mut self, items: &[ItemHint]) -> Result<Vec<ServerRow>, Error> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let sql = metadata::query(items);

        let rows = self
            .query(&sql)
            .context("Failed querying server metadata")?;

        rows.into_iter()
            .map(|row| {
                json::from_value(row)
                    .context("Unexpected server metadata row")
                    .map_err(Error::from)
            })
            .collect()
    }
}

impl<'a, C> Connection for &'a mut C
where
    C: Connection + ?Sized,
{
    fn database(&mut self) -> Result<String, Error> {
        (**self).database()
    }

    fn execute(&mut self, sql: &str) -> Result<(), Error> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<json::Value>, Error> {
        (**self).query(sql)
    }

    fn describe(&mut self, items: &[ItemHint]) -> Result<Vec<ServerRow>, Error> {
        (**self).describe(items)
    }
}
