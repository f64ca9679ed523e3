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

//! An in-memory stand-in for a database server, and other test helpers.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use failure::format_err;
use regex::Regex;
use serde_json as json;

use crate::error::{Error, ErrorKind, MakeError};
use crate::events::{Event, EventSink};
use crate::item::{Declaration, TypeCode};
use crate::server::{Connection, ItemHint, ServerRow};

/// Lower-cased `(schema, name)`.
type Key = (String, String);

fn key(schema: &str, name: &str) -> Key {
    (schema.to_lowercase(), name.to_lowercase())
}

#[derive(Clone, Debug)]
pub struct FakeObject {
    pub type_code: TypeCode,
    pub body: String,

    /// Table types this object takes as `READONLY` parameters.
    pub references: BTreeSet<Key>,
}

/// Understands just enough of `CREATE` and `DROP` to track which objects
/// exist and which table types they depend on.
pub struct FakeServer {
    objects: BTreeMap<Key, FakeObject>,
    statements: Vec<String>,
    fail_on: Option<String>,
}

fn sql_error(message: String) -> Error {
    MakeError::from(ErrorKind::Sql(message)).into()
}

impl FakeServer {
    pub fn new() -> FakeServer {
        FakeServer {
            objects: BTreeMap::new(),
            statements: Vec::new(),
            fail_on: None,
        }
    }

    /// Makes every statement containing `needle` fail.
    pub fn fail_on(mut self, needle: &str) -> FakeServer {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn set_fail_on(&mut self, needle: Option<&str>) {
        self.fail_on = needle.map(str::to_string);
    }

    /// Creates an object without recording the statement.
    pub fn create(&mut self, sql: &str) -> Result<(), Error> {
        self.apply(sql)
    }

    /// Removes an object behind the engine's back.
    pub fn forget(&mut self, schema: &str, name: &str) -> bool {
        self.objects.remove(&key(schema, name)).is_some()
    }

    pub fn exists(&self, schema: &str, name: &str) -> bool {
        self.objects.contains_key(&key(schema, name))
    }

    pub fn object(&self, schema: &str, name: &str) -> Option<&FakeObject> {
        self.objects.get(&key(schema, name))
    }

    /// Every statement executed so far.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn clear_statements(&mut self) {
        self.statements.clear();
    }

    /// The `DROP` statements executed so far.
    pub fn drops(&self) -> Vec<&str> {
        self.statements
            .iter()
            .map(|s| s.trim())
            .filter(|s| s.starts_with("DROP "))
            .collect()
    }

    fn apply(&mut self, sql: &str) -> Result<(), Error> {
        let drop = Regex::new(
            r"(?is)^\s*DROP\s+(\w+)\s+\[((?:[^\]]|\]\])+)\]\.\[((?:[^\]]|\]\])+)\]",
        )?;
        let create = Regex::new(r"(?is)^\s*CREATE\s+(OR\s+ALTER\s+)?")?;
        let readonly = Regex::new(r"(?i)\b(\w+)\.(\w+)\s+READONLY\b")?;

        if let Some(caps) = drop.captures(sql) {
            let k = key(
                &caps[2].replace("]]", "]"),
                &caps[3].replace("]]", "]"),
            );

            if !self.objects.contains_key(&k) {
                return Err(sql_error(format!(
                    "Cannot drop the object '{}.{}', because it does not exist",
                    k.0, k.1
                )));
            }

            let referenced_by = self
                .objects
                .iter()
                .find(|(_, obj)| obj.references.contains(&k))
                .map(|(other, _)| other.clone());

            if let Some(other) = referenced_by {
                return Err(sql_error(format!(
                    "Cannot drop type '{}.{}' because it is being referenced by object '{}'",
                    k.0, k.1, other.1
                )));
            }

            self.objects.remove(&k);
            return Ok(());
        }

        if let Some(caps) = create.captures(sql) {
            let or_alter = caps.get(1).is_some();

            let declaration = Declaration::sniff(Path::new("fake.sql"), sql);
            let k = key(&declaration.name.schema, &declaration.name.name);

            if !or_alter && self.objects.contains_key(&k) {
                return Err(sql_error(format!(
                    "There is already an object named '{}' in the database",
                    k.1
                )));
            }

            let mut references = BTreeSet::new();

            for caps in readonly.captures_iter(sql) {
                let r = key(&caps[1], &caps[2]);

                match self.objects.get(&r) {
                    Some(obj) if obj.type_code.is_table_type() => {}
                    _ => {
                        return Err(sql_error(format!(
                            "Cannot find data type {}.{}",
                            r.0, r.1
                        )))
                    }
                }

                references.insert(r);
            }

            self.objects.insert(
                k,
                FakeObject {
                    type_code: declaration.type_code,
                    body: sql.to_string(),
                    references,
                },
            );
        }

        Ok(())
    }
}

impl Connection for FakeServer {
    fn database(&mut self) -> Result<String, Error> {
        Ok("fake".into())
    }

    fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.statements.push(sql.to_string());

        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(sql_error(format!("Injected failure on '{}'", needle)));
            }
        }

        self.apply(sql)
    }

    fn query(&mut self, _sql: &str) -> Result<Vec<json::Value>, Error> {
        Err(format_err!("The fake server does not run queries"))
    }

    /// Answers the way the metadata query would.
    fn describe(&mut self, items: &[ItemHint]) -> Result<Vec<ServerRow>, Error> {
        // Table types being rebuilt. Anything referencing one of these must be
        // dropped too.
        let stale: BTreeSet<Key> = items
            .iter()
            .filter(|hint| hint.needs_to_be_compiled)
            .map(|hint| key(&hint.schema_name, &hint.object_name))
            .filter(|k| {
                self.objects
                    .get(k)
                    .map_or(false, |obj| obj.type_code.is_table_type())
            })
            .collect();

        Ok(items
            .iter()
            .map(|hint| {
                let k = key(&hint.schema_name, &hint.object_name);
                let object = self.objects.get(&k);

                let present = object.is_some();

                let type_code = object
                    .map(|obj| obj.type_code.clone())
                    .unwrap_or_else(|| hint.type_code.clone());

                let references_stale = object.map_or(false, |obj| {
                    obj.references.iter().any(|r| stale.contains(r))
                });

                let dropped =
                    present && (hint.needs_to_be_compiled || references_stale);

                ServerRow {
                    pathname: hint.pathname.clone(),
                    source_exists: hint.source_exists,
                    schema_name: Some(hint.schema_name.clone()),
                    object_name: Some(hint.object_name.clone()),
                    type_code: if type_code.is_empty() {
                        None
                    } else {
                        Some(type_code.as_str().to_string())
                    },
                    needs_to_be_compiled: hint.needs_to_be_compiled
                        || !present
                        || dropped,
                    is_present_on_server: present,
                    drop_order: if type_code.is_table_type() {
                        1
                    } else {
                        hint.drop_order
                    },
                    needs_to_be_dropped: dropped,
                }
            })
            .collect())
    }
}

/// An event sink that keeps every event sent to it.
#[derive(Default)]
pub struct Collect(RefCell<Vec<Event>>);

impl Collect {
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }
}

impl EventSink for Collect {
    fn send_event(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_table_type_cannot_be_dropped() -> Result<(), Error> {
        let mut server = FakeServer::new();
        server.execute("CREATE TYPE dbo.IdList AS TABLE (Id int)")?;
        server.execute("CREATE PROCEDURE dbo.Use @ids dbo.IdList READONLY AS SELECT 1")?;

        assert!(server.execute("DROP TYPE [dbo].[IdList]").is_err());
        server.execute("DROP PROCEDURE [dbo].[Use]")?;
        server.execute("DROP TYPE [dbo].[IdList]")?;

        assert!(!server.exists("dbo", "IdList"));
        assert_eq!(server.drops().len(), 3);
        Ok(())
    }

    #[test]
    fn plain_create_of_existing_object_fails() -> Result<(), Error> {
        let mut server = FakeServer::new();
        server.execute("CREATE VIEW dbo.V AS SELECT 1")?;
        assert!(server.execute("create view dbo.v as select 2").is_err());
        server.execute("CREATE OR ALTER VIEW dbo.V AS SELECT 2")?;
        assert_eq!(
            server.object("dbo", "V").map(|o| o.type_code.as_str()),
            Some("V")
        );
        Ok(())
    }
}
