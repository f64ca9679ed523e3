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

//! Sends source files to the server, batch by batch.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::error::{Error, ItemError, ResultExt};
use crate::events::EventSink;
use crate::item::{MakeItem, ObjectName};
use crate::server::Connection;

/// Whether a line is a batch separator: a line starting with `GO`, in any
/// case, possibly indented. Anything after the `GO` is ignored, as long as
/// the keyword is not the start of a longer identifier such as `GOTO`.
fn is_separator(line: &str) -> bool {
    let line = line.trim_start();

    match line.get(..2) {
        Some(go) if go.eq_ignore_ascii_case("go") => {}
        _ => return false,
    }

    match line[2..].chars().next() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_'),
    }
}

/// Splits a script into the batches between its `GO` lines. Batches with
/// nothing but whitespace in them are left out.
pub fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        if is_separator(line) {
            if !current.trim().is_empty() {
                batches.push(current.clone());
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }

    if !current.trim().is_empty() {
        batches.push(current);
    }

    batches
}

/// Works out which items must be compiled and in which order: descending
/// `drop_order`, ties broken by pathname.
pub fn plan(cache: &Cache) -> Vec<PathBuf> {
    let mut pending: Vec<_> = cache
        .items()
        .filter(|item| item.needs_to_be_compiled)
        .map(|item| (item.drop_order, item.pathname().to_path_buf()))
        .collect();

    pending.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    pending.into_iter().map(|(_, path)| path).collect()
}

/// The name to report for a compiled item.
fn reported_name(item: &MakeItem) -> ObjectName {
    let object = item.object();

    if object.is_empty() {
        ObjectName::new("", item.filename())
    } else {
        object
    }
}

/// What compiling did.
#[derive(Debug, Default)]
pub struct CompileOutcome {
    /// Objects compiled, in the order they were compiled.
    pub compiled: Vec<ObjectName>,

    /// The failure that stopped compilation, if any.
    pub error: Option<ItemError>,
}

/// Runs every batch of a file. Returns the number of batches.
fn compile_file<C>(conn: &mut C, pathname: &Path) -> Result<usize, Error>
where
    C: Connection + ?Sized,
{
    let contents = fs::read(pathname)
        .with_context(|_| format!("Failed reading source file {:?}", pathname))?;

    let batches = split_batches(&String::from_utf8_lossy(&contents));

    for (i, batch) in batches.iter().enumerate() {
        conn.execute(batch).with_context(|_| {
            format!("Batch {} of {} failed", i + 1, batches.len())
        })?;
    }

    Ok(batches.len())
}

/// Compiles every item that needs it. The first failure stops compilation
/// altogether; items compiled before it stay compiled.
pub fn compile_items<C, S>(
    conn: &mut C,
    cache: &mut Cache,
    events: &S,
) -> CompileOutcome
where
    C: Connection + ?Sized,
    S: EventSink + ?Sized,
{
    let pending = plan(cache);

    let mut outcome = CompileOutcome::default();

    if !pending.is_empty() {
        log_event!(events, "Compiling {} file(s)", pending.len());
    }

    for pathname in pending {
        let item = match cache.get_mut(&pathname) {
            Some(item) => item,
            None => continue,
        };

        let object = reported_name(item);

        let result = compile_file(conn, &pathname);

        let batches = *result.as_ref().unwrap_or(&0);
        let summary = result.as_ref().map(|_| ()).map_err(|err| {
            err.iter_chain()
                .map(|cause| cause.to_string())
                .collect::<Vec<_>>()
                .join(": ")
        });

        events.compiled(pathname.clone(), object.clone(), batches, &summary);

        match result {
            Ok(_) => {
                item.needs_to_be_compiled = false;
                item.is_present_on_server = true;
                outcome.compiled.push(object);
            }
            Err(err) => {
                let err = err.context(format!("Failed compiling {}", object));
                outcome.error = Some(ItemError::new(pathname, err));
                break;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::TypeCode;
    use crate::testing::{Collect, FakeServer};
    use tempfile::TempDir;

    #[test]
    fn splits_on_go_lines() {
        let script = "CREATE TYPE dbo.T AS TABLE (Id int)\nGO\n\n  go  \nCREATE PROCEDURE dbo.P AS\n  SELECT 'go'\nGo 5\nGOTO Done\nGO--end of view\nGO_Home\n";
        let batches = split_batches(script);
        assert_eq!(
            batches,
            vec![
                "CREATE TYPE dbo.T AS TABLE (Id int)\n".to_string(),
                "CREATE PROCEDURE dbo.P AS\n  SELECT 'go'\n".to_string(),
                "GOTO Done\n".to_string(),
                "GO_Home\n".to_string(),
            ]
        );
    }

    #[test]
    fn trailing_comment_after_go() {
        let batches = split_batches(
            "CREATE VIEW dbo.A AS SELECT 1\nGO--end of view\nCREATE VIEW dbo.B AS SELECT 2\n",
        );
        assert_eq!(
            batches,
            vec![
                "CREATE VIEW dbo.A AS SELECT 1\n".to_string(),
                "CREATE VIEW dbo.B AS SELECT 2\n".to_string(),
            ]
        );
    }

    #[test]
    fn empty_script_has_no_batches() {
        assert!(split_batches("").is_empty());
        assert!(split_batches("GO\r\n\r\nGO\r\n").is_empty());
        assert_eq!(split_batches("SELECT 1"), vec!["SELECT 1\n".to_string()]);
    }

    fn write_item(
        cache: &mut Cache,
        dir: &Path,
        name: &str,
        body: &str,
        order: i32,
    ) -> Result<(), Error> {
        let path = dir.join(name);
        fs::write(&path, body)?;
        let mut item = MakeItem::new(path)?;
        item.drop_order = order;
        if order == 1 {
            item.type_code = TypeCode::new("TT");
        }
        cache.insert(item);
        Ok(())
    }

    #[test]
    fn compiles_in_reverse_drop_order() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let mut cache = Cache::new(dir.path().join("cache"));

        write_item(&mut cache, dir.path(), "A.sql", "CREATE PROCEDURE dbo.A @ids dbo.B READONLY AS SELECT 1", 0)?;
        write_item(&mut cache, dir.path(), "B.sql", "CREATE TYPE dbo.B AS TABLE (Id int)", 1)?;
        write_item(&mut cache, dir.path(), "C.sql", "CREATE VIEW dbo.C AS SELECT 1\nGO\nCREATE VIEW dbo.C2 AS SELECT 2", 0)?;

        let mut server = FakeServer::new();
        let sink = Collect::default();
        let outcome = compile_items(&mut server, &mut cache, &sink);

        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.compiled,
            vec![
                ObjectName::new("dbo", "B"),
                ObjectName::new("dbo", "A"),
                ObjectName::new("dbo", "C"),
            ]
        );
        assert_eq!(server.statements().len(), 4);
        assert!(cache.items().all(|i| !i.needs_to_be_compiled));

        Ok(())
    }

    #[test]
    fn first_failure_stops_compilation() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let mut cache = Cache::new(dir.path().join("cache"));

        write_item(&mut cache, dir.path(), "A.sql", "CREATE VIEW dbo.A AS SELECT 1", 0)?;
        write_item(&mut cache, dir.path(), "B.sql", "CREATE VIEW dbo.B AS SELECT broken", 0)?;
        write_item(&mut cache, dir.path(), "C.sql", "CREATE VIEW dbo.C AS SELECT 1", 0)?;

        let mut server = FakeServer::new().fail_on("broken");
        let sink = Collect::default();
        let outcome = compile_items(&mut server, &mut cache, &sink);

        assert_eq!(outcome.compiled, vec![ObjectName::new("dbo", "A")]);

        let error = outcome.error.expect("compilation should fail");
        assert!(error.pathname.ends_with("B.sql"));
        assert!(error.error.to_string().contains("[dbo].[B]"));

        assert!(cache.get(&dir.path().join("C.sql")).unwrap().needs_to_be_compiled);
        assert!(!server.exists("dbo", "C"));

        Ok(())
    }

    #[test]
    fn unnamed_file_reports_its_filename() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let mut cache = Cache::new(dir.path().join("cache"));

        write_item(&mut cache, dir.path(), "Seed.sql", "INSERT INTO dbo.T VALUES (1)", 0)?;
        cache
            .items_mut()
            .for_each(|item| item.declared = ObjectName::default());

        let mut server = FakeServer::new();
        let sink = Collect::default();
        let outcome = compile_items(&mut server, &mut cache, &sink);

        assert_eq!(outcome.compiled, vec![ObjectName::new("", "Seed.sql")]);

        Ok(())
    }
}
