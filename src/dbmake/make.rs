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

//! The make engine.
//!
//! A run is a fixed sequence of stages. Once any stage reports an error, the
//! remaining stages are skipped. Nothing already done on the server is undone.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::compile;
use crate::drops;
use crate::error::{Error, ResultExt};
use crate::events::{EventSender, EventSink};
use crate::item::ObjectName;
use crate::server::{metadata, Connection, ItemHint};
use crate::sources::Sources;
use crate::sync;

/// A stage of a run, in the order they happen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadCache,
    Synchronize,
    QueryServer,
    Drop,
    SaveCache,
    Compile,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::LoadCache,
        Stage::Synchronize,
        Stage::QueryServer,
        Stage::Drop,
        Stage::SaveCache,
        Stage::Compile,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::LoadCache => "load cache",
            Stage::Synchronize => "synchronize",
            Stage::QueryServer => "query server",
            Stage::Drop => "drop",
            Stage::SaveCache => "save cache",
            Stage::Compile => "compile",
        })
    }
}

/// An error recorded during a run.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,

    /// The source file the error concerns, if any.
    pub pathname: Option<PathBuf>,

    pub error: Error,
}

/// The outcome of a run.
#[must_use]
#[derive(Debug)]
pub struct RunReport {
    /// The database the run was made against.
    pub database: String,

    /// Objects compiled, in the order they were compiled.
    pub compiled: Vec<ObjectName>,

    /// Objects dropped, in the order they were dropped.
    pub dropped: Vec<ObjectName>,

    /// Stages that never ran because an earlier one failed.
    pub skipped: Vec<Stage>,

    pub errors: Vec<StageError>,
}

impl RunReport {
    fn new(database: String) -> RunReport {
        RunReport {
            database,
            compiled: Vec::new(),
            dropped: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns a report with errors into an error.
    pub fn into_result(self) -> Result<RunReport, RunFailure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RunFailure { report: self })
        }
    }

    /// Records an error and tells the event sink about it.
    fn fail<S>(
        &mut self,
        events: &S,
        stage: Stage,
        pathname: Option<PathBuf>,
        error: Error,
    ) where
        S: EventSink + ?Sized,
    {
        events.error(stage, pathname.clone(), &error);

        self.errors.push(StageError {
            stage,
            pathname,
            error,
        });
    }
}

/// A run that finished with errors.
#[derive(Fail, Debug)]
pub struct RunFailure {
    pub report: RunReport,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.report.errors.len() == 1 {
            write!(f, "Make failed with 1 error")
        } else {
            write!(f, "Make failed with {} errors", self.report.errors.len())
        }
    }
}

/// Brings the objects on a server in line with their source files.
///
/// The connection is owned by the caller's side of things: it must already
/// be open and is used serially for the whole run.
pub struct Make<C> {
    conn: C,

    /// Where cache files are kept, one per source folder.
    cache_dir: PathBuf,

    sources: Sources,

    events: EventSender,

    /// The state as of the last run.
    cache: Cache,
}

impl<C> Make<C>
where
    C: Connection,
{
    pub fn new<P>(conn: C, cache_dir: P, events: EventSender) -> Make<C>
    where
        P: Into<PathBuf>,
    {
        let cache_dir = cache_dir.into();

        Make {
            conn,
            cache: Cache::new(cache_dir.clone()),
            cache_dir,
            sources: Sources::new(),
            events,
        }
    }

    /// Registers a single source file. It must exist.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<bool, Error> {
        self.sources.add_file(path)
    }

    /// Registers every file in a folder matching `mask`. The folder must
    /// exist.
    pub fn add_folder<P: AsRef<Path>>(
        &mut self,
        folder: P,
        mask: &str,
        recursive: bool,
    ) -> Result<usize, Error> {
        self.sources.add_folder(folder, mask, recursive)
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut Sources {
        &mut self.sources
    }

    /// The tracked items as of the end of the last run.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Runs every stage in turn.
    ///
    /// Only an unusable connection is returned as an error. Everything that
    /// goes wrong after that is collected in the report.
    pub fn run(&mut self) -> Result<RunReport, Error> {
        let database = self
            .conn
            .database()
            .context("Failed to determine the current database")?;

        self.events.begin_run(database.as_str(), self.sources.len());

        let mut report = RunReport::new(database);

        for &stage in Stage::ALL.iter() {
            if !report.is_success() {
                report.skipped.push(stage);
                continue;
            }

            log_event!(self.events, "Stage: {}", stage);

            match stage {
                Stage::LoadCache => self.load_cache(&mut report),
                Stage::Synchronize => self.synchronize(&mut report),
                Stage::QueryServer => self.query_server(&mut report),
                Stage::Drop => self.drop_stale(&mut report),
                Stage::SaveCache => self.save_cache(&mut report),
                Stage::Compile => self.compile(&mut report),
            }
        }

        let result = if report.is_success() {
            Ok(())
        } else {
            Err(format!(
                "{} error(s), skipped {} stage(s)",
                report.errors.len(),
                report.skipped.len()
            ))
        };

        self.events.end_run(
            &result,
            report.compiled.len(),
            report.dropped.len(),
        );

        Ok(report)
    }

    fn load_cache(&mut self, report: &mut RunReport) {
        match Cache::load(&self.cache_dir, self.sources.folders()) {
            Ok(cache) => {
                log_event!(
                    self.events,
                    "Loaded {} cached item(s) for {} folder(s)",
                    cache.len(),
                    cache.folders().len()
                );
                self.cache = cache;
            }
            Err(err) => {
                report.fail(&self.events, Stage::LoadCache, None, err);
            }
        }
    }

    fn synchronize(&mut self, report: &mut RunReport) {
        match sync::synchronize(&mut self.cache, &self.sources) {
            Ok(summary) => {
                log_event!(
                    self.events,
                    "{} new, {} changed, {} unchanged file(s)",
                    summary.added,
                    summary.changed,
                    summary.unchanged
                );

                for item in summary.removed {
                    log_event!(
                        self.events,
                        "No longer tracking {:?}",
                        item.pathname()
                    );
                }
            }
            Err(err) => {
                report.fail(
                    &self.events,
                    Stage::Synchronize,
                    Some(err.pathname),
                    err.error,
                );
            }
        }
    }

    fn query_server(&mut self, report: &mut RunReport) {
        let sources = &self.sources;

        let hints: Vec<ItemHint> = self
            .cache
            .items()
            .filter(|item| sources.contains(item.pathname()))
            .map(ItemHint::from)
            .collect();

        log_event!(
            self.events,
            "Asking the server about {} item(s)",
            hints.len()
        );

        let rows = match self.conn.describe(&hints) {
            Ok(rows) => rows,
            Err(err) => {
                report.fail(&self.events, Stage::QueryServer, None, err);
                return;
            }
        };

        for err in metadata::apply(&mut self.cache, rows) {
            report.fail(
                &self.events,
                Stage::QueryServer,
                Some(err.pathname),
                err.error,
            );
        }
    }

    fn drop_stale(&mut self, report: &mut RunReport) {
        let outcome =
            drops::drop_items(&mut self.conn, &mut self.cache, &self.events);

        report.dropped = outcome.dropped;

        for err in outcome.errors {
            report.fail(&self.events, Stage::Drop, Some(err.pathname), err.error);
        }
    }

    fn save_cache(&mut self, report: &mut RunReport) {
        if let Err(err) = self.cache.save() {
            report.fail(&self.events, Stage::SaveCache, None, err);
        }
    }

    fn compile(&mut self, report: &mut RunReport) {
        let outcome =
            compile::compile_items(&mut self.conn, &mut self.cache, &self.events);

        report.compiled = outcome.compiled;

        if let Some(err) = outcome.error {
            report.fail(
                &self.events,
                Stage::Compile,
                Some(err.pathname),
                err.error,
            );
        }
    }
}
