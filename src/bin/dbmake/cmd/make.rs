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

use std::path::PathBuf;
use std::sync::mpsc;

use structopt::StructOpt;

use dbmake::events::{AnyHandler, Binary, Console, EventThread};
use dbmake::server::Sqlcmd;
use dbmake::{Error, ResultExt};

use crate::opts::GlobalOpts;
use crate::paths;

use super::Project;

#[derive(StructOpt, Debug)]
pub struct Make {
    /// Path to the project file. If not specified, finds "dbmake.json" in the
    /// current directory or parent directories.
    #[structopt(long = "file", short = "f", parse(from_os_str))]
    file: Option<PathBuf>,

    /// Print additional information.
    #[structopt(long = "verbose", short = "v")]
    verbose: bool,

    /// Where to write the event log. Relative to the project root.
    #[structopt(long = "log", parse(from_os_str))]
    log: Option<PathBuf>,
}

impl Make {
    pub fn main(self, global: &GlobalOpts) -> Result<(), Error> {
        let project = Project::load(self.file)?;

        paths::init(project.root())
            .context("Failed creating the state directory")?;

        let log = project
            .root()
            .join(self.log.unwrap_or_else(|| PathBuf::from(paths::LOG)));

        // Log to both the console and a binary file for later analysis.
        let handlers: Vec<AnyHandler> = vec![
            Console::new(self.verbose)
                .colors(global.color.enabled())
                .into(),
            Binary::from_path(&log)
                .with_context(|_| format!("Failed creating log {:?}", log))?
                .into(),
        ];

        let (sender, receiver) = mpsc::channel();
        let event_thread = EventThread::new(handlers, receiver);

        let report = {
            let conn = Sqlcmd::new(project.config.connection.clone());
            let mut make =
                dbmake::Make::new(conn, project.cache_dir(), sender);

            project.config.register(project.root(), make.sources_mut())?;

            make.run()?
        };

        event_thread.join()?;

        report.into_result()?;

        Ok(())
    }
}
