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

mod clean;
mod dump;
mod make;
mod replay;

pub use self::clean::Clean;
pub use self::dump::Dump;
pub use self::make::Make;
pub use self::replay::Replay;

use std::path::{Path, PathBuf};

use structopt::StructOpt;

use dbmake::{Config, Error, ResultExt, Sources};

use crate::opts::GlobalOpts;
use crate::paths;

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Drops and compiles whatever is out of date.
    #[structopt(name = "make")]
    Make(Make),

    /// Deletes the cache so that every file is treated as new.
    #[structopt(name = "clean")]
    Clean(Clean),

    /// Dumps the cached state of every source file.
    #[structopt(name = "dump")]
    Dump(Dump),

    /// Replays an event log file.
    #[structopt(name = "replay")]
    Replay(Replay),
}

impl Command {
    pub fn main(self, global: &GlobalOpts) -> Result<(), Error> {
        match self {
            Command::Make(x) => x.main(global),
            Command::Clean(x) => x.main(global),
            Command::Dump(x) => x.main(global),
            Command::Replay(x) => x.main(global),
        }
    }
}

/// A loaded project file.
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    /// Finds and loads the project file.
    pub fn load(file: Option<PathBuf>) -> Result<Project, Error> {
        let file = paths::config_or(file)
            .context("Failed to find the project file")?;

        let config = Config::from_path(&file)?;

        Ok(Project {
            root: paths::root(&file).to_path_buf(),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache_dir(&self.root)
    }

    /// Registers every configured source file.
    pub fn sources(&self) -> Result<Sources, Error> {
        let mut sources = Sources::new();
        self.config.register(&self.root, &mut sources)?;
        Ok(sources)
    }
}
