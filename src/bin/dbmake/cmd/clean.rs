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

use structopt::StructOpt;

use dbmake::util::PathExt;
use dbmake::{Cache, Error};

use crate::opts::GlobalOpts;

use super::Project;

#[derive(StructOpt, Debug)]
pub struct Clean {
    /// Path to the project file. If not specified, finds "dbmake.json" in the
    /// current directory or parent directories.
    #[structopt(long = "file", short = "f", parse(from_os_str))]
    file: Option<PathBuf>,

    /// Doesn't delete anything. Just prints what would be deleted.
    #[structopt(long = "dryrun", short = "n")]
    dryrun: bool,
}

impl Clean {
    pub fn main(self, _global: &GlobalOpts) -> Result<(), Error> {
        let project = Project::load(self.file)?;
        let sources = project.sources()?;

        let cache = Cache::new(project.cache_dir());

        for folder in sources.folders() {
            let path = cache.path_for(&folder);

            let shown = folder
                .relative_from(project.root())
                .unwrap_or_else(|| folder.clone());

            if self.dryrun {
                if path.is_file() {
                    println!("Would delete the cache for {}", shown.display());
                }
            } else if cache.remove_file(&folder)? {
                println!("Deleted the cache for {}", shown.display());
            }
        }

        Ok(())
    }
}
