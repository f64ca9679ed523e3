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

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait PathExt {
    /// Returns a normalized path. This does not touch the file system at all.
    fn normalize(&self) -> PathBuf;

    /// Returns a normalized absolute path, resolving relative paths against
    /// the current working directory. Symbolic links are left alone.
    fn absolutize(&self) -> io::Result<PathBuf>;

    /// Returns a path relative to the given base path.
    fn relative_from(&self, base: &Path) -> Option<PathBuf>;
}

impl PathExt for Path {
    fn normalize(&self) -> PathBuf {
        let mut new_path = PathBuf::new();

        for c in self.components() {
            match c {
                Component::CurDir => {}
                Component::ParentDir => {
                    let pop = match new_path.components().next_back() {
                        Some(Component::Prefix(_))
                        | Some(Component::RootDir) => true,
                        Some(Component::Normal(s)) => !s.is_empty(),
                        _ => false,
                    };

                    if pop {
                        new_path.pop();
                    } else {
                        new_path.push("..");
                    }
                }
                _ => {
                    new_path.push(c.as_os_str());
                }
            };
        }

        if new_path.as_os_str().is_empty() {
            new_path.push(".");
        }

        new_path
    }

    fn absolutize(&self) -> io::Result<PathBuf> {
        if self.is_absolute() {
            Ok(self.normalize())
        } else {
            Ok(env::current_dir()?.join(self).normalize())
        }
    }

    fn relative_from(&self, base: &Path) -> Option<PathBuf> {
        if self.is_absolute() != base.is_absolute() {
            if self.is_absolute() {
                Some(PathBuf::from(self))
            } else {
                None
            }
        } else {
            let mut ita = self.components();
            let mut itb = base.components();
            let mut comps: Vec<Component> = vec![];
            loop {
                match (ita.next(), itb.next()) {
                    (None, None) => break,
                    (Some(a), None) => {
                        comps.push(a);
                        comps.extend(ita.by_ref());
                        break;
                    }
                    (None, _) => comps.push(Component::ParentDir),
                    (Some(a), Some(b)) if comps.is_empty() && a == b => (),
                    (Some(a), Some(b)) if b == Component::CurDir => {
                        comps.push(a)
                    }
                    (Some(_), Some(b)) if b == Component::ParentDir => {
                        return None
                    }
                    (Some(a), Some(_)) => {
                        comps.push(Component::ParentDir);
                        for _ in itb {
                            comps.push(Component::ParentDir);
                        }
                        comps.push(a);
                        comps.extend(ita.by_ref());
                        break;
                    }
                }
            }
            Some(comps.iter().map(|c| c.as_os_str()).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_norm() {
        assert_eq!(Path::new("foo").normalize(), Path::new("foo"));
        assert_eq!(Path::new("./foo").normalize(), Path::new("foo"));
        assert_eq!(Path::new("").normalize(), Path::new("."));
        assert_eq!(Path::new("/foo/../bar").normalize(), Path::new("/bar"));
        assert_eq!(Path::new("/../../bar").normalize(), Path::new("/bar"));
        assert_eq!(
            Path::new("/sql//procs/./Foo.sql").normalize(),
            Path::new("/sql/procs/Foo.sql")
        );
        assert_eq!(
            Path::new("../foo/../../bar").normalize(),
            Path::new("../../bar")
        );
    }

    #[test]
    fn test_absolutize() -> io::Result<()> {
        let cwd = env::current_dir()?;
        assert_eq!(
            Path::new("sql/../Foo.sql").absolutize()?,
            cwd.join("Foo.sql")
        );
        assert!(Path::new("Foo.sql").absolutize()?.is_absolute());
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_relative_from() {
        assert_eq!(
            Path::new("/db/sql/Foo.sql").relative_from(Path::new("/db")),
            Some(PathBuf::from("sql/Foo.sql"))
        );
        assert_eq!(
            Path::new("/foo").relative_from(Path::new("/bar")),
            Some(PathBuf::from("../foo"))
        );
        assert_eq!(
            Path::new("foobar").relative_from(Path::new("foobar")),
            Some(PathBuf::from(""))
        );
    }
}
