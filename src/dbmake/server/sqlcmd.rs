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

//! A `Connection` that drives the `sqlcmd` command-line client.
//!
//! Each batch is written to a temporary file and run by a fresh `sqlcmd`
//! process. The password is never passed on the command line; `sqlcmd` picks
//! it up from the `SQLCMDPASSWORD` environment variable itself.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use serde::{Deserialize, Serialize};
use serde_json as json;

use crate::error::{Error, ErrorKind, MakeError, ResultExt};

use super::Connection;

fn default_program() -> PathBuf {
    PathBuf::from("sqlcmd")
}

/// Settings for reaching a server with `sqlcmd`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SqlcmdSettings {
    /// Server to connect to (`-S`).
    pub server: String,

    /// Database to use (`-d`).
    pub database: String,

    /// Login name (`-U`). Integrated authentication is used when absent.
    #[serde(default)]
    pub user: Option<String>,

    /// The `sqlcmd` executable.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Trust the server certificate without validation (`-C`).
    #[serde(default)]
    pub trust_server_certificate: bool,
}

/// A connection backed by the `sqlcmd` client.
pub struct Sqlcmd {
    settings: SqlcmdSettings,
}

impl Sqlcmd {
    pub fn new(settings: SqlcmdSettings) -> Sqlcmd {
        Sqlcmd { settings }
    }

    pub fn settings(&self) -> &SqlcmdSettings {
        &self.settings
    }

    /// Arguments shared by every invocation.
    fn command(&self) -> process::Command {
        let mut cmd = process::Command::new(&self.settings.program);

        cmd.arg("-S").arg(&self.settings.server);
        cmd.arg("-d").arg(&self.settings.database);

        match &self.settings.user {
            Some(user) => {
                cmd.arg("-U").arg(user);
            }
            None => {
                cmd.arg("-E");
            }
        }

        if self.settings.trust_server_certificate {
            cmd.arg("-C");
        }

        // Fail on errors, send them to stderr, keep `$(var)` and `:r` in
        // object bodies literal, and use quoted identifiers.
        cmd.args(&["-b", "-r1", "-x", "-I"]);

        // We never want to pause waiting for user input.
        cmd.stdin(process::Stdio::null());

        cmd
    }

    /// Runs one batch and returns what the client printed on stdout.
    fn run(&self, sql: &str, extra: &[&str]) -> Result<String, Error> {
        // The temporary file must outlive the spawned process.
        let input = {
            let mut tmp = tempfile::Builder::new()
                .prefix("dbmake")
                .suffix(".sql")
                .tempfile()?;
            tmp.as_file_mut().write_all(sql.as_bytes())?;
            tmp.into_temp_path()
        };

        let mut cmd = self.command();
        cmd.args(extra);
        cmd.arg("-i").arg(&*input);

        log::debug!("Running {:?}", cmd);

        let output = cmd.output().with_context(|_| {
            format!("Failed to spawn {:?}", self.settings.program)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);

            let message = match stderr.trim() {
                "" => stdout.trim().to_string(),
                s => s.to_string(),
            };

            return Err(MakeError::from(ErrorKind::Sql(format!(
                "{} ({})",
                message,
                ExitStatus(output.status)
            )))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

struct ExitStatus(process::ExitStatus);

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.code() {
            Some(code) => write!(f, "sqlcmd exited with error code {}", code),
            None => write!(f, "sqlcmd was terminated by a signal"),
        }
    }
}

/// Decodes `FOR JSON` output. The client wraps long values over several
/// lines at a fixed width, so the lines are joined back together first. Only
/// the line terminators go; a wrap can fall inside a string value.
pub fn parse_json_rows(output: &str) -> Result<Vec<json::Value>, Error> {
    let text: String = output.lines().collect();

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    match json::from_str::<json::Value>(&text).map_err(MakeError::from)? {
        json::Value::Array(rows) => Ok(rows),
        other => Err(MakeError::from(ErrorKind::Sql(format!(
            "expected a JSON array of rows, got {}",
            other
        )))
        .into()),
    }
}

impl Connection for Sqlcmd {
    fn database(&mut self) -> Result<String, Error> {
        let output =
            self.run("SET NOCOUNT ON;\nSELECT DB_NAME();", &["-h", "-1", "-W"])?;

        Ok(output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string())
    }

    fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.run(sql, &[])?;
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<Vec<json::Value>, Error> {
        let output = self.run(sql, &["-h", "-1", "-y", "0"])?;
        parse_json_rows(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_wrapped_json() -> Result<(), Error> {
        let output = "[{\"Pathname\":\"/sql/A.sql\",\"Sour\nceExists\":true},{\"Pa\r\nthname\":\"/sql/B.sql\"}]\r\n";
        let rows = parse_json_rows(output)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["SourceExists"], json::Value::Bool(true));
        assert_eq!(rows[1]["Pathname"], json::Value::from("/sql/B.sql"));
        Ok(())
    }

    #[test]
    fn wrap_inside_a_value_keeps_its_spaces() -> Result<(), Error> {
        let rows = parse_json_rows("[{\"Pathname\":\"/sql/My \nFile.sql\"}]\n")?;
        assert_eq!(rows[0]["Pathname"], json::Value::from("/sql/My File.sql"));
        Ok(())
    }

    #[test]
    fn empty_output_is_no_rows() -> Result<(), Error> {
        assert!(parse_json_rows("\n\n")?.is_empty());
        assert!(parse_json_rows("{\"a\":1}").is_err());
        Ok(())
    }

    #[test]
    fn settings_defaults() -> Result<(), json::Error> {
        let settings: SqlcmdSettings =
            json::from_str(r#"{"server": "localhost", "database": "App"}"#)?;
        assert_eq!(settings.program, PathBuf::from("sqlcmd"));
        assert_eq!(settings.user, None);
        assert!(!settings.trust_server_certificate);
        Ok(())
    }

    #[test]
    fn missing_client_is_an_error() {
        let mut conn = Sqlcmd::new(SqlcmdSettings {
            server: "localhost".into(),
            database: "App".into(),
            user: None,
            program: PathBuf::from("/nonexistent/dbmake-sqlcmd"),
            trust_server_certificate: false,
        });

        assert!(conn.execute("SELECT 1").is_err());
    }
}
