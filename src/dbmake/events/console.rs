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

use std::io::{self, Write};

use console::style;
use humantime::format_duration;

use super::{
    BeginRunEvent, CompileEvent, DropEvent, EndRunEvent, ErrorEvent, Event,
    EventHandler, LogEvent, Timestamp,
};

/// State that lives as long as a single run. This is created and destroyed
/// for `BeginRunEvent`s and `EndRunEvent`s respectively.
struct Inner {
    // Time at which the run started. This is used to calculate the duration
    // of the run when it finishes.
    start_time: Timestamp,

    // Name of the database being made.
    database: String,
}

/// Logs events to a console, one line per event.
pub struct Console {
    inner: Option<Inner>,

    /// Print log messages along with the location that raised them.
    verbose: bool,
}

impl Default for Console {
    fn default() -> Self {
        Console::new(false)
    }
}

impl Console {
    pub fn new(verbose: bool) -> Self {
        Console {
            inner: None,
            verbose,
        }
    }

    /// Enables or disables colors for everything this handler prints.
    pub fn colors(self, enabled: bool) -> Self {
        console::set_colors_enabled(enabled);
        self
    }

    fn begin_run(
        &mut self,
        timestamp: Timestamp,
        event: BeginRunEvent,
    ) -> Result<(), io::Error> {
        writeln!(
            io::stdout(),
            "{} {} ({} source files)",
            style("Making").bold(),
            style(&event.database).yellow(),
            event.files
        )?;

        self.inner = Some(Inner {
            start_time: timestamp,
            database: event.database,
        });

        Ok(())
    }

    fn end_run(
        &mut self,
        timestamp: Timestamp,
        event: EndRunEvent,
    ) -> Result<(), io::Error> {
        let inner = match self.inner.take() {
            Some(inner) => inner,
            None => return Ok(()),
        };

        let duration = (timestamp - inner.start_time)
            .to_std()
            .unwrap_or_default();
        let duration = format_duration(duration);

        let counts = format!(
            "{} compiled, {} dropped",
            event.compiled, event.dropped
        );

        let msg = match event.result {
            Ok(()) => format!(
                "{} {} in {} ({})",
                style("Finished").bold().green(),
                style(&inner.database).yellow(),
                style(duration).cyan(),
                counts,
            ),
            Err(err) => format!(
                "{} {} after {} ({}): {}",
                style("Failed").bold().red(),
                style(&inner.database).yellow(),
                style(duration).cyan(),
                counts,
                err
            ),
        };

        writeln!(io::stdout(), "{}", msg)
    }

    fn log(&self, event: LogEvent) -> Result<(), io::Error> {
        if !self.verbose {
            return Ok(());
        }

        writeln!(
            io::stdout(),
            "{} {}",
            style(format!("[{}]", event.location)).dim(),
            event.message
        )
    }

    fn error(&self, event: ErrorEvent) -> Result<(), io::Error> {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        let mut causes = event.causes.iter();

        // Primary error.
        if let Some(cause) = causes.next() {
            write!(
                stdout,
                "    {} ({})",
                style("Error").bold().red(),
                event.stage
            )?;

            if let Some(path) = &event.pathname {
                write!(stdout, " {}", style(path.display()).yellow())?;
            }

            writeln!(stdout, ": {}", cause)?;
        }

        // Rest of the causes.
        for cause in causes {
            writeln!(stdout, "{}: {}", style("Caused by").red(), cause)?;
        }

        Ok(())
    }

    fn dropped(&self, event: DropEvent) -> Result<(), io::Error> {
        match event.result {
            Ok(()) => writeln!(
                io::stdout(),
                "{} {} {}",
                style("Dropped").bold().magenta(),
                event.keyword.to_lowercase(),
                event.object
            ),
            Err(err) => writeln!(
                io::stdout(),
                "{} to drop {} {}: {}",
                style("Failed").bold().red(),
                event.keyword.to_lowercase(),
                style(event.object).yellow(),
                err
            ),
        }
    }

    fn compiled(&self, event: CompileEvent) -> Result<(), io::Error> {
        match event.result {
            Ok(()) => {
                write!(
                    io::stdout(),
                    "{} {}",
                    style("Compiled").bold().green(),
                    event.object
                )?;

                if self.verbose {
                    write!(
                        io::stdout(),
                        " {}",
                        style(format!(
                            "({}, {} batches)",
                            event.pathname.display(),
                            event.batches
                        ))
                        .dim()
                    )?;
                }

                writeln!(io::stdout())
            }
            Err(err) => writeln!(
                io::stdout(),
                "{} to compile {} from {}: {}",
                style("Failed").bold().red(),
                style(event.object).yellow(),
                event.pathname.display(),
                err
            ),
        }
    }
}

impl EventHandler for Console {
    type Error = io::Error;

    fn call(
        &mut self,
        timestamp: Timestamp,
        event: Event,
    ) -> Result<(), Self::Error> {
        match event {
            Event::BeginRun(event) => self.begin_run(timestamp, event),
            Event::EndRun(event) => self.end_run(timestamp, event),
            Event::Log(event) => self.log(event),
            Event::Error(event) => self.error(event),
            Event::Drop(event) => self.dropped(event),
            Event::Compile(event) => self.compiled(event),
        }
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        io::stdout().flush()
    }
}
