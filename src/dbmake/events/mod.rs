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

//! The make engine does not handle any sort of display for the user. Instead,
//! it sends events along a channel for consumption by a user-facing logging
//! system. Failures are reported here as they happen and are also collected
//! in the `RunReport` returned at the end of a run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::item::ObjectName;
use crate::make::Stage;

mod binary;
mod console;

pub use self::binary::Binary;
pub use self::console::Console;

/// Sends a `LogEvent` tagged with the call site that raised it.
#[macro_export]
macro_rules! log_event {
    ($sink:expr, $($arg:tt)+) => {
        $crate::events::EventSink::log(
            &$sink,
            concat!(module_path!(), ":", line!()),
            format!($($arg)+),
        )
    };
}

/// A run has begun.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeginRunEvent {
    /// The database the connection is using.
    pub database: String,

    /// The number of registered source files.
    pub files: usize,
}

/// A run has ended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndRunEvent {
    /// The result of the run.
    pub result: Result<(), String>,

    /// Number of objects compiled.
    pub compiled: usize,

    /// Number of objects dropped.
    pub dropped: usize,
}

/// A human-readable progress message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEvent {
    /// The `module::path:line` that raised the message.
    pub location: String,

    pub message: String,
}

/// Something went wrong.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// The stage of the run the error happened in.
    pub stage: Stage,

    /// The source file the error concerns, if any.
    pub pathname: Option<PathBuf>,

    /// The error followed by its chain of causes.
    pub causes: Vec<String>,
}

/// A server object has been dropped (or failed to).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DropEvent {
    pub object: ObjectName,

    /// The `DROP` keyword used, e.g. `PROCEDURE`.
    pub keyword: String,

    /// The stringy result of the drop.
    pub result: Result<(), String>,
}

/// A source file has been compiled (or failed to).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompileEvent {
    pub pathname: PathBuf,

    pub object: ObjectName,

    /// Number of batches in the file.
    pub batches: usize,

    /// The stringy result of the compilation.
    pub result: Result<(), String>,
}

/// A single make event.
#[derive(Clone, Debug, Serialize, Deserialize, From)]
pub enum Event {
    BeginRun(BeginRunEvent),
    EndRun(EndRunEvent),
    Log(LogEvent),
    Error(ErrorEvent),
    Drop(DropEvent),
    Compile(CompileEvent),
}

pub type Timestamp = DateTime<Utc>;

pub type EventSender = Sender<(Timestamp, Event)>;
pub type EventReceiver = Receiver<(Timestamp, Event)>;

/// Trait for receiving timestamped events.
pub trait EventHandler: Send {
    type Error: std::error::Error;

    /// Listens for events on a channel, sending them to an event handler. If
    /// the event handler returns an error, this function stops listening for
    /// events and returns the error as well.
    ///
    /// This function returns when the sending channel has hung up (i.e., all
    /// senders have been dropped).
    fn read_channel(
        &mut self,
        receiver: EventReceiver,
    ) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        for (timestamp, event) in receiver.iter() {
            self.call(timestamp, event)?;
        }

        self.finish()
    }

    /// Gets events from a reader. Stops reading when an error occurs.
    ///
    /// If `realtime` is `true`, then an appropriate amount of time is waited
    /// between each event.
    fn read_bincode<R>(
        &mut self,
        mut reader: R,
        realtime: bool,
    ) -> Result<(), Self::Error>
    where
        Self: Sized,
        R: io::Read,
    {
        // Grab the first event. We need the initial timestamp to calculate
        // sleep deltas when doing realtime playback.
        let (mut prev, event) = match bincode::deserialize_from(&mut reader) {
            Ok(x) => x,
            Err(_) => return self.finish(),
        };

        self.call(prev, event)?;

        while let Ok((timestamp, event)) =
            bincode::deserialize_from::<_, (Timestamp, _)>(&mut reader)
        {
            if realtime {
                if let Ok(delta) =
                    timestamp.signed_duration_since(prev).to_std()
                {
                    thread::sleep(delta);
                }
            }

            prev = timestamp;
            self.call(timestamp, event)?;
        }

        self.finish()
    }

    /// Handles an event.
    fn call(
        &mut self,
        timestamp: Timestamp,
        event: Event,
    ) -> Result<(), Self::Error>;

    /// Called when there are no more events.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<H> EventHandler for Box<H>
where
    H: EventHandler + ?Sized,
{
    type Error = H::Error;

    fn call(
        &mut self,
        timestamp: Timestamp,
        event: Event,
    ) -> Result<(), Self::Error> {
        (**self).call(timestamp, event)
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        (**self).finish()
    }
}

impl<H> EventHandler for Vec<H>
where
    H: EventHandler,
{
    type Error = H::Error;

    fn call(
        &mut self,
        timestamp: Timestamp,
        event: Event,
    ) -> Result<(), Self::Error> {
        for handler in self.iter_mut() {
            handler.call(timestamp, event.clone())?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        for handler in self.iter_mut() {
            handler.finish()?;
        }

        Ok(())
    }
}

#[derive(Debug, Display)]
pub enum AnyHandlerError {
    Binary(<Binary as EventHandler>::Error),
    Console(<Console as EventHandler>::Error),
}

impl std::error::Error for AnyHandlerError {}

#[derive(From)]
pub enum AnyHandler {
    Binary(Binary),
    Console(Console),
}

impl EventHandler for AnyHandler {
    type Error = AnyHandlerError;

    fn call(
        &mut self,
        timestamp: Timestamp,
        event: Event,
    ) -> Result<(), Self::Error> {
        match self {
            Self::Binary(h) => {
                h.call(timestamp, event).map_err(AnyHandlerError::Binary)
            }
            Self::Console(h) => {
                h.call(timestamp, event).map_err(AnyHandlerError::Console)
            }
        }
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Binary(h) => h.finish().map_err(AnyHandlerError::Binary),
            Self::Console(h) => h.finish().map_err(AnyHandlerError::Console),
        }
    }
}

fn stringify<E: fmt::Display>(result: &Result<(), E>) -> Result<(), String> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => Err(err.to_string()),
    }
}

/// A helper trait for sending events to a sink.
///
/// Sending never fails. If nobody is listening, the event is discarded.
pub trait EventSink {
    fn send_event(&self, event: Event);

    /// Sends a `BeginRunEvent` to the sink.
    fn begin_run<S>(&self, database: S, files: usize)
    where
        S: Into<String>,
    {
        self.send_event(
            BeginRunEvent {
                database: database.into(),
                files,
            }
            .into(),
        );
    }

    /// Sends an `EndRunEvent` to the sink.
    fn end_run<E>(&self, result: &Result<(), E>, compiled: usize, dropped: usize)
    where
        E: fmt::Display,
    {
        self.send_event(
            EndRunEvent {
                result: stringify(result),
                compiled,
                dropped,
            }
            .into(),
        );
    }

    /// Sends a `LogEvent` to the sink. Prefer the `log_event!` macro, which
    /// fills in the location.
    fn log<L, M>(&self, location: L, message: M)
    where
        L: Into<String>,
        M: Into<String>,
    {
        self.send_event(
            LogEvent {
                location: location.into(),
                message: message.into(),
            }
            .into(),
        );
    }

    /// Sends an `ErrorEvent` to the sink.
    fn error(&self, stage: Stage, pathname: Option<PathBuf>, error: &Error) {
        self.send_event(
            ErrorEvent {
                stage,
                pathname,
                causes: error.iter_chain().map(|c| c.to_string()).collect(),
            }
            .into(),
        );
    }

    /// Sends a `DropEvent` to the sink.
    fn dropped<E>(
        &self,
        object: ObjectName,
        keyword: &str,
        result: &Result<(), E>,
    ) where
        E: fmt::Display,
    {
        self.send_event(
            DropEvent {
                object,
                keyword: keyword.to_string(),
                result: stringify(result),
            }
            .into(),
        );
    }

    /// Sends a `CompileEvent` to the sink.
    fn compiled<E>(
        &self,
        pathname: PathBuf,
        object: ObjectName,
        batches: usize,
        result: &Result<(), E>,
    ) where
        E: fmt::Display,
    {
        self.send_event(
            CompileEvent {
                pathname,
                object,
                batches,
                result: stringify(result),
            }
            .into(),
        );
    }
}

impl EventSink for EventSender {
    fn send_event(&self, event: Event) {
        // A hung up receiver only means nobody is listening.
        let _ = self.send((Utc::now(), event));
    }
}

impl<'a, S> EventSink for &'a S
where
    S: EventSink + ?Sized,
{
    fn send_event(&self, event: Event) {
        (**self).send_event(event)
    }
}

/// Helper for creating and destroying an event handler thread that receives
/// events.
pub struct EventThread<H>
where
    H: EventHandler,
{
    handle: Option<JoinHandle<Result<H, H::Error>>>,
}

impl<H> EventThread<H>
where
    H: EventHandler,
{
    pub fn new(mut handler: H, receiver: EventReceiver) -> Self
    where
        H: EventHandler + Send + 'static,
        H::Error: Send + 'static,
    {
        EventThread {
            handle: Some(thread::spawn(move || {
                handler.read_channel(receiver)?;
                Ok(handler)
            })),
        }
    }

    /// Waits for the channel to hang up and returns the handler.
    pub fn join(mut self) -> Result<H, H::Error> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            None => unreachable!("event thread joined twice"),
        }
    }
}

impl<H> Drop for EventThread<H>
where
    H: EventHandler,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
