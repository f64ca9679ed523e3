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

//! Removes stale objects from the server before they are compiled again.

use std::path::PathBuf;

use crate::cache::Cache;
use crate::error::{ItemError, MakeError};
use crate::events::EventSink;
use crate::item::ObjectName;
use crate::server::Connection;

/// Formats the statement that drops an object.
pub fn drop_statement(keyword: &str, object: &ObjectName) -> String {
    format!("DROP {} {}", keyword, object)
}

/// A drop that is about to happen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingDrop {
    pub pathname: PathBuf,
    pub object: ObjectName,
    pub keyword: &'static str,
    pub drop_order: i32,
}

/// Works out which objects must be dropped and in which order: ascending
/// `drop_order`, ties broken by pathname.
///
/// Every flagged item must have a type we know how to drop. If any does not,
/// nothing is dropped at all and every offending item is returned.
pub fn plan(cache: &Cache) -> Result<Vec<PendingDrop>, Vec<ItemError>> {
    let mut pending = Vec::new();
    let mut errors = Vec::new();

    for item in cache.items().filter(|item| item.needs_to_be_dropped) {
        match item.type_code.drop_keyword() {
            Ok(keyword) => pending.push(PendingDrop {
                pathname: item.pathname().to_path_buf(),
                object: item.object(),
                keyword,
                drop_order: item.drop_order,
            }),
            Err(kind) => errors.push(ItemError::new(
                item.pathname().to_path_buf(),
                MakeError::from(kind),
            )),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    pending.sort_by(|a, b| {
        a.drop_order
            .cmp(&b.drop_order)
            .then_with(|| a.pathname.cmp(&b.pathname))
    });

    Ok(pending)
}

/// What dropping did.
#[derive(Debug, Default)]
pub struct DropOutcome {
    /// Objects that are gone from the server.
    pub dropped: Vec<ObjectName>,

    /// Objects that could not be dropped.
    pub errors: Vec<ItemError>,
}

/// Drops every flagged object. A failed drop does not stop the others.
pub fn drop_items<C, S>(
    conn: &mut C,
    cache: &mut Cache,
    events: &S,
) -> DropOutcome
where
    C: Connection + ?Sized,
    S: EventSink + ?Sized,
{
    let pending = match plan(cache) {
        Ok(pending) => pending,
        Err(errors) => {
            return DropOutcome {
                dropped: Vec::new(),
                errors,
            }
        }
    };

    let mut outcome = DropOutcome::default();

    if !pending.is_empty() {
        log_event!(events, "Dropping {} object(s)", pending.len());
    }

    for drop in pending {
        let sql = drop_statement(drop.keyword, &drop.object);

        let result = conn.execute(&sql);

        events.dropped(drop.object.clone(), drop.keyword, &result);

        match result {
            Ok(()) => {
                if let Some(item) = cache.get_mut(&drop.pathname) {
                    item.is_present_on_server = false;
                }

                outcome.dropped.push(drop.object);
            }
            Err(err) => {
                let err = err.context(format!("Failed dropping {}", drop.object));
                outcome.errors.push(ItemError::new(drop.pathname, err));
            }
        }
    }

    outcome
}
