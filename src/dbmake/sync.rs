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

//! Reconciles the tracked items with the current contents of the source
//! files.

use crate::cache::Cache;
use crate::error::{Error, ItemError};
use crate::item::MakeItem;
use crate::sources::Sources;

/// What synchronizing changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncSummary {
    /// Files seen for the first time.
    pub added: usize,

    /// Tracked files whose contents changed.
    pub changed: usize,

    /// Tracked files whose contents are unchanged.
    pub unchanged: usize,

    /// Items dropped from the cache because their file is gone.
    pub removed: Vec<MakeItem>,
}

/// Re-hashes every registered file, adding items for new ones, and forgets
/// items whose file no longer exists. Forgetting an item never touches the
/// server.
///
/// Only registered files take part in the run that follows; other tracked
/// items are left as they are with their pending actions cleared.
///
/// The first file that cannot be read stops synchronization.
pub fn synchronize(
    cache: &mut Cache,
    sources: &Sources,
) -> Result<SyncSummary, ItemError> {
    let mut summary = SyncSummary::default();

    for item in cache.items_mut() {
        item.needs_to_be_dropped = false;

        if !sources.contains(item.pathname()) {
            item.needs_to_be_compiled = false;
        }
    }

    for path in sources.iter() {
        let failed = |err: Error| ItemError::new(path.to_path_buf(), err);

        match cache.get_mut(path) {
            Some(item) => {
                if item.refresh().map_err(failed)? {
                    summary.changed += 1;
                } else {
                    summary.unchanged += 1;
                }
            }
            None => {
                let item = MakeItem::new(path.to_path_buf()).map_err(failed)?;
                cache.insert(item);
                summary.added += 1;
            }
        }
    }

    summary.removed = cache.retain(|item| item.pathname().is_file());

    Ok(summary)
}
