//! The paginated key walk behind `query`.
//!
//! An explicit cursor loop inside a lazy stream: fetch one page, yield its
//! names decoded to keys, and when the page is truncated continue from the
//! raw physical name of its last item. No recursion, so the call stack is
//! flat however large the key space, and cancellation is a plain check at
//! the top of each page fetch.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream};
use silt_datastore::{AbortSignal, DatastoreError, DatastoreResult, Key};

use crate::client::ObjectClient;
use crate::path::StorePath;

struct WalkState {
    client: Arc<dyn ObjectClient>,
    path: StorePath,
    prefix: String,
    abort: Option<AbortSignal>,
    cursor: Option<String>,
    buffered: VecDeque<String>,
    done: bool,
}

/// Lazily walk every physical name under `prefix`, yielding decoded keys.
///
/// Pages are fetched sequentially, one listing call at a time; a listing
/// failure on any page is fatal to the whole walk. A set abort signal ends
/// the walk cleanly before the next page is fetched.
pub(crate) fn key_walk(
    client: Arc<dyn ObjectClient>,
    path: StorePath,
    prefix: String,
    abort: Option<AbortSignal>,
) -> impl Stream<Item = DatastoreResult<Key>> + Send {
    let state = WalkState {
        client,
        path,
        prefix,
        abort,
        cursor: None,
        buffered: VecDeque::new(),
        done: false,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(name) = state.buffered.pop_front() {
                let key = state.path.decode(&name);
                return Ok(Some((key, state)));
            }
            if state.done {
                return Ok(None);
            }
            if state
                .abort
                .as_ref()
                .is_some_and(AbortSignal::is_aborted)
            {
                return Ok(None);
            }

            let page = state
                .client
                .list_objects(&state.prefix, state.cursor.as_deref())
                .await
                .map_err(|err| {
                    DatastoreError::UnknownBackend(format!("listing failed: {err}"))
                })?;

            if page.truncated {
                // Next page starts strictly after the last name seen; an
                // empty truncated page cannot advance the cursor, so stop.
                match page.names.last() {
                    Some(last) => state.cursor = Some(last.clone()),
                    None => state.done = true,
                }
            } else {
                state.done = true;
            }
            state.buffered = page.names.into();
        }
    })
}
