// Copyright (c) 2026 PeerLinks
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! One-shot notification lists keyed by string ids.
//!
//! Tasks park on an id ("wake me when invite X arrives", "peer Y connected",
//! "message Z accepted") and are all resolved with the same value in FIFO
//! insertion order. Dropping a waiter removes its entry; closing the list
//! fails every parked task.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;

/// Waiting failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    /// The list was closed or the waiter was cancelled before resolution.
    #[error("wait list closed")]
    Closed,
}

struct Inner<T> {
    entries: BTreeMap<String, Vec<(u64, oneshot::Sender<T>)>>,
    next_token: u64,
    closed: bool,
}

/// A map from id to parked one-shot waiters.
pub struct WaitList<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for WaitList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Default for WaitList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> WaitList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: BTreeMap::new(),
                next_token: 0,
                closed: false,
            })),
        }
    }

    /// Park until `id` is resolved.
    pub fn wait_for(&self, id: &str) -> Waiter<T> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().expect("wait list lock");
        let token = inner.next_token;
        inner.next_token += 1;
        if !inner.closed {
            inner
                .entries
                .entry(id.to_string())
                .or_default()
                .push((token, tx));
        }
        // When closed, the sender is dropped here and the waiter fails fast.
        Waiter {
            list: self.inner.clone(),
            id: id.to_string(),
            token,
            rx,
        }
    }

    /// Resolve every waiter parked on `id` with `value`, FIFO. Returns the
    /// number of tasks woken.
    pub fn resolve(&self, id: &str, value: T) -> usize {
        let waiters = {
            let mut inner = self.inner.lock().expect("wait list lock");
            inner.entries.remove(id)
        };
        let Some(waiters) = waiters else { return 0 };
        let mut woken = 0;
        for (_, tx) in waiters {
            if tx.send(value.clone()).is_ok() {
                woken += 1;
            }
        }
        woken
    }

    /// Number of parked waiters on `id`.
    pub fn waiter_count(&self, id: &str) -> usize {
        self.inner
            .lock()
            .expect("wait list lock")
            .entries
            .get(id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Fail all parked waiters and refuse new ones.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("wait list lock");
        inner.closed = true;
        inner.entries.clear();
    }
}

/// A parked task handle. Dropping it cancels the wait (idempotent).
pub struct Waiter<T> {
    list: Arc<Mutex<Inner<T>>>,
    id: String,
    token: u64,
    rx: oneshot::Receiver<T>,
}

impl<T> Waiter<T> {
    /// Await resolution.
    pub async fn wait(mut self) -> Result<T, WaitError> {
        // Drop glue removes the map entry afterwards.
        (&mut self.rx).await.map_err(|_| WaitError::Closed)
    }

    /// Cancel the wait and remove the entry.
    pub fn cancel(self) {
        // Drop impl does the cleanup.
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        let mut inner = self.list.lock().expect("wait list lock");
        if let Some(entries) = inner.entries.get_mut(&self.id) {
            entries.retain(|(t, _)| *t != self.token);
            if entries.is_empty() {
                inner.entries.remove(&self.id);
            }
        }
    }
}
