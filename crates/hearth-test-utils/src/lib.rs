//! Test utilities and fixture types for Hearth development.
//!
//! Provides a shared [`CallLog`], a [`Probe`] command with an arbitrary
//! routing name, and the listener fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{RecordingListener, RequeueingListener};

use std::sync::{Arc, Mutex, PoisonError};

use hearth_core::Command;

/// Shared, ordered record of events observed by fixtures.
///
/// Cloning shares the underlying log, so a test can hand one clone to a
/// listener and inspect another.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// A copy of every entry, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// A command whose routing name is chosen by the test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    pub name: String,
    pub tag: u64,
}

impl Probe {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: 0,
        }
    }

    pub fn tagged(name: impl Into<String>, tag: u64) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }
}

impl Command for Probe {
    fn name(&self) -> &str {
        &self.name
    }
}
