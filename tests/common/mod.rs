//! Shared utilities for integration tests.
//!
//! Provides transport and storage doubles that exercise the pipeline through
//! its public collaborator traits, plus a small event-pump helper.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use espress::{ConnectionId, Storage, StorageError, Transport, TransportError};

/// Transport double whose send log is shared with the test body.
///
/// The log lives behind an [`Arc`] so the test can keep a handle while the
/// runtime owns the transport.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>,
    down: Arc<Mutex<HashSet<ConnectionId>>>,
}

impl RecordingTransport {
    /// Handle onto the shared send log.
    #[must_use]
    pub fn log(&self) -> SendLog { SendLog(self.log.clone()) }

    /// Report `connection` as gone from now on.
    pub fn mark_down(&self, connection: ConnectionId) {
        self.down.lock().unwrap().insert(connection);
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<(), TransportError> {
        self.log.lock().unwrap().push((connection, payload.to_vec()));
        Ok(())
    }

    fn is_connected(&self, connection: ConnectionId) -> bool {
        !self.down.lock().unwrap().contains(&connection)
    }
}

/// Read side of a [`RecordingTransport`]'s send log.
#[derive(Debug, Clone)]
pub struct SendLog(Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>);

impl SendLog {
    /// Number of sends initiated so far.
    #[must_use]
    pub fn len(&self) -> usize { self.0.lock().unwrap().len() }

    /// Payloads sent to `connection`, in initiation order.
    #[must_use]
    pub fn payloads_for(&self, connection: ConnectionId) -> Vec<Vec<u8>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(conn, _)| *conn == connection)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

/// In-memory storage backed by a name-to-content map.
#[derive(Debug, Clone, Default)]
pub struct FlashStorage {
    files: HashMap<String, Vec<u8>>,
}

impl FlashStorage {
    /// Storage preloaded with one file.
    #[must_use]
    pub fn with_file(name: &str, content: impl Into<Vec<u8>>) -> Self {
        let mut storage = Self::default();
        storage.files.insert(name.to_owned(), content.into());
        storage
    }
}

impl Storage for FlashStorage {
    fn size(&self, name: &str) -> Result<usize, StorageError> {
        self.files
            .get(name)
            .map(Vec::len)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_owned(),
            })
    }

    fn read(&self, name: &str, offset: usize, len: usize) -> Result<Bytes, StorageError> {
        let content = self.files.get(name).ok_or_else(|| StorageError::NotFound {
            name: name.to_owned(),
        })?;
        let start = offset.min(content.len());
        let end = offset.saturating_add(len).min(content.len());
        Ok(Bytes::copy_from_slice(&content[start..end]))
    }
}
