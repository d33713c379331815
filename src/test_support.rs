//! Shared unit-test doubles for the transport and storage seams.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::{
    storage::{Storage, StorageError},
    transport::{ConnectionId, Transport, TransportError},
};

/// Transport double recording every initiated send.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    /// Every `(connection, payload)` handed to [`Transport::send`], in order.
    pub sends: Vec<(ConnectionId, Vec<u8>)>,
    /// Error code to return from the next send, consumed once.
    pub fail_next: Option<i32>,
    /// Connections reported as gone.
    pub down: HashSet<ConnectionId>,
}

impl MockTransport {
    pub fn payloads_for(&self, connection: ConnectionId) -> Vec<&[u8]> {
        self.sends
            .iter()
            .filter(|(conn, _)| *conn == connection)
            .map(|(_, payload)| payload.as_slice())
            .collect()
    }

    pub fn mark_down(&mut self, connection: ConnectionId) {
        self.down.insert(connection);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<(), TransportError> {
        self.sends.push((connection, payload.to_vec()));
        match self.fail_next.take() {
            Some(code) => Err(TransportError { code }),
            None => Ok(()),
        }
    }

    fn is_connected(&self, connection: ConnectionId) -> bool {
        !self.down.contains(&connection)
    }
}

/// In-memory storage double.
#[derive(Debug, Default)]
pub(crate) struct MockStorage {
    /// File contents by name.
    pub files: HashMap<String, Vec<u8>>,
    /// Error code to return from every read, when set.
    pub fail_reads: Option<i32>,
}

impl MockStorage {
    pub fn with_file(name: &str, content: impl Into<Vec<u8>>) -> Self {
        let mut storage = Self::default();
        storage.files.insert(name.to_owned(), content.into());
        storage
    }
}

impl Storage for MockStorage {
    fn size(&self, name: &str) -> Result<usize, StorageError> {
        self.files
            .get(name)
            .map(Vec::len)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_owned(),
            })
    }

    fn read(&self, name: &str, offset: usize, len: usize) -> Result<Bytes, StorageError> {
        if let Some(code) = self.fail_reads {
            return Err(StorageError::ReadFailed {
                name: name.to_owned(),
                code,
            });
        }
        let content = self.files.get(name).ok_or_else(|| StorageError::NotFound {
            name: name.to_owned(),
        })?;
        let end = offset.saturating_add(len).min(content.len());
        let start = offset.min(content.len());
        Ok(Bytes::copy_from_slice(&content[start..end]))
    }
}
