use crate::error::Result;
use lowermail_core::{Document, DocumentId, FieldValue};

/// Read side of a collection: ordered pages with "start after" cursoring.
pub trait DocumentSource {
    fn collection(&self) -> &str;

    /// Returns up to `limit` documents with ids strictly greater than `after`,
    /// ascending by id. `None` starts from the beginning of the collection.
    fn fetch_page(&self, after: Option<&DocumentId>, limit: usize) -> Result<Vec<Document>>;
}

/// Deferred write side: updates are held until `flush`.
pub trait WriteBuffer {
    fn enqueue_update(&mut self, id: &DocumentId, field: &str, value: FieldValue) -> Result<()>;

    fn pending(&self) -> usize;

    /// Submits every queued update. The buffer is empty afterwards whatever
    /// the outcome. Individual rejected writes are reported in the
    /// [`FlushReport`]; an `Err` means the submission itself failed.
    fn flush(&mut self) -> Result<FlushReport>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub id: DocumentId,
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub committed: usize,
    pub failed: Vec<WriteFailure>,
}

impl FlushReport {
    pub fn merge(&mut self, other: FlushReport) {
        self.committed += other.committed;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub id: DocumentId,
    pub message: String,
}
