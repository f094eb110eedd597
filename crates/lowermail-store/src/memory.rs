use crate::collection::{DocumentSource, FlushReport, PendingUpdate, WriteBuffer, WriteFailure};
use crate::error::{Result, StoreError};
use lowermail_core::{Document, DocumentId, FieldValue};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Collection held in memory, ordered by document id.
pub struct MemoryCollection {
    name: String,
    documents: RefCell<BTreeMap<DocumentId, Document>>,
    fetch_requests: Cell<usize>,
    flushes: Cell<usize>,
    fail_on_request: Cell<Option<usize>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RefCell::new(BTreeMap::new()),
            fetch_requests: Cell::new(0),
            flushes: Cell::new(0),
            fail_on_request: Cell::new(None),
        }
    }

    pub fn insert(&self, document: Document) {
        self.documents
            .borrow_mut()
            .insert(document.id.clone(), document);
    }

    pub fn remove(&self, id: &DocumentId) -> Option<Document> {
        self.documents.borrow_mut().remove(id)
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    pub fn fetch_requests(&self) -> usize {
        self.fetch_requests.get()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }

    /// Makes the `request`-th fetch (1-based, counted from creation) fail.
    pub fn fail_on_request(&self, request: usize) {
        self.fail_on_request.set(Some(request));
    }

    pub fn writer(&self) -> MemoryWriter<'_> {
        MemoryWriter {
            collection: self,
            pending: Vec::new(),
        }
    }

    fn apply(&self, update: &PendingUpdate) -> std::result::Result<(), String> {
        let mut documents = self.documents.borrow_mut();
        match documents.get_mut(&update.id) {
            Some(document) => {
                document.set_field(update.field.clone(), update.value.clone());
                Ok(())
            }
            None => Err(format!("document {} no longer exists", update.id)),
        }
    }
}

impl DocumentSource for MemoryCollection {
    fn collection(&self) -> &str {
        &self.name
    }

    fn fetch_page(&self, after: Option<&DocumentId>, limit: usize) -> Result<Vec<Document>> {
        let request = self.fetch_requests.get() + 1;
        self.fetch_requests.set(request);
        if self.fail_on_request.get() == Some(request) {
            return Err(StoreError::Unavailable(format!(
                "fetch request {request} on {} failed",
                self.name
            )));
        }

        let documents = self.documents.borrow();
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        Ok(documents
            .range::<DocumentId, _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, document)| document.clone())
            .collect())
    }
}

pub struct MemoryWriter<'a> {
    collection: &'a MemoryCollection,
    pending: Vec<PendingUpdate>,
}

impl WriteBuffer for MemoryWriter<'_> {
    fn enqueue_update(&mut self, id: &DocumentId, field: &str, value: FieldValue) -> Result<()> {
        self.pending.push(PendingUpdate {
            id: id.clone(),
            field: field.to_string(),
            value,
        });
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn flush(&mut self) -> Result<FlushReport> {
        let collection = self.collection;
        collection.flushes.set(collection.flushes.get() + 1);
        let mut report = FlushReport::default();
        for update in self.pending.drain(..) {
            match collection.apply(&update) {
                Ok(()) => report.committed += 1,
                Err(message) => report.failed.push(WriteFailure {
                    id: update.id,
                    message,
                }),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCollection;
    use crate::collection::{DocumentSource, WriteBuffer};
    use lowermail_core::{Document, DocumentId, FieldValue};

    fn id(value: &str) -> DocumentId {
        DocumentId::new(value).expect("id")
    }

    #[test]
    fn fetch_page_starts_after_cursor() {
        let collection = MemoryCollection::new("users");
        for name in ["c", "a", "b", "d"] {
            collection.insert(Document::new(id(name)));
        }
        let page = collection.fetch_page(Some(&id("b")), 10).expect("page");
        let ids: Vec<&str> = page.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);

        let first = collection.fetch_page(None, 2).expect("page");
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id.as_str(), "a");
    }

    #[test]
    fn writer_applies_updates_on_flush_only() {
        let collection = MemoryCollection::new("users");
        collection.insert(Document::new(id("u1")).with_field("email", "A@B.C"));
        let mut writer = collection.writer();
        writer
            .enqueue_update(&id("u1"), "email", FieldValue::from("a@b.c"))
            .expect("enqueue");
        assert_eq!(writer.pending(), 1);
        assert_eq!(
            collection.get(&id("u1")).and_then(|d| d.field("email").cloned()),
            Some(FieldValue::from("A@B.C"))
        );

        let report = writer.flush().expect("flush");
        assert_eq!(report.committed, 1);
        assert!(report.failed.is_empty());
        assert_eq!(writer.pending(), 0);
        assert_eq!(
            collection.get(&id("u1")).and_then(|d| d.field("email").cloned()),
            Some(FieldValue::from("a@b.c"))
        );
    }

    #[test]
    fn writer_reports_updates_to_removed_documents() {
        let collection = MemoryCollection::new("users");
        collection.insert(Document::new(id("u1")));
        let mut writer = collection.writer();
        writer
            .enqueue_update(&id("u1"), "email", FieldValue::from("a@b.c"))
            .expect("enqueue");
        collection.remove(&id("u1"));

        let report = writer.flush().expect("flush");
        assert_eq!(report.committed, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, id("u1"));
        assert_eq!(writer.pending(), 0);
    }
}
