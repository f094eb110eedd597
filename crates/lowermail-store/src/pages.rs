use crate::collection::DocumentSource;
use crate::error::{Result, StoreError};
use lowermail_core::{Document, DocumentId};
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// Lazy cursor scan over a collection, one page per `next`.
///
/// Stops after an empty page or a page shorter than the page size, and
/// yields nothing more once an error has been returned.
pub struct Pages<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    page_size: usize,
    cursor: Option<DocumentId>,
    requests: usize,
    done: bool,
}

impl<'a, S: DocumentSource + ?Sized> Pages<'a, S> {
    pub fn new(source: &'a S, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(StoreError::InvalidPageSize(page_size));
        }
        Ok(Self {
            source,
            page_size,
            cursor: None,
            requests: 0,
            done: false,
        })
    }

    pub fn cursor(&self) -> Option<&DocumentId> {
        self.cursor.as_ref()
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn check_order(&self, page: &[Document]) -> Result<()> {
        let mut previous = self.cursor.as_ref();
        for document in page {
            if let Some(prev) = previous {
                if document.id <= *prev {
                    if prev.is_legacy_numeric() || document.id.is_legacy_numeric() {
                        warn!(
                            previous = %prev,
                            next = %document.id,
                            "legacy numeric id outside byte order"
                        );
                        previous = Some(&document.id);
                        continue;
                    }
                    return Err(StoreError::OutOfOrder {
                        previous: prev.clone(),
                        next: document.id.clone(),
                    });
                }
            }
            previous = Some(&document.id);
        }
        Ok(())
    }
}

impl<S: DocumentSource + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<Vec<Document>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.requests += 1;
        debug!(
            collection = self.source.collection(),
            after = self.cursor.as_ref().map(DocumentId::as_str).unwrap_or(""),
            limit = self.page_size,
            request = self.requests,
            "requesting page"
        );

        let page = match self.source.fetch_page(self.cursor.as_ref(), self.page_size) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if page.is_empty() {
            self.done = true;
            return None;
        }
        if let Err(err) = self.check_order(&page) {
            self.done = true;
            return Some(Err(err));
        }
        if page.len() < self.page_size {
            self.done = true;
        }
        self.cursor = page.last().map(|document| document.id.clone());
        Some(Ok(page))
    }
}

impl<S: DocumentSource + ?Sized> FusedIterator for Pages<'_, S> {}
