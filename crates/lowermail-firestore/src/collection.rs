use crate::client::FirestoreClient;
use crate::wire::{self, BatchWriteRequest, BatchWriteResponse};
use lowermail_core::{Document, DocumentId, FieldValue};
use lowermail_store::{
    DocumentSource, FlushReport, PendingUpdate, StoreError, WriteBuffer, WriteFailure,
};
use tracing::debug;

/// Largest number of writes one `batchWrite` call accepts.
pub const MAX_BATCH_WRITES: usize = 500;

pub struct FirestoreCollection<'a> {
    client: &'a FirestoreClient,
    name: String,
}

impl<'a> FirestoreCollection<'a> {
    pub fn new(client: &'a FirestoreClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }
}

impl DocumentSource for FirestoreCollection<'_> {
    fn collection(&self) -> &str {
        &self.name
    }

    fn fetch_page(
        &self,
        after: Option<&DocumentId>,
        limit: usize,
    ) -> lowermail_store::Result<Vec<Document>> {
        let cursor = after.map(|id| self.client.document_name(&self.name, id.as_str()));
        let request = wire::page_query(&self.name, cursor, limit);
        let elements = self.client.run_query(&request).map_err(|err| {
            StoreError::backend(format!("failed to fetch page of {}", self.name), err)
        })?;

        let mut documents = Vec::with_capacity(elements.len());
        for element in elements {
            let Some(wire_document) = element.document else {
                continue;
            };
            let name = wire_document.name.clone();
            let document = wire::decode_document(wire_document)
                .map_err(|err| StoreError::backend(format!("failed to decode {name}"), err))?;
            documents.push(document);
        }
        debug!(collection = %self.name, documents = documents.len(), "page fetched");
        Ok(documents)
    }
}

/// Write buffer that commits through `batchWrite`, in chunks of
/// [`MAX_BATCH_WRITES`].
pub struct BulkWriter<'a> {
    client: &'a FirestoreClient,
    collection: String,
    pending: Vec<PendingUpdate>,
}

impl<'a> BulkWriter<'a> {
    pub fn new(client: &'a FirestoreClient, collection: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            pending: Vec::new(),
        }
    }

    /// One request per [`MAX_BATCH_WRITES`] updates, in queue order.
    fn plan_batches(&self, pending: &[PendingUpdate]) -> Vec<BatchWriteRequest> {
        pending
            .chunks(MAX_BATCH_WRITES)
            .map(|chunk| self.request_for(chunk))
            .collect()
    }

    fn request_for(&self, chunk: &[PendingUpdate]) -> BatchWriteRequest {
        BatchWriteRequest {
            writes: chunk
                .iter()
                .map(|update| {
                    let name = self
                        .client
                        .document_name(&self.collection, update.id.as_str());
                    wire::field_update(name, &update.field, &update.value)
                })
                .collect(),
        }
    }
}

impl WriteBuffer for BulkWriter<'_> {
    fn enqueue_update(
        &mut self,
        id: &DocumentId,
        field: &str,
        value: FieldValue,
    ) -> lowermail_store::Result<()> {
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

    fn flush(&mut self) -> lowermail_store::Result<FlushReport> {
        let pending = std::mem::take(&mut self.pending);
        let mut report = FlushReport::default();
        let batches = self.plan_batches(&pending);
        for (chunk, request) in pending.chunks(MAX_BATCH_WRITES).zip(&batches) {
            debug!(collection = %self.collection, writes = chunk.len(), "committing batch");
            let response = self.client.batch_write(request).map_err(|err| {
                StoreError::backend(
                    format!("failed to commit {} writes to {}", chunk.len(), self.collection),
                    err,
                )
            })?;
            report.merge(outcomes(chunk, &response));
        }
        Ok(report)
    }
}

/// Pairs each write with its status; a missing status counts as success.
fn outcomes(chunk: &[PendingUpdate], response: &BatchWriteResponse) -> FlushReport {
    let mut report = FlushReport::default();
    for (idx, update) in chunk.iter().enumerate() {
        match response.status.get(idx) {
            Some(status) if status.code != 0 => report.failed.push(WriteFailure {
                id: update.id.clone(),
                message: format!("{} (code {})", status.message, status.code),
            }),
            _ => report.committed += 1,
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{outcomes, MAX_BATCH_WRITES};
    use crate::client::FirestoreClient;
    use crate::wire::{BatchWriteResponse, Status};
    use lowermail_config::Connection;
    use lowermail_core::{DocumentId, FieldValue};
    use lowermail_store::{PendingUpdate, WriteBuffer};

    fn update(id: &str) -> PendingUpdate {
        PendingUpdate {
            id: DocumentId::new(id).expect("id"),
            field: "email".to_string(),
            value: FieldValue::from("a@b.c"),
        }
    }

    #[test]
    fn outcomes_split_committed_and_rejected_writes() {
        let chunk = vec![update("u1"), update("u2"), update("u3")];
        let response = BatchWriteResponse {
            write_results: Vec::new(),
            status: vec![
                Status::default(),
                Status {
                    code: 5,
                    message: "No document to update".to_string(),
                },
                Status::default(),
            ],
        };
        let report = outcomes(&chunk, &response);
        assert_eq!(report.committed, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id.as_str(), "u2");
        assert_eq!(report.failed[0].message, "No document to update (code 5)");
    }

    #[test]
    fn outcomes_without_status_count_as_committed() {
        let chunk = vec![update("u1"), update("u2")];
        let report = outcomes(&chunk, &BatchWriteResponse::default());
        assert_eq!(report.committed, 2);
        assert!(report.failed.is_empty());
    }

    fn emulator_client() -> FirestoreClient {
        FirestoreClient::connect(
            &Connection::Emulator {
                project_id: "demo-project".to_string(),
                host: "localhost:8080".to_string(),
            },
            "(default)",
        )
        .expect("client")
    }

    #[test]
    fn large_buffers_are_split_into_batches_of_five_hundred() {
        let client = emulator_client();
        let writer = client.bulk_writer("users");
        let pending: Vec<PendingUpdate> = (0..1001).map(|idx| update(&format!("u{idx}"))).collect();

        let batches = writer.plan_batches(&pending);
        let sizes: Vec<usize> = batches.iter().map(|batch| batch.writes.len()).collect();
        assert_eq!(sizes, vec![MAX_BATCH_WRITES, MAX_BATCH_WRITES, 1]);
        assert_eq!(
            batches[1].writes[0].update.name,
            "projects/demo-project/databases/(default)/documents/users/u500"
        );
        assert_eq!(
            batches[2].writes[0].update.name,
            "projects/demo-project/databases/(default)/documents/users/u1000"
        );
        assert!(writer.plan_batches(&[]).is_empty());
    }

    #[test]
    fn batch_requests_name_documents_in_the_collection() {
        let client = emulator_client();
        let mut writer = client.bulk_writer("users");
        for idx in 0..(MAX_BATCH_WRITES + 1) {
            writer
                .enqueue_update(
                    &DocumentId::new(format!("u{idx}")).expect("id"),
                    "email",
                    FieldValue::from("a@b.c"),
                )
                .expect("enqueue");
        }
        assert_eq!(writer.pending(), MAX_BATCH_WRITES + 1);

        let request = writer.request_for(&writer.pending[..2]);
        assert_eq!(request.writes.len(), 2);
        assert_eq!(
            request.writes[1].update.name,
            "projects/demo-project/databases/(default)/documents/users/u1"
        );
        assert_eq!(request.writes[1].update_mask.field_paths, vec!["email"]);
    }
}
