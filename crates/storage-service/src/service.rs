use greenpass_protocol::dispatch::status;
use greenpass_protocol::framing::{write_byte, write_exactly};
use greenpass_protocol::messages::{
    decode_id_field, is_invalid_id, read_id_field, read_message, read_new_record,
    TestReportSubmission,
};
use greenpass_protocol::{Connection, ConnectionHandler, ProtocolError, ProtocolResult, StorageRequest};
use greenpass_store::{RecordStore, StoreResult, UpdateOutcome};
use std::io;
use std::sync::Arc;

/// Network front of the record store.
///
/// Serves one request per connection. Never caches records: every request goes to the store.
#[derive(Debug, Clone)]
pub struct StorageService {
    store: Arc<dyn RecordStore>,
}

impl StorageService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Runs a blocking store call off the async worker threads.
    async fn with_store<T, F>(&self, op: F) -> ProtocolResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RecordStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| ProtocolError::Io(io::Error::other(e)))?;
        Ok(result?)
    }

    async fn create<S: Connection>(&self, stream: &mut S) -> ProtocolResult<()> {
        // Every creation starts from a valid test result; the incoming flag byte is not read.
        let record = match read_new_record(stream).await {
            Ok(record) => record,
            Err(e @ ProtocolError::InvalidField { .. }) => {
                write_byte(stream, status::REJECTED).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let id = record.health_card_id.clone();

        match self.with_store(move |store| store.create(&record)).await {
            Ok(()) => {
                tracing::info!(health_card_id = %id, "record created");
                write_byte(stream, status::CREATED).await
            }
            Err(e) => {
                write_byte(stream, status::REJECTED).await?;
                Err(e)
            }
        }
    }

    async fn fetch<S: Connection>(&self, stream: &mut S) -> ProtocolResult<()> {
        let field = read_id_field(stream).await?;
        let id = match decode_id_field(&field) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "fetch with invalid id, reporting absent");
                return write_byte(stream, status::ABSENT).await;
            }
        };

        let key = id.clone();
        match self.with_store(move |store| store.fetch(&key)).await {
            Ok(Some(record)) => {
                tracing::debug!(health_card_id = %id, "record fetched");
                let mut reply = Vec::with_capacity(1 + record.to_bytes().len());
                reply.push(status::PRESENT);
                reply.extend_from_slice(&record.to_bytes());
                write_exactly(stream, &reply).await
            }
            Ok(None) => {
                tracing::debug!(health_card_id = %id, "record absent");
                write_byte(stream, status::ABSENT).await
            }
            Err(e) => {
                write_byte(stream, status::REJECTED).await?;
                Err(e)
            }
        }
    }

    async fn apply_report<S: Connection>(&self, stream: &mut S) -> ProtocolResult<()> {
        let submission: TestReportSubmission = match read_message(stream).await {
            Ok(submission) => submission,
            Err(e) if is_invalid_id(&e) => {
                tracing::debug!(error = %e, "report with invalid id, reporting not found");
                return write_byte(stream, status::NOT_FOUND).await;
            }
            Err(e @ ProtocolError::InvalidField { .. }) => {
                write_byte(stream, status::REJECTED).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let TestReportSubmission {
            health_card_id: id,
            test_result,
        } = submission;
        let key = id.clone();
        let outcome = self
            .with_store(move |store| store.update_report(&key, test_result))
            .await;

        match outcome {
            Ok(UpdateOutcome::Updated) => {
                tracing::info!(health_card_id = %id, %test_result, "test report applied");
                write_byte(stream, status::APPLIED).await
            }
            Ok(UpdateOutcome::NotFound) => {
                tracing::info!(health_card_id = %id, "test report for unknown id");
                write_byte(stream, status::NOT_FOUND).await
            }
            Err(e) => {
                write_byte(stream, status::REJECTED).await?;
                Err(e)
            }
        }
    }
}

impl ConnectionHandler for StorageService {
    const SERVICE: &'static str = "storage";

    async fn handle<S: Connection>(&self, mut stream: S) -> ProtocolResult<()> {
        let request = match StorageRequest::read_from(&mut stream).await {
            Ok(request) => request,
            Err(e @ ProtocolError::UnknownDispatch(_)) => {
                write_byte(&mut stream, status::REJECTED).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(%request, "storage request");

        match request {
            StorageRequest::Create => self.create(&mut stream).await,
            StorageRequest::Fetch => self.fetch(&mut stream).await,
            StorageRequest::ApplyReport => self.apply_report(&mut stream).await,
        }
    }
}
