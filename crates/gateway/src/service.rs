use greenpass_core::{Clock, ValidityEngine, Verdict};
use greenpass_protocol::framing::read_byte;
use greenpass_protocol::messages::{decode_id_field, is_invalid_id, read_id_field, read_message};
use greenpass_protocol::text::{
    write_text_block, GATEWAY_ACK, GATEWAY_ACK_LEN, GATEWAY_OUTCOME_LEN, GATEWAY_REJECTION,
    GATEWAY_WELCOME, GATEWAY_WELCOME_LEN,
};
use greenpass_protocol::{
    Connection, ConnectionHandler, GatewayRole, ProtocolError, ProtocolResult, ReportOutcome,
    StorageClient, TestReportSubmission, VerificationOutcome,
};
use greenpass_store::UpdateOutcome;
use greenpass_types::HealthCardId;
use std::sync::Arc;

/// Public endpoint for verification and test-report submission.
///
/// Relays every request to the storage service and never keeps a record past the request
/// that fetched it.
#[derive(Debug, Clone)]
pub struct GatewayService {
    storage: StorageClient,
    clock: Arc<dyn Clock>,
    engine: ValidityEngine,
}

impl GatewayService {
    pub fn new(storage: StorageClient, clock: Arc<dyn Clock>, engine: ValidityEngine) -> Self {
        Self {
            storage,
            clock,
            engine,
        }
    }

    async fn verify<S: Connection>(&self, stream: &mut S) -> ProtocolResult<()> {
        write_text_block(stream, GATEWAY_WELCOME, GATEWAY_WELCOME_LEN).await?;
        let field = read_id_field(stream).await?;
        write_text_block(stream, GATEWAY_ACK, GATEWAY_ACK_LEN).await?;

        let outcome = match decode_id_field(&field) {
            Ok(id) => self.check(&id).await,
            Err(e) => {
                tracing::debug!(error = %e, "verification with invalid id");
                VerificationOutcome::NotFound
            }
        };

        write_text_block(stream, outcome.message(), GATEWAY_OUTCOME_LEN).await
    }

    /// Fetches the record for `id` and runs the validity check against today's date.
    pub async fn check(&self, id: &HealthCardId) -> VerificationOutcome {
        let outcome = match self.storage.fetch(id).await {
            Ok(None) => VerificationOutcome::NotFound,
            Ok(Some(record)) => match self.engine.verdict(self.clock.today(), &record) {
                Verdict::Valid => VerificationOutcome::Valid,
                Verdict::Invalid => VerificationOutcome::Invalid,
            },
            Err(e) => {
                tracing::error!(health_card_id = %id, error = %e, "storage fetch failed");
                VerificationOutcome::Unavailable
            }
        };
        tracing::info!(health_card_id = %id, ?outcome, "verification");
        outcome
    }

    async fn report<S: Connection>(&self, stream: &mut S) -> ProtocolResult<()> {
        let outcome = match read_message::<TestReportSubmission, _>(stream).await {
            Ok(submission) => self.forward_report(&submission).await,
            Err(e) if is_invalid_id(&e) => {
                tracing::debug!(error = %e, "report with invalid id");
                ReportOutcome::NotFound
            }
            Err(e @ ProtocolError::InvalidField { .. }) => {
                tracing::warn!(error = %e, "report rejected");
                ReportOutcome::Rejected
            }
            Err(e) => return Err(e),
        };

        write_text_block(stream, outcome.message(), GATEWAY_OUTCOME_LEN).await
    }

    async fn forward_report(&self, submission: &TestReportSubmission) -> ReportOutcome {
        let id = &submission.health_card_id;
        let outcome = match self.storage.update_report(submission).await {
            Ok(UpdateOutcome::Updated) => ReportOutcome::Applied,
            Ok(UpdateOutcome::NotFound) => ReportOutcome::NotFound,
            Err(e) => {
                tracing::error!(health_card_id = %id, error = %e, "storage update failed");
                ReportOutcome::Unavailable
            }
        };
        tracing::info!(
            health_card_id = %id,
            test_result = %submission.test_result,
            ?outcome,
            "test report"
        );
        outcome
    }
}

impl ConnectionHandler for GatewayService {
    const SERVICE: &'static str = "gateway";

    async fn handle<S: Connection>(&self, mut stream: S) -> ProtocolResult<()> {
        let byte = read_byte(&mut stream).await?;
        let role = match GatewayRole::from_byte(byte) {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(role = byte, "unknown gateway role, rejecting");
                write_text_block(&mut stream, GATEWAY_REJECTION, GATEWAY_OUTCOME_LEN).await?;
                return Err(e);
            }
        };
        tracing::debug!(%role, "gateway request");

        match role {
            GatewayRole::Verify => self.verify(&mut stream).await,
            GatewayRole::Report => self.report(&mut stream).await,
        }
    }
}
