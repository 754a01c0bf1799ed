use greenpass_core::{Clock, ValidityEngine};
use greenpass_protocol::messages::{is_invalid_id, is_invalid_name, read_message};
use greenpass_protocol::text::{
    write_greeting, write_text_block, ISSUANCE_ACK_LEN, ISSUANCE_GREETING,
};
use greenpass_protocol::{
    Connection, ConnectionHandler, IdentitySubmission, IssuanceAck, ProtocolResult, StorageClient,
};
use greenpass_types::CertificateRecord;
use std::sync::Arc;

/// Issues green passes: computes the dates and hands a new record to the storage service.
#[derive(Debug, Clone)]
pub struct IssuanceService {
    storage: StorageClient,
    clock: Arc<dyn Clock>,
    engine: ValidityEngine,
}

impl IssuanceService {
    pub fn new(storage: StorageClient, clock: Arc<dyn Clock>, engine: ValidityEngine) -> Self {
        Self {
            storage,
            clock,
            engine,
        }
    }

    /// Builds the record a submission issued today would create.
    pub fn record_for(&self, submission: &IdentitySubmission) -> CertificateRecord {
        let today = self.clock.today();
        CertificateRecord::new(
            submission.health_card_id.clone(),
            self.engine.issuance(today),
            self.engine.expiry(today),
        )
    }

    /// Stores a new record for `submission`. The record is in the store before this returns
    /// [`IssuanceAck::Issued`].
    pub async fn issue(&self, submission: &IdentitySubmission) -> IssuanceAck {
        let record = self.record_for(submission);
        tracing::debug!(
            name = %submission.name,
            surname = %submission.surname,
            "identity submitted"
        );

        match self.storage.create(&record).await {
            Ok(()) => {
                tracing::info!(
                    health_card_id = %record.health_card_id,
                    issued_on = %record.issued_on,
                    expires_on = %record.expires_on,
                    "green pass issued"
                );
                IssuanceAck::Issued {
                    expires_on: record.expires_on.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(
                    health_card_id = %record.health_card_id,
                    error = %e,
                    "storage create failed"
                );
                IssuanceAck::Failed
            }
        }
    }
}

impl ConnectionHandler for IssuanceService {
    const SERVICE: &'static str = "issuance";

    async fn handle<S: Connection>(&self, mut stream: S) -> ProtocolResult<()> {
        write_greeting(&mut stream, ISSUANCE_GREETING).await?;

        let ack = match read_message::<IdentitySubmission, _>(&mut stream).await {
            Ok(submission) => self.issue(&submission).await,
            Err(e) if is_invalid_id(&e) => {
                tracing::info!(error = %e, "identity with invalid health card id");
                IssuanceAck::InvalidId
            }
            Err(e) if is_invalid_name(&e) => {
                tracing::info!(error = %e, "identity with invalid name");
                IssuanceAck::InvalidName
            }
            Err(e) => return Err(e),
        };

        write_text_block(&mut stream, &ack.message(), ISSUANCE_ACK_LEN).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::issue_over;
    use gateway::client::verify;
    use gateway::GatewayService;
    use greenpass_core::{FixedClock, ValidityRules};
    use greenpass_protocol::framing::{read_vec, write_exactly};
    use greenpass_protocol::messages::FixedLayout;
    use greenpass_protocol::text::{decode_text, read_greeting};
    use greenpass_protocol::{serve, shutdown_channel, ShutdownTrigger, VerificationOutcome};
    use greenpass_store::{InMemoryRecordStore, RecordStore};
    use greenpass_types::{CalendarDate, HealthCardId, PersonName, TestResult};
    use std::time::Duration;
    use storage_service::StorageService;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    struct Stack {
        storage_addr: String,
        gateway_addr: String,
        store: Arc<InMemoryRecordStore>,
        _triggers: Vec<ShutdownTrigger>,
    }

    /// Storage service and gateway on loopback, sharing one in-memory store.
    async fn start_stack(today: CalendarDate) -> Stack {
        start_stack_with_rules(today, ValidityRules::Legacy).await
    }

    async fn start_stack_with_rules(today: CalendarDate, rules: ValidityRules) -> Stack {
        let store = Arc::new(InMemoryRecordStore::new());
        let drain = Duration::from_millis(100);

        let storage_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let storage_addr = storage_listener.local_addr().unwrap().to_string();
        let (storage_trigger, token) = shutdown_channel();
        tokio::spawn(serve(
            storage_listener,
            Arc::new(StorageService::new(store.clone())),
            token,
            drain,
        ));

        let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let gateway_addr = gateway_listener.local_addr().unwrap().to_string();
        let (gateway_trigger, token) = shutdown_channel();
        let gateway = GatewayService::new(
            StorageClient::new(storage_addr.clone()),
            Arc::new(FixedClock(today)),
            ValidityEngine::new(rules),
        );
        tokio::spawn(serve(gateway_listener, Arc::new(gateway), token, drain));

        Stack {
            storage_addr,
            gateway_addr,
            store,
            _triggers: vec![storage_trigger, gateway_trigger],
        }
    }

    fn issuance(storage_addr: &str, today: CalendarDate) -> IssuanceService {
        issuance_with_rules(storage_addr, today, ValidityRules::Legacy)
    }

    fn issuance_with_rules(
        storage_addr: &str,
        today: CalendarDate,
        rules: ValidityRules,
    ) -> IssuanceService {
        IssuanceService::new(
            StorageClient::new(storage_addr),
            Arc::new(FixedClock(today)),
            ValidityEngine::new(rules),
        )
    }

    fn submission() -> IdentitySubmission {
        IdentitySubmission {
            name: PersonName::parse("Mario").unwrap(),
            surname: PersonName::parse("Rossi").unwrap(),
            health_card_id: HealthCardId::parse("RSSMRA80A01H501U").unwrap(),
        }
    }

    async fn issue(service: &IssuanceService, submission: &IdentitySubmission) -> crate::client::IssuanceReply {
        let (mut client, server) = duplex(4096);
        let service = service.clone();
        let worker = tokio::spawn(async move { service.handle(server).await });
        let reply = issue_over(&mut client, submission).await.unwrap();
        worker.await.unwrap().unwrap();
        reply
    }

    #[tokio::test]
    async fn test_issue_in_september_expires_in_january() {
        let today = CalendarDate::new(10, 9, 2023);
        let stack = start_stack(today).await;
        let service = issuance(&stack.storage_addr, today);

        let reply = issue(&service, &submission()).await;

        assert_eq!(reply.greeting, ISSUANCE_GREETING);
        assert_eq!(
            IssuanceAck::from_message(&reply.ack),
            Some(IssuanceAck::Issued {
                expires_on: "10/01/2024".into()
            })
        );
        let stored = stack
            .store
            .fetch(&submission().health_card_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.issued_on, CalendarDate::new(10, 9, 2023));
        assert_eq!(stored.expires_on, CalendarDate::new(10, 1, 2024));
        assert_eq!(stored.test_result, TestResult::Valid);
        assert_eq!(stored.to_bytes()[17], b'1');
    }

    #[tokio::test]
    async fn test_issue_then_verify_is_valid() {
        let today = CalendarDate::new(1, 3, 2023);
        let stack = start_stack(today).await;
        let service = issuance(&stack.storage_addr, today);

        let reply = issue(&service, &submission()).await;
        assert!(IssuanceAck::from_message(&reply.ack).is_some_and(|ack| ack.is_issued()));

        let verification = verify(&stack.gateway_addr, &submission().health_card_id)
            .await
            .unwrap();
        assert_eq!(
            verification.outcome,
            VerificationOutcome::Valid.message()
        );
    }

    #[tokio::test]
    async fn test_autumn_issue_then_verify_depends_on_rules() {
        // Legacy rules compare month fields independently: 9 > 1 makes a September pass
        // expiring in January read as not valid on the day it is issued.
        let today = CalendarDate::new(10, 9, 2023);

        let legacy = start_stack_with_rules(today, ValidityRules::Legacy).await;
        let service = issuance_with_rules(&legacy.storage_addr, today, ValidityRules::Legacy);
        let reply = issue(&service, &submission()).await;
        assert!(IssuanceAck::from_message(&reply.ack).is_some_and(|ack| ack.is_issued()));
        let verification = verify(&legacy.gateway_addr, &submission().health_card_id)
            .await
            .unwrap();
        assert_eq!(verification.outcome, VerificationOutcome::Invalid.message());

        let calendar = start_stack_with_rules(today, ValidityRules::Calendar).await;
        let service = issuance_with_rules(&calendar.storage_addr, today, ValidityRules::Calendar);
        let reply = issue(&service, &submission()).await;
        assert_eq!(
            IssuanceAck::from_message(&reply.ack),
            Some(IssuanceAck::Issued {
                expires_on: "10/01/2024".into()
            })
        );
        let verification = verify(&calendar.gateway_addr, &submission().health_card_id)
            .await
            .unwrap();
        assert_eq!(verification.outcome, VerificationOutcome::Valid.message());
    }

    #[tokio::test]
    async fn test_reissue_overwrites_reported_record() {
        let today = CalendarDate::new(1, 3, 2023);
        let stack = start_stack(today).await;
        let service = issuance(&stack.storage_addr, today);
        issue(&service, &submission()).await;
        stack
            .store
            .update_report(&submission().health_card_id, TestResult::Invalid)
            .unwrap();

        issue(&service, &submission()).await;

        let stored = stack
            .store
            .fetch(&submission().health_card_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.test_result, TestResult::Valid);
        assert_eq!(stack.store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_id_is_acknowledged_as_failure() {
        let today = CalendarDate::new(1, 3, 2023);
        let stack = start_stack(today).await;
        let service = issuance(&stack.storage_addr, today);

        let mut bytes = submission().encode();
        bytes[2048..2065].copy_from_slice(b"short\0\0\0\0\0\0\0\0\0\0\0\0");

        let (mut client, server) = duplex(4096);
        let worker = tokio::spawn(async move { service.handle(server).await });
        read_greeting(&mut client).await.unwrap();
        write_exactly(&mut client, &bytes).await.unwrap();
        let ack = decode_text(&read_vec(&mut client, ISSUANCE_ACK_LEN).await.unwrap());
        worker.await.unwrap().unwrap();

        assert_eq!(IssuanceAck::from_message(&ack), Some(IssuanceAck::InvalidId));
        assert!(stack.store.is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_is_acknowledged_as_failure() {
        let today = CalendarDate::new(1, 3, 2023);
        let stack = start_stack(today).await;
        let service = issuance(&stack.storage_addr, today);

        let mut bytes = submission().encode();
        bytes[..5].copy_from_slice(b"     ");

        let (mut client, server) = duplex(4096);
        let worker = tokio::spawn(async move { service.handle(server).await });
        read_greeting(&mut client).await.unwrap();
        write_exactly(&mut client, &bytes).await.unwrap();
        let ack = decode_text(&read_vec(&mut client, ISSUANCE_ACK_LEN).await.unwrap());
        worker.await.unwrap().unwrap();

        assert_eq!(IssuanceAck::from_message(&ack), Some(IssuanceAck::InvalidName));
        assert!(stack.store.is_empty());
    }

    #[tokio::test]
    async fn test_storage_down_is_acknowledged_as_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let service = issuance(&addr, CalendarDate::new(1, 3, 2023));

        let reply = issue(&service, &submission()).await;

        assert_eq!(IssuanceAck::from_message(&reply.ack), Some(IssuanceAck::Failed));
    }

    #[test]
    fn test_record_for_uses_engine_rules() {
        let today = CalendarDate::new(31, 10, 2023);
        let legacy = issuance("127.0.0.1:1", today);
        let record = legacy.record_for(&submission());
        assert_eq!(record.expires_on, CalendarDate::new(31, 2, 2024));

        let calendar = IssuanceService::new(
            StorageClient::new("127.0.0.1:1"),
            Arc::new(FixedClock(today)),
            ValidityEngine::new(ValidityRules::Calendar),
        );
        let record = calendar.record_for(&submission());
        assert_eq!(record.expires_on, CalendarDate::new(29, 2, 2024));
    }
}
