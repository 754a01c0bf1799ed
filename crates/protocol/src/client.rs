//! Client side of the storage service protocol.
//!
//! Each call opens a fresh connection and performs exactly one exchange, matching the
//! one-exchange-per-connection model of the server.

use crate::dispatch::{status, StorageRequest};
use crate::framing::read_byte;
use crate::messages::{read_message, write_id_field, write_message, TestReportSubmission};
use crate::{ProtocolError, ProtocolResult};
use greenpass_store::UpdateOutcome;
use greenpass_types::{CertificateRecord, HealthCardId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Connects to the storage service at `host:port`.
#[derive(Debug, Clone)]
pub struct StorageClient {
    upstream: String,
}

impl StorageClient {
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    async fn connect(&self) -> ProtocolResult<TcpStream> {
        let stream = TcpStream::connect(self.upstream.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Stores `record`, overwriting any earlier record for the same id.
    pub async fn create(&self, record: &CertificateRecord) -> ProtocolResult<()> {
        let mut stream = self.connect().await?;
        create_over(&mut stream, record).await
    }

    /// Fetches the record for `id`; `None` when the storage service has no record.
    pub async fn fetch(&self, id: &HealthCardId) -> ProtocolResult<Option<CertificateRecord>> {
        let mut stream = self.connect().await?;
        fetch_over(&mut stream, id).await
    }

    /// Applies a test report to an existing record.
    pub async fn update_report(
        &self,
        submission: &TestReportSubmission,
    ) -> ProtocolResult<UpdateOutcome> {
        let mut stream = self.connect().await?;
        update_report_over(&mut stream, submission).await
    }
}

/// Runs a create exchange over an established connection.
pub async fn create_over<S>(stream: &mut S, record: &CertificateRecord) -> ProtocolResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let request = StorageRequest::Create;
    request.write_to(stream).await?;
    write_message(stream, record).await?;

    match read_byte(stream).await? {
        status::CREATED => Ok(()),
        byte => Err(unexpected(request, byte)),
    }
}

pub async fn fetch_over<S>(
    stream: &mut S,
    id: &HealthCardId,
) -> ProtocolResult<Option<CertificateRecord>>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let request = StorageRequest::Fetch;
    request.write_to(stream).await?;
    write_id_field(stream, id).await?;

    match read_byte(stream).await? {
        status::PRESENT => Ok(Some(read_message(stream).await?)),
        status::ABSENT => Ok(None),
        byte => Err(unexpected(request, byte)),
    }
}

pub async fn update_report_over<S>(
    stream: &mut S,
    submission: &TestReportSubmission,
) -> ProtocolResult<UpdateOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let request = StorageRequest::ApplyReport;
    request.write_to(stream).await?;
    write_message(stream, submission).await?;

    match read_byte(stream).await? {
        status::APPLIED => Ok(UpdateOutcome::Updated),
        status::NOT_FOUND => Ok(UpdateOutcome::NotFound),
        byte => Err(unexpected(request, byte)),
    }
}

fn unexpected(request: StorageRequest, byte: u8) -> ProtocolError {
    if byte == status::REJECTED {
        ProtocolError::Rejected {
            request: request.name(),
        }
    } else {
        ProtocolError::UnexpectedStatus {
            request: request.name(),
            byte,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{read_vec, write_byte, write_exactly};
    use greenpass_types::{CalendarDate, TestResult};
    use tokio::io::duplex;

    fn record() -> CertificateRecord {
        CertificateRecord::new(
            HealthCardId::parse("RSSMRA80A01H501U").unwrap(),
            CalendarDate::new(10, 9, 2023),
            CalendarDate::new(10, 1, 2024),
        )
    }

    #[tokio::test]
    async fn test_create_sends_prefix_and_record() {
        let (mut client, mut server) = duplex(256);
        let rec = record();

        let peer = tokio::spawn(async move {
            let sent = read_vec(&mut server, 45).await.unwrap();
            write_byte(&mut server, status::CREATED).await.unwrap();
            sent
        });

        create_over(&mut client, &rec).await.unwrap();
        let sent = peer.await.unwrap();
        assert_eq!(sent[0], b'1');
        assert_eq!(&sent[1..], &rec.to_bytes());
    }

    #[tokio::test]
    async fn test_fetch_present_and_absent() {
        let rec = record();

        let (mut client, mut server) = duplex(256);
        let bytes = rec.to_bytes();
        let peer = tokio::spawn(async move {
            let sent = read_vec(&mut server, 19).await.unwrap();
            write_byte(&mut server, status::PRESENT).await.unwrap();
            write_exactly(&mut server, &bytes).await.unwrap();
            sent
        });
        let fetched = fetch_over(&mut client, &rec.health_card_id).await.unwrap();
        let sent = peer.await.unwrap();
        assert_eq!(&sent[..2], b"01");
        assert_eq!(&sent[2..18], b"RSSMRA80A01H501U");
        assert_eq!(fetched, Some(rec.clone()));

        let (mut client, mut server) = duplex(256);
        let peer = tokio::spawn(async move {
            read_vec(&mut server, 19).await.unwrap();
            write_byte(&mut server, status::ABSENT).await.unwrap();
        });
        assert_eq!(fetch_over(&mut client, &rec.health_card_id).await.unwrap(), None);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_update_report_statuses() {
        let submission = TestReportSubmission {
            health_card_id: record().health_card_id,
            test_result: TestResult::Invalid,
        };

        for (byte, expected) in [
            (status::APPLIED, UpdateOutcome::Updated),
            (status::NOT_FOUND, UpdateOutcome::NotFound),
        ] {
            let (mut client, mut server) = duplex(64);
            let peer = tokio::spawn(async move {
                let sent = read_vec(&mut server, 20).await.unwrap();
                write_byte(&mut server, byte).await.unwrap();
                sent
            });
            let outcome = update_report_over(&mut client, &submission).await.unwrap();
            let sent = peer.await.unwrap();
            assert_eq!(&sent[..2], b"00");
            assert_eq!(sent[19], b'0');
            assert_eq!(outcome, expected);
        }
    }

    #[tokio::test]
    async fn test_rejection_and_unexpected_status() {
        let rec = record();

        let (mut client, mut server) = duplex(256);
        tokio::spawn(async move {
            read_vec(&mut server, 45).await.unwrap();
            write_byte(&mut server, status::REJECTED).await.unwrap();
        });
        assert!(matches!(
            create_over(&mut client, &rec).await,
            Err(ProtocolError::Rejected { request: "create" })
        ));

        let (mut client, mut server) = duplex(256);
        tokio::spawn(async move {
            read_vec(&mut server, 19).await.unwrap();
            write_byte(&mut server, b'?').await.unwrap();
        });
        assert!(matches!(
            fetch_over(&mut client, &rec.health_card_id).await,
            Err(ProtocolError::UnexpectedStatus { byte: b'?', .. })
        ));
    }

    #[tokio::test]
    async fn test_hang_up_is_short_read() {
        let (mut client, mut server) = duplex(256);
        tokio::spawn(async move {
            read_vec(&mut server, 19).await.unwrap();
            write_byte(&mut server, status::PRESENT).await.unwrap();
            write_exactly(&mut server, &[0u8; 10]).await.unwrap();
        });

        assert!(matches!(
            fetch_over(&mut client, &record().health_card_id).await,
            Err(ProtocolError::ShortRead {
                expected: 44,
                received: 10
            })
        ));
    }
}
