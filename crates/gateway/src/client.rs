//! Caller side of the gateway exchanges.

use greenpass_protocol::framing::write_byte;
use greenpass_protocol::messages::{write_id_field, write_message};
use greenpass_protocol::text::{
    read_text_block, GATEWAY_ACK_LEN, GATEWAY_OUTCOME_LEN, GATEWAY_WELCOME_LEN,
};
use greenpass_protocol::{GatewayRole, ProtocolResult, TestReportSubmission};
use greenpass_types::HealthCardId;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// The three text blocks of a verification exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReply {
    pub welcome: String,
    pub ack: String,
    pub outcome: String,
}

pub async fn verify_over<S>(stream: &mut S, id: &HealthCardId) -> ProtocolResult<VerificationReply>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    write_byte(stream, GatewayRole::Verify.as_byte()).await?;
    let welcome = read_text_block(stream, GATEWAY_WELCOME_LEN).await?;
    write_id_field(stream, id).await?;
    let ack = read_text_block(stream, GATEWAY_ACK_LEN).await?;
    let outcome = read_text_block(stream, GATEWAY_OUTCOME_LEN).await?;
    Ok(VerificationReply {
        welcome,
        ack,
        outcome,
    })
}

/// Submits a test report and returns the gateway's outcome text.
pub async fn report_over<S>(stream: &mut S, submission: &TestReportSubmission) -> ProtocolResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    write_byte(stream, GatewayRole::Report.as_byte()).await?;
    write_message(stream, submission).await?;
    read_text_block(stream, GATEWAY_OUTCOME_LEN).await
}

pub async fn verify(addr: &str, id: &HealthCardId) -> ProtocolResult<VerificationReply> {
    let mut stream = TcpStream::connect(addr).await?;
    verify_over(&mut stream, id).await
}

pub async fn report(addr: &str, submission: &TestReportSubmission) -> ProtocolResult<String> {
    let mut stream = TcpStream::connect(addr).await?;
    report_over(&mut stream, submission).await
}
