//! Caller side of the issuance exchange.

use greenpass_protocol::messages::write_message;
use greenpass_protocol::text::{read_greeting, read_text_block, ISSUANCE_ACK_LEN};
use greenpass_protocol::{IdentitySubmission, ProtocolResult};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceReply {
    pub greeting: String,
    pub ack: String,
}

pub async fn issue_over<S>(stream: &mut S, submission: &IdentitySubmission) -> ProtocolResult<IssuanceReply>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let greeting = read_greeting(stream).await?;
    write_message(stream, submission).await?;
    let ack = read_text_block(stream, ISSUANCE_ACK_LEN).await?;
    Ok(IssuanceReply { greeting, ack })
}

pub async fn issue(addr: &str, submission: &IdentitySubmission) -> ProtocolResult<IssuanceReply> {
    let mut stream = TcpStream::connect(addr).await?;
    issue_over(&mut stream, submission).await
}
