use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{HEADER_SIZE, HeaderError, Metric, Packet, Response, decode_header};

/// Errors when sending metrics to the Zabbix server.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The connection to the server could not be established.
    #[error("could not connect to zabbix server at {address}")]
    Connect {
        /// The address as `host:port`.
        address: String,
        /// The underlying connection error.
        #[source]
        source: io::Error,
    },
    /// Writing the request or reading the response failed.
    #[error("failed to exchange data with zabbix server")]
    Io(#[from] io::Error),
    /// The packet could not be serialized.
    #[error("failed to serialize packet")]
    Serialize(#[source] serde_json::Error),
    /// The response frame is malformed or unsupported.
    #[error("invalid response frame")]
    InvalidFrame(#[from] HeaderError),
    /// The response payload is not a valid response document.
    #[error("invalid response payload")]
    InvalidResponse(#[source] serde_json::Error),
    /// The server answered, but did not accept the packet.
    #[error("zabbix server rejected the packet: {response} ({info})")]
    Rejected {
        /// The response status sent by the server.
        response: String,
        /// The info string sent by the server.
        info: String,
    },
}

/// Sends batches of metrics to a Zabbix server or proxy.
///
/// Every call to [`send`](Self::send) opens a new TCP connection, which is closed once the
/// response has been read.
#[derive(Clone, Debug)]
pub struct Sender {
    host: String,
    port: u16,
}

impl Sender {
    /// Creates a sender for the server at the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the address of the server as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sends a batch of metrics and returns the server's response.
    ///
    /// The packet is stamped with the current time. Values the server could not process are
    /// reported in the [response info](Response::info) and do not cause an error.
    pub async fn send(&self, metrics: &[Metric]) -> Result<Response, SendError> {
        let packet = Packet::new(metrics, chrono::Utc::now().timestamp());
        let frame = packet.to_frame().map_err(SendError::Serialize)?;

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| SendError::Connect {
                address: self.address(),
                source,
            })?;

        alertbridge_log::trace!(
            address = %self.address(),
            count = metrics.len(),
            "sending packet to zabbix server"
        );

        stream.write_all(&frame).await?;
        stream.flush().await?;

        let response = read_response(&mut stream).await?;
        stream.shutdown().await.ok();

        if !response.is_success() {
            return Err(SendError::Rejected {
                response: response.response,
                info: response.info,
            });
        }

        Ok(response)
    }
}

async fn read_response(stream: &mut TcpStream) -> Result<Response, SendError> {
    let mut header = [0; HEADER_SIZE];
    stream.read_exact(&mut header).await?;
    let length = decode_header(&header)?;

    // `decode_header` caps the length well below `usize::MAX`.
    let mut payload = vec![0; length as usize];
    stream.read_exact(&mut payload).await?;

    serde_json::from_slice(&payload).map_err(SendError::InvalidResponse)
}
