//! Delivery of batches to the Zabbix server.

use std::future::Future;
use std::time::Duration;

use alertbridge_config::Config;
use alertbridge_zabbix::{Metric, SendError, Sender};

/// Errors when forwarding a batch.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The Zabbix client failed.
    #[error("failed to send batch to zabbix")]
    Send(#[from] SendError),
    /// The send did not complete within the configured timeout.
    #[error("sending batch to zabbix timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends complete batches to a monitoring backend.
pub trait Forward: Send + Sync + 'static {
    /// Sends the batch in a single request.
    fn send(&self, batch: &[Metric]) -> impl Future<Output = Result<(), ForwardError>> + Send;
}

/// Forwards batches to a Zabbix server with the sender protocol.
#[derive(Clone, Debug)]
pub struct ZabbixForwarder {
    sender: Sender,
    timeout: Option<Duration>,
}

impl ZabbixForwarder {
    /// Creates a forwarder for the given sender.
    ///
    /// Without a `timeout`, a send waits for as long as the server takes to answer.
    pub fn new(sender: Sender, timeout: Option<Duration>) -> Self {
        Self { sender, timeout }
    }

    /// Creates a forwarder for the Zabbix server in the configuration.
    pub fn from_config(config: &Config) -> Self {
        let sender = Sender::new(config.zabbix_server_host(), config.zabbix_server_port());
        Self::new(sender, config.zabbix_send_timeout())
    }
}

impl Forward for ZabbixForwarder {
    async fn send(&self, batch: &[Metric]) -> Result<(), ForwardError> {
        alertbridge_log::info!(
            count = batch.len(),
            "sending to zabbix at {}",
            self.sender.address()
        );

        let send = self.sender.send(batch);
        let response = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| ForwardError::Timeout(timeout))??,
            None => send.await?,
        };

        match response.info() {
            Some(info) if info.failed > 0 => alertbridge_log::warn!(
                processed = info.processed,
                failed = info.failed,
                total = info.total,
                "zabbix server did not accept all values"
            ),
            Some(info) => alertbridge_log::debug!(
                processed = info.processed,
                seconds_spent = info.seconds_spent,
                "zabbix server accepted batch"
            ),
            None => alertbridge_log::debug!(info = %response.info, "zabbix server accepted batch"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alertbridge_zabbix::{HEADER_SIZE, decode_header, encode_frame};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_forward_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0; HEADER_SIZE];
            stream.read_exact(&mut header).await.unwrap();
            let mut payload = vec![0; decode_header(&header).unwrap() as usize];
            stream.read_exact(&mut payload).await.unwrap();

            let response = encode_frame(
                br#"{"response":"success","info":"processed: 0; failed: 1; total: 1; seconds spent: 0.000010"}"#,
            );
            stream.write_all(&response).await.unwrap();
        });

        let forwarder = ZabbixForwarder::new(Sender::new("127.0.0.1", port), None);
        let batch = [Metric::new("web-1", "prometheus.highcpu", "1")];

        // Values rejected by the server are logged, but do not fail the batch.
        assert!(forwarder.send(&batch).await.is_ok());
    }

    #[tokio::test]
    async fn test_forward_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accept the connection, but never answer.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let timeout = Duration::from_millis(50);
        let forwarder = ZabbixForwarder::new(Sender::new("127.0.0.1", port), Some(timeout));
        let batch = [Metric::new("web-1", "prometheus.highcpu", "1")];

        let error = forwarder.send(&batch).await.unwrap_err();
        assert!(matches!(error, ForwardError::Timeout(t) if t == timeout));
        server.abort();
    }

    #[test]
    fn test_from_config() {
        let config = alertbridge_config::Config::from_json_value(serde_json::json!({
            "zabbixServerHost": "zabbix.local",
            "zabbixServerPort": 10052,
            "zabbixSendTimeout": 3,
        }))
        .unwrap();

        let forwarder = ZabbixForwarder::from_config(&config);
        assert_eq!(forwarder.sender.address(), "zabbix.local:10052");
        assert_eq!(forwarder.timeout, Some(Duration::from_secs(3)));
    }
}
