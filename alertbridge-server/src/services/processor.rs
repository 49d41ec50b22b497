//! The processing loop between the alert queue and Zabbix.

use std::time::{Duration, Instant};

use alertbridge_log::LogError;
use alertbridge_statsd::metric;
use alertbridge_system::{Controller, Receiver, Service, TryRecvError};
use alertbridge_zabbix::Metric;

use crate::protocol::Alert;
use crate::services::forwarder::Forward;
use crate::statsd::{BridgeCounters, BridgeDistributions, BridgeTimers};
use crate::translate::{TranslationRules, translate};

/// Service that translates queued alerts and forwards them in batches.
///
/// Alerts are taken from the queue as long as they are immediately available. As soon as the queue
/// is empty, everything collected so far is sent to the forwarder in a single request and the batch
/// is cleared, whether the send succeeded or not. Failed batches are not retried.
///
/// On shutdown, the processor stops accepting alerts, drains the queue and sends the last batch.
#[derive(Debug)]
pub struct AlertProcessor<F> {
    rules: TranslationRules,
    forwarder: F,
    idle_interval: Duration,
    batch: Vec<Metric>,
}

impl<F: Forward> AlertProcessor<F> {
    /// Creates a new processor.
    ///
    /// `idle_interval` bounds how long the processor waits on an empty queue before checking it
    /// again.
    pub fn new(rules: TranslationRules, forwarder: F, idle_interval: Duration) -> Self {
        Self {
            rules,
            forwarder,
            idle_interval,
            batch: Vec::new(),
        }
    }

    fn handle_alert(&mut self, alert: Alert) {
        let Some(metric) = translate(&alert, &self.rules) else {
            alertbridge_log::debug!(
                alertname = alert.name().unwrap_or_default(),
                "skipping alert without zabbix host"
            );
            metric!(counter(BridgeCounters::AlertsSkipped) += 1);
            return;
        };

        alertbridge_log::info!(
            host = %metric.host,
            key = %metric.key,
            value = %metric.value,
            "added zabbix metric"
        );

        let clock = chrono::Utc::now().timestamp();
        self.batch.push(metric.with_clock(clock));
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        metric!(distribution(BridgeDistributions::BatchSize) = batch.len() as u64);

        let start = Instant::now();
        let result = self.forwarder.send(&batch).await;
        metric!(timer(BridgeTimers::ZabbixSendDuration) = start.elapsed());

        match result {
            Ok(()) => {
                alertbridge_log::info!(count = batch.len(), "successfully sent");
                metric!(counter(BridgeCounters::ZabbixSend) += 1, result = "success");
            }
            Err(error) => {
                alertbridge_log::error!(
                    count = batch.len(),
                    "dropping batch: {}",
                    LogError(&error)
                );
                metric!(counter(BridgeCounters::ZabbixSend) += 1, result = "failure");
            }
        }
    }
}

impl<F: Forward> Service for AlertProcessor<F> {
    type Interface = Alert;

    async fn run(mut self, mut rx: Receiver<Self::Interface>) {
        let mut shutdown = Controller::shutdown_handle();
        let mut closing = false;

        alertbridge_log::info!("alerts queue started");

        loop {
            match rx.try_recv() {
                Ok(alert) => self.handle_alert(alert),
                Err(TryRecvError::Empty) if !self.batch.is_empty() => self.flush().await,
                Err(TryRecvError::Empty) => {
                    tokio::select! {
                        biased;

                        alert = rx.recv() => match alert {
                            Some(alert) => self.handle_alert(alert),
                            None => break,
                        },
                        _ = shutdown.notified(), if !closing => {
                            alertbridge_log::info!("draining alerts queue");
                            closing = true;
                            rx.close();
                        }
                        _ = tokio::time::sleep(self.idle_interval) => (),
                    }
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }

        self.flush().await;
        alertbridge_log::info!("alerts queue closed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use alertbridge_system::channel;
    use tokio::sync::mpsc;

    use super::*;
    use crate::services::forwarder::ForwardError;

    /// Records every batch and optionally fails the send.
    struct TestForwarder {
        batches: mpsc::UnboundedSender<Vec<Metric>>,
        fail: bool,
    }

    impl Forward for TestForwarder {
        async fn send(&self, batch: &[Metric]) -> Result<(), ForwardError> {
            self.batches.send(batch.to_vec()).ok();
            match self.fail {
                true => Err(ForwardError::Timeout(Duration::from_secs(1))),
                false => Ok(()),
            }
        }
    }

    fn processor(
        fail: bool,
    ) -> (
        AlertProcessor<TestForwarder>,
        mpsc::UnboundedReceiver<Vec<Metric>>,
    ) {
        let (batches, rx) = mpsc::unbounded_channel();
        let rules = TranslationRules {
            host_annotation: "zabbix_host".to_owned(),
            default_host: String::new(),
            key_prefix: "prometheus".to_owned(),
        };

        let forwarder = TestForwarder { batches, fail };
        (
            AlertProcessor::new(rules, forwarder, Duration::from_millis(10)),
            rx,
        )
    }

    fn alert(name: &str, host: Option<&str>) -> Alert {
        Alert {
            status: "firing".to_owned(),
            labels: BTreeMap::from([("alertname".to_owned(), name.to_owned())]),
            annotations: host
                .map(|host| BTreeMap::from([("zabbix_host".to_owned(), host.to_owned())]))
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    fn keys(batch: &[Metric]) -> Vec<&str> {
        batch.iter().map(|metric| metric.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_queued_alerts_form_one_batch() {
        alertbridge_log::init_test!();

        let (processor, mut batches) = processor(false);
        let (addr, rx) = channel("test", 10);

        for name in ["DiskFull", "HighCPU", "NodeDown"] {
            addr.send(alert(name, Some("db01"))).await.unwrap();
        }
        drop(addr);

        processor.run(rx).await;

        let batch = batches.recv().await.unwrap();
        assert_eq!(
            keys(&batch),
            [
                "prometheus.diskfull",
                "prometheus.highcpu",
                "prometheus.nodedown"
            ]
        );
        assert!(batch.iter().all(|metric| metric.clock.is_some()));
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_record() {
        let (processor, mut batches) = processor(false);
        let (addr, rx) = channel("test", 10);

        addr.send(alert("DiskFull", Some("db01"))).await.unwrap();
        drop(addr);
        processor.run(rx).await;

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].host, "db01");
        assert_eq!(batch[0].key, "prometheus.diskfull");
        assert_eq!(batch[0].value, "1");
    }

    #[tokio::test]
    async fn test_skipped_alerts_are_not_sent() {
        let (processor, mut batches) = processor(false);
        let (addr, rx) = channel("test", 10);

        addr.send(alert("HighCPU", None)).await.unwrap();
        addr.send(alert("HighCPU", Some(""))).await.unwrap();
        drop(addr);

        processor.run(rx).await;
        assert!(batches.recv().await.is_none());
    }

    #[test]
    fn test_skipped_alert_metric() {
        let (mut processor, _batches) = processor(false);

        let captures = alertbridge_statsd::with_capturing_test_client(|| {
            processor.handle_alert(alert("HighCPU", None));
        });

        assert!(processor.batch.is_empty());
        assert_eq!(captures, ["alerts.skipped:1|c"]);
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped() {
        let (processor, mut batches) = processor(true);
        let (addr, rx) = channel("test", 10);

        addr.send(alert("DiskFull", Some("db01"))).await.unwrap();
        addr.send(alert("HighCPU", Some("web-1"))).await.unwrap();

        let handle = tokio::spawn(processor.run(rx));

        let first = batches.recv().await.unwrap();
        assert_eq!(keys(&first), ["prometheus.diskfull", "prometheus.highcpu"]);

        // The loop keeps running after a failed send and starts with an empty batch.
        addr.send(alert("NodeDown", Some("web-2"))).await.unwrap();
        let second = batches.recv().await.unwrap();
        assert_eq!(keys(&second), ["prometheus.nodedown"]);

        drop(addr);
        handle.await.unwrap();
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_batches_after_idle() {
        let (processor, mut batches) = processor(false);
        let (addr, rx) = channel("test", 10);
        let handle = tokio::spawn(processor.run(rx));

        addr.send(alert("DiskFull", Some("db01"))).await.unwrap();
        assert_eq!(keys(&batches.recv().await.unwrap()), ["prometheus.diskfull"]);

        tokio::time::sleep(Duration::from_millis(30)).await;

        addr.send(alert("HighCPU", Some("web-1"))).await.unwrap();
        assert_eq!(keys(&batches.recv().await.unwrap()), ["prometheus.highcpu"]);

        drop(addr);
        handle.await.unwrap();
    }

    #[test]
    fn test_flush_metrics() {
        let (mut processor, _batches) = processor(true);
        processor.handle_alert(alert("DiskFull", Some("db01")));
        processor.handle_alert(alert("HighCPU", None));

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let captures = alertbridge_statsd::with_capturing_test_client(|| {
            rt.block_on(processor.flush());
        });

        assert!(processor.batch.is_empty());
        assert_eq!(captures[0], "batch.size:1|d");
        assert!(captures[1].starts_with("zabbix.send.duration:"));
        assert_eq!(captures[2], "zabbix.send:1|c|#result:failure");
    }
}
