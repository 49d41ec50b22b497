use alertbridge_statsd::{CounterMetric, DistributionMetric, GaugeMetric, TimerMetric};

/// Gauge metrics used by alertbridge.
pub enum BridgeGauges {
    /// The number of alerts waiting in the queue after a webhook request has been enqueued.
    ///
    /// If this number stays close to the configured `queueCapacity`, webhook requests are slowed
    /// down by the Zabbix server.
    QueueSize,
}

impl GaugeMetric for BridgeGauges {
    fn name(&self) -> &'static str {
        match self {
            Self::QueueSize => "queue.size",
        }
    }
}

/// Distribution metrics used by alertbridge.
pub enum BridgeDistributions {
    /// The number of values sent to Zabbix in a single batch.
    BatchSize,
}

impl DistributionMetric for BridgeDistributions {
    fn name(&self) -> &'static str {
        match self {
            Self::BatchSize => "batch.size",
        }
    }
}

/// Timer metrics used by alertbridge.
pub enum BridgeTimers {
    /// Total duration of a request to the Zabbix server, including the connection setup.
    ZabbixSendDuration,
    /// Total duration spent handling a HTTP request.
    ///
    /// This metric is tagged with:
    ///  - `route`: The matched route of the request.
    ///  - `method`: The HTTP method of the request.
    RequestsDuration,
}

impl TimerMetric for BridgeTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::ZabbixSendDuration => "zabbix.send.duration",
            Self::RequestsDuration => "requests.duration",
        }
    }
}

/// Counter metrics used by alertbridge.
pub enum BridgeCounters {
    /// Number of alerts received through the webhook.
    AlertsReceived,
    /// Number of alerts that were dropped because no Zabbix host could be resolved.
    AlertsSkipped,
    /// Number of batches sent to the Zabbix server.
    ///
    /// This metric is tagged with:
    ///  - `result`: Either `success` or `failure`.
    ZabbixSend,
    /// Number of webhook requests that were answered with an error.
    ///
    /// This metric is tagged with:
    ///  - `reason`: Either `method` or `body`.
    RequestsRejected,
    /// Number of HTTP requests reaching the server.
    Requests,
    /// Number of completed HTTP requests.
    ///
    /// This metric is tagged with:
    ///  - `status_code`: The HTTP status code number.
    ///  - `route`: The matched route of the request.
    ///  - `method`: The HTTP method of the request.
    ResponsesStatusCodes,
    /// Number of times the HTTP server was started.
    ServerStarting,
}

impl CounterMetric for BridgeCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::AlertsReceived => "alerts.received",
            Self::AlertsSkipped => "alerts.skipped",
            Self::ZabbixSend => "zabbix.send",
            Self::RequestsRejected => "server.requests.rejected",
            Self::Requests => "requests",
            Self::ResponsesStatusCodes => "responses.status_codes",
            Self::ServerStarting => "server.starting",
        }
    }
}
