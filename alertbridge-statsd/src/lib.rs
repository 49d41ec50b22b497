//! Internal metrics of alertbridge, reported to a StatsD server.
//!
//! Every metric is named by an enum implementing one of [`CounterMetric`], [`GaugeMetric`],
//! [`DistributionMetric`] or [`TimerMetric`]. The trait decides which kind of value a name can
//! be used with, so a counter name cannot be reported as a gauge by accident.
//!
//! Values are recorded with the [`metric!`] macro. Until [`init`] or [`set_client`] has been
//! called, recording a metric does nothing:
//!
//! ```
//! use alertbridge_statsd::{CounterMetric, metric};
//!
//! enum QueueCounters {
//!     Dropped,
//! }
//!
//! impl CounterMetric for QueueCounters {
//!     fn name(&self) -> &'static str {
//!         match self {
//!             Self::Dropped => "queue.dropped",
//!         }
//!     }
//! }
//!
//! metric!(counter(QueueCounters::Dropped) += 1, reason = "full");
//! ```
//!
//! Reporting to a real server:
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use alertbridge_statsd::MetricsConfig;
//!
//! alertbridge_statsd::init(MetricsConfig {
//!     prefix: "alertbridge",
//!     host: "127.0.0.1:8125",
//!     default_tags: BTreeMap::from([("env".to_owned(), "prod".to_owned())]),
//! })
//! .ok();
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::net::UdpSocket;
use std::sync::Arc;

use cadence::{
    BufferedUdpMetricSink, Metric, MetricBuilder, MetricError, QueuingMetricSink, StatsdClient,
};
use parking_lot::RwLock;

/// Metrics waiting for the UDP socket beyond this number are dropped.
const QUEUE_CAPACITY: usize = 100_000;

/// The client all metrics are reported through.
#[derive(Debug)]
pub struct MetricsClient {
    statsd: StatsdClient,
    default_tags: BTreeMap<String, String>,
}

impl MetricsClient {
    /// Wraps a cadence client and attaches `default_tags` to every metric it sends.
    pub fn new(statsd: StatsdClient, default_tags: BTreeMap<String, String>) -> Self {
        Self {
            statsd,
            default_tags,
        }
    }

    /// The underlying cadence client, used by [`metric!`] to build metrics.
    #[doc(hidden)]
    pub fn statsd(&self) -> &StatsdClient {
        &self.statsd
    }

    /// Adds the default tags and sends the metric.
    ///
    /// Failures are logged and otherwise ignored.
    #[doc(hidden)]
    pub fn send<'a, T>(&'a self, builder: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        let builder = self
            .default_tags
            .iter()
            .fold(builder, |builder, (key, value)| builder.with_tag(key, value));

        if let Err(error) = builder.try_send() {
            alertbridge_log::error!(
                queue_capacity = QUEUE_CAPACITY,
                "failed to report metric: {error}"
            );
        }
    }
}

/// Settings for [`init`].
#[derive(Debug)]
pub struct MetricsConfig<'a> {
    /// Prefix of all metric names, without the trailing dot.
    pub prefix: &'a str,
    /// Address of the StatsD server as `host:port`.
    pub host: &'a str,
    /// Tags attached to every metric.
    pub default_tags: BTreeMap<String, String>,
}

static GLOBAL_CLIENT: RwLock<Option<Arc<MetricsClient>>> = RwLock::new(None);

thread_local! {
    // Threads pick up the global client on first use. Tests swap it for a capturing one.
    static THREAD_CLIENT: RefCell<Option<Arc<MetricsClient>>> = RefCell::new(GLOBAL_CLIENT.read().clone());
}

#[doc(hidden)]
pub mod _pred {
    pub use cadence::prelude::*;
}

/// Installs `client` for all threads.
pub fn set_client(client: MetricsClient) {
    let client = Arc::new(client);
    *GLOBAL_CLIENT.write() = Some(client.clone());
    THREAD_CLIENT.with(|cell| cell.replace(Some(client)));
}

/// Reports metrics over UDP to the StatsD server in `config`.
///
/// Metrics are queued and written by a background thread, so recording a metric never blocks.
pub fn init(config: MetricsConfig<'_>) -> Result<(), MetricError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;

    let sink = BufferedUdpMetricSink::from(config.host, socket)?;
    let sink = QueuingMetricSink::with_capacity(sink, QUEUE_CAPACITY);

    alertbridge_log::info!("reporting metrics to statsd at {}", config.host);
    set_client(MetricsClient::new(
        StatsdClient::from_sink(config.prefix, sink),
        config.default_tags,
    ));

    Ok(())
}

/// Runs `f` with the client of the current thread.
///
/// Returns the default of `R` without calling `f` if metrics are not reported.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    THREAD_CLIENT.with(|cell| match cell.borrow().as_deref() {
        Some(client) => f(client),
        None => R::default(),
    })
}

/// Records all metrics reported by `f` on the current thread and returns them as StatsD lines.
#[doc(hidden)]
pub fn with_capturing_test_client(f: impl FnOnce()) -> Vec<String> {
    let (lines, sink) = cadence::SpyMetricSink::new();
    let client = MetricsClient::new(StatsdClient::from_sink("", sink), BTreeMap::new());

    THREAD_CLIENT.with(|cell| {
        let previous = cell.replace(Some(Arc::new(client)));
        f();
        cell.replace(previous);
    });

    lines
        .try_iter()
        .map(|line| String::from_utf8_lossy(&line).into_owned())
        .collect()
}

/// Name of a duration, reported in milliseconds.
pub trait TimerMetric {
    /// The metric name without prefix.
    fn name(&self) -> &'static str;
}

/// Name of a counter. The server aggregates increments into rates.
pub trait CounterMetric {
    /// The metric name without prefix.
    fn name(&self) -> &'static str;
}

/// Name of a distribution of arbitrary values, such as batch sizes.
pub trait DistributionMetric {
    /// The metric name without prefix.
    fn name(&self) -> &'static str;
}

/// Name of a gauge, which holds the last value that was set.
pub trait GaugeMetric {
    /// The metric name without prefix.
    fn name(&self) -> &'static str;
}

/// Records a metric with optional tags.
///
/// ```ignore
/// metric!(counter(Counters::Foo) += 1, result = "success");
/// metric!(gauge(Gauges::Foo) = 12);
/// metric!(distribution(Distributions::Foo) = 4);
/// metric!(timer(Timers::Foo) = start.elapsed());
/// ```
///
/// Counter increments of zero are not sent.
#[macro_export]
macro_rules! metric {
    (counter($id:expr) += $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        match $value {
            0 => (),
            value => $crate::with_client(|client| {
                use $crate::_pred::*;
                client.send(
                    client
                        .statsd()
                        .count_with_tags($crate::CounterMetric::name(&$id), value)
                        $(.with_tag(stringify!($($k).*), $v))*,
                )
            }),
        }
    };

    (gauge($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        $crate::with_client(|client| {
            use $crate::_pred::*;
            client.send(
                client
                    .statsd()
                    .gauge_with_tags($crate::GaugeMetric::name(&$id), $value)
                    $(.with_tag(stringify!($($k).*), $v))*,
            )
        })
    };

    (distribution($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        $crate::with_client(|client| {
            use $crate::_pred::*;
            client.send(
                client
                    .statsd()
                    .distribution_with_tags($crate::DistributionMetric::name(&$id), $value)
                    $(.with_tag(stringify!($($k).*), $v))*,
            )
        })
    };

    // Durations are sent as distributions in milliseconds.
    (timer($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        $crate::with_client(|client| {
            use $crate::_pred::*;
            let millis = ::std::time::Duration::as_secs_f64(&$value) * 1000.0;
            client.send(
                client
                    .statsd()
                    .distribution_with_tags($crate::TimerMetric::name(&$id), millis)
                    $(.with_tag(stringify!($($k).*), $v))*,
            )
        })
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence::{Counted, NopMetricSink};

    use super::*;

    enum QueueGauges {
        Size,
    }

    impl GaugeMetric for QueueGauges {
        fn name(&self) -> &'static str {
            match self {
                Self::Size => "queue.size",
            }
        }
    }

    struct Received;

    impl CounterMetric for Received {
        fn name(&self) -> &'static str {
            "alerts.received"
        }
    }

    struct BatchSize;

    impl DistributionMetric for BatchSize {
        fn name(&self) -> &'static str {
            "batch.size"
        }
    }

    struct SendDuration;

    impl TimerMetric for SendDuration {
        fn name(&self) -> &'static str {
            "send.duration"
        }
    }

    #[test]
    fn test_gauge_with_tags() {
        let captures = with_capturing_test_client(|| {
            metric!(gauge(QueueGauges::Size) = 12, queue = "alerts");
            metric!(gauge(QueueGauges::Size) = 0);
        });

        assert_eq!(captures, ["queue.size:12|g|#queue:alerts", "queue.size:0|g"]);
    }

    #[test]
    fn test_counter_skips_zero() {
        let captures = with_capturing_test_client(|| {
            metric!(counter(Received) += 3, source = "webhook");
            metric!(counter(Received) += 0, source = "webhook");
        });

        assert_eq!(captures, ["alerts.received:3|c|#source:webhook"]);
    }

    #[test]
    fn test_distribution() {
        let captures = with_capturing_test_client(|| {
            metric!(distribution(BatchSize) = 25);
        });

        assert_eq!(captures, ["batch.size:25|d"]);
    }

    #[test]
    fn test_timer_in_milliseconds() {
        let captures = with_capturing_test_client(|| {
            metric!(timer(SendDuration) = Duration::from_millis(1500), result = "success");
        });

        assert_eq!(captures, ["send.duration:1500|d|#result:success"]);
    }

    #[test]
    fn test_default_tags() {
        let (lines, sink) = cadence::SpyMetricSink::new();
        let client = MetricsClient::new(
            StatsdClient::from_sink("alertbridge", sink),
            BTreeMap::from([("env".to_owned(), "test".to_owned())]),
        );

        client.send(client.statsd().count_with_tags("alerts.received", 1));

        let line = lines.try_recv().unwrap();
        assert_eq!(line, b"alertbridge.alerts.received:1|c|#env:test");
    }

    #[test]
    fn test_set_client_replaces_thread_client() {
        std::thread::spawn(|| {
            assert!(!with_client(|_| true));

            set_client(MetricsClient::new(
                StatsdClient::from_sink("", NopMetricSink),
                BTreeMap::new(),
            ));
            assert!(with_client(|_| true));
        })
        .join()
        .unwrap();
    }
}
