//! Client for the Zabbix sender protocol.
//!
//! Zabbix trapper items accept values pushed by external programs. A batch of [`Metric`]s is
//! wrapped in a [`Packet`], framed with the `ZBXD` header and written to the Zabbix server or proxy
//! over TCP. The server answers with a [`Response`] in the same framing.
//!
//! ```no_run
//! use alertbridge_zabbix::{Metric, Sender};
//!
//! # async fn send() -> Result<(), alertbridge_zabbix::SendError> {
//! let sender = Sender::new("127.0.0.1", 10051);
//! let response = sender
//!     .send(&[Metric::new("web-1", "prometheus.highcpu", "1")])
//!     .await?;
//!
//! if let Some(info) = response.info() {
//!     alertbridge_log::info!("processed {} of {} values", info.processed, info.total);
//! }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

mod protocol;
mod sender;

pub use self::protocol::*;
pub use self::sender::*;
