//! Services of the alert pipeline.
//!
//! The [`HttpServer`](server::HttpServer) receives webhook notifications and places their alerts
//! into the queue of the [`AlertProcessor`](processor::AlertProcessor), which translates them and
//! hands batches to a [`Forward`](forwarder::Forward) implementation.

pub mod forwarder;
pub mod processor;
pub mod server;
