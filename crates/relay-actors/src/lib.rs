//! # relay-actors
//!
//! Concrete sources and sinks for the market-data relay.
//!
//! ## Architecture
//!
//! Every actor embeds a [`Workflow`](relay_core::workflow::Workflow) and
//! expresses each DSL call as an operation value (plugin, validate,
//! transform). The backend itself sits behind a transport trait so the same
//! actor runs against a real driver or an in-process implementation.
//!
//! | Actor                        | Role   | Backend                         |
//! |------------------------------|--------|---------------------------------|
//! | [`price_api::PriceApiReader`] | reader | public price API over HTTP      |
//! | [`broker::BrokerReader`]     | reader | [`broker::Broker`]              |
//! | [`broker::BrokerWriter`]     | writer | [`broker::Broker`]              |
//! | [`store::StoreReader`]       | reader | [`store::TimeSeriesStore`]      |
//! | [`store::StoreWriter`]       | writer | [`store::TimeSeriesStore`]      |
//!
//! ## Shared infrastructure
//!
//! - [`registry`]: actor factory from config
//! - [`pipeline`]: the relay tick moving data from readers to writers
//! - [`json_util`]: JSON field helpers for raw API payloads

pub mod broker;
pub mod json_util;
pub mod pipeline;
pub mod price_api;
pub mod registry;
pub mod store;
