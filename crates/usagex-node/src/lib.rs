#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP node for a UsageX settlement ledger.
//!
//! [`LedgerNode`] wraps a [`SettlementLedger`](usagex_ledger::SettlementLedger)
//! over an in-memory token and exposes it through the axum routes in
//! [`handlers`]. Callers authenticate state-changing calls by signing them,
//! see [`call_auth`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use usagex_node::{LedgerNode, handlers};
//!
//! let node = Arc::new(LedgerNode::new(ledger));
//! let app = axum::Router::new().merge(handlers::routes().with_state(node));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Feature Flags
//!
//! - `telemetry` - log subscriber, HTTP request spans and ledger instrumentation

pub mod call_auth;
pub mod error;
pub mod handlers;
pub mod node;
pub mod util;

pub use call_auth::{Call, CallAuthError, CallGuard, SignedCall};
pub use error::NodeError;
pub use node::{CallResponse, LedgerNode};
