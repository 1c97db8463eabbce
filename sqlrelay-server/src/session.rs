//! Per-session protocol handler.
//!
//! One instance lives for the whole session, registered in the core
//! `SessionRegistry`; its state (client identity, subscription topics)
//! persists across the physical requests that carry the session id.

use std::collections::BTreeSet;
use std::sync::Mutex;

use sqlrelay_core::FinalizeMode;

use crate::http::error::ApiError;
use crate::rpc::ops;
use crate::rpc::protocol::{ClientInfo, RpcRequest, RpcResponse};
use crate::state::AppState;

pub struct SessionHandler {
    state: AppState,
    client: Option<ClientInfo>,
    subscriptions: Mutex<BTreeSet<String>>,
}

impl SessionHandler {
    pub fn new(state: AppState, client: Option<ClientInfo>) -> Self {
        Self {
            state,
            client,
            subscriptions: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.name.as_str())
    }

    /// Dispatch one routed request.
    pub async fn handle(&self, request: RpcRequest) -> Result<RpcResponse, ApiError> {
        tracing::debug!(op = request.op_name(), client = ?self.client_name(), "handling request");

        match request {
            RpcRequest::Initialize { .. } => Err(ApiError::Validation {
                message: "session already initialized".into(),
            }),
            RpcRequest::Query { sql } => ops::read_query(&self.state, &sql).await,
            RpcRequest::BeginWrite { sql } => ops::begin_write(&self.state, &sql).await,
            RpcRequest::Commit { transaction_id } => {
                ops::finalize(&self.state, &transaction_id, FinalizeMode::Commit).await
            }
            RpcRequest::Rollback { transaction_id } => {
                ops::finalize(&self.state, &transaction_id, FinalizeMode::Rollback).await
            }
            RpcRequest::Execute { sql } => ops::execute(&self.state, &sql).await,
            RpcRequest::ListTables => ops::list_tables(&self.state).await,
            RpcRequest::DescribeTable { table } => {
                ops::describe_table(&self.state, &table).await
            }
            RpcRequest::Subscribe { topic } => {
                let mut topics = self.subscriptions.lock().expect("subscription lock poisoned");
                topics.insert(topic);
                Ok(RpcResponse::Subscriptions {
                    topics: topics.iter().cloned().collect(),
                })
            }
            RpcRequest::Unsubscribe { topic } => {
                let mut topics = self.subscriptions.lock().expect("subscription lock poisoned");
                topics.remove(&topic);
                Ok(RpcResponse::Subscriptions {
                    topics: topics.iter().cloned().collect(),
                })
            }
        }
    }
}
