//! Tagged request/response payloads.
//!
//! The wire format is a closed set of variants validated at the protocol
//! boundary; nothing loosely-typed reaches the transaction or session core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-supplied identification on initialize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Inbound operation, tagged by `op`
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    /// Establish a session; the only request valid without a session id
    Initialize {
        #[serde(default)]
        client: Option<ClientInfo>,
    },
    /// Read query on the shared pool
    Query { sql: String },
    /// Start a bounded write transaction; the statement runs inside it
    BeginWrite { sql: String },
    Commit { transaction_id: String },
    Rollback { transaction_id: String },
    /// Autocommit statement (DDL/DCL/TCL, maintenance)
    Execute { sql: String },
    ListTables,
    DescribeTable { table: String },
    /// Server-held per-session subscription state
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

impl RpcRequest {
    pub fn is_initialize(&self) -> bool {
        matches!(self, RpcRequest::Initialize { .. })
    }

    /// Operation name for logging
    pub fn op_name(&self) -> &'static str {
        match self {
            RpcRequest::Initialize { .. } => "initialize",
            RpcRequest::Query { .. } => "query",
            RpcRequest::BeginWrite { .. } => "begin_write",
            RpcRequest::Commit { .. } => "commit",
            RpcRequest::Rollback { .. } => "rollback",
            RpcRequest::Execute { .. } => "execute",
            RpcRequest::ListTables => "list_tables",
            RpcRequest::DescribeTable { .. } => "describe_table",
            RpcRequest::Subscribe { .. } => "subscribe",
            RpcRequest::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl ServerInfo {
    pub fn current() -> Self {
        Self {
            name: "sqlrelay",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Outbound payload, tagged by `result`
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RpcResponse {
    Initialized {
        session_id: String,
        server: ServerInfo,
    },
    Rows {
        rows: Vec<Value>,
        count: usize,
    },
    TransactionStarted {
        transaction_id: String,
        rows_affected: u64,
    },
    TransactionFinalized {
        transaction_id: String,
        mode: &'static str,
    },
    Executed {
        rows_affected: u64,
    },
    Tables {
        tables: Vec<String>,
    },
    TableDescription {
        table: String,
        columns: Vec<ColumnDescription>,
    },
    Subscriptions {
        topics: Vec<String>,
    },
}
