//! Request/response protocol and operation implementations.

pub mod ops;
pub mod protocol;

pub use protocol::{ClientInfo, ColumnDescription, RpcRequest, RpcResponse, ServerInfo};
