//! Route modules, each exposing a `router()` merged in `build_router`.

pub mod health;
pub mod rpc;
