//! Connections to systems outside the payment gateway.
pub mod json_rpc;
