//! # Ether payment server
//! This crate hosts the server for the Ether payment gateway. It is responsible for:
//! * Issuing invoices, each with its own receiving address, over a small HTTP API.
//! * Following the chain through a JSON-RPC node and crediting payments to invoices, via the payment engine's
//!   ingestion pipeline.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /invoices`: Create an invoice. The body is `{"price": <wei>}`. Returns `{"id": <invoice id>}`.
//! * `GET /invoices/{id}`: The invoice's price, balance, receiving address and status.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
