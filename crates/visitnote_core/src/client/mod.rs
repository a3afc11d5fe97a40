//! Record-keeping service client.

pub mod record_service;
