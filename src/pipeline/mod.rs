//! Fetch-and-enrich pipeline.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
