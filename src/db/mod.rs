//! Store access: the handle/connector seams and their Postgres implementation.
//!
//! A [`SpanStore`] is one live connection (the StoreHandle). A
//! [`StoreConnector`] knows the fixed connection descriptor and produces new
//! handles; it is only ever driven by the reconnection task in
//! [`crate::connection`].

use core::error;
use std::{fmt::Display, future::Future};

use crate::types::SpanId;

mod postgres;
pub mod test_utils;

pub use postgres::{PgConnector, PgSpanStore};

pub trait SpanStore: Send + 'static {
    /// Returns the hex-encoded payload of span `id`, or `None` when no row
    /// matches.
    fn fetch_span(
        &mut self,
        id: SpanId,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;
}

pub trait StoreConnector: Send + Sync + 'static {
    type Store: SpanStore;

    /// Makes a single attempt at opening a handle. Retrying is the caller's job.
    fn connect(&self) -> impl Future<Output = Result<Self::Store, StoreError>> + Send;
}

#[derive(Debug)]
pub enum StoreError {
    /// Opening the connection or issuing the query failed.
    Connection(sqlx::Error),
    /// No handle is currently published.
    NotConnected,
    /// The row came back but its payload column could not be read.
    Decode(String),
}

impl StoreError {
    /// Whether the failure means the handle is unusable and must be replaced.
    /// Data errors never trigger a reconnection.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::NotConnected => true,
            Self::Decode(_) => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(err) => err.fmt(f),
            Self::NotConnected => write!(f, "No store connection available"),
            Self::Decode(err_str) => write!(f, "Failed to decode span row: {err_str}"),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            StoreError::Connection(err) => Some(err),
            StoreError::NotConnected => None,
            StoreError::Decode(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Connection(err)
    }
}
