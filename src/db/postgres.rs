use std::time::Duration;

use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    ConnectOptions, Connection,
};

use super::{SpanStore, StoreConnector, StoreError};
use crate::{repositories::span::get_span, types::SpanId};

/// Opens single Postgres connections from a fixed descriptor.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        let options =
            options.log_slow_statements(tracing::log::LevelFilter::Debug, Duration::new(120, 0));
        Self { options }
    }
}

impl StoreConnector for PgConnector {
    type Store = PgSpanStore;

    async fn connect(&self) -> Result<PgSpanStore, StoreError> {
        let conn = PgConnection::connect_with(&self.options).await?;
        Ok(PgSpanStore { conn })
    }
}

/// One live connection to the span database.
#[derive(Debug)]
pub struct PgSpanStore {
    conn: PgConnection,
}

impl SpanStore for PgSpanStore {
    async fn fetch_span(&mut self, id: SpanId) -> Result<Option<String>, StoreError> {
        get_span(&mut self.conn, id).await
    }
}
