use sqlx::{postgres::PgConnection, Row};

use crate::{db::StoreError, types::SpanId};

/// Looks up the hex-encoded payload of a single span.
///
/// Errors from issuing the query are connection errors; a row whose `span`
/// column cannot be read as text is a decode error.
pub async fn get_span(conn: &mut PgConnection, id: SpanId) -> Result<Option<String>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT span FROM spans WHERE id = $1
        "#,
    )
    .bind(id.value())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| row.try_get::<String, _>("span"))
        .transpose()
        .map_err(|e| StoreError::Decode(e.to_string()))
}
