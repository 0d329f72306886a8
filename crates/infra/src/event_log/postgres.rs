//! Postgres-backed transition log.
//!
//! Expects the `inventory_events` table from `migrations/0001_inventory_events.sql`.
//! Quantities are read back as `BIGINT` casts so tables created with
//! `INTEGER` columns work unchanged.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | EventLogError |
//! |------------|----------------------|---------------|
//! | Io, Tls, PoolTimedOut, PoolClosed | N/A | `Unavailable` |
//! | Database | class `08` (connection), `53` (resources), `57P01..57P03` (shutdown) | `Unavailable` |
//! | Database | any other | `Rejected` |
//! | ColumnDecode, Decode, ColumnNotFound | N/A | `Malformed` |
//! | Other | N/A | `Rejected` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};

use stockwatch_core::ProductId;
use stockwatch_inventory::{StockTransition, TransitionKind};

use super::{EventLogError, EventLogStore, TransitionRecord};

/// Postgres-backed append-only transition log.
///
/// Uses a shared SQLx pool; each call checks out a connection for the
/// duration of one statement only.
#[derive(Debug, Clone)]
pub struct PostgresEventLog {
    pool: Arc<PgPool>,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl EventLogStore for PostgresEventLog {
    #[instrument(
        skip(self, transition),
        fields(
            product_id = %transition.product_id,
            event_type = %transition.event_type,
            rows_affected
        ),
        err
    )]
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_events (product_id, previous_quantity, new_quantity, event_type)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(transition.product_id.as_str())
        .bind(transition.previous_quantity)
        .bind(transition.new_quantity)
        .bind(transition.event_type.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append", e))?;

        let rows = result.rows_affected();
        Span::current().record("rows_affected", rows);
        Ok(rows)
    }

    #[instrument(skip(self), fields(product_id = %product_id, row_count), err)]
    async fn list_for_product(
        &self,
        product_id: &ProductId,
        limit: u32,
    ) -> Result<Vec<TransitionRecord>, EventLogError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id::BIGINT AS id,
                product_id,
                previous_quantity::BIGINT AS previous_quantity,
                new_quantity::BIGINT AS new_quantity,
                event_type,
                created_at
            FROM inventory_events
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_product", e))?;

        Span::current().record("row_count", rows.len());

        rows.iter()
            .map(|row| {
                TransitionRow::from_row(row)
                    .map_err(|e| map_sqlx_error("list_for_product", e))
                    .and_then(TransitionRecord::try_from)
            })
            .collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventLogError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            EventLogError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code() {
                Some(code) if is_unavailable_code(code.as_ref()) => EventLogError::Unavailable(msg),
                _ => EventLogError::Rejected(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => {
            EventLogError::Malformed(format!("{operation}: {err}"))
        }
        _ => EventLogError::Rejected(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unavailable_code(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("53") || matches!(code, "57P01" | "57P02" | "57P03")
}

// SQLx row types

#[derive(Debug)]
struct TransitionRow {
    id: i64,
    product_id: String,
    previous_quantity: i64,
    new_quantity: i64,
    event_type: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TransitionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransitionRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            previous_quantity: row.try_get("previous_quantity")?,
            new_quantity: row.try_get("new_quantity")?,
            event_type: row.try_get("event_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransitionRow> for TransitionRecord {
    type Error = EventLogError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let product_id = ProductId::new(row.product_id)
            .map_err(|e| EventLogError::Malformed(format!("row {}: {e}", row.id)))?;
        let event_type = row
            .event_type
            .parse::<TransitionKind>()
            .map_err(|e| EventLogError::Malformed(format!("row {}: {e}", row.id)))?;

        Ok(TransitionRecord {
            id: row.id,
            product_id,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            event_type,
            created_at: row.created_at,
        })
    }
}
