//! Period balance repository: the Postgres [`BalanceStore`].
//!
//! Every granularity lives in its own table. Calls are routed with
//! `with_balance_table!`, a `match` from [`Granularity`] to the entity module,
//! so table names are fixed at compile time.

use async_trait::async_trait;
use chrono::Utc;
use moneyflow_core::ledger::{
    BalanceStore, CashBank, FlowDelta, PeriodBalance, StoreError, upsert_row,
};
use moneyflow_core::period::{Granularity, PeriodKey};
use moneyflow_shared::types::UserId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, RuntimeErr, SqlErr, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

/// Runs `$body` with `$table` bound to the entity module for `$granularity`.
macro_rules! with_balance_table {
    ($granularity:expr, $table:ident => $body:expr) => {
        match $granularity {
            Granularity::Daily => {
                use $crate::entities::daily_balances as $table;
                $body
            }
            Granularity::Weekly => {
                use $crate::entities::weekly_balances as $table;
                $body
            }
            Granularity::Monthly => {
                use $crate::entities::monthly_balances as $table;
                $body
            }
            Granularity::Quarterly => {
                use $crate::entities::quarterly_balances as $table;
                $body
            }
            Granularity::Semiannual => {
                use $crate::entities::semiannual_balances as $table;
                $body
            }
            Granularity::Annual => {
                use $crate::entities::annual_balances as $table;
                $body
            }
        }
    };
}

/// Postgres SQLSTATEs for a lost race: serialization failure, deadlock,
/// lock not available.
const CONFLICT_STATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Period balance repository.
#[derive(Debug, Clone)]
pub struct PeriodBalanceRepository {
    db: DatabaseConnection,
}

impl PeriodBalanceRepository {
    /// Creates a new period balance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BalanceStore for PeriodBalanceRepository {
    async fn get(
        &self,
        user_id: UserId,
        key: PeriodKey,
    ) -> Result<Option<PeriodBalance>, StoreError> {
        with_balance_table!(key.granularity(), table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id.into_inner()))
                .filter(table::Column::PeriodKey.eq(key.to_string()))
                .one(&self.db)
                .await
                .map_err(map_db_err)?
                .map(table::Model::into_balance)
                .transpose()
        })
    }

    async fn latest_before(
        &self,
        user_id: UserId,
        before: PeriodKey,
        floor: PeriodKey,
    ) -> Result<Option<PeriodBalance>, StoreError> {
        if floor >= before {
            return Ok(None);
        }
        with_balance_table!(before.granularity(), table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id.into_inner()))
                .filter(table::Column::PeriodKey.gte(floor.to_string()))
                .filter(table::Column::PeriodKey.lt(before.to_string()))
                .order_by_desc(table::Column::PeriodKey)
                .one(&self.db)
                .await
                .map_err(map_db_err)?
                .map(table::Model::into_balance)
                .transpose()
        })
    }

    async fn range_after(
        &self,
        user_id: UserId,
        after: PeriodKey,
        through: PeriodKey,
        limit: u64,
    ) -> Result<Vec<PeriodBalance>, StoreError> {
        if after >= through || limit == 0 {
            return Ok(Vec::new());
        }
        with_balance_table!(after.granularity(), table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id.into_inner()))
                .filter(table::Column::PeriodKey.gt(after.to_string()))
                .filter(table::Column::PeriodKey.lte(through.to_string()))
                .order_by_asc(table::Column::PeriodKey)
                .limit(limit)
                .all(&self.db)
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(table::Model::into_balance)
                .collect()
        })
    }

    async fn apply_delta(
        &self,
        user_id: UserId,
        key: PeriodKey,
        delta: &FlowDelta,
        seed: CashBank,
    ) -> Result<PeriodBalance, StoreError> {
        with_balance_table!(key.granularity(), table => {
            let txn = self.db.begin().await.map_err(map_db_err)?;

            let existing = table::Entity::find()
                .filter(table::Column::UserId.eq(user_id.into_inner()))
                .filter(table::Column::PeriodKey.eq(key.to_string()))
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(map_db_err)?;

            let (id, current) = match existing {
                Some(model) => (model.id, Some(model.into_balance()?)),
                None => (Uuid::now_v7(), None),
            };
            let inserting = current.is_none();
            let row = upsert_row(current, user_id, key, delta, seed)?;

            let active = table::ActiveModel::from_balance(id, &row);
            if inserting {
                active.insert(&txn).await.map_err(map_db_err)?;
            } else {
                active.update(&txn).await.map_err(map_db_err)?;
            }
            txn.commit().await.map_err(map_db_err)?;

            debug!(
                granularity = %key.granularity(),
                period_key = %key,
                inserted = inserting,
                "Applied delta"
            );
            Ok(row)
        })
    }

    async fn save(&self, row: &PeriodBalance) -> Result<(), StoreError> {
        let key = row.period_key;
        with_balance_table!(key.granularity(), table => {
            let txn = self.db.begin().await.map_err(map_db_err)?;

            let id = table::Entity::find()
                .filter(table::Column::UserId.eq(row.user_id.into_inner()))
                .filter(table::Column::PeriodKey.eq(key.to_string()))
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(map_db_err)?
                .map(|model| model.id)
                .ok_or_else(|| {
                    StoreError::Backend(format!("no {} row for {key}", key.granularity()))
                })?;

            let mut active = table::ActiveModel::from_balance(id, row);
            active.updated_at = sea_orm::ActiveValue::Set(Utc::now().into());
            active.update(&txn).await.map_err(map_db_err)?;
            txn.commit().await.map_err(map_db_err)?;
            Ok(())
        })
    }

    async fn list(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<Vec<PeriodBalance>, StoreError> {
        with_balance_table!(granularity, table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id.into_inner()))
                .order_by_asc(table::Column::PeriodKey)
                .all(&self.db)
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(table::Model::into_balance)
                .collect()
        })
    }
}

/// Classifies a database error for the retry policy.
fn map_db_err(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StoreError::Conflict(detail);
    }
    if sqlstate(&err).is_some_and(|state| CONFLICT_STATES.contains(&state.as_str())) {
        return StoreError::Conflict(err.to_string());
    }
    match &err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Transient(err.to_string()),
        DbErr::Exec(RuntimeErr::SqlxError(inner)) | DbErr::Query(RuntimeErr::SqlxError(inner))
            if matches!(
                inner,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ) =>
        {
            StoreError::Transient(err.to_string())
        }
        DbErr::Type(_) | DbErr::Json(_) => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ConnAcquireErr;

    #[test]
    fn test_connection_errors_are_transient() {
        let err = map_db_err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
        assert!(matches!(err, StoreError::Transient(_)));
        assert!(err.is_retryable());

        let err = map_db_err(DbErr::Conn(RuntimeErr::Internal("reset".into())));
        assert!(matches!(err, StoreError::Transient(_)));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = map_db_err(DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut)));
        assert!(matches!(err, StoreError::Transient(_)));
    }

    #[test]
    fn test_decode_errors_are_corrupt() {
        let err = map_db_err(DbErr::Type("bad numeric".into()));
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_errors_are_backend() {
        let err = map_db_err(DbErr::Custom("boom".into()));
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_retryable());
    }
}
