use crate::database::entities::deletion_logs::{self, LogAction, LogStatus};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Datelike, Duration, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// Input for a new audit entry. Optional context defaults to absent.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub email: String,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_data: Option<String>,
    pub response_data: Option<String>,
    pub keycloak_user_id: Option<String>,
    pub keycloak_realm: Option<String>,
}

/// Sortable columns for log queries. Restricting to this set keeps arbitrary
/// identifiers out of the generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogOrderBy {
    Id,
    Email,
    Action,
    Status,
    CreatedAt,
}

impl LogOrderBy {
    fn column(self) -> deletion_logs::Column {
        match self {
            LogOrderBy::Id => deletion_logs::Column::Id,
            LogOrderBy::Email => deletion_logs::Column::Email,
            LogOrderBy::Action => deletion_logs::Column::Action,
            LogOrderBy::Status => deletion_logs::Column::Status,
            LogOrderBy::CreatedAt => deletion_logs::Column::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query filters for the admin log API.
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct LogQueryParams {
    /// Partial, case-insensitive email match
    pub email: Option<String>,
    /// Exact action match
    pub action: Option<LogAction>,
    /// Exact status match
    pub status: Option<LogStatus>,
    /// Inclusive lower bound on created_at
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on created_at
    pub end_date: Option<DateTime<Utc>>,
    /// Sort column, default created_at
    pub order_by: Option<LogOrderBy>,
    /// Sort direction, default desc
    pub order: Option<SortOrder>,
    /// Page size
    pub limit: Option<u64>,
    /// Page offset
    pub offset: Option<u64>,
}

impl LogQueryParams {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(deletion_logs::Column::Email)))
                    .like(format!("%{}%", email.to_lowercase())),
            );
        }
        if let Some(action) = self.action {
            condition = condition.add(deletion_logs::Column::Action.eq(action));
        }
        if let Some(status) = self.status {
            condition = condition.add(deletion_logs::Column::Status.eq(status));
        }
        if let Some(start) = self.start_date {
            condition = condition.add(deletion_logs::Column::CreatedAt.gte(start));
        }
        if let Some(end) = self.end_date {
            condition = condition.add(deletion_logs::Column::CreatedAt.lte(end));
        }
        condition
    }
}

/// Aggregation window for `statistics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Today,
    Week,
    Month,
    Year,
}

impl StatsPeriod {
    fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            StatsPeriod::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
            StatsPeriod::Week => now - Duration::days(7),
            StatsPeriod::Month => now - Duration::days(30),
            StatsPeriod::Year => now - Duration::days(365),
        }
    }

    fn bucket(self, at: DateTime<Utc>) -> String {
        match self {
            // Yearly trends aggregate per month, everything else per day
            StatsPeriod::Year => format!("{:04}-{:02}", at.year(), at.month()),
            _ => at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrendBucket {
    pub bucket: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogStatistics {
    pub period: StatsPeriod,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub pending: u64,
    pub completed: u64,
    pub trend: Vec<TrendBucket>,
}

/// Deletion logs DAO for database operations
pub struct DeletionLogsDao {
    db: DatabaseConnection,
}

impl DeletionLogsDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append an entry, returning its id.
    pub async fn store(
        &self,
        action: LogAction,
        status: LogStatus,
        entry: NewLogEntry,
    ) -> DatabaseResult<i64> {
        let active_model = deletion_logs::ActiveModel {
            id: ActiveValue::NotSet,
            email: Set(entry.email),
            action: Set(action),
            status: Set(status),
            message: Set(entry.message),
            ip_address: Set(entry.ip_address),
            user_agent: Set(entry.user_agent),
            request_data: Set(entry.request_data),
            response_data: Set(entry.response_data),
            keycloak_user_id: Set(entry.keycloak_user_id),
            keycloak_realm: Set(entry.keycloak_realm),
            created_at: Set(Utc::now()),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(model.id)
    }

    /// Update the most recent entry matching `email` + `action`. Returns
    /// false when no such entry exists.
    pub async fn update_status(
        &self,
        email: &str,
        action: LogAction,
        status: LogStatus,
        message: &str,
    ) -> DatabaseResult<bool> {
        let latest = deletion_logs::Entity::find()
            .filter(deletion_logs::Column::Email.eq(email))
            .filter(deletion_logs::Column::Action.eq(action))
            .order_by_desc(deletion_logs::Column::CreatedAt)
            .order_by_desc(deletion_logs::Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        let Some(model) = latest else {
            return Ok(false);
        };

        let mut active: deletion_logs::ActiveModel = model.into();
        active.status = Set(status);
        active.message = Set(message.to_string());
        active
            .update(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(true)
    }

    pub async fn find_all(
        &self,
        params: &LogQueryParams,
    ) -> DatabaseResult<Vec<deletion_logs::Model>> {
        let order_column = params.order_by.unwrap_or(LogOrderBy::CreatedAt).column();
        let mut query = deletion_logs::Entity::find().filter(params.condition());

        query = match params.order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => query.order_by_asc(order_column),
            SortOrder::Desc => query.order_by_desc(order_column),
        };

        if let Some(limit) = params.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = params.offset {
            query = query.offset(offset);
        }

        query
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn count_all(&self, params: &LogQueryParams) -> DatabaseResult<u64> {
        deletion_logs::Entity::find()
            .filter(params.condition())
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<deletion_logs::Model>> {
        deletion_logs::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Aggregate counts and a per-bucket trend for the given window.
    ///
    /// Rows are aggregated in process rather than with backend-specific
    /// date functions, so the same code serves SQLite and Postgres.
    pub async fn statistics(&self, period: StatsPeriod) -> DatabaseResult<LogStatistics> {
        let cutoff = period.cutoff(Utc::now());
        let rows = deletion_logs::Entity::find()
            .filter(deletion_logs::Column::CreatedAt.gte(cutoff))
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        let mut stats = LogStatistics {
            period,
            total: rows.len() as u64,
            successful: 0,
            failed: 0,
            pending: 0,
            completed: 0,
            trend: Vec::new(),
        };

        let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
        for row in &rows {
            match row.status {
                LogStatus::Success => stats.successful += 1,
                LogStatus::Failed => stats.failed += 1,
                LogStatus::Pending => stats.pending += 1,
                LogStatus::Completed => stats.completed += 1,
            }
            *buckets.entry(period.bucket(row.created_at)).or_default() += 1;
        }

        stats.trend = buckets
            .into_iter()
            .map(|(bucket, count)| TrendBucket { bucket, count })
            .collect();

        Ok(stats)
    }

    /// Render matching entries as CSV, unpaged.
    pub async fn export_csv(&self, params: &LogQueryParams) -> DatabaseResult<String> {
        let mut unpaged = params.clone();
        unpaged.limit = None;
        unpaged.offset = None;
        let rows = self.find_all(&unpaged).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "id",
                "email",
                "action",
                "status",
                "message",
                "ip_address",
                "keycloak_user_id",
                "keycloak_realm",
                "created_at",
            ])
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        for row in rows {
            writer
                .write_record([
                    row.id.to_string(),
                    row.email,
                    serde_plain_action(row.action),
                    serde_plain_status(row.status),
                    row.message,
                    row.ip_address.unwrap_or_default(),
                    row.keycloak_user_id.unwrap_or_default(),
                    row.keycloak_realm.unwrap_or_default(),
                    row.created_at.to_rfc3339(),
                ])
                .map_err(|e| DatabaseError::Database(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| DatabaseError::Database(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn count_older_than(&self, days: u32) -> DatabaseResult<u64> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        deletion_logs::Entity::find()
            .filter(deletion_logs::Column::CreatedAt.lt(cutoff))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn cleanup_older_than(&self, days: u32) -> DatabaseResult<u64> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let result = deletion_logs::Entity::delete_many()
            .filter(deletion_logs::Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    pub async fn delete_by_ids(&self, ids: &[i64]) -> DatabaseResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = deletion_logs::Entity::delete_many()
            .filter(deletion_logs::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    pub async fn delete_by_id(&self, id: i64) -> DatabaseResult<bool> {
        let result = deletion_logs::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

fn serde_plain_action(action: LogAction) -> String {
    match action {
        LogAction::Request => "request",
        LogAction::Confirmation => "confirmation",
        LogAction::Deletion => "deletion",
        LogAction::Error => "error",
        LogAction::Expired => "expired",
    }
    .to_string()
}

fn serde_plain_status(status: LogStatus) -> String {
    match status {
        LogStatus::Success => "success",
        LogStatus::Failed => "failed",
        LogStatus::Pending => "pending",
        LogStatus::Completed => "completed",
    }
    .to_string()
}
