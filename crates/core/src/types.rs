/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Tenants are rows in the `tenants` table like any other entity.
pub type TenantId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
