/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Users are identified by the UUID issued by the external identity provider.
pub type UserId = uuid::Uuid;

/// Token amounts. Signed so ledger deltas and balances share one type.
pub type TokenAmount = i64;
