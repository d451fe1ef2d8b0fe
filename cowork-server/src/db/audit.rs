//! Audit log operations

use sqlx::PgExecutor;

/// Write an audit log entry. `subject` names the affected record, e.g. `user_plan:42`.
pub async fn log<'e>(
    executor: impl PgExecutor<'e>,
    subject: &str,
    action: &str,
    detail: Option<&serde_json::Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO audit_logs (subject, action, detail) VALUES ($1, $2, $3)")
        .bind(subject)
        .bind(action)
        .bind(detail)
        .execute(executor)
        .await?;
    Ok(())
}
