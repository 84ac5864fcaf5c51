//! Repository for the `rule_configs` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::rule::Rule;

/// Column list for `rule_configs` queries.
const COLUMNS: &str = "id, rule_name, rule_type, conditions, action_params, priority_order, \
     is_active, created_at, updated_at";

/// Provides CRUD operations for operator-configurable rules.
pub struct RuleRepo;

impl RuleRepo {
    /// All rules ordered by priority, optionally filtered to active ones.
    pub async fn list(pool: &PgPool, active_only: bool) -> Result<Vec<Rule>, sqlx::Error> {
        let filter = if active_only { "WHERE is_active = TRUE" } else { "" };
        sqlx::query_as::<_, Rule>(&format!(
            "SELECT {COLUMNS} FROM rule_configs {filter} ORDER BY priority_order, rule_name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Rule>, sqlx::Error> {
        sqlx::query_as::<_, Rule>(&format!("SELECT {COLUMNS} FROM rule_configs WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn get_by_name(pool: &PgPool, rule_name: &str) -> Result<Option<Rule>, sqlx::Error> {
        sqlx::query_as::<_, Rule>(&format!(
            "SELECT {COLUMNS} FROM rule_configs WHERE rule_name = $1"
        ))
        .bind(rule_name)
        .fetch_optional(pool)
        .await
    }

    /// Insert a new rule row.
    pub async fn create(pool: &PgPool, rule: &Rule) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rule_configs \
             (id, rule_name, rule_type, conditions, action_params, priority_order, is_active, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(rule.id)
        .bind(&rule.rule_name)
        .bind(&rule.rule_type)
        .bind(&rule.conditions)
        .bind(&rule.action_params)
        .bind(rule.priority_order)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Replace every mutable field of an existing rule.
    ///
    /// Returns `true` if the rule existed and was updated.
    pub async fn update(pool: &PgPool, rule: &Rule) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rule_configs \
             SET rule_name = $2, rule_type = $3, conditions = $4, action_params = $5, \
                 priority_order = $6, is_active = $7, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(rule.id)
        .bind(&rule.rule_name)
        .bind(&rule.rule_type)
        .bind(&rule.conditions)
        .bind(&rule.action_params)
        .bind(rule.priority_order)
        .bind(rule.is_active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip a rule's `is_active` flag, returning the new value if the rule
    /// exists.
    pub async fn toggle(pool: &PgPool, id: Uuid) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE rule_configs \
             SET is_active = NOT is_active, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING is_active",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Delete a rule. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rule_configs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of rules in the table (used by startup seeding).
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM rule_configs")
            .fetch_one(pool)
            .await?;
        Ok(count.unwrap_or(0))
    }
}
