//! Conversation membership, directory and message rules.
//!
//! Every function takes a `&mut SqliteConnection` so callers decide whether
//! it runs on a plain pooled connection or inside a transaction.

pub mod access;
pub mod directory;
pub mod membership;
pub mod messages;

use sqlx::SqliteConnection;

/// True when every id in `ids` names an existing user.
pub(crate) async fn all_users_exist(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<bool, sqlx::Error> {
    if ids.is_empty() {
        return Ok(true);
    }

    let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        r#"SELECT COUNT(*) FROM "users" WHERE id IN ({})"#,
        placeholders
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let found = query.fetch_one(&mut *conn).await?;

    Ok(found as usize == ids.len())
}

/// Order-preserving dedup that also drops `exclude`.
pub(crate) fn dedup_ids(ids: &[String], exclude: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() || Some(id) == exclude || out.iter().any(|o| o == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}
