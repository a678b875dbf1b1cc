use std::collections::HashMap;

use crate::{db::DbPool, error::AppError, models::user::UserRef};

/// Read-side join against the user table: resolves user identifiers to
/// display records for response payloads. Identifiers that no longer resolve
/// are left out; callers substitute [`UserRef::unknown`].
pub async fn resolve_refs<'a, I>(db: &DbPool, ids: I) -> Result<HashMap<String, UserRef>, AppError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut refs = HashMap::new();
    for id in ids {
        if refs.contains_key(id) {
            continue;
        }
        let found =
            sqlx::query_as::<_, UserRef>("SELECT uuid AS id, name, email FROM users WHERE uuid = ?1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        if let Some(user) = found {
            refs.insert(id.to_string(), user);
        }
    }
    Ok(refs)
}
