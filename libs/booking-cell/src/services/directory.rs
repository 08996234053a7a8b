use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use shared_database::store::find_as;
use shared_database::{Query, RecordStore};
use shared_models::auth::Role;

use crate::models::{BookingKind, Invoice, UserRecord, INVOICES, USERS};

pub async fn find_user(store: &dyn RecordStore, user_id: i64) -> Result<Option<UserRecord>> {
    let users: Vec<UserRecord> = find_as(store, &Query::table(USERS).eq("id", user_id).limit(1)).await?;
    Ok(users.into_iter().next())
}

/// The account exists and carries the given role.
pub async fn find_user_with_role(
    store: &dyn RecordStore,
    user_id: i64,
    role: Role,
) -> Result<Option<UserRecord>> {
    let user = find_user(store, user_id).await?;
    Ok(user.filter(|u| {
        u.role
            .as_deref()
            .and_then(|r| r.parse::<Role>().ok())
            == Some(role)
    }))
}

pub async fn users_by_ids(
    store: &dyn RecordStore,
    ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, UserRecord>> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users: Vec<UserRecord> = find_as(store, &Query::table(USERS).is_in("id", ids)).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Ids of accounts whose full name contains `name`, case-insensitively.
pub async fn matching_user_ids(store: &dyn RecordStore, name: &str) -> Result<Vec<i64>> {
    let users: Vec<UserRecord> = find_as(store, &Query::table(USERS).contains("full_name", name)).await?;
    debug!("Name filter '{}' matched {} accounts", name, users.len());
    Ok(users.into_iter().map(|u| u.id).collect())
}

pub async fn invoices_for(
    store: &dyn RecordStore,
    kind: BookingKind,
    booking_ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, Invoice>> {
    let ids: Vec<i64> = booking_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let invoices: Vec<Invoice> = find_as(
        store,
        &Query::table(INVOICES)
            .eq("booking_kind", kind)
            .is_in("booking_id", ids),
    )
    .await?;

    Ok(invoices.into_iter().map(|i| (i.booking_id, i)).collect())
}
