use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use shared_database::store::find_page_as;
use shared_database::{Query, RecordStore};
use shared_models::page::{Page, PageRequest, SortDirection};

use crate::models::{BookingError, BookingStatus};
use crate::services::directory::matching_user_ids;

/// Optional search criteria; every `None` is a wildcard.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub customer_id: Option<i64>,
    pub consultant_id: Option<i64>,
    pub service_id: Option<i64>,
    pub status: Option<BookingStatus>,
    pub customer_name: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn for_customer(customer_id: i64) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    fn name_term(&self) -> Option<&str> {
        self.customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Table, date column and sort column of one booking family.
#[derive(Debug, Clone, Copy)]
pub struct HistorySource {
    pub table: &'static str,
    pub date_column: &'static str,
    pub sort_column: &'static str,
}

pub fn parse_status(raw: Option<&str>) -> Result<Option<BookingStatus>, BookingError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map(Some),
        None => Ok(None),
    }
}

/// Composes the filter into a query. `customer_ids` carries the accounts a
/// name filter resolved to.
pub fn build_history_query(
    source: HistorySource,
    filter: &HistoryFilter,
    customer_ids: Option<&[i64]>,
    direction: SortDirection,
) -> Query {
    let mut query = Query::table(source.table)
        .eq_opt("customer_id", filter.customer_id)
        .eq_opt("consultant_id", filter.consultant_id)
        .eq_opt("service_id", filter.service_id)
        .eq_opt("status", filter.status)
        .gte_opt(source.date_column, filter.from)
        .lte_opt(source.date_column, filter.to);

    if let Some(ids) = customer_ids {
        query = query.is_in("customer_id", ids.iter().copied());
    }

    query
        .order_by(source.sort_column, direction)
        .order_by("id", direction)
}

pub async fn find_history<T>(
    store: &dyn RecordStore,
    source: HistorySource,
    filter: &HistoryFilter,
    direction: SortDirection,
    page: PageRequest,
) -> Result<Page<T>, BookingError>
where
    T: DeserializeOwned,
{
    let customer_ids = match filter.name_term() {
        Some(name) => {
            let ids = matching_user_ids(store, name).await?;
            if ids.is_empty() {
                debug!("No accounts match '{}'; returning empty page", name);
                return Ok(Page::empty(page));
            }
            Some(ids)
        }
        None => None,
    };

    let query = build_history_query(source, filter, customer_ids.as_deref(), direction);
    Ok(find_page_as(store, &query, page).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: HistorySource = HistorySource {
        table: "stis_bookings",
        date_column: "booking_date",
        sort_column: "created_at",
    };

    #[test]
    fn test_no_filters_only_sorts() {
        let query = build_history_query(SOURCE, &HistoryFilter::default(), None, SortDirection::Desc);
        assert_eq!(
            query.to_postgrest(),
            "/rest/v1/stis_bookings?select=*&order=created_at.desc,id.desc"
        );
    }

    #[test]
    fn test_every_filter_is_rendered() {
        let filter = HistoryFilter {
            customer_id: Some(3),
            service_id: Some(8),
            status: Some(BookingStatus::Confirmed),
            ..HistoryFilter::default()
        };
        let rendered = build_history_query(SOURCE, &filter, Some(&[3, 4]), SortDirection::Asc).to_postgrest();

        assert!(rendered.contains("customer_id=eq.3"));
        assert!(rendered.contains("service_id=eq.8"));
        assert!(rendered.contains("status=eq.CONFIRMED"));
        assert!(rendered.contains("customer_id=in.(3,4)"));
        assert!(rendered.contains("order=created_at.asc,id.asc"));
    }

    #[test]
    fn test_blank_status_is_wildcard() {
        assert_eq!(parse_status(Some("  ")).unwrap(), None);
        assert_eq!(parse_status(Some("confirmed")).unwrap(), Some(BookingStatus::Confirmed));
        assert!(parse_status(Some("nope")).is_err());
    }
}
