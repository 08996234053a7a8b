use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use shared_models::page::SortDirection;

/// A single column filter. Values are kept as JSON so the same predicate can
/// be rendered for PostgREST and evaluated against in-memory rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match.
    Contains(String, String),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
}

impl Predicate {
    fn column(&self) -> &str {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Neq(c, _)
            | Predicate::Gt(c, _)
            | Predicate::Gte(c, _)
            | Predicate::Lt(c, _)
            | Predicate::Lte(c, _)
            | Predicate::Contains(c, _)
            | Predicate::In(c, _)
            | Predicate::NotIn(c, _)
            | Predicate::IsNull(c) => c,
        }
    }

    fn render(&self) -> String {
        let filter = match self {
            Predicate::Eq(_, v) if v.is_null() => "is.null".to_string(),
            Predicate::Eq(_, v) => format!("eq.{}", render_value(v)),
            Predicate::Neq(_, v) => format!("neq.{}", render_value(v)),
            Predicate::Gt(_, v) => format!("gt.{}", render_value(v)),
            Predicate::Gte(_, v) => format!("gte.{}", render_value(v)),
            Predicate::Lt(_, v) => format!("lt.{}", render_value(v)),
            Predicate::Lte(_, v) => format!("lte.{}", render_value(v)),
            Predicate::Contains(_, term) => {
                format!("ilike.*{}*", urlencoding::encode(&escape_like(term)))
            }
            Predicate::In(_, values) => format!("in.({})", render_list(values)),
            Predicate::NotIn(_, values) => format!("not.in.({})", render_list(values)),
            Predicate::IsNull(_) => "is.null".to_string(),
        };

        format!("{}={}", self.column(), filter)
    }

    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);

        match self {
            Predicate::Eq(_, v) => values_equal(field, v),
            Predicate::Neq(_, v) => !field.is_null() && !values_equal(field, v),
            Predicate::Gt(_, v) => compare(field, v) == Some(Ordering::Greater),
            Predicate::Gte(_, v) => matches!(
                compare(field, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Lt(_, v) => compare(field, v) == Some(Ordering::Less),
            Predicate::Lte(_, v) => {
                matches!(compare(field, v), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::Contains(_, term) => field
                .as_str()
                .map(|s| s.to_lowercase().contains(&term.to_lowercase()))
                .unwrap_or(false),
            Predicate::In(_, values) => values.iter().any(|v| values_equal(field, v)),
            Predicate::NotIn(_, values) => {
                !field.is_null() && !values.iter().any(|v| values_equal(field, v))
            }
            Predicate::IsNull(_) => field.is_null(),
        }
    }
}

/// Filter, sort and window over one table.
///
/// Optional filters (`eq_opt`, `gte_opt`, ...) are skipped when `None`, so an
/// absent search field never narrows the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Eq(column.to_string(), to_json(value)))
    }

    pub fn eq_opt<V: Serialize>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn neq(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Neq(column.to_string(), to_json(value)))
    }

    pub fn gt(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Gt(column.to_string(), to_json(value)))
    }

    pub fn gte(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Gte(column.to_string(), to_json(value)))
    }

    pub fn gte_opt<V: Serialize>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.gte(column, v),
            None => self,
        }
    }

    pub fn lt(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Lt(column.to_string(), to_json(value)))
    }

    pub fn lte(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Predicate::Lte(column.to_string(), to_json(value)))
    }

    pub fn lte_opt<V: Serialize>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.lte(column, v),
            None => self,
        }
    }

    /// Inclusive range on a timestamp column.
    pub fn between(self, column: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.gte(column, from).lte(column, to)
    }

    pub fn contains(self, column: &str, term: &str) -> Self {
        self.filter(Predicate::Contains(column.to_string(), term.to_string()))
    }

    pub fn contains_opt(self, column: &str, term: Option<&str>) -> Self {
        match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => self.contains(column, t),
            None => self,
        }
    }

    pub fn is_in<V: Serialize>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(to_json).collect();
        self.filter(Predicate::In(column.to_string(), values))
    }

    pub fn not_in<V: Serialize>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(to_json).collect();
        self.filter(Predicate::NotIn(column.to_string(), values))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Predicate::IsNull(column.to_string()))
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn window(self, offset: u64, limit: u64) -> Self {
        self.offset(offset).limit(limit)
    }

    /// PostgREST path, e.g.
    /// `/rest/v1/stis_bookings?select=*&customer_id=eq.4&order=created_at.desc`.
    pub fn to_postgrest(&self) -> String {
        let mut query_parts = vec!["select=*".to_string()];

        query_parts.extend(self.predicates.iter().map(Predicate::render));

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, direction)| match direction {
                    SortDirection::Asc => format!("{}.asc", column),
                    SortDirection::Desc => format!("{}.desc", column),
                })
                .collect::<Vec<_>>()
                .join(",");
            query_parts.push(format!("order={}", order));
        }

        if let Some(limit) = self.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = self.offset {
            query_parts.push(format!("offset={}", offset));
        }

        format!("/rest/v1/{}?{}", self.table, query_parts.join("&"))
    }

    /// PATCH target: only the filters, no ordering or window.
    pub fn to_postgrest_filter(&self) -> String {
        let filters = self
            .predicates
            .iter()
            .map(Predicate::render)
            .collect::<Vec<_>>()
            .join("&");

        format!("/rest/v1/{}?{}", self.table, filters)
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Apply filters, ordering and the offset/limit window to in-memory rows.
    pub fn apply(&self, rows: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut selected = self.filter_and_sort(rows);

        let offset = self.offset.unwrap_or(0) as usize;
        selected = selected.into_iter().skip(offset).collect();

        if let Some(limit) = self.limit {
            selected.truncate(limit as usize);
        }
        selected
    }

    pub fn filter_and_sort(&self, rows: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.into_iter().filter(|row| self.matches(row)).collect();

        selected.sort_by(|a, b| {
            for (column, direction) in &self.order {
                let left = a.get(column).unwrap_or(&Value::Null);
                let right = b.get(column).unwrap_or(&Value::Null);

                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    // Nulls last regardless of direction.
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
                };

                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        selected
    }
}

fn to_json(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => urlencoding::encode(s).into_owned(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => format!("\"{}\"", urlencoding::encode(s)),
            other => render_value(other),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_like(term: &str) -> String {
    term.replace('*', "").replace('%', "")
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Numbers compare numerically, RFC 3339 strings chronologically, other
/// strings lexically. Mixed kinds do not compare.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (parse_timestamp(a), parse_timestamp(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return left.is_null() && right.is_null();
    }
    compare(left, right) == Some(Ordering::Equal) || left == right
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_absent_filters_are_wildcards() {
        let status: Option<&str> = None;
        let query = Query::table("stis_bookings")
            .eq("customer_id", 4)
            .eq_opt("status", status)
            .contains_opt("full_name", Some("  "))
            .order_by("created_at", SortDirection::Desc);

        assert_eq!(
            query.to_postgrest(),
            "/rest/v1/stis_bookings?select=*&customer_id=eq.4&order=created_at.desc"
        );
    }

    #[test]
    fn test_renders_ranges_lists_and_window() {
        let from = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let query = Query::table("consultant_bookings")
            .eq("consultant_id", 7)
            .not_in("status", ["CANCELLED", "DENIED"])
            .gte("booking_date", from)
            .contains("note", "follow up")
            .window(20, 10);

        let rendered = query.to_postgrest();
        assert!(rendered.contains("status=not.in.(\"CANCELLED\",\"DENIED\")"));
        assert!(rendered.contains("booking_date=gte.2026-03-01T09%3A30%3A00Z"));
        assert!(rendered.contains("note=ilike.*follow%20up*"));
        assert!(rendered.ends_with("limit=10&offset=20"));
    }

    #[test]
    fn test_in_memory_evaluation_compares_timestamps_chronologically() {
        let rows = vec![
            json!({ "id": 1, "booking_date": "2026-03-01T09:00:00Z", "status": "PENDING" }),
            json!({ "id": 2, "booking_date": "2026-03-01T10:00:00+00:00", "status": "CANCELLED" }),
            json!({ "id": 3, "booking_date": "2026-03-01T11:00:00Z", "status": "CONFIRMED" }),
        ];

        let query = Query::table("consultant_bookings")
            .between(
                "booking_date",
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
            )
            .not_in("status", ["CANCELLED"])
            .order_by("booking_date", SortDirection::Desc);

        let ids: Vec<i64> = query
            .apply(rows)
            .iter()
            .filter_map(|row| row["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let predicate = Predicate::Contains("full_name".into(), "ngu".into());
        assert!(predicate.matches(&json!({ "full_name": "Tran Nguyen" })));
        assert!(!predicate.matches(&json!({ "full_name": null })));
    }
}
