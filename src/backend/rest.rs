//! Relational Store Access
//!
//! A PostgREST query builder and the CRUD calls built on it.

use super::{BackendClient, BackendError, BackendResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Query against one table
///
/// Filters are rendered as PostgREST operators, e.g. `eq.`, `cs.{a,b}`,
/// `ilike.*term*`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table: String,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            params: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns (and embedded relations) to return
    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.param(column, format!("eq.{}", value.as_ref()))
    }

    /// Negated equality, `not.eq.value`
    pub fn not_eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.param(column, format!("not.eq.{}", value.as_ref()))
    }

    /// Array column contains every one of `values`
    pub fn contains<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        let items: Vec<String> = values.iter().map(|v| array_item(v.as_ref())).collect();
        self.param(column, format!("cs.{{{}}}", items.join(",")))
    }

    /// Disjunction of filter expressions, e.g. [`ilike_filter`] output
    pub fn or(self, expressions: &[String]) -> Self {
        self.param("or", format!("({})", expressions.join(",")))
    }

    pub fn order(self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.param("order", format!("{}.{}", column, direction))
    }

    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", limit.to_string())
    }

    /// Conflict target for upserts
    pub fn on_conflict(self, column: &str) -> Self {
        self.param("on_conflict", column.to_string())
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    /// Encoded query string (without the leading `?`)
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn path(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            format!("rest/v1/{}", self.table)
        } else {
            format!("rest/v1/{}?{}", self.table, query)
        }
    }
}

/// Quote an array literal element when it contains reserved characters
fn array_item(value: &str) -> String {
    if value.contains(&[',', '{', '}', '"', ' ', '\\'][..]) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Case-insensitive substring match as an `or` member, `column.ilike.*term*`
pub fn ilike_filter(column: &str, term: &str) -> String {
    format!("{}.ilike.*{}*", column, sanitize_term(term))
}

/// Strip characters that would break out of an `ilike` / `or` expression
pub fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect::<String>()
        .trim()
        .to_string()
}

impl BackendClient {
    /// Run a select and decode every row
    pub async fn select<T: DeserializeOwned>(&self, query: &TableQuery) -> BackendResult<Vec<T>> {
        let request = self.http.get(self.endpoint(&query.path()));
        let response = self.send(self.authorized(request).await).await?;
        let rows: Vec<T> = Self::read_json(response).await?;

        tracing::trace!(table = %query.table(), rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// Run a select expecting zero or one row
    pub async fn select_maybe_single<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> BackendResult<Option<T>> {
        let rows: Vec<T> = self.select(&query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored
    pub async fn insert<B, T>(&self, table: &str, row: &B) -> BackendResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let query = TableQuery::new(table);
        let request = self
            .http
            .post(self.endpoint(&query.path()))
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.send(self.authorized(request).await).await?;
        Self::first_row(response).await
    }

    /// Insert or merge one row on `conflict_column` and return it as stored
    pub async fn upsert<B, T>(&self, table: &str, row: &B, conflict_column: &str) -> BackendResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let query = TableQuery::new(table).on_conflict(conflict_column);
        let request = self
            .http
            .post(self.endpoint(&query.path()))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(row);
        let response = self.send(self.authorized(request).await).await?;
        Self::first_row(response).await
    }

    async fn first_row<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
        let rows: Vec<T> = Self::read_json(response).await?;
        rows.into_iter().next().ok_or(BackendError::EmptyResponse)
    }
}
