//! Supabase (PostgREST) implementation of the remote store.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::models::SessionClose;
use crate::util::compact_text;

use super::{OpenSession, RemoteError, RemoteResult, RemoteStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgREST client for the production tables.
#[derive(Clone)]
pub struct SupabaseStore {
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseStore")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl SupabaseStore {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> RemoteResult<Self> {
        Self::with_timeout(url, anon_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            access_token: None,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Authorize requests with a signed-in user's token instead of the anon key.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        let token = access_token.into().trim().to_string();
        self.access_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table_url(&self, table: &str) -> RemoteResult<String> {
        validate_table_name(table)?;
        Ok(format!("{}/{}", self.rest_url, table))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }
}

impl RemoteStore for SupabaseStore {
    async fn insert(&self, table: &str, record: &Value) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .post(self.table_url(table)?)
                .header("Prefer", "return=minimal")
                .json(record),
        );
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn find_open_session(
        &self,
        table: &str,
        machine_id: i64,
        operator_id: i64,
    ) -> RemoteResult<Option<OpenSession>> {
        // Two rows are requested so a broken "one open session" invariant is visible
        let query = [
            ("select", "id,baslangic".to_string()),
            ("machine_id", format!("eq.{machine_id}")),
            ("operator_id", format!("eq.{operator_id}")),
            ("bitis", "is.null".to_string()),
            ("order", "baslangic.desc".to_string()),
            ("limit", "2".to_string()),
        ];
        let request = self.authorized(self.client.get(self.table_url(table)?).query(&query));

        let response = match ensure_success(request.send().await?).await {
            Ok(response) => response,
            Err(error) if error.is_no_rows() => return Ok(None),
            Err(error) => return Err(error),
        };

        let body = response.text().await?;
        let mut sessions = serde_json::from_str::<Vec<OpenSession>>(&body)?;
        if sessions.len() > 1 {
            tracing::warn!(
                "Found more than one open session in {} for machine {} / operator {}; closing the most recent",
                table,
                machine_id,
                operator_id
            );
        }

        Ok(if sessions.is_empty() {
            None
        } else {
            Some(sessions.swap_remove(0))
        })
    }

    async fn update_session(
        &self,
        table: &str,
        id: i64,
        close: &SessionClose,
    ) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .patch(self.table_url(table)?)
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=minimal")
                .json(&close.update_fields()),
        );
        ensure_success(request.send().await?).await?;
        Ok(())
    }
}

/// Normalize a Supabase project URL into its REST endpoint.
pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !crate::util::is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

fn validate_table_name(table: &str) -> RemoteResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidConfiguration(format!(
            "invalid table name: {table:?}"
        )))
    }
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(parse_api_error(status, &body))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> RemoteError {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.details)
            .or(payload.hint)
        {
            return RemoteError::Api {
                status: status.as_u16(),
                code: payload.code,
                message: compact_text(&message),
            };
        }
    }

    let trimmed = compact_text(body);
    RemoteError::Api {
        status: status.as_u16(),
        code: None,
        message: if trimmed.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            trimmed
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const ANON_KEY: &str = "anon-key";

    #[derive(Clone, Default)]
    struct FakeRest {
        rows: Arc<Mutex<Vec<Value>>>,
        fail_inserts: Arc<Mutex<bool>>,
        last_query: Arc<Mutex<HashMap<String, String>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("apikey").and_then(|value| value.to_str().ok()) == Some(ANON_KEY)
    }

    fn eq_filter(query: &HashMap<String, String>, column: &str) -> Option<i64> {
        query.get(column)?.strip_prefix("eq.")?.parse().ok()
    }

    async fn insert_row(
        State(state): State<FakeRest>,
        Path(table): Path<String>,
        headers: HeaderMap,
        Json(mut body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"message": "No API key found in request"})),
            );
        }
        if *state.fail_inserts.lock().unwrap() {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"code": "57P01", "message": "database restarting"})),
            );
        }
        let mut rows = state.rows.lock().unwrap();
        body["id"] = Value::from(rows.len() as i64 + 1);
        body["_table"] = Value::from(table);
        rows.push(body);
        (StatusCode::CREATED, Json(Value::Null))
    }

    async fn select_rows(
        State(state): State<FakeRest>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        *state.last_query.lock().unwrap() = query.clone();
        let machine_id = eq_filter(&query, "machine_id");
        let operator_id = eq_filter(&query, "operator_id");
        let limit = query
            .get("limit")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(usize::MAX);

        let rows = state.rows.lock().unwrap();
        let mut matching = rows
            .iter()
            .filter(|row| row["machine_id"].as_i64() == machine_id)
            .filter(|row| row["operator_id"].as_i64() == operator_id)
            .filter(|row| row["bitis"].is_null())
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            b["baslangic"]
                .as_str()
                .unwrap_or_default()
                .cmp(a["baslangic"].as_str().unwrap_or_default())
        });
        matching.truncate(limit);
        Json(Value::from(matching))
    }

    async fn update_rows(
        State(state): State<FakeRest>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let Some(id) = eq_filter(&query, "id") else {
            return StatusCode::BAD_REQUEST;
        };
        let mut rows = state.rows.lock().unwrap();
        for row in rows.iter_mut().filter(|row| row["id"].as_i64() == Some(id)) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), body.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        StatusCode::NO_CONTENT
    }

    async fn spawn_fake(state: FakeRest) -> String {
        let router = Router::new()
            .route(
                "/rest/v1/{table}",
                post(insert_row).get(select_rows).patch(update_rows),
            )
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn session_row(id: i64, machine_id: i64, operator_id: i64, started: &str) -> Value {
        serde_json::json!({
            "id": id,
            "machine_id": machine_id,
            "operator_id": operator_id,
            "baslangic": started,
            "bitis": null,
            "sebep": null,
        })
    }

    #[test]
    fn normalize_rest_url_appends_rest_path() {
        assert_eq!(
            normalize_rest_url("https://demo.supabase.co/").unwrap(),
            "https://demo.supabase.co/rest/v1"
        );
        assert_eq!(
            normalize_rest_url("https://demo.supabase.co/rest/v1").unwrap(),
            "https://demo.supabase.co/rest/v1"
        );
        assert!(normalize_rest_url("demo.supabase.co").is_err());
        assert!(normalize_rest_url("  ").is_err());
    }

    #[test]
    fn rejects_empty_anon_key() {
        assert!(SupabaseStore::new("https://demo.supabase.co", "  ").is_err());
    }

    #[test]
    fn table_names_are_restricted() {
        assert!(validate_table_name("durus_loglari").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("logs?select=*").is_err());
        assert!(validate_table_name("../auth").is_err());
    }

    #[test]
    fn parse_api_error_reads_postgrest_body() {
        let error = parse_api_error(
            StatusCode::NOT_ACCEPTABLE,
            r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned","details":"The result contains 0 rows","hint":null}"#,
        );
        assert!(error.is_no_rows());
        assert!(error.to_string().contains("406"));

        let error = parse_api_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(error.to_string(), "Remote API error: HTTP 502 (502)");
    }

    #[test]
    fn debug_redacts_keys() {
        let store = SupabaseStore::new("https://demo.supabase.co", "secret-anon")
            .unwrap()
            .with_access_token("secret-token");
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("secret-anon"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_posts_record_with_api_key() {
        let state = FakeRest::default();
        let url = spawn_fake(state.clone()).await;
        let store = SupabaseStore::new(&url, ANON_KEY).unwrap();

        store
            .insert("uretim_loglari", &serde_json::json!({"machine_id": 7, "quantity": 4}))
            .await
            .unwrap();

        let rows = state.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["_table"], "uretim_loglari");
        assert_eq!(rows[0]["quantity"], 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_failure_is_api_error() {
        let state = FakeRest::default();
        *state.fail_inserts.lock().unwrap() = true;
        let url = spawn_fake(state.clone()).await;
        let store = SupabaseStore::new(&url, ANON_KEY).unwrap();

        let error = store
            .insert("uretim_loglari", &serde_json::json!({"machine_id": 7}))
            .await
            .unwrap_err();

        match error {
            RemoteError::Api { status, code, .. } => {
                assert_eq!(status, 503);
                assert_eq!(code.as_deref(), Some("57P01"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_key_is_rejected() {
        let url = spawn_fake(FakeRest::default()).await;
        let store = SupabaseStore::new(&url, "other-key").unwrap();

        let error = store
            .insert("uretim_loglari", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("401"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_open_session_filters_and_orders() {
        let state = FakeRest::default();
        state.rows.lock().unwrap().extend([
            session_row(1, 7, 3, "2025-03-04T06:00:00Z"),
            session_row(2, 7, 3, "2025-03-04T08:00:00Z"),
            session_row(3, 7, 4, "2025-03-04T09:00:00Z"),
        ]);
        let url = spawn_fake(state.clone()).await;
        let store = SupabaseStore::new(&url, ANON_KEY).unwrap();

        let session = store
            .find_open_session("durus_loglari", 7, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.id, 2);
        assert_eq!(session.started_at.as_deref(), Some("2025-03-04T08:00:00Z"));

        let query = state.last_query.lock().unwrap().clone();
        assert_eq!(query.get("bitis").map(String::as_str), Some("is.null"));
        assert_eq!(query.get("order").map(String::as_str), Some("baslangic.desc"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_open_session_returns_none_when_empty() {
        let url = spawn_fake(FakeRest::default()).await;
        let store = SupabaseStore::new(&url, ANON_KEY).unwrap();

        let session = store.find_open_session("durus_loglari", 7, 3).await.unwrap();
        assert_eq!(session, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_session_writes_end_and_reason() {
        let state = FakeRest::default();
        state
            .rows
            .lock()
            .unwrap()
            .push(session_row(5, 7, 3, "2025-03-04T08:00:00Z"));
        let url = spawn_fake(state.clone()).await;
        let store = SupabaseStore::new(&url, ANON_KEY).unwrap();
        let ended_at = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();

        store
            .update_session("durus_loglari", 5, &SessionClose::new(7, 3, ended_at, "Mola"))
            .await
            .unwrap();

        let rows = state.rows.lock().unwrap();
        assert_eq!(rows[0]["bitis"], "2025-03-04T12:00:00.000Z");
        assert_eq!(rows[0]["sebep"], "Mola");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_host_is_http_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = SupabaseStore::with_timeout(
            format!("http://{addr}"),
            ANON_KEY,
            Duration::from_millis(500),
        )
        .unwrap();
        let error = store
            .insert("uretim_loglari", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Http(_)));
    }
}
