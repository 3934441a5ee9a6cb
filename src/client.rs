use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::redact::redact_bearer;
use crate::session::{Session, SessionStore};
use crate::token::token_is_valid;
use crate::types::{
    AnalysisFilter, Budget, Conversion, LoginResponse, MonthlySummary, NewBudget, NewTransaction,
    SpendingAnalysis, Transaction, TransactionFilter, UserRecord,
};
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

const EXPORT_SENTINELS: [&str; 2] = ["No transactions found", "Error"];

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Client for the finance tracker REST API.
///
/// Owns the HTTP connection pool and an injected [`SessionStore`]; every
/// authenticated operation goes through the same path: attach the stored
/// access token if it still validates, refresh it otherwise, and retry a
/// request exactly once when the backend answers 401. Refreshes are
/// single-flight: concurrent callers that hit an expired or rejected
/// token share one refresh call instead of each spending the refresh
/// token.
pub struct ApiClient<S> {
    http: reqwest::Client,
    base_url: String,
    store: S,
    refresh_gate: Mutex<()>,
}

impl<S: SessionStore> ApiClient<S> {
    pub fn new(config: ClientConfig, store: S) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ApiError::network)?;
        Ok(Self {
            http,
            base_url: config.base_url,
            store,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn session_store(&self) -> &S {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // --- account operations (no bearer token) ---

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ApiError> {
        let res = self
            .http
            .post(self.url("/accounts/register/"))
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await
            .map_err(ApiError::network)?;
        let res = Self::check(res, "Registration failed").await?;
        Self::parse_json(res).await
    }

    /// Logs in and persists the returned token pair in the session store.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let res = self
            .http
            .post(self.url("/accounts/login/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(ApiError::network)?;
        let res = Self::check(res, "Login failed").await?;
        let body: LoginResponse = Self::parse_json(res).await?;
        self.store.save(&Session {
            access_token: body.access_token.clone(),
            refresh_token: body.refresh_token.clone(),
        });
        tracing::info!(username, "logged in");
        Ok(body)
    }

    /// Clears the stored token pair. Idempotent; safe with no session.
    pub fn logout(&self) {
        self.store.clear();
    }

    // --- token lifecycle ---

    fn valid_access_token(&self) -> Option<String> {
        let session = self.store.load()?;
        token_is_valid(&session.access_token, Utc::now()).then_some(session.access_token)
    }

    /// Returns a valid access token, refreshing at most once behind the
    /// single-flight gate when the stored one is expired or absent.
    async fn ensure_access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.valid_access_token() {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;
        if let Some(token) = self.valid_access_token() {
            return Ok(token);
        }
        self.refresh_access_token().await?;
        self.installed_access_token()
    }

    /// Replaces a token the backend rejected with a 401. Callers that
    /// queued on the gate while another refresh ran adopt its result
    /// instead of spending the refresh token again; only the first caller
    /// holding the still-rejected token performs the refresh.
    async fn refresh_rejected_token(&self, rejected: &str) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        if let Some(current) = self.valid_access_token() {
            if current != rejected {
                return Ok(current);
            }
        }
        self.refresh_access_token().await?;
        self.installed_access_token()
    }

    fn installed_access_token(&self) -> Result<String, ApiError> {
        match self.valid_access_token() {
            Some(token) => Ok(token),
            None => {
                // The backend handed back a token that does not validate.
                self.logout();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Exchanges the stored refresh token for a new access token. Any
    /// failure here is session-fatal: both tokens are cleared and the
    /// caller ends up unauthenticated.
    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let Some(session) = self.store.load() else {
            self.logout();
            return Err(ApiError::SessionExpired);
        };

        let result = self
            .http
            .post(self.url("/accounts/token/refresh/"))
            .json(&json!({ "refresh": session.refresh_token }))
            .send()
            .await;
        let res = match result {
            Ok(res) if res.status().is_success() => res,
            Ok(res) => {
                tracing::warn!(status = res.status().as_u16(), "token refresh rejected");
                self.logout();
                return Err(ApiError::SessionExpired);
            }
            Err(err) => {
                tracing::warn!(error = %redact_bearer(&err.to_string()), "token refresh failed");
                self.logout();
                return Err(ApiError::SessionExpired);
            }
        };

        match Self::parse_json::<RefreshResponse>(res).await {
            Ok(body) => {
                self.store.save(&Session {
                    access_token: body.access,
                    refresh_token: session.refresh_token,
                });
                tracing::debug!("access token refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "token refresh returned malformed body");
                self.logout();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Sends an authenticated request with a retry budget of one. A 401
    /// triggers a single refresh-and-reissue; a second 401 is terminal.
    /// Every other failure is surfaced without a retry.
    async fn send_authorized<F>(&self, fallback: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut token = self.ensure_access_token().await?;
        let mut retried = false;
        loop {
            let res = build(&self.http)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .send()
                .await
                .map_err(ApiError::network)?;

            if res.status() == StatusCode::UNAUTHORIZED {
                if retried {
                    return Err(ApiError::Unauthorized);
                }
                retried = true;
                token = self.refresh_rejected_token(&token).await?;
                continue;
            }

            return Self::check(res, fallback).await;
        }
    }

    // --- authenticated operations ---

    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        let res = self
            .send_authorized("Failed to fetch transactions", |http| {
                let mut req = http.get(self.url("/api/transactions/"));
                if let Some(start) = filter.start_date {
                    req = req.query(&[("start_date", start.to_string())]);
                }
                if let Some(end) = filter.end_date {
                    req = req.query(&[("end_date", end.to_string())]);
                }
                if let Some(tx_type) = filter.transaction_type {
                    req = req.query(&[("transaction_type", tx_type.as_str())]);
                }
                if let Some(category) = &filter.category {
                    req = req.query(&[("category", category.as_str())]);
                }
                req
            })
            .await?;
        Self::parse_json(res).await
    }

    pub async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        let res = self
            .send_authorized("Failed to create transaction", |http| {
                http.post(self.url("/api/transactions/")).json(transaction)
            })
            .await?;
        Self::parse_json(res).await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<(), ApiError> {
        self.send_authorized("Failed to delete transaction", |http| {
            http.delete(self.url(&format!("/api/transactions/{id}/")))
        })
        .await?;
        Ok(())
    }

    pub async fn budgets(&self) -> Result<Vec<Budget>, ApiError> {
        let res = self
            .send_authorized("Failed to fetch budgets", |http| {
                http.get(self.url("/api/budgets/"))
            })
            .await?;
        Self::parse_json(res).await
    }

    pub async fn create_budget(&self, budget: &NewBudget) -> Result<Budget, ApiError> {
        let res = self
            .send_authorized("Failed to create budget", |http| {
                http.post(self.url("/api/budgets/")).json(budget)
            })
            .await?;
        Self::parse_json(res).await
    }

    /// Income/expense totals for one month, `month` in `YYYY-MM` form.
    pub async fn monthly_summary(&self, month: &str) -> Result<MonthlySummary, ApiError> {
        let res = self
            .send_authorized("Failed to fetch monthly summary", |http| {
                http.get(self.url("/api/monthly-summary/"))
                    .query(&[("month", month)])
            })
            .await?;
        Self::parse_json(res).await
    }

    pub async fn spending_analysis(
        &self,
        filter: &AnalysisFilter,
    ) -> Result<SpendingAnalysis, ApiError> {
        let res = self
            .send_authorized("Failed to fetch spending analysis", |http| {
                let mut req = http.get(self.url("/api/spending-analysis/"));
                if let Some(start) = filter.start_date {
                    req = req.query(&[("start_date", start.to_string())]);
                }
                if let Some(end) = filter.end_date {
                    req = req.query(&[("end_date", end.to_string())]);
                }
                if let Some(category) = &filter.category {
                    req = req.query(&[("category", category.as_str())]);
                }
                req
            })
            .await?;
        Self::parse_json(res).await
    }

    pub async fn convert_currency(
        &self,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Conversion, ApiError> {
        let res = self
            .send_authorized("Currency conversion failed", |http| {
                http.get(self.url("/api/currency-conversion/")).query(&[
                    ("amount", amount.to_string()),
                    ("from_currency", from_currency.to_string()),
                    ("to_currency", to_currency.to_string()),
                ])
            })
            .await?;
        Self::parse_json(res).await
    }

    /// Downloads the transaction history as CSV text. The backend signals
    /// logical failures inside a 2xx body, so the content is inspected
    /// before it is handed back; the surfaced message is the body's first
    /// line.
    pub async fn export_transactions(&self) -> Result<String, ApiError> {
        let res = self
            .send_authorized("Export failed. Please try again.", |http| {
                http.get(self.url("/api/export-transactions/"))
            })
            .await?;
        let body = res.text().await.map_err(ApiError::network)?;
        if let Some(message) = export_failure(&body) {
            return Err(ApiError::Export(message));
        }
        Ok(body)
    }

    // --- response plumbing ---

    async fn check(res: Response, fallback: &str) -> Result<Response, ApiError> {
        if res.status().is_success() {
            return Ok(res);
        }
        Err(Self::failure(res, fallback).await)
    }

    /// Builds the surfaced error for a non-success response, preferring
    /// the backend's own message field over the per-operation fallback.
    async fn failure(res: Response, fallback: &str) -> ApiError {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        let message = backend_message(&body).unwrap_or_else(|| fallback.to_string());
        ApiError::Api {
            status,
            message: redact_bearer(&message).into_owned(),
        }
    }

    async fn parse_json<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
        let body = res.text().await.map_err(ApiError::network)?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pulls a human-readable message out of an error body. The backend uses
/// `detail` (DRF), `error`, or `message` depending on the endpoint.
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
}

/// Detects the export sentinel: an error marker inside an otherwise
/// successful CSV body. Returns the body's first line as the message.
fn export_failure(body: &str) -> Option<String> {
    if !EXPORT_SENTINELS.iter().any(|marker| body.contains(marker)) {
        return None;
    }
    let first_line = body.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        Some("Export failed. Please try again.".to_string())
    } else {
        Some(first_line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_prefers_detail_then_error_then_message() {
        assert_eq!(
            backend_message(r#"{"detail": "token invalid"}"#).as_deref(),
            Some("token invalid")
        );
        assert_eq!(
            backend_message(r#"{"error": "No user found with this username"}"#).as_deref(),
            Some("No user found with this username")
        );
        assert_eq!(
            backend_message(r#"{"message": "boom", "error": "first"}"#).as_deref(),
            Some("first")
        );
        assert_eq!(backend_message("<html>502</html>"), None);
        assert_eq!(backend_message(r#"{"code": 42}"#), None);
    }

    #[test]
    fn export_failure_detects_sentinels() {
        let message = export_failure("No transactions found for this period").unwrap();
        assert!(message.starts_with("No transactions"));

        let message = export_failure("Error generating export. Please try again later.").unwrap();
        assert!(message.starts_with("Error generating export"));

        assert_eq!(
            export_failure("Date,Amount,Category,Type,Description\n2024-03-05,123.40,groceries,Expense,weekly shop\n"),
            None
        );
    }
}
