//! Lark Open API client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers what a run needs: tenant auth, tab listing, row reads, cell
//! writes and the summary card.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use shiptrack_recon::{RowUpdate, ShipmentRecord};
use thiserror::Error;

use crate::sheet::SheetLayout;

const USER_AGENT: &str = concat!("shiptrack/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback token lifetime when `expire` is missing.
const DEFAULT_TOKEN_SECS: u64 = 7200;
/// Refresh this long before the token actually expires.
const TOKEN_MARGIN_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum LarkError {
    /// Tenant token could not be obtained.
    #[error("Lark authentication failed: {0}")]
    Auth(String),
    #[error("Lark network error: {0}")]
    Network(String),
    #[error("Lark HTTP {0}: {1}")]
    Http(u16, String),
    /// HTTP 200 with a non-zero `code`.
    #[error("Lark API error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("Lark response parse error: {0}")]
    Parse(String),
}

/// One tab of a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTab {
    pub sheet_id: String,
    pub title: String,
}

struct TenantToken {
    value: String,
    expires_at: Instant,
}

/// Lark API client (blocking).
pub struct LarkClient {
    http: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: Option<TenantToken>,
}

impl LarkClient {
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("HTTP client setup failed, using defaults: {e}");
                Client::new()
            });

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            token: None,
        }
    }

    // ── Auth ────────────────────────────────────────────────────────

    /// Tenant access token, cached until shortly before it expires.
    pub fn tenant_token(&mut self) -> Result<String, LarkError> {
        if let Some(token) = &self.token {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/open-apis/auth/v3/tenant_access_token/internal", self.base_url);
        let body = json!({ "app_id": self.app_id, "app_secret": self.app_secret });
        let data = self
            .send(self.http.post(&url).json(&body))
            .map_err(|e| match e {
                LarkError::Api { code, msg } => LarkError::Auth(format!("code {code}: {msg}")),
                LarkError::Http(status, msg) => LarkError::Auth(format!("HTTP {status}: {msg}")),
                other => other,
            })?;

        let value = data["tenant_access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LarkError::Auth("response has no tenant_access_token".into()))?
            .to_string();
        let lifetime = data["expire"].as_u64().unwrap_or(DEFAULT_TOKEN_SECS);
        self.token = Some(TenantToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime.saturating_sub(TOKEN_MARGIN_SECS)),
        });
        tracing::debug!("Lark tenant token acquired");
        Ok(value)
    }

    // ── Sheets ──────────────────────────────────────────────────────

    /// All tabs of a spreadsheet. Tries the v3 listing, then v2 metainfo.
    pub fn list_tabs(&mut self, spreadsheet: &str) -> Result<Vec<SheetTab>, LarkError> {
        let token = self.tenant_token()?;

        let url = format!("{}/open-apis/sheets/v3/spreadsheets/{spreadsheet}/sheets/query", self.base_url);
        match self.send(self.http.get(&url).bearer_auth(&token)) {
            Ok(data) => return Ok(parse_tabs(&data["sheets"], "sheet_id")),
            Err(e) => tracing::warn!(spreadsheet, "v3 sheet listing failed, trying v2: {e}"),
        }

        let url = format!("{}/open-apis/sheets/v2/spreadsheets/{spreadsheet}/metainfo", self.base_url);
        let data = self.send(self.http.get(&url).bearer_auth(&token))?;
        Ok(parse_tabs(&data["sheets"], "sheetId"))
    }

    /// Shipment rows of one tab.
    pub fn read_rows(
        &mut self,
        spreadsheet: &str,
        tab: &SheetTab,
        layout: &SheetLayout,
    ) -> Result<Vec<ShipmentRecord>, LarkError> {
        let token = self.tenant_token()?;
        let range = layout.read_range(&tab.sheet_id);
        let url = format!("{}/open-apis/sheets/v2/spreadsheets/{spreadsheet}/values/{range}", self.base_url);

        let data = self.send(
            self.http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("valueRenderOption", "ToString")]),
        )?;
        let values = data["valueRange"]["values"].as_array().map(Vec::as_slice).unwrap_or(&[]);

        let records = layout.parse_rows(spreadsheet, &tab.title, &tab.sheet_id, values);
        tracing::info!(spreadsheet, tab = %tab.title, rows = records.len(), "read tracking rows");
        Ok(records)
    }

    /// Write one row's status and/or delivery date. Returns the number of
    /// cells written.
    pub fn write_row(&mut self, update: &RowUpdate, layout: &SheetLayout) -> Result<usize, LarkError> {
        let ranges = layout.value_ranges(update);
        if ranges.is_empty() {
            return Ok(0);
        }

        let token = self.tenant_token()?;
        let url = format!(
            "{}/open-apis/sheets/v2/spreadsheets/{}/values_batch_update",
            self.base_url, update.id.spreadsheet
        );
        let cells = ranges.len();
        self.send(
            self.http
                .post(&url)
                .bearer_auth(&token)
                .json(&json!({ "valueRanges": ranges })),
        )?;
        tracing::debug!(tab = %update.id.tab, row = update.id.row, cells, "row updated");
        Ok(cells)
    }

    // ── Messaging ───────────────────────────────────────────────────

    /// Post an interactive card to a group chat. `card` is the card object;
    /// Lark expects it as a JSON string inside the message body.
    pub fn send_card(&mut self, chat_id: &str, card: &Value) -> Result<(), LarkError> {
        let token = self.tenant_token()?;
        let url = format!("{}/open-apis/im/v1/messages", self.base_url);
        let body = json!({
            "receive_id": chat_id,
            "msg_type": "interactive",
            "content": card.to_string(),
        });

        self.send(
            self.http
                .post(&url)
                .bearer_auth(&token)
                .query(&[("receive_id_type", "chat_id")])
                .json(&body),
        )?;
        tracing::info!(chat_id, "summary card sent");
        Ok(())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    /// Send a request and unwrap Lark's `{ code, msg, data }` envelope.
    /// Returns `data` (or the whole body when there is no `data`).
    fn send(&self, request: RequestBuilder) -> Result<Value, LarkError> {
        let resp = request.send().map_err(|e| LarkError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(|e| LarkError::Network(e.to_string()))?;
        let body: Option<Value> = serde_json::from_str(text.trim_start_matches('\u{feff}')).ok();

        if !(200..300).contains(&status) {
            let msg = body
                .as_ref()
                .and_then(|b| b["msg"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| truncate(&text, 200).to_string());
            return Err(LarkError::Http(status, msg));
        }

        let mut body = body.ok_or_else(|| LarkError::Parse(format!("not JSON: {}", truncate(&text, 200))))?;
        let code = body["code"].as_i64().unwrap_or(0);
        if code != 0 {
            return Err(LarkError::Api {
                code,
                msg: body["msg"].as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(match body.get_mut("data") {
            Some(data) => data.take(),
            None => body,
        })
    }
}

fn parse_tabs(sheets: &Value, id_key: &str) -> Vec<SheetTab> {
    sheets
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|s| {
            let sheet_id = s[id_key].as_str()?.to_string();
            Some(SheetTab {
                sheet_id,
                title: s["title"].as_str().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
