// Run settings
// Loaded from --config, $SHIPTRACK_CONFIG, or ~/.config/shiptrack/config.toml
//
// Secrets never live in this file; see `credentials`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "SHIPTRACK_CONFIG";

pub const DEFAULT_LARK_BASE_URL: &str = "https://open.larksuite.com";

// ── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarkSettings {
    pub base_url: String,
    /// Group chat that receives the run report.
    pub chat_id: String,
    /// Spreadsheets to scan.
    pub sheet_tokens: Vec<String>,
    /// 1-indexed header row; data starts on the next row.
    pub header_row: u32,
    /// Last row read from each tab.
    pub max_row: u32,
}

impl Default for LarkSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LARK_BASE_URL.to_string(),
            chat_id: String::new(),
            sheet_tokens: Vec::new(),
            header_row: 2,
            max_row: 500,
        }
    }
}

/// Column letters of the shipment tab layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub recipient: String,
    pub customer: String,
    pub tracking: String,
    pub carrier: String,
    pub status: String,
    pub delivery_date: String,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            recipient: "C".into(),
            customer: "E".into(),
            tracking: "G".into(),
            carrier: "H".into(),
            status: "M".into(),
            delivery_date: "Q".into(),
        }
    }
}

impl ColumnSettings {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("recipient", self.recipient.as_str()),
            ("customer", self.customer.as_str()),
            ("tracking", self.tracking.as_str()),
            ("carrier", self.carrier.as_str()),
            ("status", self.status.as_str()),
            ("delivery_date", self.delivery_date.as_str()),
        ]
    }

    /// Rightmost configured column, the end of the read range.
    pub fn last_column(&self) -> String {
        self.entries()
            .iter()
            .filter_map(|(_, letter)| column_index(letter).map(|i| (i, letter.to_ascii_uppercase())))
            .max_by_key(|(i, _)| *i)
            .map(|(_, letter)| letter)
            .unwrap_or_else(|| "A".into())
    }
}

/// Which tabs of a spreadsheet hold shipments to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabScope {
    /// Every tab not in `skip_tabs`.
    #[default]
    All,
    /// Only the tab named after the current month (`JAN` … `DEC`).
    CurrentMonth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    /// Tab titles never read (case-insensitive).
    pub skip_tabs: Vec<String>,
    pub tab_scope: TabScope,
    /// Skip lookups for rows already DELIVERED with a delivery date.
    pub skip_settled: bool,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            skip_tabs: vec!["TEMPLATE".into()],
            tab_scope: TabScope::All,
            skip_settled: false,
        }
    }
}

impl SheetSettings {
    pub fn is_skipped(&self, title: &str) -> bool {
        let title = title.trim();
        self.skip_tabs.iter().any(|t| t.trim().eq_ignore_ascii_case(title))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Minimum gap between carrier calls, in milliseconds.
    pub pacing_ms: u64,
    /// Additional attempts after a transient failure.
    pub max_retries: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pacing_ms: 500,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub title: String,
    pub max_lines_per_bucket: usize,
    /// List delivered shipments in the message (otherwise only counted).
    pub include_delivered: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Shipment Tracking Update".into(),
            max_lines_per_bucket: 25,
            include_delivered: true,
        }
    }
}

/// Per-carrier overrides (sandbox hosts, test servers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierSettings {
    pub base_url: Option<String>,
}

// ── Settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lark: LarkSettings,
    pub columns: ColumnSettings,
    pub sheets: SheetSettings,
    pub dispatch: DispatchSettings,
    pub report: ReportSettings,
    /// Keyed by carrier: `fedex`, `ups`, `usps`, `dhl`.
    pub carriers: BTreeMap<String, CarrierSettings>,
}

impl Settings {
    /// Default settings file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shiptrack")
            .join("config.toml")
    }

    /// Resolve which file to read: explicit path, then `$SHIPTRACK_CONFIG`,
    /// then the default location. The flag tells whether the file must exist.
    pub fn resolve_path(explicit: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path.to_path_buf(), true);
        }
        if let Some(path) = env(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            return (PathBuf::from(path), true);
        }
        (Self::default_path(), false)
    }

    /// Load settings and apply environment overrides from the process env.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, &|name| std::env::var(name).ok())
    }

    /// `load` with an injectable environment.
    pub fn load_with_env(explicit: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let (path, required) = Self::resolve_path(explicit, env);
        let mut settings = if path.exists() || required {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Self::default()
        };
        settings.apply_env(env);
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })
    }

    /// Layer `LARK_*` environment variables over file values.
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("LARK_BASE_URL") {
            self.lark.base_url = url;
        }
        if let Some(chat) = non_empty("LARK_CHAT_ID") {
            self.lark.chat_id = chat;
        }
        if let Some(tokens) = non_empty("LARK_SHEET_TOKENS") {
            self.lark.sheet_tokens = split_tokens(&tokens);
        }
    }

    /// Base URL override for a carrier key (`fedex`, `ups`, ...).
    pub fn carrier_base_url(&self, key: &str) -> Option<&str> {
        self.carriers
            .get(key)
            .and_then(|c| c.base_url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lark.sheet_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::NoSheetTokens);
        }
        for (name, letter) in self.columns.entries() {
            if column_index(letter).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "columns.{name}: '{letter}' is not a column letter"
                )));
            }
        }
        if self.lark.header_row == 0 {
            return Err(ConfigError::Invalid("lark.header_row must be at least 1".into()));
        }
        if self.lark.max_row <= self.lark.header_row {
            return Err(ConfigError::Invalid(format!(
                "lark.max_row ({}) must be greater than lark.header_row ({})",
                self.lark.max_row, self.lark.header_row
            )));
        }
        if self.report.max_lines_per_bucket == 0 {
            return Err(ConfigError::Invalid("report.max_lines_per_bucket must be at least 1".into()));
        }
        for key in self.carriers.keys() {
            if !matches!(key.as_str(), "fedex" | "ups" | "usps" | "dhl") {
                return Err(ConfigError::Invalid(format!(
                    "carriers.{key}: unknown carrier (expected fedex, ups, usps or dhl)"
                )));
            }
        }
        Ok(())
    }
}

/// Split a comma-separated token list, dropping blanks.
pub fn split_tokens(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// 0-indexed position of a column letter: `A` → 0, `Q` → 16, `AA` → 26.
pub fn column_index(letter: &str) -> Option<usize> {
    let letter = letter.trim();
    if letter.is_empty() || letter.len() > 3 {
        return None;
    }
    let mut index = 0usize;
    for c in letter.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}
