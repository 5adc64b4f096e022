use serde::{Deserialize, Serialize};

pub const DEFAULT_TOTAL_GB: f64 = 100.0;
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_NOTIFICATION_THRESHOLD_GB: f64 = 5.0;
/// Choices offered by the settings view. Advisory only, nothing polls on it.
pub const REFRESH_INTERVAL_PRESETS: [u32; 3] = [15, 60, 1440];

pub const EXPIRY_PLACEHOLDER: &str = "-";
pub const SYNCING_PLACEHOLDER: &str = "جاري المزامنة...";
pub const UNKNOWN_EXPIRY: &str = "غير معروف";
pub const PARSE_ERROR_EXPIRY: &str = "خطأ في التحليل";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    /// Declared for the stored format; no refresh path produces it yet.
    Expired,
    Low,
}

impl AccountStatus {
    pub fn from_balance(balance_gb: f64, threshold_gb: f64) -> Self {
        if balance_gb <= threshold_gb {
            Self::Low
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub username: String,
    pub balance_gb: f64,
    pub total_gb: f64,
    pub expiry_date: String,
    pub last_updated: String,
    pub status: AccountStatus,
}

impl Account {
    pub fn pending(id: String, name: &str, username: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            username: username.to_string(),
            balance_gb: 0.0,
            total_gb: DEFAULT_TOTAL_GB,
            expiry_date: EXPIRY_PLACEHOLDER.to_string(),
            last_updated: SYNCING_PLACEHOLDER.to_string(),
            status: AccountStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub refresh_interval_minutes: u32,
    pub notification_threshold_gb: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            notification_threshold_gb: DEFAULT_NOTIFICATION_THRESHOLD_GB,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub refresh_interval_minutes: Option<u32>,
    pub notification_threshold_gb: Option<f64>,
}

impl Settings {
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(minutes) = patch.refresh_interval_minutes {
            self.refresh_interval_minutes = minutes;
        }
        if let Some(threshold) = patch.notification_threshold_gb {
            self.notification_threshold_gb = threshold;
        }
    }
}

/// What a balance lookup or a portal page parse yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReading {
    pub balance: f64,
    pub expiry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BalanceReading {
    pub fn new(balance: f64, expiry: impl Into<String>) -> Self {
        Self {
            balance,
            expiry: expiry.into(),
            error: None,
        }
    }

    pub fn parse_failed() -> Self {
        Self {
            balance: 0.0,
            expiry: PARSE_ERROR_EXPIRY.to_string(),
            error: Some("Failed to parse data".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceResult {
    pub summary: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Dashboard,
    Settings,
    Support,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub view: View,
    pub accounts: Vec<Account>,
    pub settings: Settings,
    pub total_balance_gb: f64,
    pub intelligence: Option<IntelligenceResult>,
    pub intelligence_loading: bool,
    pub refreshing: bool,
    pub add_form_open: bool,
    pub install_available: bool,
    pub refresh_interval_presets: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportInfo {
    pub email: String,
    pub mailto: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleStatus {
    pub ok: bool,
    pub message: String,
}
