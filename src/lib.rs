mod app_state;
mod balance;
mod gemini;
mod install;
mod logging;
mod models;
mod store;

#[cfg(feature = "shell")]
mod shell;

pub use app_state::{AddedAccount, AppState};
pub use balance::{BalanceSource, SimulatedBalanceSource};
pub use gemini::{GeminiClient, GeminiConfig, GeminiError, IntelligenceFeed};
pub use install::{DeferredInstall, InstallOutcome, InstallResponse};
pub use logging::init_tracing;
pub use models::{
    Account, AccountStatus, BalanceReading, DashboardView, GroundingSource, IntelligenceResult,
    Settings, SettingsPatch, SimpleStatus, SupportInfo, View, WebSource,
};
pub use store::{default_data_dir, AppStore};

#[cfg(feature = "shell")]
pub use shell::run;
