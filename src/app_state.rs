use crate::balance::BalanceSource;
use crate::gemini::IntelligenceFeed;
use crate::install::{
    DeferredInstall, InstallOutcome, InstallPromptSlot, InstallResponse,
    MANUAL_INSTALL_INSTRUCTIONS,
};
use crate::models::{
    Account, AccountStatus, DashboardView, IntelligenceResult, Settings, SettingsPatch,
    SupportInfo, View, REFRESH_INTERVAL_PRESETS,
};
use crate::store::AppStore;
use anyhow::Result;
use chrono::{Local, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const SUPPORT_EMAIL: &str = "tamamaltamimi11@gmail.com";

#[derive(Debug, Default)]
struct Dashboard {
    accounts: Vec<Account>,
    settings: Settings,
    intelligence: Option<IntelligenceResult>,
    intelligence_loading: usize,
    refreshes_in_flight: usize,
    view: View,
    add_form_open: bool,
    install: InstallPromptSlot,
    last_issued_id: i64,
}

impl Dashboard {
    /// Millisecond timestamp, bumped past every id already handed out.
    ///
    /// Stored ids are opaque strings; once a numeric one sits at `i64::MAX`
    /// the timestamp is used as is and stepped past any id still in the list.
    fn next_account_id(&mut self) -> String {
        let taken: HashSet<i64> = self
            .accounts
            .iter()
            .filter_map(|account| account.id.parse::<i64>().ok())
            .collect();
        let floor = taken
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(self.last_issued_id);
        let now = Utc::now().timestamp_millis();
        let mut id = floor.checked_add(1).map_or(now, |next| now.max(next));
        while taken.contains(&id) {
            id = id.wrapping_add(1);
        }
        self.last_issued_id = self.last_issued_id.max(id);
        id.to_string()
    }
}

/// Single owner of the account list, settings and intelligence result.
///
/// Mutations happen under one lock that is never held across an await, and
/// every change to the account list is written through to the store before
/// the lock is released.
pub struct AppState {
    pub store: AppStore,
    balance: Arc<dyn BalanceSource>,
    intelligence: Arc<dyn IntelligenceFeed>,
    dashboard: Mutex<Dashboard>,
}

struct InFlight<'a> {
    state: &'a AppState,
    counter: fn(&mut Dashboard) -> &mut usize,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a AppState, counter: fn(&mut Dashboard) -> &mut usize) -> Self {
        *counter(&mut state.lock()) += 1;
        Self { state, counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut dashboard = self.state.lock();
        let count = (self.counter)(&mut dashboard);
        *count = count.saturating_sub(1);
    }
}

/// The newly appended account and the refresh that was started for it.
pub struct AddedAccount {
    pub account: Account,
    pub refresh: JoinHandle<Option<Account>>,
}

impl AppState {
    pub fn initialize(
        store: AppStore,
        balance: Arc<dyn BalanceSource>,
        intelligence: Arc<dyn IntelligenceFeed>,
    ) -> Result<Self> {
        store.init()?;
        let mut seen = HashSet::new();
        let accounts: Vec<Account> = store
            .load_accounts()
            .into_iter()
            .filter(|account| seen.insert(account.id.clone()))
            .collect();
        let settings = store.load_settings();
        info!(
            accounts = accounts.len(),
            balance_source = balance.name(),
            "application state loaded"
        );
        Ok(Self {
            store,
            balance,
            intelligence,
            dashboard: Mutex::new(Dashboard {
                accounts,
                settings,
                ..Dashboard::default()
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Dashboard> {
        self.dashboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_accounts(&self, accounts: &[Account]) {
        if let Err(error) = self.store.save_accounts(accounts) {
            warn!(error = %error, "failed to persist accounts");
        }
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.lock().accounts.clone()
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.lock()
            .accounts
            .iter()
            .find(|account| account.id == id)
            .cloned()
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn intelligence(&self) -> Option<IntelligenceResult> {
        self.lock().intelligence.clone()
    }

    pub fn is_intelligence_loading(&self) -> bool {
        self.lock().intelligence_loading > 0
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshes_in_flight > 0
    }

    pub fn total_balance_gb(&self) -> f64 {
        self.lock()
            .accounts
            .iter()
            .map(|account| account.balance_gb)
            .sum()
    }

    pub fn dashboard(&self) -> DashboardView {
        let dashboard = self.lock();
        DashboardView {
            view: dashboard.view,
            accounts: dashboard.accounts.clone(),
            settings: dashboard.settings.clone(),
            total_balance_gb: dashboard
                .accounts
                .iter()
                .map(|account| account.balance_gb)
                .sum(),
            intelligence: dashboard.intelligence.clone(),
            intelligence_loading: dashboard.intelligence_loading > 0,
            refreshing: dashboard.refreshes_in_flight > 0,
            add_form_open: dashboard.add_form_open,
            install_available: dashboard.install.is_available(),
            refresh_interval_presets: REFRESH_INTERVAL_PRESETS.to_vec(),
        }
    }

    /// Appends a pending account and starts its first refresh.
    ///
    /// Returns `None` and leaves the add form untouched when either field is
    /// blank. Must be called from within a tokio runtime.
    pub fn add_account(self: &Arc<Self>, name: &str, username: &str) -> Option<AddedAccount> {
        let name = name.trim();
        let username = username.trim();
        if name.is_empty() || username.is_empty() {
            debug!("add account rejected: empty field");
            return None;
        }

        let account = {
            let mut dashboard = self.lock();
            let id = dashboard.next_account_id();
            let account = Account::pending(id, name, username);
            dashboard.accounts.push(account.clone());
            dashboard.add_form_open = false;
            self.persist_accounts(&dashboard.accounts);
            account
        };
        info!(id = %account.id, "account added");

        let state = Arc::clone(self);
        let id = account.id.clone();
        let refresh = tokio::spawn(async move { state.refresh_account(&id).await });
        Some(AddedAccount { account, refresh })
    }

    /// Fetches a fresh reading and applies it to whichever entry still has `id`.
    ///
    /// Overlapping refreshes of one account are not serialized: the last one
    /// to complete wins. A failed fetch leaves the entry as it was.
    pub async fn refresh_account(&self, id: &str) -> Option<Account> {
        let username = self
            .lock()
            .accounts
            .iter()
            .find(|account| account.id == id)
            .map(|account| account.username.clone())?;

        let _in_flight = InFlight::enter(self, |dashboard| &mut dashboard.refreshes_in_flight);
        let reading = match self.balance.fetch_balance(&username).await {
            Ok(reading) => reading,
            Err(error) => {
                warn!(id, error = %error, "balance fetch failed");
                return None;
            }
        };

        let mut dashboard = self.lock();
        let threshold = dashboard.settings.notification_threshold_gb;
        let Some(account) = dashboard
            .accounts
            .iter_mut()
            .find(|account| account.id == id)
        else {
            debug!(id, "account removed while refreshing, reading dropped");
            return None;
        };
        account.balance_gb = reading.balance;
        account.expiry_date = reading.expiry;
        account.last_updated = Local::now().format("%X").to_string();
        account.status = AccountStatus::from_balance(reading.balance, threshold);
        let updated = account.clone();
        self.persist_accounts(&dashboard.accounts);
        debug!(id, balance = updated.balance_gb, status = ?updated.status, "account refreshed");
        Some(updated)
    }

    /// Deletes the entry only if `confirm` agrees. Returns whether it was removed.
    pub fn remove_account<F>(&self, id: &str, confirm: F) -> bool
    where
        F: FnOnce(&Account) -> bool,
    {
        let Some(account) = self.account(id) else {
            return false;
        };
        if !confirm(&account) {
            debug!(id, "account removal declined");
            return false;
        }
        let mut dashboard = self.lock();
        let before = dashboard.accounts.len();
        dashboard.accounts.retain(|account| account.id != id);
        if dashboard.accounts.len() == before {
            return false;
        }
        self.persist_accounts(&dashboard.accounts);
        info!(id, "account removed");
        true
    }

    pub async fn refresh_intelligence(&self) -> IntelligenceResult {
        let _in_flight = InFlight::enter(self, |dashboard| &mut dashboard.intelligence_loading);
        let result = self.intelligence.fetch_intelligence().await;
        self.lock().intelligence = Some(result.clone());
        result
    }

    /// Refreshes every current account and the intelligence summary at once.
    pub async fn refresh_all(&self) {
        let ids: Vec<String> = self
            .lock()
            .accounts
            .iter()
            .map(|account| account.id.clone())
            .collect();
        let refreshes = futures::future::join_all(ids.iter().map(|id| self.refresh_account(id)));
        tokio::join!(refreshes, self.refresh_intelligence());
    }

    /// Applies the named fields. No bounds are enforced and no account
    /// status is recomputed until its next refresh.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Settings {
        let settings = {
            let mut dashboard = self.lock();
            dashboard.settings.apply(patch);
            dashboard.settings.clone()
        };
        if let Err(error) = self.store.save_settings(&settings) {
            warn!(error = %error, "failed to persist settings");
        }
        settings
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn set_view(&self, view: View) {
        self.lock().view = view;
    }

    pub fn open_add_form(&self) {
        self.lock().add_form_open = true;
    }

    pub fn close_add_form(&self) {
        self.lock().add_form_open = false;
    }

    pub fn is_add_form_open(&self) -> bool {
        self.lock().add_form_open
    }

    pub fn capture_install_prompt(&self, prompt: Arc<dyn DeferredInstall>) {
        self.lock().install.capture(prompt);
        debug!("install prompt captured");
    }

    pub fn install_available(&self) -> bool {
        self.lock().install.is_available()
    }

    /// Shows the captured prompt, or returns manual steps when none was offered.
    pub async fn install_app(&self) -> InstallResponse {
        let Some(prompt) = self.lock().install.current() else {
            return InstallResponse::ManualInstructions {
                message: MANUAL_INSTALL_INSTRUCTIONS.to_string(),
            };
        };
        let outcome = prompt.prompt().await;
        if outcome == InstallOutcome::Accepted {
            self.lock().install.consume(&prompt);
        }
        info!(?outcome, "install prompt answered");
        InstallResponse::Prompted { outcome }
    }

    pub fn support_info(&self) -> SupportInfo {
        SupportInfo {
            email: SUPPORT_EMAIL.to_string(),
            mailto: format!("mailto:{SUPPORT_EMAIL}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::SimulatedBalanceSource;
    use crate::gemini::{GeminiClient, GeminiConfig, FALLBACK_SUMMARY};
    use crate::models::{BalanceReading, SYNCING_PLACEHOLDER};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers each call with the next scripted reading after its own delay.
    #[derive(Default)]
    struct ScriptedBalance {
        script: Mutex<VecDeque<(Duration, anyhow::Result<BalanceReading>)>>,
    }

    impl ScriptedBalance {
        fn new(script: Vec<(u64, anyhow::Result<BalanceReading>)>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|(millis, reading)| (Duration::from_millis(millis), reading))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl BalanceSource for ScriptedBalance {
        async fn fetch_balance(&self, _username: &str) -> anyhow::Result<BalanceReading> {
            let next = self.script.lock().expect("script lock").pop_front();
            let (delay, reading) = next.expect("unscripted balance call");
            tokio::time::sleep(delay).await;
            reading
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct CannedIntelligence;

    #[async_trait]
    impl IntelligenceFeed for CannedIntelligence {
        async fn fetch_intelligence(&self) -> IntelligenceResult {
            tokio::time::sleep(Duration::from_millis(200)).await;
            IntelligenceResult {
                summary: "all good".to_string(),
                sources: Vec::new(),
            }
        }
    }

    struct FixedInstall(InstallOutcome);

    #[async_trait]
    impl DeferredInstall for FixedInstall {
        async fn prompt(&self) -> InstallOutcome {
            self.0
        }
    }

    fn state_with(
        balance: Arc<dyn BalanceSource>,
        intelligence: Arc<dyn IntelligenceFeed>,
    ) -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AppStore::new(dir.path().to_path_buf());
        let state = AppState::initialize(store, balance, intelligence).expect("init state");
        (dir, Arc::new(state))
    }

    fn reading(balance: f64) -> anyhow::Result<BalanceReading> {
        Ok(BalanceReading::new(balance, "2024-07-01"))
    }

    #[tokio::test(start_paused = true)]
    async fn add_then_refresh_with_simulated_source() {
        let (_dir, state) = state_with(
            Arc::new(SimulatedBalanceSource::new()),
            Arc::new(CannedIntelligence),
        );
        assert!(state.accounts().is_empty());
        state.open_add_form();

        let added = state
            .add_account("Home Modem", "0112345")
            .expect("valid account");
        let accounts = state.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Home Modem");
        assert_eq!(accounts[0].username, "0112345");
        assert_eq!(accounts[0].balance_gb, 0.0);
        assert_eq!(accounts[0].status, AccountStatus::Active);
        assert_eq!(accounts[0].last_updated, SYNCING_PLACEHOLDER);
        assert!(!state.is_add_form_open());

        let refreshed = added.refresh.await.expect("join").expect("refreshed");
        assert_eq!(refreshed.id, added.account.id);
        assert!((1.0..=20.0).contains(&refreshed.balance_gb));
        assert!(!refreshed.last_updated.is_empty());
        assert_ne!(refreshed.last_updated, SYNCING_PLACEHOLDER);
        assert_eq!(state.accounts(), vec![refreshed]);
        assert!(!state.is_refreshing());
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::default()),
            Arc::new(CannedIntelligence),
        );
        state.open_add_form();

        assert!(state.add_account("", "x").is_none());
        assert!(state.add_account("x", "").is_none());
        assert!(state.add_account("   ", "x").is_none());
        assert!(state.accounts().is_empty());
        assert!(state.is_add_form_open());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_adds_get_distinct_ids() {
        let (_dir, state) = state_with(
            Arc::new(SimulatedBalanceSource::new()),
            Arc::new(CannedIntelligence),
        );
        let ids: HashSet<String> = (0..5)
            .map(|index| {
                state
                    .add_account(&format!("Line {index}"), "0112345")
                    .expect("valid")
                    .account
                    .id
            })
            .collect();
        assert_eq!(ids.len(), 5);
        let ordered: Vec<String> = state.accounts().into_iter().map(|a| a.name).collect();
        assert_eq!(ordered, ["Line 0", "Line 1", "Line 2", "Line 3", "Line 4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn add_after_stored_max_id_picks_a_free_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AppStore::new(dir.path().to_path_buf());
        store.init().expect("init store");
        store
            .save_accounts(&[Account::pending(i64::MAX.to_string(), "Legacy", "1")])
            .expect("seed");
        let state = Arc::new(
            AppState::initialize(
                store,
                Arc::new(ScriptedBalance::new(vec![(0, reading(3.0)), (0, reading(4.0))])),
                Arc::new(CannedIntelligence),
            )
            .expect("init"),
        );

        let first = state.add_account("New", "2").expect("valid");
        let second = state.add_account("Newer", "3").expect("valid");
        first.refresh.await.expect("join");
        second.refresh.await.expect("join");

        let ids: HashSet<String> = state.accounts().into_iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&i64::MAX.to_string()));
        assert_eq!(state.store.load_accounts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_follows_threshold_at_each_refresh() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![
                (10, reading(0.0)),
                (10, reading(3.0)),
                (10, reading(10.0)),
            ])),
            Arc::new(CannedIntelligence),
        );
        state.update_settings(&SettingsPatch {
            notification_threshold_gb: Some(5.0),
            ..SettingsPatch::default()
        });
        let added = state.add_account("Home", "0112345").expect("valid");
        added.refresh.await.expect("join");
        let id = added.account.id;

        let low = state.refresh_account(&id).await.expect("refreshed");
        assert_eq!(low.balance_gb, 3.0);
        assert_eq!(low.status, AccountStatus::Low);

        let active = state.refresh_account(&id).await.expect("refreshed");
        assert_eq!(active.balance_gb, 10.0);
        assert_eq!(active.status, AccountStatus::Active);

        state.update_settings(&SettingsPatch {
            notification_threshold_gb: Some(50.0),
            ..SettingsPatch::default()
        });
        assert_eq!(
            state.account(&id).expect("still there").status,
            AccountStatus::Active
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_keep_last_completion() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![
                (0, reading(1.0)),
                (500, reading(7.0)),
                (100, reading(15.0)),
            ])),
            Arc::new(CannedIntelligence),
        );
        let added = state.add_account("Home", "0112345").expect("valid");
        added.refresh.await.expect("join");
        let id = added.account.id;

        let spawn_refresh = |state: &Arc<AppState>| {
            let state = Arc::clone(state);
            let id = id.clone();
            tokio::spawn(async move { state.refresh_account(&id).await })
        };
        let first_issued = spawn_refresh(&state);
        tokio::task::yield_now().await;
        let second_issued = spawn_refresh(&state);

        let second = second_issued.await.expect("join second");
        assert_eq!(second.expect("second").balance_gb, 15.0);
        assert_eq!(state.account(&id).expect("present").balance_gb, 15.0);
        let first = first_issued.await.expect("join first");
        assert_eq!(first.expect("first").balance_gb, 7.0);

        assert_eq!(state.account(&id).expect("present").balance_gb, 7.0);
        assert_eq!(state.store.load_accounts()[0].balance_gb, 7.0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_leaves_account_untouched() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![
                (10, reading(8.0)),
                (10, Err(anyhow::anyhow!("portal down"))),
            ])),
            Arc::new(CannedIntelligence),
        );
        let added = state.add_account("Home", "0112345").expect("valid");
        let before = added.refresh.await.expect("join").expect("refreshed");

        assert!(state.refresh_account(&before.id).await.is_none());
        assert_eq!(state.account(&before.id), Some(before));
        assert!(!state.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_during_refresh_discards_reading() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![(1000, reading(9.0))])),
            Arc::new(CannedIntelligence),
        );
        let added = state.add_account("Home", "0112345").expect("valid");
        tokio::task::yield_now().await;
        assert!(state.remove_account(&added.account.id, |_| true));

        assert!(added.refresh.await.expect("join").is_none());
        assert!(state.accounts().is_empty());
        assert!(state.store.load_accounts().is_empty());
    }

    #[tokio::test]
    async fn refresh_of_unknown_account_is_a_no_op() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::default()),
            Arc::new(CannedIntelligence),
        );
        assert!(state.refresh_account("missing").await.is_none());
        assert!(!state.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_needs_confirmation_and_targets_one_id() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![(0, reading(4.0)), (0, reading(6.0))])),
            Arc::new(CannedIntelligence),
        );
        let home = state.add_account("Home", "0112345").expect("valid");
        let office = state.add_account("Office", "0119999").expect("valid");
        home.refresh.await.expect("join");
        office.refresh.await.expect("join");

        assert!(!state.remove_account(&home.account.id, |_| false));
        assert_eq!(state.accounts().len(), 2);

        let mut asked_about = None;
        assert!(state.remove_account(&home.account.id, |account| {
            asked_about = Some(account.name.clone());
            true
        }));
        assert_eq!(asked_about.as_deref(), Some("Home"));
        let remaining: Vec<String> = state.accounts().into_iter().map(|a| a.id).collect();
        assert_eq!(remaining, vec![office.account.id.clone()]);

        let mut asked = false;
        assert!(!state.remove_account("missing", |_| {
            asked = true;
            true
        }));
        assert!(!asked);
    }

    #[tokio::test(start_paused = true)]
    async fn accounts_survive_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let balance: Arc<dyn BalanceSource> =
            Arc::new(ScriptedBalance::new(vec![(0, reading(12.0))]));
        let state = Arc::new(
            AppState::initialize(
                AppStore::new(dir.path().to_path_buf()),
                Arc::clone(&balance),
                Arc::new(CannedIntelligence),
            )
            .expect("init"),
        );
        let added = state.add_account("Home", "0112345").expect("valid");
        added.refresh.await.expect("join");
        state.update_settings(&SettingsPatch {
            refresh_interval_minutes: Some(15),
            notification_threshold_gb: None,
        });
        let saved = state.accounts();
        drop(state);

        let reopened = AppState::initialize(
            AppStore::new(dir.path().to_path_buf()),
            balance,
            Arc::new(CannedIntelligence),
        )
        .expect("reopen");
        assert_eq!(reopened.accounts(), saved);
        assert_eq!(reopened.settings().refresh_interval_minutes, 15);
        assert!(reopened.intelligence().is_none());
    }

    #[tokio::test]
    async fn failed_intelligence_falls_back_and_clears_loading() {
        let client = GeminiClient::new(GeminiConfig::default()).expect("client");
        let (_dir, state) = state_with(Arc::new(ScriptedBalance::default()), Arc::new(client));

        let result = state.refresh_intelligence().await;
        assert_eq!(result.summary, FALLBACK_SUMMARY);
        assert!(result.sources.is_empty());
        assert_eq!(state.intelligence(), Some(result));
        assert!(!state.is_intelligence_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn intelligence_loading_flag_spans_the_fetch() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::default()),
            Arc::new(CannedIntelligence),
        );
        let pending = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.refresh_intelligence().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.is_intelligence_loading());
        assert!(state.dashboard().intelligence_loading);

        pending.await.expect("join");
        assert!(!state.is_intelligence_loading());
        assert_eq!(
            state.intelligence().map(|result| result.summary),
            Some("all good".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_refresh_updates_everything() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::new(vec![
                (0, reading(1.0)),
                (0, reading(2.0)),
                (300, reading(4.5)),
                (100, reading(6.0)),
            ])),
            Arc::new(CannedIntelligence),
        );
        let first = state.add_account("Home", "0112345").expect("valid");
        let second = state.add_account("Office", "0119999").expect("valid");
        first.refresh.await.expect("join");
        second.refresh.await.expect("join");

        state.refresh_all().await;
        let balances: Vec<f64> = state.accounts().iter().map(|a| a.balance_gb).collect();
        assert_eq!(balances, vec![4.5, 6.0]);
        assert_eq!(state.total_balance_gb(), 10.5);
        assert!(state.intelligence().is_some());
        assert!(!state.is_refreshing());
    }

    #[tokio::test]
    async fn navigation_and_settings_are_unchecked() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::default()),
            Arc::new(CannedIntelligence),
        );
        assert_eq!(state.view(), View::Dashboard);
        state.set_view(View::Support);
        assert_eq!(state.view(), View::Support);
        state.set_view(View::Settings);
        assert_eq!(state.dashboard().view, View::Settings);

        let settings = state.update_settings(&SettingsPatch {
            refresh_interval_minutes: Some(1440),
            notification_threshold_gb: Some(-3.0),
        });
        assert_eq!(settings.notification_threshold_gb, -3.0);
        assert_eq!(state.store.load_settings(), settings);

        let presets = state.dashboard().refresh_interval_presets;
        assert_eq!(presets, vec![15, 60, 1440]);
        assert!(presets.contains(&settings.refresh_interval_minutes));

        let support = state.support_info();
        assert_eq!(support.mailto, format!("mailto:{}", support.email));
    }

    #[tokio::test]
    async fn install_prompt_is_consumed_only_on_accept() {
        let (_dir, state) = state_with(
            Arc::new(ScriptedBalance::default()),
            Arc::new(CannedIntelligence),
        );
        assert!(matches!(
            state.install_app().await,
            InstallResponse::ManualInstructions { .. }
        ));

        state.capture_install_prompt(Arc::new(FixedInstall(InstallOutcome::Dismissed)));
        assert_eq!(
            state.install_app().await,
            InstallResponse::Prompted {
                outcome: InstallOutcome::Dismissed
            }
        );
        assert!(state.install_available());

        state.capture_install_prompt(Arc::new(FixedInstall(InstallOutcome::Accepted)));
        assert_eq!(
            state.install_app().await,
            InstallResponse::Prompted {
                outcome: InstallOutcome::Accepted
            }
        );
        assert!(!state.install_available());
        assert!(!state.dashboard().install_available);
    }
}
