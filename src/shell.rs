use crate::app_state::AppState;
use crate::balance::SimulatedBalanceSource;
use crate::gemini::{GeminiClient, GeminiConfig};
use crate::install::{DeferredInstall, InstallOutcome, InstallResponse};
use crate::logging;
use crate::models::{
    Account, AccountStatus, BalanceReading, DashboardView, IntelligenceResult, Settings,
    SettingsPatch, SimpleStatus, SupportInfo, View,
};
use crate::store::{default_data_dir, AppStore};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tauri::{AppHandle, Emitter, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons};
use tauri_plugin_notification::NotificationExt;
use tauri_plugin_opener::OpenerExt;
use tokio::sync::oneshot;
use tracing::warn;

type CmdResult<T> = Result<T, String>;

const INSTALL_PROMPT_EVENT: &str = "install://prompt";

fn map_error<T>(result: anyhow::Result<T>) -> CmdResult<T> {
    result.map_err(|error| error.to_string())
}

fn notify_if_low(app: &AppHandle, account: &Account) {
    if account.status != AccountStatus::Low {
        return;
    }
    let result = app
        .notification()
        .builder()
        .title("رصيد منخفض")
        .body(format!(
            "{}: متبقي {} جيجابايت",
            account.name, account.balance_gb
        ))
        .show();
    if let Err(error) = result {
        warn!(error = %error, "low balance notification failed");
    }
}

/// Relays the webview's deferred install offer through a frontend event.
#[derive(Default)]
struct InstallBridge {
    pending: Mutex<Option<oneshot::Sender<InstallOutcome>>>,
}

struct WebviewInstallPrompt {
    app: AppHandle,
    bridge: Arc<InstallBridge>,
}

#[async_trait]
impl DeferredInstall for WebviewInstallPrompt {
    async fn prompt(&self) -> InstallOutcome {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.bridge.pending.lock() {
            *pending = Some(tx);
        }
        if let Err(error) = self.app.emit(INSTALL_PROMPT_EVENT, ()) {
            warn!(error = %error, "failed to forward install prompt");
            return InstallOutcome::Dismissed;
        }
        rx.await.unwrap_or(InstallOutcome::Dismissed)
    }
}

#[tauri::command]
fn get_dashboard(state: State<'_, Arc<AppState>>) -> CmdResult<DashboardView> {
    Ok(state.dashboard())
}

#[tauri::command]
async fn add_account(
    app: AppHandle,
    state: State<'_, Arc<AppState>>,
    name: String,
    username: String,
) -> CmdResult<Option<Account>> {
    let Some(added) = state.add_account(&name, &username) else {
        return Ok(None);
    };
    tauri::async_runtime::spawn(async move {
        if let Ok(Some(account)) = added.refresh.await {
            notify_if_low(&app, &account);
        }
    });
    Ok(Some(added.account))
}

#[tauri::command]
async fn refresh_account(
    app: AppHandle,
    state: State<'_, Arc<AppState>>,
    id: String,
) -> CmdResult<Option<Account>> {
    let refreshed = state.refresh_account(id.trim()).await;
    if let Some(account) = refreshed.as_ref() {
        notify_if_low(&app, account);
    }
    Ok(refreshed)
}

#[tauri::command]
async fn remove_account(
    app: AppHandle,
    state: State<'_, Arc<AppState>>,
    id: String,
) -> CmdResult<bool> {
    let id = id.trim().to_string();
    let Some(account) = state.account(&id) else {
        return Ok(false);
    };
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .message(format!("هل تريد حذف هذا الحساب؟\n{}", account.name))
        .title("حذف الحساب")
        .buttons(MessageDialogButtons::OkCancel)
        .show(move |confirmed| {
            let _ = tx.send(confirmed);
        });
    let confirmed = rx.await.unwrap_or(false);
    Ok(state.remove_account(&id, |_| confirmed))
}

#[tauri::command]
async fn refresh_intelligence(state: State<'_, Arc<AppState>>) -> CmdResult<IntelligenceResult> {
    Ok(state.refresh_intelligence().await)
}

#[tauri::command]
fn refresh_all(app: AppHandle, state: State<'_, Arc<AppState>>) -> CmdResult<SimpleStatus> {
    let state = Arc::clone(&state);
    tauri::async_runtime::spawn(async move {
        state.refresh_all().await;
        for account in state.accounts() {
            notify_if_low(&app, &account);
        }
    });
    Ok(SimpleStatus {
        ok: true,
        message: "جاري تحديث جميع الحسابات".to_string(),
    })
}

#[tauri::command]
fn get_settings(state: State<'_, Arc<AppState>>) -> CmdResult<Settings> {
    Ok(state.settings())
}

#[tauri::command]
fn update_settings(state: State<'_, Arc<AppState>>, patch: SettingsPatch) -> CmdResult<Settings> {
    Ok(state.update_settings(&patch))
}

#[tauri::command]
fn set_view(state: State<'_, Arc<AppState>>, view: View) -> CmdResult<View> {
    state.set_view(view);
    Ok(state.view())
}

#[tauri::command]
fn open_add_form(state: State<'_, Arc<AppState>>) -> CmdResult<bool> {
    state.open_add_form();
    Ok(state.is_add_form_open())
}

#[tauri::command]
fn close_add_form(state: State<'_, Arc<AppState>>) -> CmdResult<bool> {
    state.close_add_form();
    Ok(state.is_add_form_open())
}

#[tauri::command]
fn install_prompt_offered(
    app: AppHandle,
    state: State<'_, Arc<AppState>>,
    bridge: State<'_, Arc<InstallBridge>>,
) -> CmdResult<SimpleStatus> {
    state.capture_install_prompt(Arc::new(WebviewInstallPrompt {
        app,
        bridge: Arc::clone(&bridge),
    }));
    Ok(SimpleStatus {
        ok: true,
        message: "install prompt captured".to_string(),
    })
}

#[tauri::command]
fn install_prompt_choice(
    bridge: State<'_, Arc<InstallBridge>>,
    accepted: bool,
) -> CmdResult<SimpleStatus> {
    let sender = bridge
        .pending
        .lock()
        .map_err(|_| "install prompt lock poisoned".to_string())?
        .take();
    let outcome = if accepted {
        InstallOutcome::Accepted
    } else {
        InstallOutcome::Dismissed
    };
    let delivered = sender.is_some_and(|sender| sender.send(outcome).is_ok());
    Ok(SimpleStatus {
        ok: delivered,
        message: format!("{outcome:?}"),
    })
}

#[tauri::command]
async fn install_app(state: State<'_, Arc<AppState>>) -> CmdResult<InstallResponse> {
    Ok(state.install_app().await)
}

#[tauri::command]
async fn parse_portal_html(
    gemini: State<'_, Arc<GeminiClient>>,
    html: String,
) -> CmdResult<BalanceReading> {
    Ok(gemini.parse_portal_html(&html).await)
}

#[tauri::command]
fn get_support_info(state: State<'_, Arc<AppState>>) -> CmdResult<SupportInfo> {
    Ok(state.support_info())
}

#[tauri::command]
fn contact_support(app: AppHandle, state: State<'_, Arc<AppState>>) -> CmdResult<SimpleStatus> {
    let support = state.support_info();
    map_error(
        app.opener()
            .open_url(support.mailto, None::<&str>)
            .map_err(anyhow::Error::from),
    )?;
    Ok(SimpleStatus {
        ok: true,
        message: support.email,
    })
}

#[tauri::command]
fn open_source(app: AppHandle, uri: String) -> CmdResult<SimpleStatus> {
    let uri = uri.trim();
    if !(uri.starts_with("https://") || uri.starts_with("http://")) {
        return Err("only web links can be opened".to_string());
    }
    map_error(
        app.opener()
            .open_url(uri, None::<&str>)
            .map_err(anyhow::Error::from),
    )?;
    Ok(SimpleStatus {
        ok: true,
        message: uri.to_string(),
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let base_dir = default_data_dir();
    let _log_guard = match logging::init_tracing(&base_dir) {
        Ok(guard) => Some(guard),
        Err(error) => {
            eprintln!("logging disabled: {error:#}");
            None
        }
    };

    let gemini = Arc::new(
        GeminiClient::new(GeminiConfig::from_env()).expect("failed to build generative client"),
    );
    let store = AppStore::new(base_dir);
    let state = Arc::new(
        AppState::initialize(
            store,
            Arc::new(SimulatedBalanceSource::new()),
            Arc::clone(&gemini) as Arc<dyn crate::gemini::IntelligenceFeed>,
        )
        .expect("failed to initialize application state"),
    );
    let startup_state = Arc::clone(&state);

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_notification::init())
        .manage(state)
        .manage(gemini)
        .manage(Arc::new(InstallBridge::default()))
        .setup(move |_app| {
            tauri::async_runtime::spawn(async move {
                startup_state.refresh_intelligence().await;
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_dashboard,
            add_account,
            refresh_account,
            remove_account,
            refresh_intelligence,
            refresh_all,
            get_settings,
            update_settings,
            set_view,
            open_add_form,
            close_add_form,
            install_prompt_offered,
            install_prompt_choice,
            install_app,
            parse_portal_html,
            get_support_info,
            contact_support,
            open_source,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
