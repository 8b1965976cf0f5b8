//! Logins: the Authing QR-code flow, WeChat QR-connect, and the session user.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::csrf::random_token;
use super::flash::{FLASH_LOGGED_OUT, set_flash};
use super::prelude::*;
use crate::authing::{AuthingUser, QrLoginProvider, QrScanStatus};
use crate::constants::{LOGIN_ATTEMPT_TTL, LOGIN_PAGE_REFRESH_SECONDS, WECHAT_CALLBACK_PATH};
use crate::wechat::validate_callback_state;

const USER_KEY: &str = "user";
const QR_RANDOM_KEY: &str = "qr_random";
const WECHAT_STATE_KEY: &str = "wx_login_state";
const WECHAT_STATE_LENGTH: usize = 24;

/// Who is logged in, as kept in the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SessionUser {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: Option<String>,
    pub(crate) photo: Option<String>,
}

impl SessionUser {
    /// Value stored in `user_email` for this user's wallpapers.
    pub(crate) fn owner(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.id.clone())
    }
}

impl From<AuthingUser> for SessionUser {
    fn from(user: AuthingUser) -> Self {
        let name = user
            .nickname
            .clone()
            .or_else(|| user.name.clone())
            .or_else(|| user.username.clone())
            .or_else(|| user.email.clone())
            .unwrap_or_else(|| user.id.clone());
        Self {
            id: user.id,
            name,
            email: user.email,
            photo: user.photo,
        }
    }
}

pub(crate) async fn current_user(session: &Session) -> Result<Option<SessionUser>, WallpaperError> {
    Ok(session.get::<SessionUser>(USER_KEY).await?)
}

async fn log_in(session: &Session, user: &SessionUser) -> Result<(), WallpaperError> {
    session.cycle_id().await?;
    session.insert(USER_KEY, user.clone()).await?;
    info!("{} ({}) logged in", user.name, user.id);
    Ok(())
}

/// One QR login in flight.
#[derive(Clone, Debug)]
pub(crate) struct LoginAttempt {
    pub(crate) qr_url: String,
    pub(crate) status: QrScanStatus,
    pub(crate) user: Option<SessionUser>,
    created_at: Instant,
}

/// QR logins in flight, keyed by Authing's `random`.
#[derive(Clone, Debug, Default)]
pub(crate) struct LoginRegistry {
    attempts: Arc<RwLock<HashMap<String, LoginAttempt>>>,
}

impl LoginRegistry {
    pub(crate) async fn start(&self, random: &str, qr_url: &str) {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        prune(&mut attempts, now);
        attempts.insert(
            random.to_string(),
            LoginAttempt {
                qr_url: qr_url.to_string(),
                status: QrScanStatus::Pending,
                user: None,
                created_at: now,
            },
        );
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub(crate) async fn get(&self, random: &str) -> Option<LoginAttempt> {
        self.attempts.read().await.get(random).cloned()
    }

    pub(crate) async fn set_status(&self, random: &str, status: QrScanStatus) {
        if let Some(attempt) = self.attempts.write().await.get_mut(random) {
            attempt.status = status;
        }
    }

    pub(crate) async fn complete(&self, random: &str, user: SessionUser) {
        if let Some(attempt) = self.attempts.write().await.get_mut(random) {
            attempt.status = QrScanStatus::Confirmed;
            attempt.user = Some(user);
        }
    }

    pub(crate) async fn remove(&self, random: &str) -> Option<LoginAttempt> {
        self.attempts.write().await.remove(random)
    }
}

fn prune(attempts: &mut HashMap<String, LoginAttempt>, now: Instant) {
    let before = attempts.len();
    attempts.retain(|_, attempt| now.duration_since(attempt.created_at) < LOGIN_ATTEMPT_TTL);
    let dropped = before - attempts.len();
    if dropped > 0 {
        debug!("Dropped {dropped} stale QR logins");
    }
}

/// Polls Authing every `every` until the login finishes, fails, or is
/// dropped from the registry. Expired and failed logins are removed, a
/// confirmed one waits for its session to pick it up.
pub(crate) async fn poll_qr_login(
    provider: Arc<dyn QrLoginProvider>,
    registry: LoginRegistry,
    random: String,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    // the first tick fires immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if registry.get(&random).await.is_none() {
            debug!("QR login {random} dropped, stopping poll");
            return;
        }

        let check = match provider.check_status(&random).await {
            Ok(check) => check,
            Err(err) => {
                warn!("Checking QR login {random} failed: {err}");
                registry.remove(&random).await;
                return;
            }
        };
        let status = QrScanStatus::from_code(check.status);
        debug!("QR login {random} is {status}");

        if status == QrScanStatus::Confirmed {
            let Some(ticket) = check.ticket else {
                warn!("QR login {random} confirmed without a ticket");
                registry.remove(&random).await;
                return;
            };
            match provider.exchange_user_info(&ticket).await {
                Ok(user) => registry.complete(&random, SessionUser::from(user)).await,
                Err(err) => {
                    warn!("Exchanging ticket for QR login {random} failed: {err}");
                    registry.remove(&random).await;
                }
            }
            return;
        }

        if status.is_terminal() {
            registry.remove(&random).await;
            return;
        }
        registry.set_status(&random, status).await;
    }
}

/// Returns the session's live attempt, starting a new one when there is none.
async fn current_or_new_attempt(
    state: &AppState,
    session: &Session,
    provider: Arc<dyn QrLoginProvider>,
) -> Result<(String, LoginAttempt), WallpaperError> {
    if let Some(random) = session.get::<String>(QR_RANDOM_KEY).await? {
        if let Some(attempt) = state.logins.get(&random).await {
            return Ok((random, attempt));
        }
    }

    let code = provider.gene_code().await?;
    state.logins.start(&code.random, &code.url).await;
    session.insert(QR_RANDOM_KEY, code.random.clone()).await?;
    tokio::spawn(poll_qr_login(
        provider,
        state.logins.clone(),
        code.random.clone(),
        state.poll_interval,
    ));
    info!("Started QR login {}", code.random);

    let attempt = state
        .logins
        .get(&code.random)
        .await
        .ok_or_else(|| WallpaperError::InternalServerError("QR login vanished".to_string()))?;
    Ok((code.random, attempt))
}

/// Moves a confirmed QR login into the session.
async fn finish_if_confirmed(
    state: &AppState,
    session: &Session,
) -> Result<Option<SessionUser>, WallpaperError> {
    let Some(random) = session.get::<String>(QR_RANDOM_KEY).await? else {
        return Ok(None);
    };
    let Some(attempt) = state.logins.get(&random).await else {
        return Ok(None);
    };
    let Some(user) = attempt.user else {
        return Ok(None);
    };
    state.logins.remove(&random).await;
    session.remove::<String>(QR_RANDOM_KEY).await?;
    log_in(session, &user).await?;
    Ok(Some(user))
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub(crate) struct LoginTemplate {
    has_qr: bool,
    qr_url: String,
    status_label: String,
    refresh_seconds: u32,
    wechat_enabled: bool,
}

pub(crate) async fn login_page(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, WallpaperError> {
    if current_user(&session).await?.is_some() || finish_if_confirmed(&state, &session).await?.is_some()
    {
        return Ok(Redirect::to("/").into_response());
    }

    let (has_qr, qr_url, status_label) = match state.qr_login.clone() {
        Some(provider) => {
            let (_, attempt) = current_or_new_attempt(&state, &session, provider).await?;
            (true, attempt.qr_url, attempt.status.label().to_string())
        }
        None => (false, String::new(), "扫码登录未配置".to_string()),
    };

    Ok(LoginTemplate {
        has_qr,
        qr_url,
        status_label,
        refresh_seconds: LOGIN_PAGE_REFRESH_SECONDS,
        wechat_enabled: state.wechat.is_some(),
    }
    .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginStatus {
    logged_in: bool,
    status: Option<QrScanStatus>,
    user: Option<SessionUser>,
}

pub(crate) async fn login_status_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Envelope<LoginStatus>>, WallpaperError> {
    let user = match current_user(&session).await? {
        Some(user) => Some(user),
        None => finish_if_confirmed(&state, &session).await?,
    };
    let status = match (&user, session.get::<String>(QR_RANDOM_KEY).await?) {
        (Some(_), _) => Some(QrScanStatus::Confirmed),
        (None, Some(random)) => state.logins.get(&random).await.map(|attempt| attempt.status),
        (None, None) => None,
    };
    Ok(Json(Envelope::ok(
        "success",
        LoginStatus {
            logged_in: user.is_some(),
            status,
            user,
        },
    )))
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Redirect, WallpaperError> {
    if let Some(random) = session.get::<String>(QR_RANDOM_KEY).await? {
        state.logins.remove(&random).await;
    }
    if let Some(user) = current_user(&session).await? {
        info!("{} ({}) logged out", user.name, user.id);
    }
    session.flush().await?;
    set_flash(&session, FLASH_LOGGED_OUT).await?;
    Ok(Redirect::to("/"))
}

pub(crate) async fn wechat_login_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Redirect, WallpaperError> {
    let wechat = state.wechat.as_ref().ok_or(WallpaperError::NotConfigured("WX_APP_ID"))?;
    let login_state = random_token(WECHAT_STATE_LENGTH);
    session.insert(WECHAT_STATE_KEY, login_state.clone()).await?;
    let url = wechat.qr_login_url(WECHAT_CALLBACK_PATH, &login_state)?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub(crate) struct WechatCallback {
    code: String,
    state: String,
}

pub(crate) async fn wechat_callback_handler(
    State(state): State<AppState>,
    session: Session,
    Query(callback): Query<WechatCallback>,
) -> Result<Redirect, WallpaperError> {
    let saved = session.remove::<String>(WECHAT_STATE_KEY).await?;
    if !validate_callback_state(saved.as_deref(), &callback.state) {
        return Err(WallpaperError::Unauthorized);
    }
    let wechat = state.wechat.as_ref().ok_or(WallpaperError::NotConfigured("WX_APP_ID"))?;
    let info = wechat.get_user_info(&callback.code).await?;

    let Some(openid) = info.get("openid").and_then(|value| value.as_str()) else {
        return Err(WallpaperError::Upstream("WeChat response missing openid".to_string()));
    };
    let user = SessionUser {
        id: openid.to_string(),
        name: info
            .get("nickname")
            .and_then(|value| value.as_str())
            .unwrap_or(openid)
            .to_string(),
        email: None,
        photo: info
            .get("headimgurl")
            .and_then(|value| value.as_str())
            .map(str::to_owned),
    };
    log_in(&session, &user).await?;
    Ok(Redirect::to("/"))
}
