use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ClientResult, ErrorInfo};
use crate::forms::{LoginForm, RegisterForm, Validate};
use crate::gateway::Gateway;
use crate::models::{AuthResponse, User};
use crate::session::SessionStore;
use crate::store::LoadingPhase;

#[derive(Debug, Clone, Default, PartialEq)]
/// Состояние авторизации.
pub struct AuthState {
    /// Фаза последнего действия.
    pub phase: LoadingPhase,
    /// Ошибка последнего действия.
    pub error: Option<ErrorInfo>,
}

/// Контейнер авторизации. Единственный владелец токена сессии.
pub struct AuthStore {
    gateway: Arc<Gateway>,
    session: Arc<SessionStore>,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// Контейнер поверх клиента и его сессии.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let session = gateway.session().clone();
        Self {
            gateway,
            session,
            state: watch::Sender::new(AuthState::default()),
        }
    }

    /// Снимок состояния.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Подписка на изменения состояния.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Есть ли действующая сессия.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Пользователь текущей сессии, если известен.
    pub fn current_user(&self) -> Option<User> {
        self.session.user()
    }

    /// Вход. Форма проверяется до обращения к серверу.
    pub async fn login(&self, form: &LoginForm) -> ClientResult<User> {
        form.validate()?;
        self.authenticate(self.gateway.login(form)).await
    }

    /// Регистрация с последующим входом.
    pub async fn register(&self, form: &RegisterForm) -> ClientResult<User> {
        form.validate()?;
        self.authenticate(self.gateway.register(form)).await
    }

    /// Выход. Локальная сессия очищается даже при ошибке сервера.
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            if let Err(err) = self.gateway.logout().await {
                warn!(error = %err, "server logout failed, clearing local session anyway");
            }
        }
        self.session.end();
        self.state.send_replace(AuthState::default());
        info!("logged out");
    }

    /// Восстанавливает сессию из хранилища токена.
    pub fn restore(&self) -> bool {
        self.session.restore()
    }

    async fn authenticate(
        &self,
        request: impl Future<Output = ClientResult<AuthResponse>>,
    ) -> ClientResult<User> {
        self.state.send_modify(|state| state.phase = LoadingPhase::Loading);

        match request.await {
            Ok(auth) => {
                info!(user_id = auth.user.id, "authenticated");
                self.session.begin(auth.token, Some(auth.user.clone()));
                self.state.send_replace(AuthState {
                    phase: LoadingPhase::Success,
                    error: None,
                });
                Ok(auth.user)
            }
            Err(err) => {
                warn!(error = %err, "authentication failed");
                self.state.send_replace(AuthState {
                    phase: LoadingPhase::Error,
                    error: Some(err.clone()),
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ErrorCode;
    use crate::session::MemoryTokenStorage;

    fn auth_with(session: SessionStore) -> AuthStore {
        let config = ClientConfig::new("http://127.0.0.1:9");
        let gateway = Gateway::new(&config, Arc::new(session)).expect("gateway must build");
        AuthStore::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn invalid_login_form_is_rejected_before_request() {
        let auth = auth_with(SessionStore::in_memory());

        let err = auth
            .login(&LoginForm {
                email: "не-почта".to_string(),
                password: String::new(),
            })
            .await
            .expect_err("form must fail validation");

        assert_eq!(err.kind(), ErrorCode::Validation);
        assert_eq!(auth.state().phase, LoadingPhase::Idle);
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn logout_without_session_only_resets_state() {
        let auth = auth_with(SessionStore::in_memory());
        auth.state.send_replace(AuthState {
            phase: LoadingPhase::Error,
            error: Some(ErrorInfo::unauthorized("Token inválido")),
        });

        auth.logout().await;

        assert_eq!(auth.state(), AuthState::default());
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn restore_picks_up_stored_token() {
        let storage = Arc::new(MemoryTokenStorage::with_token("tok-salvo"));
        let auth = auth_with(SessionStore::new(storage));

        assert!(auth.restore());
        assert!(auth.is_authenticated());
        assert_eq!(auth.session.token().as_deref(), Some("tok-salvo"));
    }

    #[test]
    fn restore_without_stored_token_stays_anonymous() {
        let auth = auth_with(SessionStore::in_memory());

        assert!(!auth.restore());
        assert!(!auth.is_authenticated());
    }
}
