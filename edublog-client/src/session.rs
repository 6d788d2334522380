//! Сессия пользователя: токен, профиль и уведомление об истечении.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{info, warn};

use crate::models::User;

/// Хранилище токена на устройстве.
pub trait TokenStorage: Send + Sync {
    /// Загружает сохранённый токен.
    fn load(&self) -> io::Result<Option<String>>;
    /// Сохраняет токен.
    fn save(&self, token: &str) -> io::Result<()>;
    /// Удаляет токен.
    fn clear(&self) -> io::Result<()>;
}

fn parse_token(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[derive(Debug, Clone)]
/// Токен в текстовом файле.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Хранилище в файле `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse_token(&raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        fs::write(&self.path, token)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
/// Токен в памяти процесса.
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    /// Хранилище с заранее сохранённым токеном.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> io::Result<Option<String>> {
        let token = self
            .token
            .lock()
            .map_err(|_| io::Error::other("token mutex poisoned"))?;
        Ok(token.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self
            .token
            .lock()
            .map_err(|_| io::Error::other("token mutex poisoned"))? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self
            .token
            .lock()
            .map_err(|_| io::Error::other("token mutex poisoned"))? = None;
        Ok(())
    }
}

type ExpiredCallback = Arc<dyn Fn() + Send + Sync>;

/// Текущая сессия.
///
/// Передаётся в `Gateway` явно. Колбэк истечения сессии вызывается не более
/// одного раза на серию 401: флаг `expired` сбрасывается только новым входом.
pub struct SessionStore {
    token: RwLock<Option<String>>,
    user: RwLock<Option<User>>,
    expired: AtomicBool,
    on_expired: RwLock<Option<ExpiredCallback>>,
    storage: Arc<dyn TokenStorage>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("expired", &self.expired.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Пустая сессия поверх хранилища токена.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            token: RwLock::new(None),
            user: RwLock::new(None),
            // без сессии истекать нечему
            expired: AtomicBool::new(true),
            on_expired: RwLock::new(None),
            storage,
        }
    }

    /// Сессия в памяти, для тестов и одноразовых запусков.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStorage::default()))
    }

    /// Регистрирует колбэк истечения сессии, заменяя предыдущий.
    pub fn set_on_expired(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_expired.write() {
            *slot = Some(Arc::new(callback));
        }
    }

    /// Текущий токен.
    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|token| token.clone())
    }

    /// Текущий пользователь, если он известен.
    pub fn user(&self) -> Option<User> {
        self.user.read().ok().and_then(|user| user.clone())
    }

    /// Есть ли токен.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().map(|token| token.is_some()).unwrap_or(false)
    }

    /// Начинает сессию после входа или регистрации.
    pub fn begin(&self, token: impl Into<String>, user: Option<User>) {
        let token = token.into();
        if let Err(err) = self.storage.save(&token) {
            warn!(error = %err, "failed to persist session token");
        }
        self.set_token(Some(token));
        self.set_user(user);
        self.expired.store(false, Ordering::SeqCst);
    }

    /// Восстанавливает токен из хранилища. Возвращает `true`, если токен найден.
    pub fn restore(&self) -> bool {
        match self.storage.load() {
            Ok(Some(token)) => {
                self.set_token(Some(token));
                self.expired.store(false, Ordering::SeqCst);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "failed to load session token");
                false
            }
        }
    }

    /// Обновляет профиль текущего пользователя.
    pub fn set_user(&self, user: Option<User>) {
        if let Ok(mut slot) = self.user.write() {
            *slot = user;
        }
    }

    /// Явный выход: очищает сессию без вызова колбэка.
    pub fn end(&self) {
        self.expired.store(true, Ordering::SeqCst);
        self.clear_local();
    }

    /// Сервер отверг токен: очищает сессию и один раз на серию вызывает колбэк.
    ///
    /// Возвращает `true`, если колбэк был вызван этим обращением.
    pub fn expire(&self) -> bool {
        self.clear_local();
        if self.expired.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!("session expired, notifying subscriber");
        let callback = self
            .on_expired
            .read()
            .ok()
            .and_then(|slot| slot.clone());
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Как `expire`, но игнорирует 401 на запрос со старым токеном, если
    /// пользователь успел войти заново.
    pub fn expire_token(&self, used: Option<&str>) -> bool {
        let current = self.token();
        if let (Some(used), Some(current)) = (used, current.as_deref()) {
            if used != current {
                return false;
            }
        }
        self.expire()
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    fn clear_local(&self) {
        self.set_token(None);
        self.set_user(None);
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to clear session token");
        }
    }
}
