use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Машинный тег ошибки.
pub enum ErrorCode {
    /// Клиентская валидация формы, до сервера не доходит.
    Validation,
    /// Сервер ответил 401 или сообщил о невалидном токене.
    Unauthorized,
    /// Ресурс не найден (404).
    NotFound,
    /// Ошибка сервера (5xx).
    ServerError,
    /// Ответа нет: соединение не установлено или истёк таймаут.
    NetworkError,
    /// Всё остальное.
    Unknown,
}

impl ErrorCode {
    /// Строковое представление тега, например `NETWORK_ERROR`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
/// Ошибка клиентской библиотеки `edublog-client`.
///
/// `message` предназначено для показа пользователю, `code` и `status`
/// используются для ветвления логики.
pub struct ErrorInfo {
    /// Сообщение для пользователя.
    pub message: String,
    /// Машинный тег.
    pub code: Option<ErrorCode>,
    /// HTTP-статус ответа, если ответ был получен.
    pub status: Option<u16>,
}

/// Результат операций `edublog-client`.
pub type ClientResult<T> = Result<T, ErrorInfo>;

impl ErrorInfo {
    /// Создаёт ошибку с тегом и без HTTP-статуса.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            status: None,
        }
    }

    /// Ошибка валидации формы.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Сессия истекла или токен отсутствует.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Сетевая ошибка без ответа сервера.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Прочие ошибки без HTTP-статуса.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    /// Классифицирует неуспешный HTTP-ответ.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            401 => ErrorCode::Unauthorized,
            404 => ErrorCode::NotFound,
            500..=599 => ErrorCode::ServerError,
            _ => ErrorCode::Unknown,
        };
        Self {
            message: message.into(),
            code: Some(code),
            status: Some(status),
        }
    }

    /// Классифицирует ошибку транспорта `reqwest`.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return Self::network(err.to_string());
        }
        if err.is_decode() || err.is_body() {
            return Self::unknown(format!("failed to decode response: {err}"));
        }
        Self::network(err.to_string())
    }

    /// Тег ошибки; отсутствие тега трактуется как `UNKNOWN`.
    pub fn kind(&self) -> ErrorCode {
        self.code.unwrap_or(ErrorCode::Unknown)
    }

    /// Имеет ли смысл повторять идемпотентный запрос.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorCode::NetworkError | ErrorCode::ServerError
        )
    }

    /// Требует ли ошибка повторной авторизации.
    pub fn is_session_fatal(&self) -> bool {
        self.kind() == ErrorCode::Unauthorized
    }
}
