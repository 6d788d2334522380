//! Единственная точка выхода в REST API бэкенда.

use std::sync::Arc;

use anyhow::Context;
use reqwest::header::HeaderName;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientResult, ErrorCode, ErrorInfo};
use crate::forms::{CommentDraft, LoginForm, PostDraft, RegisterForm, StudentDraft, TeacherDraft};
use crate::models::{
    AuthResponse, Comment, Like, LikeStatus, Page, Pagination, Post, Role, Student, Teacher, User,
};
use crate::session::SessionStore;

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    email: &'a str,
    senha: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequestDto<'a> {
    nome: &'a str,
    email: &'a str,
    senha: &'a str,
    tipo: Role,
}

#[derive(Debug, Serialize)]
struct PostRequestDto<'a> {
    title: &'a str,
    content: &'a str,
    author: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentRequestDto<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct TeacherRequestDto<'a> {
    name: &'a str,
    email: &'a str,
    department: &'a str,
    #[serde(rename = "senha", skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentRequestDto<'a> {
    name: &'a str,
    email: &'a str,
    student_id: &'a str,
    #[serde(rename = "senha", skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PageQuery<'a> {
    page: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationDto {
    current_page: u32,
    total_pages: u32,
    total_items: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Paged {
        data: Vec<T>,
        #[serde(default)]
        pagination: Option<PaginationDto>,
    },
    Bare(Vec<T>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneBody<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> From<ListBody<T>> for Page<T> {
    fn from(value: ListBody<T>) -> Self {
        match value {
            ListBody::Paged {
                data,
                pagination: Some(p),
            } => Self {
                items: data,
                pagination: Pagination::from_server(p.current_page, p.total_pages, p.total_items),
            },
            ListBody::Paged {
                data,
                pagination: None,
            }
            | ListBody::Bare(data) => Self {
                pagination: Pagination::single(data.len()),
                items: data,
            },
        }
    }
}

impl<T> OneBody<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Где искать сообщение об ошибке в теле ответа, по порядку.
const ERROR_MESSAGE_POINTERS: &[&str] = &[
    "/error",
    "/erro",
    "/message",
    "/mensagem",
    "/error/message",
    "/errors/0/msg",
    "/errors/0/message",
];

const PLAIN_TEXT_ERROR_LIMIT: usize = 200;

/// Достаёт сообщение об ошибке из тела ответа.
fn extract_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => ERROR_MESSAGE_POINTERS.iter().find_map(|pointer| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        }),
        Err(_) if !body.starts_with('<') && body.chars().count() <= PLAIN_TEXT_ERROR_LIMIT => {
            Some(body.to_string())
        }
        Err(_) => None,
    }
}

fn mentions_invalid_token(message: &str) -> bool {
    let message = message.to_lowercase();
    [
        "token inválido",
        "token invalido",
        "token expirado",
        "invalid token",
        "token invalid",
        "token expired",
        "jwt expired",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

fn classify_failure(status: StatusCode, body: &str) -> ErrorInfo {
    let message = extract_error_message(body).unwrap_or_else(|| format!("http status {status}"));
    if status.is_client_error() && mentions_invalid_token(&message) {
        return ErrorInfo {
            message,
            code: Some(ErrorCode::Unauthorized),
            status: Some(status.as_u16()),
        };
    }
    ErrorInfo::from_http_status(status.as_u16(), message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Приложить токен; 401 завершает сессию.
    Session,
    /// Приложить токен, если он есть, но сессию по 401 не завершать (выход).
    Detached,
    /// Запрос без токена (вход, регистрация).
    Anonymous,
}

#[derive(Debug, Clone)]
/// HTTP-клиент REST API платформы.
pub struct Gateway {
    base_url: String,
    token_header: HeaderName,
    client: Client,
    session: Arc<SessionStore>,
}

impl Gateway {
    /// Создаёт клиент по настройкам и общей сессии.
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .context("failed to build http client")?;
        let token_header = HeaderName::from_bytes(config.token_header.as_bytes())
            .with_context(|| format!("invalid token header name: {}", config.token_header))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            token_header,
            client,
            session,
        })
    }

    /// Сессия, с которой работает клиент.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Отправляет запрос и возвращает успешный ответ либо классифицированную ошибку.
    async fn send(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> ClientResult<Response> {
        let url = self.endpoint(path);
        let token = match auth {
            Auth::Session | Auth::Detached => self.session.token(),
            Auth::Anonymous => None,
        };

        let mut request = self.client.request(method.clone(), &url);
        if let Some(token) = &token {
            request = request.header(self.token_header.clone(), token);
        }
        let request = build(request);

        debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|err| {
            let info = ErrorInfo::from_reqwest(&err);
            warn!(%method, %url, code = %info.kind(), error = %err, "request failed");
            info
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let info = classify_failure(status, &body);
        warn!(
            %method,
            %url,
            status = status.as_u16(),
            code = %info.kind(),
            reason = %info.message,
            "request rejected"
        );

        if info.is_session_fatal() && auth == Auth::Session {
            self.session.expire_token(token.as_deref());
        }
        Err(info)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| ErrorInfo::from_reqwest(&err))
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(Method::GET, path, Auth::Session, |r| r).await?;
        Ok(Self::decode::<OneBody<T>>(response).await?.into_inner())
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &PageQuery<'_>,
    ) -> ClientResult<Page<T>> {
        let response = self
            .send(Method::GET, path, Auth::Session, |r| r.query(query))
            .await?;
        Ok(Self::decode::<ListBody<T>>(response).await?.into())
    }

    async fn send_json<TReq, TRes>(&self, method: Method, path: &str, body: &TReq) -> ClientResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        let response = self
            .send(method, path, Auth::Session, |r| r.json(body))
            .await?;
        Ok(Self::decode::<OneBody<TRes>>(response).await?.into_inner())
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(Method::DELETE, path, Auth::Session, |r| r)
            .await
            .map(|_| ())
    }

    /// Вход по email и паролю.
    pub async fn login(&self, form: &LoginForm) -> ClientResult<AuthResponse> {
        let payload = LoginRequestDto {
            email: form.email.trim(),
            senha: &form.password,
        };
        let response = self
            .send(Method::POST, "/auth/login", Auth::Anonymous, |r| {
                r.json(&payload)
            })
            .await?;
        Self::decode(response).await
    }

    /// Регистрация нового пользователя.
    pub async fn register(&self, form: &RegisterForm) -> ClientResult<AuthResponse> {
        let payload = RegisterRequestDto {
            nome: form.name.trim(),
            email: form.email.trim(),
            senha: &form.password,
            tipo: form.role,
        };
        let response = self
            .send(Method::POST, "/auth/register", Auth::Anonymous, |r| {
                r.json(&payload)
            })
            .await?;
        Self::decode(response).await
    }

    /// Сообщает серверу о выходе. Сессию не трогает.
    pub async fn logout(&self) -> ClientResult<()> {
        self.send(Method::POST, "/auth/logout", Auth::Detached, |r| r)
            .await
            .map(|_| ())
    }

    /// Список постов.
    pub async fn list_posts(&self, page: u32, limit: u32) -> ClientResult<Page<Post>> {
        let query = PageQuery {
            page,
            limit,
            q: None,
        };
        self.get_page("/posts", &query).await
    }

    /// Пост по идентификатору.
    pub async fn get_post(&self, id: i64) -> ClientResult<Post> {
        self.get_one(&format!("/posts/{id}")).await
    }

    /// Поиск постов по строке.
    pub async fn search_posts(&self, query: &str, page: u32, limit: u32) -> ClientResult<Page<Post>> {
        let query = PageQuery {
            page,
            limit,
            q: Some(query.trim()),
        };
        self.get_page("/posts/search", &query).await
    }

    /// Создаёт пост.
    pub async fn create_post(&self, draft: &PostDraft) -> ClientResult<Post> {
        let payload = PostRequestDto {
            title: draft.title.trim(),
            content: draft.content.trim(),
            author: draft.author.trim(),
        };
        self.send_json(Method::POST, "/posts", &payload).await
    }

    /// Обновляет пост.
    pub async fn update_post(&self, id: i64, draft: &PostDraft) -> ClientResult<Post> {
        let payload = PostRequestDto {
            title: draft.title.trim(),
            content: draft.content.trim(),
            author: draft.author.trim(),
        };
        self.send_json(Method::PUT, &format!("/posts/{id}"), &payload)
            .await
    }

    /// Удаляет пост.
    pub async fn delete_post(&self, id: i64) -> ClientResult<()> {
        self.delete(&format!("/posts/{id}")).await
    }

    /// Комментарии к посту.
    pub async fn list_comments(
        &self,
        post_id: i64,
        page: u32,
        limit: u32,
    ) -> ClientResult<Page<Comment>> {
        let query = PageQuery {
            page,
            limit,
            q: None,
        };
        self.get_page(&format!("/posts/{post_id}/comments"), &query)
            .await
    }

    /// Добавляет комментарий.
    pub async fn create_comment(&self, post_id: i64, draft: &CommentDraft) -> ClientResult<Comment> {
        let payload = CommentRequestDto {
            content: draft.content.trim(),
        };
        self.send_json(
            Method::POST,
            &format!("/posts/{post_id}/comments"),
            &payload,
        )
        .await
    }

    /// Редактирует комментарий.
    pub async fn update_comment(
        &self,
        post_id: i64,
        comment_id: i64,
        draft: &CommentDraft,
    ) -> ClientResult<Comment> {
        let payload = CommentRequestDto {
            content: draft.content.trim(),
        };
        self.send_json(
            Method::PUT,
            &format!("/posts/{post_id}/comments/{comment_id}"),
            &payload,
        )
        .await
    }

    /// Удаляет комментарий.
    pub async fn delete_comment(&self, post_id: i64, comment_id: i64) -> ClientResult<()> {
        self.delete(&format!("/posts/{post_id}/comments/{comment_id}"))
            .await
    }

    /// Ставит или снимает лайк текущего пользователя.
    pub async fn toggle_like(&self, post_id: i64) -> ClientResult<LikeStatus> {
        let response = self
            .send(
                Method::POST,
                &format!("/posts/{post_id}/like"),
                Auth::Session,
                |r| r,
            )
            .await?;
        Ok(Self::decode::<OneBody<LikeStatus>>(response)
            .await?
            .into_inner())
    }

    /// Лайки поста.
    pub async fn list_likes(&self, post_id: i64) -> ClientResult<Vec<Like>> {
        let response = self
            .send(
                Method::GET,
                &format!("/posts/{post_id}/likes"),
                Auth::Session,
                |r| r,
            )
            .await?;
        let page: Page<Like> = Self::decode::<ListBody<Like>>(response).await?.into();
        Ok(page.items)
    }

    /// Снимает лайк текущего пользователя.
    pub async fn remove_like(&self, post_id: i64) -> ClientResult<()> {
        self.delete(&format!("/posts/{post_id}/like")).await
    }

    /// Пользователь по идентификатору.
    pub async fn get_user(&self, id: i64) -> ClientResult<User> {
        self.get_one(&format!("/users/{id}")).await
    }

    /// Список преподавателей.
    pub async fn list_teachers(&self, page: u32, limit: u32) -> ClientResult<Page<Teacher>> {
        let query = PageQuery {
            page,
            limit,
            q: None,
        };
        self.get_page("/teachers", &query).await
    }

    /// Преподаватель по идентификатору.
    pub async fn get_teacher(&self, id: i64) -> ClientResult<Teacher> {
        self.get_one(&format!("/teachers/{id}")).await
    }

    /// Создаёт учётную запись преподавателя.
    pub async fn create_teacher(&self, draft: &TeacherDraft) -> ClientResult<Teacher> {
        self.send_json(Method::POST, "/teachers", &teacher_payload(draft))
            .await
    }

    /// Обновляет учётную запись преподавателя.
    pub async fn update_teacher(&self, id: i64, draft: &TeacherDraft) -> ClientResult<Teacher> {
        self.send_json(
            Method::PUT,
            &format!("/teachers/{id}"),
            &teacher_payload(draft),
        )
        .await
    }

    /// Удаляет учётную запись преподавателя.
    pub async fn delete_teacher(&self, id: i64) -> ClientResult<()> {
        self.delete(&format!("/teachers/{id}")).await
    }

    /// Список студентов.
    pub async fn list_students(&self, page: u32, limit: u32) -> ClientResult<Page<Student>> {
        let query = PageQuery {
            page,
            limit,
            q: None,
        };
        self.get_page("/students", &query).await
    }

    /// Студент по идентификатору.
    pub async fn get_student(&self, id: i64) -> ClientResult<Student> {
        self.get_one(&format!("/students/{id}")).await
    }

    /// Создаёт учётную запись студента.
    pub async fn create_student(&self, draft: &StudentDraft) -> ClientResult<Student> {
        self.send_json(Method::POST, "/students", &student_payload(draft))
            .await
    }

    /// Обновляет учётную запись студента.
    pub async fn update_student(&self, id: i64, draft: &StudentDraft) -> ClientResult<Student> {
        self.send_json(
            Method::PUT,
            &format!("/students/{id}"),
            &student_payload(draft),
        )
        .await
    }

    /// Удаляет учётную запись студента.
    pub async fn delete_student(&self, id: i64) -> ClientResult<()> {
        self.delete(&format!("/students/{id}")).await
    }
}

fn teacher_payload(draft: &TeacherDraft) -> TeacherRequestDto<'_> {
    TeacherRequestDto {
        name: draft.name.trim(),
        email: draft.email.trim(),
        department: draft.department.trim(),
        password: draft.password.as_deref(),
    }
}

fn student_payload(draft: &StudentDraft) -> StudentRequestDto<'_> {
    StudentRequestDto {
        name: draft.name.trim(),
        email: draft.email.trim(),
        student_id: draft.student_id.trim(),
        password: draft.password.as_deref(),
    }
}
