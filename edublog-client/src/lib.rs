//! Клиентское ядро образовательного блога: валидация форм, повторы запросов,
//! HTTP-клиент REST API и контейнеры состояния коллекций.
//!
//! Типичный поток: экран вызывает действие контейнера (`PostsStore`,
//! `TeachersStore`, `StudentsStore`, `AuthStore`), контейнер проверяет форму,
//! обращается к `Gateway` (читающие запросы идут через `with_retry`) и обновляет
//! своё состояние, а экран перерисовывается по подписке на него.
//!
//! Все сервисы собираются один раз в `AppContext` и передаются явно.
#![warn(missing_docs)]

mod auth;
mod config;
mod context;
mod error;
mod forms;
mod gateway;
mod models;
mod resources;
mod retry;
mod session;
mod store;
mod validation;

pub use auth::{AuthState, AuthStore};
pub use config::{
    ClientConfig, DEFAULT_API_URL, DEFAULT_TOKEN_FILE, DEFAULT_TOKEN_HEADER, normalize_base_url,
};
pub use context::AppContext;
pub use error::{ClientResult, ErrorCode, ErrorInfo};
pub use forms::{
    CommentDraft, FieldRules, LoginForm, PostDraft, RegisterForm, StudentDraft, TeacherDraft,
    Validate,
};
pub use gateway::Gateway;
pub use models::{
    AuthResponse, Comment, Identified, Like, LikeStatus, Page, Pagination, Post, Role, Student,
    Teacher, User,
};
pub use resources::{
    CommentsResource, CommentsStore, PostsResource, PostsStore, StudentsResource, StudentsStore,
    TeachersResource, TeachersStore,
};
pub use retry::{RetryPolicy, with_retry};
pub use session::{FileTokenStorage, MemoryTokenStorage, SessionStore, TokenStorage};
pub use store::{CollectionState, EntityStore, LoadingPhase, Resource, Searchable};
pub use validation::{Field, Rule, Validation, ValidationMode, validate};
