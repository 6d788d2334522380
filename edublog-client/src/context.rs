use std::sync::Arc;

use crate::auth::AuthStore;
use crate::config::ClientConfig;
use crate::gateway::Gateway;
use crate::resources::{
    CommentsResource, CommentsStore, PostsResource, PostsStore, StudentsResource, StudentsStore,
    TeachersResource, TeachersStore,
};
use crate::session::{SessionStore, TokenStorage};

/// Все сервисы приложения. Создаётся один раз при старте и передаётся явно.
pub struct AppContext {
    config: ClientConfig,
    session: Arc<SessionStore>,
    gateway: Arc<Gateway>,
    auth: AuthStore,
    posts: PostsStore,
    teachers: TeachersStore,
    students: StudentsStore,
}

impl AppContext {
    /// Собирает сессию, клиент и контейнеры по настройкам.
    pub fn new(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> anyhow::Result<Self> {
        let session = Arc::new(SessionStore::new(storage));
        let gateway = Arc::new(Gateway::new(&config, session.clone())?);

        let auth = AuthStore::new(gateway.clone());
        let posts = PostsStore::new(
            PostsResource::new(gateway.clone()),
            config.retry.clone(),
            config.page_size,
        );
        let teachers = TeachersStore::new(
            TeachersResource::new(gateway.clone()),
            config.retry.clone(),
            config.page_size,
        );
        let students = StudentsStore::new(
            StudentsResource::new(gateway.clone()),
            config.retry.clone(),
            config.page_size,
        );

        Ok(Self {
            config,
            session,
            gateway,
            auth,
            posts,
            teachers,
            students,
        })
    }

    /// Настройки.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Сессия.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// HTTP-клиент.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Авторизация.
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// Посты.
    pub fn posts(&self) -> &PostsStore {
        &self.posts
    }

    /// Преподаватели.
    pub fn teachers(&self) -> &TeachersStore {
        &self.teachers
    }

    /// Студенты.
    pub fn students(&self) -> &StudentsStore {
        &self.students
    }

    /// Новый контейнер комментариев поста.
    pub fn comments(&self, post_id: i64) -> CommentsStore {
        CommentsStore::new(
            CommentsResource::new(self.gateway.clone(), post_id),
            self.config.retry.clone(),
            self.config.page_size,
        )
    }

    /// Колбэк на истечение сессии; вызывается не чаще раза на серию 401.
    pub fn on_session_expired(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.session.set_on_expired(callback);
    }
}
