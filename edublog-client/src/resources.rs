//! Коллекции бэкенда поверх `Gateway`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ClientResult, ErrorInfo};
use crate::forms::{CommentDraft, PostDraft, StudentDraft, TeacherDraft};
use crate::gateway::Gateway;
use crate::models::{Comment, LikeStatus, Page, Post, Student, Teacher, User};
use crate::store::{EntityStore, Resource, Searchable};

/// Контейнер постов.
pub type PostsStore = EntityStore<PostsResource>;
/// Контейнер комментариев одного поста.
pub type CommentsStore = EntityStore<CommentsResource>;
/// Контейнер преподавателей.
pub type TeachersStore = EntityStore<TeachersResource>;
/// Контейнер студентов.
pub type StudentsStore = EntityStore<StudentsResource>;

#[derive(Debug, Clone)]
/// Посты.
pub struct PostsResource {
    gateway: Arc<Gateway>,
}

impl PostsResource {
    /// Коллекция постов через `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Resource for PostsResource {
    type Item = Post;
    type Draft = PostDraft;

    fn name(&self) -> &'static str {
        "posts"
    }

    async fn list(&self, page: u32, limit: u32) -> ClientResult<Page<Post>> {
        self.gateway.list_posts(page, limit).await
    }

    async fn get(&self, id: i64) -> ClientResult<Post> {
        self.gateway.get_post(id).await
    }

    async fn create(&self, draft: &PostDraft) -> ClientResult<Post> {
        self.gateway.create_post(draft).await
    }

    async fn update(&self, id: i64, draft: &PostDraft) -> ClientResult<Post> {
        self.gateway.update_post(id, draft).await
    }

    async fn delete(&self, id: i64) -> ClientResult<()> {
        self.gateway.delete_post(id).await
    }

    async fn search(&self, query: &str, page: u32, limit: u32) -> ClientResult<Page<Post>> {
        self.gateway.search_posts(query, page, limit).await
    }
}

impl Searchable for PostsResource {}

impl EntityStore<PostsResource> {
    /// Переключает лайк и обновляет счётчик поста в списке.
    pub async fn toggle_like(&self, post_id: i64) -> ClientResult<LikeStatus> {
        let gateway = self.resource().gateway.clone();
        self.mutate("toggle_like", gateway.toggle_like(post_id), |state, status| {
            if let Some(post) = state.items.iter_mut().find(|post| post.id == post_id) {
                post.likes = status.likes;
            }
        })
        .await
    }

    /// Автор поста. Пост ищется сначала в списке, затем на сервере.
    pub async fn author_of(&self, post_id: i64) -> ClientResult<User> {
        let gateway = &self.resource().gateway;
        let author_id = match self.find(post_id) {
            Some(post) => post.author_id,
            None => gateway.get_post(post_id).await?.author_id,
        };
        gateway.get_user(author_id).await
    }
}

const COMMENT_LOOKUP_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
/// Комментарии одного поста.
pub struct CommentsResource {
    gateway: Arc<Gateway>,
    post_id: i64,
}

impl CommentsResource {
    /// Комментарии поста `post_id`.
    pub fn new(gateway: Arc<Gateway>, post_id: i64) -> Self {
        Self { gateway, post_id }
    }

    /// Пост, к которому привязана коллекция.
    pub fn post_id(&self) -> i64 {
        self.post_id
    }
}

#[async_trait]
impl Resource for CommentsResource {
    type Item = Comment;
    type Draft = CommentDraft;

    fn name(&self) -> &'static str {
        "comments"
    }

    async fn list(&self, page: u32, limit: u32) -> ClientResult<Page<Comment>> {
        self.gateway.list_comments(self.post_id, page, limit).await
    }

    async fn get(&self, id: i64) -> ClientResult<Comment> {
        // отдельного эндпоинта нет: ищем в первой странице
        let page = self
            .gateway
            .list_comments(self.post_id, 1, COMMENT_LOOKUP_LIMIT)
            .await?;
        page.items
            .into_iter()
            .find(|comment| comment.id == id)
            .ok_or_else(|| ErrorInfo::from_http_status(404, format!("comment id: {id}")))
    }

    async fn create(&self, draft: &CommentDraft) -> ClientResult<Comment> {
        self.gateway.create_comment(self.post_id, draft).await
    }

    async fn update(&self, id: i64, draft: &CommentDraft) -> ClientResult<Comment> {
        self.gateway.update_comment(self.post_id, id, draft).await
    }

    async fn delete(&self, id: i64) -> ClientResult<()> {
        self.gateway.delete_comment(self.post_id, id).await
    }
}

#[derive(Debug, Clone)]
/// Учётные записи преподавателей.
pub struct TeachersResource {
    gateway: Arc<Gateway>,
}

impl TeachersResource {
    /// Коллекция преподавателей через `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Resource for TeachersResource {
    type Item = Teacher;
    type Draft = TeacherDraft;

    fn name(&self) -> &'static str {
        "teachers"
    }

    async fn list(&self, page: u32, limit: u32) -> ClientResult<Page<Teacher>> {
        self.gateway.list_teachers(page, limit).await
    }

    async fn get(&self, id: i64) -> ClientResult<Teacher> {
        self.gateway.get_teacher(id).await
    }

    async fn create(&self, draft: &TeacherDraft) -> ClientResult<Teacher> {
        self.gateway.create_teacher(draft).await
    }

    async fn update(&self, id: i64, draft: &TeacherDraft) -> ClientResult<Teacher> {
        self.gateway.update_teacher(id, draft).await
    }

    async fn delete(&self, id: i64) -> ClientResult<()> {
        self.gateway.delete_teacher(id).await
    }
}

#[derive(Debug, Clone)]
/// Учётные записи студентов.
pub struct StudentsResource {
    gateway: Arc<Gateway>,
}

impl StudentsResource {
    /// Коллекция студентов через `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Resource for StudentsResource {
    type Item = Student;
    type Draft = StudentDraft;

    fn name(&self) -> &'static str {
        "students"
    }

    async fn list(&self, page: u32, limit: u32) -> ClientResult<Page<Student>> {
        self.gateway.list_students(page, limit).await
    }

    async fn get(&self, id: i64) -> ClientResult<Student> {
        self.gateway.get_student(id).await
    }

    async fn create(&self, draft: &StudentDraft) -> ClientResult<Student> {
        self.gateway.create_student(draft).await
    }

    async fn update(&self, id: i64, draft: &StudentDraft) -> ClientResult<Student> {
        self.gateway.update_student(id, draft).await
    }

    async fn delete(&self, id: i64) -> ClientResult<()> {
        self.gateway.delete_student(id).await
    }
}
