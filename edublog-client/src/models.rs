use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Сущность с серверным идентификатором.
pub trait Identified {
    /// Идентификатор, присвоенный сервером.
    fn id(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Роль пользователя в терминах бэкенда.
pub enum Role {
    /// Преподаватель: публикует посты.
    #[serde(rename = "professor")]
    Teacher,
    /// Студент: читает, комментирует, лайкает.
    #[serde(rename = "aluno")]
    Student,
    /// Администратор платформы.
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    /// Значение роли в словаре бэкенда.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Teacher => "professor",
            Self::Student => "aluno",
            Self::Admin => "admin",
        }
    }

    /// Разбирает роль из словаря бэкенда или английского синонима.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "professor" | "teacher" => Some(Self::Teacher),
            "aluno" | "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Публичная модель пользователя.
pub struct User {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Имя.
    #[serde(rename = "nome")]
    pub name: String,
    /// Email.
    pub email: String,
    /// Роль.
    #[serde(rename = "tipo")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Пост преподавателя.
pub struct Post {
    /// Идентификатор поста.
    pub id: i64,
    /// Заголовок.
    pub title: String,
    /// Содержимое.
    pub content: String,
    /// Отображаемое имя автора.
    pub author: String,
    /// Идентификатор автора; только для поиска через `get_user`.
    pub author_id: i64,
    /// Количество лайков.
    #[serde(default)]
    pub likes: u64,
    /// Дата создания (UTC).
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Дата последнего обновления (UTC).
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Комментарий к посту.
pub struct Comment {
    /// Идентификатор комментария.
    pub id: i64,
    /// Пост, к которому относится комментарий.
    pub post_id: i64,
    /// Автор комментария.
    pub author_id: i64,
    /// Отображаемое имя автора.
    #[serde(default)]
    pub author: String,
    /// Текст.
    pub content: String,
    /// Дата создания (UTC).
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Лайк пользователя под постом.
pub struct Like {
    /// Идентификатор лайка.
    pub id: i64,
    /// Пост.
    pub post_id: i64,
    /// Пользователь.
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Состояние лайка после переключения.
pub struct LikeStatus {
    /// Стоит ли лайк текущего пользователя.
    pub liked: bool,
    /// Общее количество лайков у поста.
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Учётная запись преподавателя.
pub struct Teacher {
    /// Идентификатор.
    pub id: i64,
    /// Имя.
    pub name: String,
    /// Email.
    pub email: String,
    /// Кафедра.
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Учётная запись студента.
pub struct Student {
    /// Идентификатор.
    pub id: i64,
    /// Имя.
    pub name: String,
    /// Email.
    pub email: String,
    /// Номер студенческого билета.
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Ответ после успешной регистрации или входа.
pub struct AuthResponse {
    /// Непрозрачный токен доступа.
    pub token: String,
    /// Данные пользователя.
    #[serde(rename = "usuario")]
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Параметры пагинации в том виде, в каком их сообщил сервер.
pub struct Pagination {
    /// Текущая страница (с единицы).
    pub current_page: u32,
    /// Всего страниц.
    pub total_pages: u32,
    /// Всего элементов.
    pub total_items: u64,
    /// Есть ли следующая страница: `current_page < total_pages`.
    pub has_next_page: bool,
}

impl Pagination {
    /// Строит пагинацию по значениям сервера.
    pub fn from_server(current_page: u32, total_pages: u32, total_items: u64) -> Self {
        Self {
            current_page,
            total_pages,
            total_items,
            has_next_page: current_page < total_pages,
        }
    }

    /// Пагинация для ответа без метаданных: всё в одной странице.
    pub fn single(total_items: usize) -> Self {
        Self::from_server(1, 1, total_items as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Одна страница коллекции.
pub struct Page<T> {
    /// Элементы в серверном порядке.
    pub items: Vec<T>,
    /// Пагинация.
    pub pagination: Pagination,
}

macro_rules! impl_identified {
    ($($ty:ty),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })*
    };
}

impl_identified!(User, Post, Comment, Like, Teacher, Student);
