//! Черновики форм, которые проверяются до отправки на сервер.

use crate::error::{ClientResult, ErrorInfo};
use crate::models::Role;
use crate::validation::{Rule, validate};

/// Поле формы: имя, текущее значение и список правил.
pub type FieldRules<'a> = (&'static str, &'a str, Vec<Rule>);

/// Форма, которую можно проверить целиком.
pub trait Validate {
    /// Поля формы в порядке проверки.
    fn fields(&self) -> Vec<FieldRules<'_>>;

    /// Первая ошибка по порядку полей в виде `VALIDATION`.
    fn validate(&self) -> ClientResult<()> {
        for (_, value, rules) in self.fields() {
            let result = validate(&rules, value);
            if !result.valid {
                return Err(ErrorInfo::validation(result.message));
            }
        }
        Ok(())
    }

    /// Первая ошибка каждого невалидного поля, для подсветки в форме.
    fn field_errors(&self) -> Vec<(&'static str, String)> {
        self.fields()
            .into_iter()
            .filter_map(|(name, value, rules)| {
                let result = validate(&rules, value);
                (!result.valid).then_some((name, result.message))
            })
            .collect()
    }
}

/// Правила для email.
pub fn email_rules() -> Vec<Rule> {
    vec![
        Rule::required("Введите email"),
        Rule::email("Некорректный email"),
    ]
}

/// Правила для пароля.
pub fn password_rules() -> Vec<Rule> {
    vec![
        Rule::required("Введите пароль"),
        Rule::min_length(6, "Пароль должен быть не короче 6 символов"),
        Rule::max_length(128, "Пароль должен быть не длиннее 128 символов"),
    ]
}

/// Правила подтверждения пароля; строятся заново при каждом изменении пароля.
pub fn password_confirmation_rules(password: &str) -> Vec<Rule> {
    vec![
        Rule::required("Подтвердите пароль"),
        Rule::equals(password, "Пароли не совпадают"),
    ]
}

/// Правила для имени пользователя.
pub fn name_rules() -> Vec<Rule> {
    vec![
        Rule::required("Введите имя"),
        Rule::min_length(3, "Имя должно быть не короче 3 символов"),
        Rule::max_length(100, "Имя должно быть не длиннее 100 символов"),
    ]
}

#[derive(Debug, Clone, Default)]
/// Форма входа.
pub struct LoginForm {
    /// Email.
    pub email: String,
    /// Пароль.
    pub password: String,
}

impl Validate for LoginForm {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        vec![
            ("email", self.email.as_str(), email_rules()),
            (
                "password",
                self.password.as_str(),
                vec![Rule::required("Введите пароль")],
            ),
        ]
    }
}

#[derive(Debug, Clone)]
/// Форма регистрации.
pub struct RegisterForm {
    /// Имя.
    pub name: String,
    /// Email.
    pub email: String,
    /// Пароль.
    pub password: String,
    /// Повтор пароля.
    pub password_confirmation: String,
    /// Роль нового пользователя.
    pub role: Role,
}

impl Validate for RegisterForm {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        vec![
            ("name", self.name.as_str(), name_rules()),
            ("email", self.email.as_str(), email_rules()),
            ("password", self.password.as_str(), password_rules()),
            (
                "password_confirmation",
                self.password_confirmation.as_str(),
                password_confirmation_rules(&self.password),
            ),
        ]
    }
}

#[derive(Debug, Clone, Default)]
/// Черновик поста.
pub struct PostDraft {
    /// Заголовок.
    pub title: String,
    /// Содержимое.
    pub content: String,
    /// Отображаемое имя автора.
    pub author: String,
}

impl Validate for PostDraft {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        vec![
            (
                "title",
                self.title.as_str(),
                vec![
                    Rule::required("Введите заголовок"),
                    Rule::max_length(255, "Заголовок должен быть не длиннее 255 символов"),
                ],
            ),
            (
                "content",
                self.content.as_str(),
                vec![Rule::required("Введите текст поста")],
            ),
            (
                "author",
                self.author.as_str(),
                vec![Rule::required("Укажите автора")],
            ),
        ]
    }
}

#[derive(Debug, Clone, Default)]
/// Черновик комментария.
pub struct CommentDraft {
    /// Текст.
    pub content: String,
}

impl Validate for CommentDraft {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        vec![(
            "content",
            self.content.as_str(),
            vec![
                Rule::required("Комментарий не может быть пустым"),
                Rule::max_length(1000, "Комментарий должен быть не длиннее 1000 символов"),
            ],
        )]
    }
}

#[derive(Debug, Clone, Default)]
/// Черновик учётной записи преподавателя.
pub struct TeacherDraft {
    /// Имя.
    pub name: String,
    /// Email.
    pub email: String,
    /// Кафедра.
    pub department: String,
    /// Пароль; обязателен только при создании.
    pub password: Option<String>,
}

impl Validate for TeacherDraft {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        let mut fields = vec![
            ("name", self.name.as_str(), name_rules()),
            ("email", self.email.as_str(), email_rules()),
            (
                "department",
                self.department.as_str(),
                vec![Rule::required("Укажите кафедру")],
            ),
        ];
        if let Some(password) = &self.password {
            fields.push(("password", password.as_str(), password_rules()));
        }
        fields
    }
}

#[derive(Debug, Clone, Default)]
/// Черновик учётной записи студента.
pub struct StudentDraft {
    /// Имя.
    pub name: String,
    /// Email.
    pub email: String,
    /// Номер студенческого билета.
    pub student_id: String,
    /// Пароль; обязателен только при создании.
    pub password: Option<String>,
}

impl Validate for StudentDraft {
    fn fields(&self) -> Vec<FieldRules<'_>> {
        let mut fields = vec![
            ("name", self.name.as_str(), name_rules()),
            ("email", self.email.as_str(), email_rules()),
            (
                "student_id",
                self.student_id.as_str(),
                vec![
                    Rule::required("Укажите номер студенческого билета"),
                    Rule::digits("Номер студенческого билета должен содержать только цифры"),
                ],
            ),
        ];
        if let Some(password) = &self.password {
            fields.push(("password", password.as_str(), password_rules()));
        }
        fields
    }
}
