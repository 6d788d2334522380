//! Правила клиентской валидации полей форм.
//!
//! Правило: предикат над строковым значением плюс сообщение. Поле валидно,
//! если все правила из его списка выполняются; наружу отдаётся сообщение
//! первого нарушенного правила.

use std::fmt;

use validator::ValidateEmail;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Одно правило валидации.
pub struct Rule {
    test: Predicate,
    message: String,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Правило из произвольного предиката.
    pub fn custom(
        test: impl Fn(&str) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test: Box::new(test),
            message: message.into(),
        }
    }

    /// Значение не пустое после обрезки пробелов.
    pub fn required(message: impl Into<String>) -> Self {
        Self::custom(|value| !value.trim().is_empty(), message)
    }

    /// Не меньше `min` символов (без учёта крайних пробелов).
    pub fn min_length(min: usize, message: impl Into<String>) -> Self {
        Self::custom(move |value| value.trim().chars().count() >= min, message)
    }

    /// Не больше `max` символов (без учёта крайних пробелов).
    pub fn max_length(max: usize, message: impl Into<String>) -> Self {
        Self::custom(move |value| value.trim().chars().count() <= max, message)
    }

    /// Синтаксически корректный email.
    pub fn email(message: impl Into<String>) -> Self {
        Self::custom(|value| value.trim().to_string().validate_email(), message)
    }

    /// Только цифры.
    pub fn digits(message: impl Into<String>) -> Self {
        Self::custom(
            |value| {
                let value = value.trim();
                !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
            },
            message,
        )
    }

    /// Совпадает со значением соседнего поля.
    ///
    /// Значение соседа захватывается при создании правила, поэтому при его
    /// изменении список правил нужно построить заново.
    pub fn equals(other: impl Into<String>, message: impl Into<String>) -> Self {
        let other = other.into();
        Self::custom(move |value| value == other, message)
    }

    /// Сообщение правила.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Проверяет значение.
    pub fn check(&self, value: &str) -> bool {
        (self.test)(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Результат проверки поля.
pub struct Validation {
    /// Прошли ли все правила.
    pub valid: bool,
    /// Сообщение первого нарушенного правила; пустое, если всё валидно.
    pub message: String,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }
}

/// Проверяет значение по списку правил по порядку, останавливаясь на первом
/// нарушенном.
pub fn validate(rules: &[Rule], value: &str) -> Validation {
    rules
        .iter()
        .find(|rule| !rule.check(value))
        .map(|rule| Validation {
            valid: false,
            message: rule.message.clone(),
        })
        .unwrap_or_else(Validation::ok)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Когда поле перепроверяется.
pub enum ValidationMode {
    /// На каждое изменение значения.
    RealTime,
    /// Только при потере фокуса или отправке формы.
    #[default]
    Deferred,
}

#[derive(Debug, Clone, Default)]
/// Состояние одного поля формы.
pub struct Field {
    value: String,
    mode: ValidationMode,
    result: Option<Validation>,
}

impl Field {
    /// Пустое поле с выбранным режимом валидации.
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            value: String::new(),
            mode,
            result: None,
        }
    }

    /// Текущее значение.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Ввод нового значения. В режиме `RealTime` поле сразу перепроверяется.
    pub fn input(&mut self, value: impl Into<String>, rules: &[Rule]) {
        self.value = value.into();
        if self.mode == ValidationMode::RealTime {
            self.result = Some(validate(rules, &self.value));
        }
    }

    /// Потеря фокуса.
    pub fn blur(&mut self, rules: &[Rule]) -> &Validation {
        self.result.insert(validate(rules, &self.value))
    }

    /// Проверка при отправке формы; выполняется в любом режиме.
    pub fn submit(&mut self, rules: &[Rule]) -> bool {
        self.blur(rules).valid
    }

    /// Сообщение об ошибке, если поле уже проверялось и невалидно.
    pub fn error(&self) -> Option<&str> {
        self.result
            .as_ref()
            .filter(|result| !result.valid)
            .map(|result| result.message.as_str())
    }
}
