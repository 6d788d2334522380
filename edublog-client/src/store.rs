//! Контейнеры состояния коллекций: элементы, фаза загрузки, ошибка, пагинация.
//!
//! Экран вызывает действие контейнера и перерисовывается по его состоянию.
//! Читающие действия ошибку не возвращают, а кладут её в состояние;
//! изменяющие и кладут, и возвращают, чтобы экран мог показать уведомление.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{ClientResult, ErrorInfo};
use crate::forms::Validate;
use crate::models::{Identified, Page, Pagination};
use crate::retry::{RetryPolicy, with_retry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Фаза загрузки контейнера.
pub enum LoadingPhase {
    /// Ничего ещё не запрашивалось.
    #[default]
    Idle,
    /// Запрос в полёте.
    Loading,
    /// Последний запрос успешен.
    Success,
    /// Последний запрос завершился ошибкой; `error` заполнен.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
/// Снимок состояния коллекции.
pub struct CollectionState<T> {
    /// Элементы в серверном порядке.
    pub items: Vec<T>,
    /// Фаза загрузки.
    pub phase: LoadingPhase,
    /// Последняя ошибка.
    pub error: Option<ErrorInfo>,
    /// Пагинация последнего успешного ответа.
    pub pagination: Pagination,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            phase: LoadingPhase::Idle,
            error: None,
            pagination: Pagination::default(),
        }
    }
}

impl<T: Identified> CollectionState<T> {
    /// Идёт ли запрос.
    pub fn is_loading(&self) -> bool {
        self.phase == LoadingPhase::Loading
    }

    fn fail(&mut self, err: ErrorInfo) {
        self.phase = LoadingPhase::Error;
        self.error = Some(err);
    }

    fn succeed(&mut self) {
        self.phase = LoadingPhase::Success;
        self.error = None;
    }

    fn upsert(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => {
                *existing = item;
                false
            }
            None => {
                self.items.push(item);
                true
            }
        }
    }

    fn replace(&mut self, item: T) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.id() == item.id())
        {
            *existing = item;
        }
    }

    fn remove(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    fn apply_page(&mut self, page_number: u32, page: Page<T>) {
        if page_number <= 1 {
            self.items = page.items;
        } else {
            for item in page.items {
                if !self.items.iter().any(|existing| existing.id() == item.id()) {
                    self.items.push(item);
                }
            }
        }
        self.pagination = page.pagination;
        self.succeed();
    }
}

/// Серверная коллекция одного типа сущностей.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Сущность.
    type Item: Identified + Clone + Send + Sync + 'static;
    /// Черновик для создания и обновления.
    type Draft: Validate + Send + Sync;

    /// Имя коллекции для логов.
    fn name(&self) -> &'static str;

    /// Страница коллекции.
    async fn list(&self, page: u32, limit: u32) -> ClientResult<Page<Self::Item>>;

    /// Одна сущность.
    async fn get(&self, id: i64) -> ClientResult<Self::Item>;

    /// Создаёт сущность; идентификатор назначает сервер.
    async fn create(&self, draft: &Self::Draft) -> ClientResult<Self::Item>;

    /// Обновляет сущность.
    async fn update(&self, id: i64, draft: &Self::Draft) -> ClientResult<Self::Item>;

    /// Удаляет сущность.
    async fn delete(&self, id: i64) -> ClientResult<()>;

    /// Страница результатов поиска. Коллекции с поиском переопределяют метод
    /// и помечаются `Searchable`.
    async fn search(
        &self,
        _query: &str,
        _page: u32,
        _limit: u32,
    ) -> ClientResult<Page<Self::Item>> {
        Err(ErrorInfo::unknown(format!(
            "{} does not support search",
            self.name()
        )))
    }
}

/// Коллекция с полнотекстовым поиском: открывает `EntityStore::search`.
pub trait Searchable: Resource {}

/// Чтение в полёте; снимается при завершении или отмене запроса.
struct PendingRead<'a>(&'a AtomicUsize);

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Контейнер состояния коллекции.
///
/// Применяется только ответ последнего выданного запроса на чтение:
/// ответы более ранних запросов, пришедшие позже, отбрасываются.
pub struct EntityStore<R: Resource> {
    resource: R,
    state: watch::Sender<CollectionState<R::Item>>,
    retry: RetryPolicy,
    page_size: u32,
    issued: AtomicU64,
    pending: AtomicUsize,
    query: Mutex<Option<String>>,
}

impl<R: Resource> EntityStore<R> {
    /// Пустой контейнер.
    pub fn new(resource: R, retry: RetryPolicy, page_size: u32) -> Self {
        Self {
            resource,
            state: watch::Sender::new(CollectionState::default()),
            retry,
            page_size: page_size.max(1),
            issued: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            query: Mutex::new(None),
        }
    }

    /// Коллекция, с которой работает контейнер.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Снимок текущего состояния.
    pub fn state(&self) -> CollectionState<R::Item> {
        self.state.borrow().clone()
    }

    /// Подписка на изменения состояния.
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<R::Item>> {
        self.state.subscribe()
    }

    /// Элемент из локального состояния.
    pub fn find(&self, id: i64) -> Option<R::Item> {
        self.state
            .borrow()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Сбрасывает ошибку, не трогая элементы.
    pub fn clear_error(&self) {
        self.state.send_modify(|state| {
            state.error = None;
            if state.phase == LoadingPhase::Error {
                state.phase = LoadingPhase::Idle;
            }
        });
    }

    /// Возвращает контейнер в исходное состояние.
    pub fn reset(&self) {
        self.issued.fetch_add(1, Ordering::SeqCst);
        self.set_query(None);
        self.state.send_replace(CollectionState::default());
    }

    /// Активный поисковый запрос, если список показывает результаты поиска.
    pub fn active_query(&self) -> Option<String> {
        self.query.lock().ok().and_then(|query| query.clone())
    }

    /// Загружает страницу `page` общего списка, выходя из режима поиска:
    /// первая заменяет элементы, следующие дописываются без дублей по id.
    pub async fn fetch_page(&self, page: u32) {
        self.set_query(None);
        self.read_page(None, page).await;
    }

    /// Перезагружает первую страницу общего списка.
    pub async fn refresh(&self) {
        self.fetch_page(1).await;
    }

    /// Догружает следующую страницу того же запроса (списка или поиска),
    /// если сервер сообщил, что она есть.
    pub async fn load_more(&self) -> bool {
        let pagination = self.state.borrow().pagination;
        if !pagination.has_next_page {
            return false;
        }
        self.read_page(self.active_query(), pagination.current_page + 1)
            .await;
        true
    }

    /// Загружает одну сущность и вставляет или обновляет её в списке.
    pub async fn load_one(&self, id: i64) -> Option<R::Item> {
        let _pending = self.track_read();
        self.state
            .send_modify(|state| state.phase = LoadingPhase::Loading);
        let result = with_retry(&self.retry, ErrorInfo::is_retryable, || {
            self.resource.get(id)
        })
        .await;

        match result {
            Ok(item) => {
                self.state.send_modify(|state| {
                    state.upsert(item.clone());
                    state.succeed();
                });
                Some(item)
            }
            Err(err) => {
                warn!(resource = self.resource.name(), id, error = %err, "failed to load item");
                self.state.send_modify(|state| state.fail(err));
                None
            }
        }
    }

    /// Создаёт сущность и добавляет её в список без перезагрузки.
    pub async fn create(&self, draft: &R::Draft) -> ClientResult<R::Item> {
        draft.validate()?;
        self.mutate("create", self.resource.create(draft), |state, item| {
            if state.upsert(item.clone()) {
                state.pagination.total_items += 1;
            }
        })
        .await
    }

    /// Обновляет сущность и заменяет её в списке по id.
    pub async fn update(&self, id: i64, draft: &R::Draft) -> ClientResult<R::Item> {
        draft.validate()?;
        self.mutate("update", self.resource.update(id, draft), |state, item| {
            state.replace(item.clone());
        })
        .await
    }

    /// Удаляет сущность и убирает её из списка.
    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.mutate("delete", self.resource.delete(id), |state, _| {
            if state.remove(id) {
                state.pagination.total_items = state.pagination.total_items.saturating_sub(1);
            }
        })
        .await
    }

    /// Выполняет изменяющий запрос один раз, без повторов.
    ///
    /// При успехе `reconcile` согласует локальный список с ответом, при
    /// ошибке список не меняется, ошибка сохраняется и возвращается.
    pub(crate) async fn mutate<T>(
        &self,
        action: &'static str,
        request: impl Future<Output = ClientResult<T>>,
        reconcile: impl FnOnce(&mut CollectionState<R::Item>, &T),
    ) -> ClientResult<T> {
        self.state
            .send_modify(|state| state.phase = LoadingPhase::Loading);

        match request.await {
            Ok(value) => {
                debug!(resource = self.resource.name(), action, "mutation succeeded");
                let reading = self.reads_pending();
                self.state.send_modify(|state| {
                    reconcile(state, &value);
                    if reading {
                        // фазу выставит незавершённое чтение
                        state.error = None;
                    } else {
                        state.succeed();
                    }
                });
                Ok(value)
            }
            Err(err) => {
                warn!(resource = self.resource.name(), action, error = %err, "mutation failed");
                let reading = self.reads_pending();
                self.state.send_modify(|state| {
                    if reading {
                        state.error = Some(err.clone());
                    } else {
                        state.fail(err.clone());
                    }
                });
                Err(err)
            }
        }
    }

    async fn read_page(&self, query: Option<String>, page: u32) {
        let page = page.max(1);
        let limit = self.page_size;
        let query = query.as_deref();
        debug!(resource = self.resource.name(), page, query, "fetching page");

        let _pending = self.track_read();
        let seq = self.begin_read();
        let result = with_retry(&self.retry, ErrorInfo::is_retryable, || async move {
            match query {
                Some(query) => self.resource.search(query, page, limit).await,
                None => self.resource.list(page, limit).await,
            }
        })
        .await;
        self.finish_read(seq, page, result);
    }

    fn set_query(&self, query: Option<String>) {
        if let Ok(mut slot) = self.query.lock() {
            *slot = query;
        }
    }

    fn track_read(&self) -> PendingRead<'_> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        PendingRead(&self.pending)
    }

    fn reads_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn begin_read(&self) -> u64 {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .send_modify(|state| state.phase = LoadingPhase::Loading);
        seq
    }

    fn finish_read(&self, seq: u64, page: u32, result: ClientResult<Page<R::Item>>) {
        if self.issued.load(Ordering::SeqCst) != seq {
            debug!(resource = self.resource.name(), seq, "dropping stale response");
            return;
        }

        match result {
            Ok(data) => self.state.send_modify(|state| state.apply_page(page, data)),
            Err(err) => {
                warn!(resource = self.resource.name(), page, error = %err, "fetch failed");
                self.state.send_modify(|state| state.fail(err));
            }
        }
    }
}

impl<R: Searchable> EntityStore<R> {
    /// Заменяет список первой страницей результатов поиска; `load_more`
    /// догружает следующие страницы того же запроса до `refresh` или `reset`.
    /// Пустой запрос перезагружает общий список.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.refresh().await;
            return;
        }

        self.set_query(Some(query.to_string()));
        self.read_page(Some(query.to_string()), 1).await;
    }
}
