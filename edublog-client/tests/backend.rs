use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use edublog_client::{
    AppContext, ClientConfig, ErrorCode, Gateway, LoadingPhase, LoginForm, MemoryTokenStorage,
    PostDraft, RegisterForm, RetryPolicy, Role, SessionStore, TokenStorage,
};

const VALID_TOKEN: &str = "tok-valido";

#[derive(Default)]
struct Stub {
    list_posts_calls: AtomicUsize,
    teachers_calls: AtomicUsize,
    students_calls: AtomicUsize,
    last_body: Mutex<Option<Value>>,
    last_token: Mutex<Option<String>>,
}

type Shared = Arc<Stub>;
type Reply = (StatusCode, Json<Value>);

fn token_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-access-token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn post_json(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": "conteúdo do post",
        "author": "Ana",
        "authorId": 7,
        "likes": 0
    })
}

async fn login(State(stub): State<Shared>, Json(body): Json<Value>) -> Reply {
    *stub.last_body.lock().expect("last_body mutex poisoned") = Some(body.clone());
    if body["senha"] == "segredo1" {
        return (
            StatusCode::OK,
            Json(json!({
                "token": VALID_TOKEN,
                "usuario": {"id": 7, "nome": "Ana", "email": body["email"], "tipo": "professor"}
            })),
        );
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"mensagem": "Credenciais inválidas"})),
    )
}

async fn register(State(stub): State<Shared>, Json(body): Json<Value>) -> Reply {
    *stub.last_body.lock().expect("last_body mutex poisoned") = Some(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "token": VALID_TOKEN,
            "usuario": {"id": 8, "nome": body["nome"], "email": body["email"], "tipo": body["tipo"]}
        })),
    )
}

async fn logout(State(stub): State<Shared>, headers: HeaderMap) -> Reply {
    let token = token_of(&headers);
    *stub.last_token.lock().expect("last_token mutex poisoned") = token.clone();
    if token.as_deref() != Some(VALID_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"mensagem": "Token inválido"})),
        );
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "falha ao encerrar sessão"})),
    )
}

async fn list_posts(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    stub.list_posts_calls.fetch_add(1, Ordering::SeqCst);
    if token_of(&headers).as_deref() != Some(VALID_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"mensagem": "Token inválido"})),
        );
    }
    let page = query
        .get("page")
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(1);
    let data = match page {
        1 => vec![post_json(1, "A"), post_json(2, "B")],
        _ => vec![post_json(2, "B"), post_json(3, "C")],
    };
    (
        StatusCode::OK,
        Json(json!({
            "data": data,
            "pagination": {"currentPage": page, "totalPages": 2, "totalItems": 3}
        })),
    )
}

async fn create_post(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    *stub.last_token.lock().expect("last_token mutex poisoned") = token_of(&headers);
    *stub.last_body.lock().expect("last_body mutex poisoned") = Some(body.clone());
    let mut created = post_json(42, body["title"].as_str().unwrap_or_default());
    created["content"] = body["content"].clone();
    created["author"] = body["author"].clone();
    (StatusCode::CREATED, Json(json!({ "data": created })))
}

async fn get_post(Path(id): Path<i64>) -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("Post {id} não encontrado")})),
    )
}

async fn list_teachers(State(stub): State<Shared>) -> Reply {
    stub.teachers_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "falha no banco"})),
    )
}

fn student_json(id: i64) -> Value {
    json!({"id": id, "name": "João Lima", "email": "joao@escola.br", "studentId": "2024001"})
}

async fn list_students(State(stub): State<Shared>) -> Reply {
    if stub.students_calls.fetch_add(1, Ordering::SeqCst) > 0 {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    (StatusCode::OK, Json(json!({ "data": [student_json(1)] })))
}

async fn get_student(Path(id): Path<i64>) -> Reply {
    tokio::time::sleep(Duration::from_secs(2)).await;
    (StatusCode::OK, Json(student_json(id)))
}

async fn spawn_stub() -> (String, Shared) {
    let stub = Shared::default();
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/students", get(list_students))
        .route("/students/{id}", get(get_student))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post))
        .route("/teachers", get(list_teachers))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    (format!("http://{addr}"), stub)
}

fn config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base_url);
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(10),
    };
    config
}

fn context(base_url: &str) -> AppContext {
    AppContext::new(config(base_url), Arc::new(MemoryTokenStorage::default()))
        .expect("context must build")
}

async fn logged_in_context(base_url: &str) -> AppContext {
    let ctx = context(base_url);
    ctx.auth()
        .login(&LoginForm {
            email: "ana@escola.br".to_string(),
            password: "segredo1".to_string(),
        })
        .await
        .expect("login must succeed");
    ctx
}

#[tokio::test]
async fn login_sends_backend_field_names_and_starts_session() {
    let (base_url, stub) = spawn_stub().await;
    let ctx = logged_in_context(&base_url).await;

    let body = stub
        .last_body
        .lock()
        .expect("last_body mutex poisoned")
        .clone()
        .expect("login body captured");
    assert_eq!(body, json!({"email": "ana@escola.br", "senha": "segredo1"}));

    assert!(ctx.auth().is_authenticated());
    assert_eq!(ctx.session().token().as_deref(), Some(VALID_TOKEN));
    let user = ctx.auth().current_user().expect("user must be stored");
    assert_eq!(user.role, Role::Teacher);
    assert_eq!(ctx.auth().state().phase, LoadingPhase::Success);
}

#[tokio::test]
async fn wrong_password_is_unauthorized_without_expiry_callback() {
    let (base_url, _stub) = spawn_stub().await;
    let ctx = context(&base_url);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    ctx.on_session_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = ctx
        .auth()
        .login(&LoginForm {
            email: "ana@escola.br".to_string(),
            password: "errada".to_string(),
        })
        .await
        .expect_err("login must fail");

    assert_eq!(err.kind(), ErrorCode::Unauthorized);
    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "Credenciais inválidas");
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.auth().state().error, Some(err));
}

#[tokio::test]
async fn concurrent_401_burst_fires_expiry_callback_once() {
    let (base_url, _stub) = spawn_stub().await;
    let session = Arc::new(SessionStore::in_memory());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    session.set_on_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.begin("tok-expirado", None);
    let gateway = Gateway::new(&config(&base_url), session.clone()).expect("gateway");

    let (a, b, c) = tokio::join!(
        gateway.list_posts(1, 10),
        gateway.list_posts(1, 10),
        gateway.list_posts(1, 10)
    );

    for result in [a, b, c] {
        let err = result.expect_err("expired token must be rejected");
        assert_eq!(err.kind(), ErrorCode::Unauthorized);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(session.token().is_none());
}

#[tokio::test]
async fn refresh_then_load_more_appends_without_duplicates() {
    let (base_url, stub) = spawn_stub().await;
    let ctx = logged_in_context(&base_url).await;

    ctx.posts().refresh().await;
    let state = ctx.posts().state();
    assert_eq!(state.phase, LoadingPhase::Success);
    assert_eq!(state.items.len(), 2);
    assert!(state.pagination.has_next_page);

    assert!(ctx.posts().load_more().await);
    let ids: Vec<i64> = ctx.posts().state().items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(!ctx.posts().load_more().await);
    assert_eq!(stub.list_posts_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn create_post_inserts_server_entity_without_refetch() {
    let (base_url, stub) = spawn_stub().await;
    let ctx = logged_in_context(&base_url).await;
    ctx.posts().refresh().await;

    let created = ctx
        .posts()
        .create(&PostDraft {
            title: "T".to_string(),
            content: "C...".to_string(),
            author: "X".to_string(),
        })
        .await
        .expect("create must succeed");

    assert_eq!(created.id, 42);
    assert!(ctx.posts().find(42).is_some());
    assert_eq!(stub.list_posts_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        stub.last_token
            .lock()
            .expect("last_token mutex poisoned")
            .as_deref(),
        Some(VALID_TOKEN)
    );
    let body = stub
        .last_body
        .lock()
        .expect("last_body mutex poisoned")
        .clone()
        .expect("create body captured");
    assert_eq!(body, json!({"title": "T", "content": "C...", "author": "X"}));
}

#[tokio::test]
async fn not_found_carries_status_and_server_message() {
    let (base_url, _stub) = spawn_stub().await;
    let ctx = context(&base_url);

    let err = ctx
        .gateway()
        .get_post(5)
        .await
        .expect_err("post must be missing");

    assert_eq!(err.kind(), ErrorCode::NotFound);
    assert_eq!(err.status, Some(404));
    assert_eq!(err.message, "Post 5 não encontrado");
}

#[tokio::test]
async fn server_errors_are_retried_then_stored() {
    let (base_url, stub) = spawn_stub().await;
    let ctx = context(&base_url);

    ctx.teachers().refresh().await;

    let state = ctx.teachers().state();
    assert_eq!(state.phase, LoadingPhase::Error);
    let err = state.error.expect("error must be stored");
    assert_eq!(err.kind(), ErrorCode::ServerError);
    assert_eq!(err.message, "falha no banco");
    assert_eq!(stub.teachers_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);

    let ctx = context(&format!("http://{addr}"));
    let err = ctx
        .gateway()
        .get_post(1)
        .await
        .expect_err("nothing listens on the port");

    assert_eq!(err.kind(), ErrorCode::NetworkError);
    assert!(err.status.is_none());
}

#[tokio::test]
async fn timeout_is_network_error_and_keeps_loaded_items() {
    let (base_url, stub) = spawn_stub().await;
    let mut config = config(&base_url);
    config.request_timeout = Duration::from_millis(200);
    let ctx = AppContext::new(config, Arc::new(MemoryTokenStorage::default()))
        .expect("context must build");

    let err = ctx
        .gateway()
        .get_student(1)
        .await
        .expect_err("slow response must time out");
    assert_eq!(err.kind(), ErrorCode::NetworkError);
    assert!(err.status.is_none());

    ctx.students().refresh().await;
    assert_eq!(ctx.students().state().items.len(), 1);

    ctx.students().refresh().await;
    let state = ctx.students().state();
    assert_eq!(state.phase, LoadingPhase::Error);
    assert_eq!(
        state.error.map(|err| err.kind()),
        Some(ErrorCode::NetworkError)
    );
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].student_id, "2024001");
    assert_eq!(stub.students_calls.load(Ordering::SeqCst), 1 + 3);
}

#[tokio::test]
async fn register_sends_backend_field_names() {
    let (base_url, stub) = spawn_stub().await;
    let ctx = context(&base_url);

    let user = ctx
        .auth()
        .register(&RegisterForm {
            name: "Bruno Souza".to_string(),
            email: "bruno@escola.br".to_string(),
            password: "segredo1".to_string(),
            password_confirmation: "segredo1".to_string(),
            role: Role::Student,
        })
        .await
        .expect("register must succeed");

    let body = stub
        .last_body
        .lock()
        .expect("last_body mutex poisoned")
        .clone()
        .expect("register body captured");
    assert_eq!(
        body,
        json!({"nome": "Bruno Souza", "email": "bruno@escola.br", "senha": "segredo1", "tipo": "aluno"})
    );
    assert_eq!(user.role, Role::Student);
    assert_eq!(ctx.session().token().as_deref(), Some(VALID_TOKEN));
}

#[tokio::test]
async fn logout_clears_session_even_when_server_fails() {
    let (base_url, stub) = spawn_stub().await;
    let storage = Arc::new(MemoryTokenStorage::default());
    let ctx = AppContext::new(config(&base_url), storage.clone()).expect("context must build");
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    ctx.on_session_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    ctx.auth()
        .login(&LoginForm {
            email: "ana@escola.br".to_string(),
            password: "segredo1".to_string(),
        })
        .await
        .expect("login must succeed");
    assert_eq!(
        storage.load().expect("storage readable").as_deref(),
        Some(VALID_TOKEN)
    );

    ctx.auth().logout().await;

    assert_eq!(
        stub.last_token
            .lock()
            .expect("last_token mutex poisoned")
            .as_deref(),
        Some(VALID_TOKEN)
    );
    assert!(!ctx.auth().is_authenticated());
    assert!(ctx.auth().current_user().is_none());
    assert!(storage.load().expect("storage readable").is_none());
    assert_eq!(ctx.auth().state().phase, LoadingPhase::Idle);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_logout_does_not_expire_session() {
    let (base_url, _stub) = spawn_stub().await;
    let session = Arc::new(SessionStore::in_memory());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    session.set_on_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.begin("tok-expirado", None);
    let gateway = Gateway::new(&config(&base_url), session.clone()).expect("gateway");

    let err = gateway.logout().await.expect_err("stale token must be rejected");

    assert_eq!(err.kind(), ErrorCode::Unauthorized);
    assert_eq!(session.token().as_deref(), Some("tok-expirado"));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn restored_token_is_attached_to_next_request() {
    let (base_url, stub) = spawn_stub().await;
    let storage = Arc::new(MemoryTokenStorage::with_token(VALID_TOKEN));
    let ctx = AppContext::new(config(&base_url), storage).expect("context must build");

    assert!(ctx.auth().restore());
    ctx.posts().refresh().await;

    let state = ctx.posts().state();
    assert_eq!(state.phase, LoadingPhase::Success);
    assert_eq!(state.items.len(), 2);
    assert_eq!(stub.list_posts_calls.load(Ordering::SeqCst), 1);
}
