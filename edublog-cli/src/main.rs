use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use edublog_client::{
    AppContext, ClientConfig, CollectionState, CommentDraft, ErrorCode, ErrorInfo,
    FileTokenStorage, LoadingPhase, LoginForm, Post, PostDraft, RegisterForm, Role, StudentDraft,
    TeacherDraft, normalize_base_url,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod print;

use print::{
    print_comments, print_post, print_posts, print_student, print_students, print_teacher,
    print_teachers, print_user,
};

#[derive(Debug, Parser)]
#[command(name = "edublog-cli", version, about = "CLI клиент образовательного блога")]
struct Cli {
    /// Адрес API (по умолчанию EDUBLOG_API_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Регистрация пользователя.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Повтор пароля; если не указан, совпадает с `--password`.
        #[arg(long)]
        password_confirmation: Option<String>,
        /// professor, aluno или admin.
        #[arg(long, default_value = "aluno")]
        role: String,
    },
    /// Вход пользователя.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Выход и удаление сохранённого токена.
    Logout,
    /// Текущая сессия.
    Whoami,
    /// Посты.
    #[command(subcommand)]
    Posts(PostsCommand),
    /// Комментарии к посту.
    #[command(subcommand)]
    Comments(CommentsCommand),
    /// Преподаватели.
    #[command(subcommand)]
    Teachers(TeachersCommand),
    /// Студенты.
    #[command(subcommand)]
    Students(StudentsCommand),
}

#[derive(Debug, Subcommand)]
enum PostsCommand {
    /// Список постов.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Догрузить все страницы.
        #[arg(long)]
        all: bool,
    },
    /// Пост по id.
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Поиск по тексту.
    Search {
        #[arg(long)]
        query: String,
    },
    /// Создание поста (требует токен).
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Имя автора; по умолчанию имя текущего пользователя.
        #[arg(long)]
        author: Option<String>,
    },
    /// Обновление поста (требует токен).
    ///
    /// Незаданные поля берутся из текущей версии поста.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Удаление поста (требует токен).
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Поставить или снять лайк.
    Like {
        #[arg(long)]
        id: i64,
    },
    /// Снять лайк.
    Unlike {
        #[arg(long)]
        id: i64,
    },
    /// Кто лайкнул пост.
    Likes {
        #[arg(long)]
        id: i64,
    },
    /// Автор поста.
    Author {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum CommentsCommand {
    /// Комментарии поста.
    List {
        #[arg(long)]
        post: i64,
    },
    /// Новый комментарий.
    Add {
        #[arg(long)]
        post: i64,
        #[arg(long)]
        content: String,
    },
    /// Правка комментария.
    Edit {
        #[arg(long)]
        post: i64,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        content: String,
    },
    /// Удаление комментария.
    Delete {
        #[arg(long)]
        post: i64,
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum TeachersCommand {
    /// Список преподавателей.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Преподаватель по id.
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Новая учётная запись.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Правка учётной записи.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        department: String,
    },
    /// Удаление учётной записи.
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum StudentsCommand {
    /// Список студентов.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Студент по id.
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Новая учётная запись.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Номер студенческого билета.
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Правка учётной записи.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        student_id: String,
    },
    /// Удаление учётной записи.
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = resolve_config(ClientConfig::from_env()?, cli.server)?;
    init_logging(&config.log_level)?;
    debug!(base_url = %config.base_url, "starting");

    let storage = Arc::new(FileTokenStorage::new(config.token_file.clone()));
    let ctx = AppContext::new(config, storage).context("не удалось создать клиент")?;
    ctx.on_session_expired(|| {
        eprintln!("Сессия истекла: выполните `edublog-cli login ...`");
    });
    ctx.auth().restore();

    match cli.command {
        Command::Register {
            name,
            email,
            password,
            password_confirmation,
            role,
        } => {
            let role = Role::parse(&role).ok_or_else(|| anyhow!("неизвестная роль: {role}"))?;
            let form = RegisterForm {
                name,
                email,
                password_confirmation: password_confirmation.unwrap_or_else(|| password.clone()),
                password,
                role,
            };
            let user = ctx.auth().register(&form).await.map_err(map_error)?;
            print_user("Регистрация успешна", &user);
        }
        Command::Login { email, password } => {
            let user = ctx
                .auth()
                .login(&LoginForm { email, password })
                .await
                .map_err(map_error)?;
            print_user("Вход выполнен", &user);
        }
        Command::Logout => {
            ctx.auth().logout().await;
            println!("Выход выполнен");
        }
        Command::Whoami => match (ctx.auth().is_authenticated(), ctx.auth().current_user()) {
            (true, Some(user)) => print_user("Текущий пользователь", &user),
            (true, None) => println!("Токен сохранён, профиль не загружен"),
            (false, _) => println!("Вход не выполнен"),
        },
        Command::Posts(command) => run_posts(&ctx, command).await?,
        Command::Comments(command) => run_comments(&ctx, command).await?,
        Command::Teachers(command) => run_teachers(&ctx, command).await?,
        Command::Students(command) => run_students(&ctx, command).await?,
    }

    Ok(())
}

async fn run_posts(ctx: &AppContext, command: PostsCommand) -> Result<()> {
    let posts = ctx.posts();
    match command {
        PostsCommand::List { page, all } => {
            posts.fetch_page(page).await;
            if all {
                while loaded(posts.state())?.pagination.has_next_page {
                    posts.load_more().await;
                }
            }
            let state = loaded(posts.state())?;
            print_posts(&state.items, &state.pagination);
        }
        PostsCommand::Get { id } => {
            let post = ctx.gateway().get_post(id).await.map_err(map_error)?;
            print_post("Пост", &post);
        }
        PostsCommand::Search { query } => {
            posts.search(&query).await;
            let state = loaded(posts.state())?;
            print_posts(&state.items, &state.pagination);
        }
        PostsCommand::Create {
            title,
            content,
            author,
        } => {
            let author = match author {
                Some(author) => author,
                None => ctx
                    .auth()
                    .current_user()
                    .map(|user| user.name)
                    .ok_or_else(|| anyhow!("укажите --author"))?,
            };
            let draft = PostDraft {
                title,
                content,
                author,
            };
            let post = posts.create(&draft).await.map_err(map_error)?;
            print_post("Пост создан", &post);
        }
        PostsCommand::Update { id, title, content } => {
            let current = ctx.gateway().get_post(id).await.map_err(map_error)?;
            let draft = merge_post_draft(current, title, content);
            let post = posts.update(id, &draft).await.map_err(map_error)?;
            print_post("Пост обновлён", &post);
        }
        PostsCommand::Delete { id } => {
            posts.delete(id).await.map_err(map_error)?;
            println!("Пост удалён: id={id}");
        }
        PostsCommand::Like { id } => {
            let status = posts.toggle_like(id).await.map_err(map_error)?;
            let verb = if status.liked { "поставлен" } else { "снят" };
            println!("Лайк {verb}: id={id}, лайков={}", status.likes);
        }
        PostsCommand::Unlike { id } => {
            ctx.gateway().remove_like(id).await.map_err(map_error)?;
            println!("Лайк снят: id={id}");
        }
        PostsCommand::Likes { id } => {
            let likes = ctx.gateway().list_likes(id).await.map_err(map_error)?;
            println!("Лайков: {}", likes.len());
            for like in &likes {
                println!("- user_id={}", like.user_id);
            }
        }
        PostsCommand::Author { id } => {
            let user = posts.author_of(id).await.map_err(map_error)?;
            print_user("Автор", &user);
        }
    }
    Ok(())
}

async fn run_comments(ctx: &AppContext, command: CommentsCommand) -> Result<()> {
    match command {
        CommentsCommand::List { post } => {
            let comments = ctx.comments(post);
            comments.refresh().await;
            let state = loaded(comments.state())?;
            print_comments(post, &state.items);
        }
        CommentsCommand::Add { post, content } => {
            let comment = ctx
                .comments(post)
                .create(&CommentDraft { content })
                .await
                .map_err(map_error)?;
            println!("Комментарий добавлен: id={}", comment.id);
        }
        CommentsCommand::Edit { post, id, content } => {
            let comment = ctx
                .comments(post)
                .update(id, &CommentDraft { content })
                .await
                .map_err(map_error)?;
            println!("Комментарий обновлён: id={}", comment.id);
        }
        CommentsCommand::Delete { post, id } => {
            ctx.comments(post).delete(id).await.map_err(map_error)?;
            println!("Комментарий удалён: id={id}");
        }
    }
    Ok(())
}

async fn run_teachers(ctx: &AppContext, command: TeachersCommand) -> Result<()> {
    let teachers = ctx.teachers();
    match command {
        TeachersCommand::List { page } => {
            teachers.fetch_page(page).await;
            let state = loaded(teachers.state())?;
            print_teachers(&state.items, &state.pagination);
        }
        TeachersCommand::Get { id } => {
            let teacher = found(teachers.load_one(id).await, teachers.state())?;
            print_teacher("Преподаватель", &teacher);
        }
        TeachersCommand::Create {
            name,
            email,
            department,
            password,
        } => {
            let draft = TeacherDraft {
                name,
                email,
                department,
                password,
            };
            let teacher = teachers.create(&draft).await.map_err(map_error)?;
            print_teacher("Преподаватель создан", &teacher);
        }
        TeachersCommand::Update {
            id,
            name,
            email,
            department,
        } => {
            let draft = TeacherDraft {
                name,
                email,
                department,
                password: None,
            };
            let teacher = teachers.update(id, &draft).await.map_err(map_error)?;
            print_teacher("Преподаватель обновлён", &teacher);
        }
        TeachersCommand::Delete { id } => {
            teachers.delete(id).await.map_err(map_error)?;
            println!("Преподаватель удалён: id={id}");
        }
    }
    Ok(())
}

async fn run_students(ctx: &AppContext, command: StudentsCommand) -> Result<()> {
    let students = ctx.students();
    match command {
        StudentsCommand::List { page } => {
            students.fetch_page(page).await;
            let state = loaded(students.state())?;
            print_students(&state.items, &state.pagination);
        }
        StudentsCommand::Get { id } => {
            let student = found(students.load_one(id).await, students.state())?;
            print_student("Студент", &student);
        }
        StudentsCommand::Create {
            name,
            email,
            student_id,
            password,
        } => {
            let draft = StudentDraft {
                name,
                email,
                student_id,
                password,
            };
            let student = students.create(&draft).await.map_err(map_error)?;
            print_student("Студент создан", &student);
        }
        StudentsCommand::Update {
            id,
            name,
            email,
            student_id,
        } => {
            let draft = StudentDraft {
                name,
                email,
                student_id,
                password: None,
            };
            let student = students.update(id, &draft).await.map_err(map_error)?;
            print_student("Студент обновлён", &student);
        }
        StudentsCommand::Delete { id } => {
            students.delete(id).await.map_err(map_error)?;
            println!("Студент удалён: id={id}");
        }
    }
    Ok(())
}

fn resolve_config(mut config: ClientConfig, server: Option<String>) -> Result<ClientConfig> {
    if let Some(server) = server {
        config.base_url = normalize_base_url(server).context("некорректный --server")?;
    }
    Ok(config)
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn merge_post_draft(current: Post, title: Option<String>, content: Option<String>) -> PostDraft {
    PostDraft {
        title: title.unwrap_or(current.title),
        content: content.unwrap_or(current.content),
        author: current.author,
    }
}

/// Состояние коллекции после загрузки либо её ошибка.
fn loaded<T>(state: CollectionState<T>) -> Result<CollectionState<T>> {
    if let (LoadingPhase::Error, Some(err)) = (state.phase, &state.error) {
        return Err(map_error(err.clone()));
    }
    Ok(state)
}

fn found<T, U>(item: Option<T>, state: CollectionState<U>) -> Result<T> {
    match item {
        Some(item) => Ok(item),
        None => Err(state
            .error
            .map(map_error)
            .unwrap_or_else(|| anyhow!("ресурс не найден"))),
    }
}

fn map_error(err: ErrorInfo) -> anyhow::Error {
    let message = match err.kind() {
        ErrorCode::Unauthorized => format!(
            "требуется авторизация ({}): выполните `edublog-cli login ...` или `edublog-cli register ...`",
            err.message
        ),
        ErrorCode::Validation => format!("некорректные данные: {}", err.message),
        ErrorCode::NotFound => format!("ресурс не найден: {}", err.message),
        ErrorCode::NetworkError => format!("сервер недоступен: {}", err.message),
        ErrorCode::ServerError => format!("ошибка сервера: {}", err.message),
        ErrorCode::Unknown => match err.status {
            Some(status) => format!("запрос отклонён (HTTP {status}): {}", err.message),
            None => format!("ошибка: {}", err.message),
        },
    };
    anyhow!(message)
}
