use std::{str::FromStr, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::DateTime;
use minijinja::{context, Environment, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::{
    services::ServeDir,
    trace::{self, TraceLayer},
};
use tower_sessions::{cookie::Key, Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::{error, info, Level};

use crate::{
    config::Config,
    error::Error,
    flash,
    handlers::{
        handler_404, handler_article, handler_category, handler_home, handler_new_article_get,
        handler_new_article_post, handler_new_author_get, handler_new_author_post,
        handler_new_category_get, handler_new_category_post, handler_ping,
    },
    markdown,
    models::{create_tables, Category},
    uploads::PictureStore,
};

const TEMPLATES_DIR: &str = "templates";
const PICTURES_URL: &str = "/assets/pictures";
const STATIC_DIR: &str = "static";
const DEFAULT_CONFIG_FILE_PATH: &str = "config.toml";
const CONFIG_FILE_ENV: &str = "GAZETTE_CONFIG";

// AppState is used to pass the global states to the handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub env: Environment<'static>,
    pub db: sqlx::SqlitePool,
    pub pictures: PictureStore,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, Error> {
        info!("connecting to the database");
        let options = SqliteConnectOptions::from_str(config.database_url())?.create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(config.database_max_connections())
            .connect_with(options)
            .await?;
        info!("initializing the database");
        // create the tables if they don't exist.
        create_tables(&db).await?;

        info!("preparing the pictures directory");
        let pictures = PictureStore::new(config.pictures_dir(), config.allowed_extensions());
        pictures.init().await?;

        info!("initializing the environment");
        let env = Self::build_environment(&config)?;

        Ok(Self {
            config,
            env,
            db,
            pictures,
        })
    }

    fn build_environment(config: &Config) -> Result<Environment<'static>, Error> {
        let mut env = Environment::new();
        // iterate the templates directory and add all the templates.
        for entry in std::fs::read_dir(TEMPLATES_DIR)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let file_name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let template_content = std::fs::read_to_string(&path)?;
            env.add_template_owned(file_name, template_content)?;
        }
        // load the global variables into the environment.
        env.add_global("config", Value::from_object(config.clone()));
        env.add_global("pictures_url", PICTURES_URL);
        // load the embedded functions into the environment.
        env.add_filter("truncate_str", |value: &str, max_length: usize| {
            if value.chars().count() > max_length {
                let mut truncated: String = value.chars().take(max_length).collect();
                truncated.push('…');
                truncated
            } else {
                value.to_string()
            }
        });
        env.add_filter("format_date", |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|date| date.format("%B %-d, %Y").to_string())
                .unwrap_or_else(|_| value.to_string())
        });

        Ok(env)
    }

    // Render the article content for storage, Markdown is turned into HTML when enabled.
    // The flag tells whether the stored content is HTML.
    pub fn prepare_content(&self, content: &str) -> (String, bool) {
        if self.config.render_markdown() {
            (
                markdown::render(content, &self.config.code_syntax_highlight_theme()),
                true,
            )
        } else {
            (content.to_string(), false)
        }
    }

    pub async fn render_template(
        &self,
        template_name: &str,
        session: Option<&Session>,
        context: Value,
    ) -> Result<Html<String>, Error> {
        let flashes = match session {
            Some(session) => flash::take(session).await?,
            None => vec![],
        };
        let template = self.env.get_template(template_name)?;
        let html = template.render(context! {
            nav_categories => Category::get_all(&self.db).await?,
            flashes => flashes,
            ..context,
        })?;
        Ok(Html(html))
    }

    pub async fn render_error(&self, status: StatusCode, title: &str, message: &str) -> Response {
        match self
            .render_template(
                "error.html",
                None,
                context! {
                    title => title,
                    message => message,
                },
            )
            .await
        {
            Ok(html) => (status, html).into_response(),
            Err(e) => {
                error!("failed rendering the error page: {}", e);
                (status, message.to_string()).into_response()
            }
        }
    }

    // Turn a handler result into a response, failures get the error page.
    pub async fn respond<R: IntoResponse>(&self, result: Result<R, Error>) -> Response {
        match result {
            Ok(response) => response.into_response(),
            Err(err) => {
                error!("request failed: {}", err);
                self.render_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500",
                    "Oops, something went wrong on our side...",
                )
                .await
            }
        }
    }

    pub async fn render_not_found(&self) -> Response {
        self.render_error(
            StatusCode::NOT_FOUND,
            "404",
            "Oops, it seems like you've stumbled upon a URL that doesn't exist...",
        )
        .await
    }
}

pub struct App {
    state: AppState,
}

impl App {
    pub async fn new() -> Result<Self, Error> {
        let config_path = std::env::var(CONFIG_FILE_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE_PATH.to_string());
        info!("parsing config file {}", config_path);
        let config = Config::new(&config_path)?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self, Error> {
        Ok(Self {
            state: AppState::new(config).await?,
        })
    }

    pub fn router(&self) -> Router {
        // flash messages live in a session resident in memory.
        let session_layer = SessionManagerLayer::new(MemoryStore::default())
            .with_secure(false)
            .with_expiry(Expiry::OnSessionEnd)
            .with_signed(Key::generate());

        Router::new()
            .fallback(handler_404)
            // serve the static files and the uploaded pictures
            .nest_service("/static", ServeDir::new(STATIC_DIR))
            .nest_service(PICTURES_URL, ServeDir::new(self.state.pictures.dir()))
            // serve the page handlers
            .route("/", get(handler_home))
            .route("/article/:id", get(handler_article))
            .route("/category/:id", get(handler_category))
            .route(
                "/newArticle",
                get(handler_new_article_get).post(handler_new_article_post),
            )
            .route(
                "/newAuthor",
                get(handler_new_author_get).post(handler_new_author_post),
            )
            .route(
                "/newCategory",
                get(handler_new_category_get).post(handler_new_category_post),
            )
            .route("/ping", get(handler_ping))
            .layer(session_layer)
            .layer(DefaultBodyLimit::max(self.state.config.max_body_bytes()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
            )
            .with_state(Arc::new(self.state.clone()))
    }

    pub async fn serve(&self) -> Result<(), Error> {
        let listener = tokio::net::TcpListener::bind(self.state.config.server_url()).await?;
        info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
