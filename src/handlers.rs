use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::{context, Value};
use tower_sessions::Session;
use tracing::warn;

use crate::{
    app::AppState,
    flash::{self, Level},
    models::{Article, Author, Category, NewArticle, NewAuthor, NewCategory},
    utils::{Path, SubmittedForm},
    Error,
};

const SUCCESS_MESSAGE: &str = "Record was successfully added";

pub async fn handler_home(State(state): State<Arc<AppState>>, session: Session) -> Response {
    state.respond(home(&state, &session).await).await
}

async fn home(state: &AppState, session: &Session) -> Result<Html<String>, Error> {
    state
        .render_template(
            "blog.html",
            Some(session),
            context! {
                articles => Article::get_all(&state.db).await?,
                active => Value::from(()),
            },
        )
        .await
}

pub async fn handler_article(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    state.respond(article(&state, &session, id).await).await
}

async fn article(state: &AppState, session: &Session, id: i64) -> Result<Response, Error> {
    let article = match Article::get_by_id(&state.db, id).await? {
        Some(article) => article,
        None => return Ok(state.render_not_found().await),
    };
    Ok(state
        .render_template(
            "blog.html",
            Some(session),
            context! {
                article => article,
                active => article.category_id,
            },
        )
        .await?
        .into_response())
}

pub async fn handler_category(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    state.respond(category(&state, &session, id).await).await
}

async fn category(state: &AppState, session: &Session, id: i64) -> Result<Response, Error> {
    let category = match Category::get_by_id(&state.db, id).await? {
        Some(category) => category,
        None => return Ok(state.render_not_found().await),
    };
    Ok(state
        .render_template(
            "blog.html",
            Some(session),
            context! {
                articles => Article::get_by_category(&state.db, id).await?,
                category => category,
                active => id,
            },
        )
        .await?
        .into_response())
}

pub async fn handler_404(State(state): State<Arc<AppState>>) -> Response {
    state.render_not_found().await
}

pub async fn handler_ping() -> impl IntoResponse {
    "pong"
}

pub async fn handler_new_article_get(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Response {
    state
        .respond(render_article_form(&state, &session, None).await)
        .await
}

pub async fn handler_new_article_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    form: SubmittedForm,
) -> Response {
    state
        .respond(new_article(&state, &session, &form).await)
        .await
}

async fn new_article(
    state: &AppState,
    session: &Session,
    form: &SubmittedForm,
) -> Result<Response, Error> {
    async fn validate(state: &AppState, form: &SubmittedForm) -> Result<NewArticle, Error> {
        let article = NewArticle::try_from(form)?;
        // the foreign keys must point at existing rows.
        if Category::get_by_id(&state.db, article.category_id)
            .await?
            .is_none()
        {
            return Err(Error::UnknownReference("category"));
        }
        if Author::get_by_id(&state.db, article.author_id)
            .await?
            .is_none()
        {
            return Err(Error::UnknownReference("author"));
        }
        Ok(article)
    }

    let mut article = match validate(state, form).await {
        Ok(article) => article,
        Err(err) if err.is_validation() => {
            flash::push(session, Level::Error, err.to_string()).await?;
            return Ok(render_article_form(state, session, Some(form))
                .await?
                .into_response());
        }
        Err(err) => return Err(err),
    };
    let (content, content_is_html) = state.prepare_content(&article.content);
    article.content = content;
    article.content_is_html = content_is_html;
    article.picture = store_picture(state, form).await?;

    if let Err(err) = article.insert(&state.db).await {
        if let Some(picture) = &article.picture {
            state.pictures.remove(picture).await;
        }
        return Err(err);
    }
    flash::push(session, Level::Success, SUCCESS_MESSAGE).await?;
    if article.picture.is_none() {
        flash::push(session, Level::Warning, "No picture for this article").await?;
    }
    Ok(Redirect::to("/").into_response())
}

async fn render_article_form(
    state: &AppState,
    session: &Session,
    form: Option<&SubmittedForm>,
) -> Result<Html<String>, Error> {
    state
        .render_template(
            "new_article.html",
            Some(session),
            context! {
                authors => Author::get_all(&state.db).await?,
                categories => Category::get_all(&state.db).await?,
                form => form.map(SubmittedForm::values),
            },
        )
        .await
}

pub async fn handler_new_author_get(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Response {
    let result = state
        .render_template("new_author.html", Some(&session), context! {})
        .await;
    state.respond(result).await
}

pub async fn handler_new_author_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    form: SubmittedForm,
) -> Response {
    state
        .respond(new_author(&state, &session, &form).await)
        .await
}

async fn new_author(
    state: &AppState,
    session: &Session,
    form: &SubmittedForm,
) -> Result<Response, Error> {
    let mut author = match NewAuthor::try_from(form) {
        Ok(author) => author,
        Err(err) if err.is_validation() => {
            flash::push(session, Level::Error, err.to_string()).await?;
            return Ok(state
                .render_template(
                    "new_author.html",
                    Some(session),
                    context! {form => form.values()},
                )
                .await?
                .into_response());
        }
        Err(err) => return Err(err),
    };
    author.picture = store_picture(state, form).await?;

    if let Err(err) = author.insert(&state.db).await {
        if let Some(picture) = &author.picture {
            state.pictures.remove(picture).await;
        }
        return Err(err);
    }
    flash::push(session, Level::Success, SUCCESS_MESSAGE).await?;
    if author.picture.is_none() {
        flash::push(session, Level::Warning, "No picture for this author").await?;
    }
    Ok(Redirect::to("/").into_response())
}

pub async fn handler_new_category_get(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Response {
    let result = state
        .render_template("new_category.html", Some(&session), context! {})
        .await;
    state.respond(result).await
}

pub async fn handler_new_category_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    form: SubmittedForm,
) -> Response {
    state
        .respond(new_category(&state, &session, &form).await)
        .await
}

async fn new_category(
    state: &AppState,
    session: &Session,
    form: &SubmittedForm,
) -> Result<Response, Error> {
    let category = match NewCategory::try_from(form) {
        Ok(category) => category,
        Err(err) if err.is_validation() => {
            flash::push(session, Level::Error, err.to_string()).await?;
            return Ok(state
                .render_template(
                    "new_category.html",
                    Some(session),
                    context! {form => form.values()},
                )
                .await?
                .into_response());
        }
        Err(err) => return Err(err),
    };
    category.insert(&state.db).await?;
    flash::push(session, Level::Success, SUCCESS_MESSAGE).await?;
    Ok(Redirect::to("/").into_response())
}

// Store the submitted picture if there is an acceptable one.
// A missing or rejected picture is not an error, the record is kept without one.
async fn store_picture(state: &AppState, form: &SubmittedForm) -> Result<Option<String>, Error> {
    let picture = match &form.picture {
        Some(picture) => picture,
        None => return Ok(None),
    };
    if !state.pictures.allowed_file(&picture.file_name) {
        warn!("rejected picture {}: extension not allowed", picture.file_name);
        return Ok(None);
    }
    if picture.data.len() > state.config.max_picture_bytes() {
        warn!(
            "rejected picture {}: {} bytes over the limit",
            picture.file_name,
            picture.data.len()
        );
        return Ok(None);
    }
    match state.pictures.save(&picture.file_name, &picture.data).await {
        Ok(filename) => Ok(Some(filename)),
        Err(err @ Error::InvalidPictureName(_)) => {
            warn!("{}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
