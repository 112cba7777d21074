use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::prelude::FromRow;
use tracing::info;

use crate::{
    utils::{parse_date, SubmittedForm},
    Error,
};

// Every article query joins the author and the category so pages can show their names.
const SELECT_ARTICLES_SQL: &str = r#"
SELECT a.id, a.title, a.content, a.content_is_html, a.resume, a.picture, a.source, a.date,
       a.category_id, c.name AS category_name,
       a.author_id, au.name AS author_name, au.website AS author_website,
       au.picture AS author_picture
FROM articles AS a
LEFT JOIN categories AS c ON c.id = a.category_id
LEFT JOIN authors AS au ON au.id = a.author_id
"#;

#[derive(FromRow, Serialize, Debug)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    // whether `content` was stored as rendered HTML or as raw text.
    pub content_is_html: bool,
    pub resume: String,
    pub picture: Option<String>,
    pub source: Option<String>,
    pub date: DateTime<Utc>,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub author_website: Option<String>,
    pub author_picture: Option<String>,
}

impl Article {
    pub async fn get_all(db: &sqlx::SqlitePool) -> Result<Vec<Self>, Error> {
        sqlx::query_as(&format!(
            "{} ORDER BY a.date DESC, a.id DESC",
            SELECT_ARTICLES_SQL
        ))
        .fetch_all(db)
        .await
        .map_err(|e| e.into())
    }

    pub async fn get_by_category(
        db: &sqlx::SqlitePool,
        category_id: i64,
    ) -> Result<Vec<Self>, Error> {
        sqlx::query_as(&format!(
            "{} WHERE a.category_id = ? ORDER BY a.date DESC, a.id DESC",
            SELECT_ARTICLES_SQL
        ))
        .bind(category_id)
        .fetch_all(db)
        .await
        .map_err(|e| e.into())
    }

    pub async fn get_by_id(db: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, Error> {
        sqlx::query_as(&format!("{} WHERE a.id = ?", SELECT_ARTICLES_SQL))
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(|e| e.into())
    }
}

#[derive(Debug)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub content_is_html: bool,
    pub resume: String,
    pub picture: Option<String>,
    pub source: Option<String>,
    pub date: DateTime<Utc>,
    pub category_id: i64,
    pub author_id: i64,
}

impl NewArticle {
    pub async fn insert(&self, db: &sqlx::SqlitePool) -> Result<i64, Error> {
        let id = sqlx::query(
            "INSERT INTO articles (title, content, content_is_html, resume, picture, source, date, category_id, author_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.title)
        .bind(&self.content)
        .bind(self.content_is_html)
        .bind(&self.resume)
        .bind(&self.picture)
        .bind(&self.source)
        .bind(self.date)
        .bind(self.category_id)
        .bind(self.author_id)
        .execute(db)
        .await?
        .last_insert_rowid();
        info!("inserted {} with id {}", self, id);
        Ok(id)
    }
}

impl Display for NewArticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "article <{}> [category {}, author {}]",
            self.title, self.category_id, self.author_id
        )
    }
}

impl TryFrom<&SubmittedForm> for NewArticle {
    type Error = Error;

    fn try_from(form: &SubmittedForm) -> Result<Self, Self::Error> {
        form.require(&["title", "resume", "content", "category", "author"])?;
        Ok(Self {
            title: form.text("title").unwrap_or_default().to_string(),
            // keep the content as typed, leading indentation matters to Markdown.
            content: form
                .values()
                .get("content")
                .cloned()
                .unwrap_or_default(),
            content_is_html: false,
            resume: form.text("resume").unwrap_or_default().to_string(),
            picture: None,
            source: form.text("source").map(str::to_string),
            date: parse_date(form.text("date"))?,
            category_id: form.id("category", "category")?,
            author_id: form.id("author", "author")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{test_pool, NewAuthor, NewCategory};

    async fn seed(db: &sqlx::SqlitePool) -> (i64, i64, i64) {
        let rust = NewCategory {
            name: "Rust".to_string(),
        }
        .insert(db)
        .await
        .unwrap();
        let cooking = NewCategory {
            name: "Cooking".to_string(),
        }
        .insert(db)
        .await
        .unwrap();
        let author = NewAuthor {
            name: "Ada".to_string(),
            website: "https://ada.dev/".to_string(),
            picture: Some("ada.png".to_string()),
        }
        .insert(db)
        .await
        .unwrap();
        (rust, cooking, author)
    }

    fn article(title: &str, category_id: i64, author_id: i64, day: u32) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: "<p>body</p>".to_string(),
            content_is_html: true,
            resume: "summary".to_string(),
            picture: None,
            source: None,
            date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            category_id,
            author_id,
        }
    }

    #[tokio::test]
    async fn test_listing_and_filtering() {
        let db = test_pool().await;
        let (rust, cooking, author) = seed(&db).await;
        article("older", rust, author, 1).insert(&db).await.unwrap();
        article("newer", rust, author, 2).insert(&db).await.unwrap();
        article("pasta", cooking, author, 3)
            .insert(&db)
            .await
            .unwrap();

        let titles: Vec<_> = Article::get_all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["pasta", "newer", "older"]);

        let rust_articles = Article::get_by_category(&db, rust).await.unwrap();
        assert_eq!(rust_articles.len(), 2);
        assert!(rust_articles
            .iter()
            .all(|a| a.category_name.as_deref() == Some("Rust")));
        assert!(Article::get_by_category(&db, cooking + 100)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id_joins() {
        let db = test_pool().await;
        let (rust, _, author) = seed(&db).await;
        let mut new = article("hello", rust, author, 5);
        new.source = Some("somewhere".to_string());
        new.picture = Some("hello.png".to_string());
        let id = new.insert(&db).await.unwrap();

        let stored = Article::get_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(stored.title, "hello");
        assert!(stored.content_is_html);
        assert_eq!(stored.source.as_deref(), Some("somewhere"));
        assert_eq!(stored.picture.as_deref(), Some("hello.png"));
        assert_eq!(stored.date, Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        assert_eq!(stored.category_name.as_deref(), Some("Rust"));
        assert_eq!(stored.author_name.as_deref(), Some("Ada"));
        assert_eq!(stored.author_picture.as_deref(), Some("ada.png"));
        assert!(Article::get_by_id(&db, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_content_keeps_its_flag() {
        let db = test_pool().await;
        let (rust, _, author) = seed(&db).await;
        let mut new = article("raw", rust, author, 6);
        new.content = "<script>alert(1)</script>".to_string();
        new.content_is_html = false;
        let id = new.insert(&db).await.unwrap();

        let stored = Article::get_by_id(&db, id).await.unwrap().unwrap();
        assert!(!stored.content_is_html);
        assert_eq!(stored.content, "<script>alert(1)</script>");
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = test_pool().await;
        assert!(article("orphan", 1, 1, 1).insert(&db).await.is_err());
    }

    #[test]
    fn test_from_form() {
        let form = SubmittedForm::from_fields([
            ("title", " Hello "),
            ("resume", "short"),
            ("content", "    indented code"),
            ("category", "2"),
            ("author", "3"),
            ("source", ""),
            ("date", "2024-02-29"),
        ]);
        let article = NewArticle::try_from(&form).unwrap();
        assert_eq!(article.title, "Hello");
        assert_eq!(article.content, "    indented code");
        assert!(!article.content_is_html);
        assert_eq!(article.source, None);
        assert_eq!(article.category_id, 2);
        assert_eq!(article.author_id, 3);
        assert_eq!(
            article.date,
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_from_form_missing_fields() {
        let form = SubmittedForm::from_fields([
            ("title", "Hello"),
            ("resume", "short"),
            ("content", "body"),
            ("category", "2"),
        ]);
        assert!(matches!(
            NewArticle::try_from(&form),
            Err(Error::MissingFields)
        ));
    }
}
