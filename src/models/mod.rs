mod articles;
mod authors;
mod categories;

pub(crate) use articles::*;
pub(crate) use authors::*;
pub(crate) use categories::*;

const CREATE_TABLE_CATEGORIES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(50) NOT NULL
);
"#;

const CREATE_TABLE_AUTHORS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(50) NOT NULL,
    website VARCHAR(256) NOT NULL,
    picture VARCHAR(256)
);
"#;

const CREATE_TABLE_ARTICLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title VARCHAR(64) NOT NULL,
    content TEXT NOT NULL,
    content_is_html BOOLEAN NOT NULL DEFAULT 0,
    resume TEXT NOT NULL,
    picture VARCHAR(256),
    source VARCHAR(256),
    date DATETIME NOT NULL,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    author_id INTEGER NOT NULL REFERENCES authors(id)
);
"#;

const CREATE_INDEX_ARTICLES_CATEGORY_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category_id);";

pub async fn create_tables(db: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TABLE_CATEGORIES_SQL).execute(db).await?;
    sqlx::query(CREATE_TABLE_AUTHORS_SQL).execute(db).await?;
    sqlx::query(CREATE_TABLE_ARTICLES_SQL).execute(db).await?;
    sqlx::query(CREATE_INDEX_ARTICLES_CATEGORY_SQL)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // a single connection keeps every query on the same in-memory database.
    let db = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_tables(&db).await.unwrap();
    db
}
