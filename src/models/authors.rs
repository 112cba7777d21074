use std::fmt::{self, Display};

use serde::Serialize;
use sqlx::prelude::FromRow;
use tracing::info;

use crate::{
    utils::{normalize_website, SubmittedForm},
    Error,
};

#[derive(FromRow, Serialize, Debug, Clone)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub picture: Option<String>,
}

impl Author {
    pub async fn get_all(db: &sqlx::SqlitePool) -> Result<Vec<Self>, Error> {
        sqlx::query_as("SELECT id, name, website, picture FROM authors ORDER BY name ASC, id ASC")
            .fetch_all(db)
            .await
            .map_err(|e| e.into())
    }

    pub async fn get_by_id(db: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, Error> {
        sqlx::query_as("SELECT id, name, website, picture FROM authors WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(|e| e.into())
    }
}

#[derive(Debug)]
pub struct NewAuthor {
    pub name: String,
    pub website: String,
    pub picture: Option<String>,
}

impl NewAuthor {
    pub async fn insert(&self, db: &sqlx::SqlitePool) -> Result<i64, Error> {
        let id = sqlx::query("INSERT INTO authors (name, website, picture) VALUES (?, ?, ?)")
            .bind(&self.name)
            .bind(&self.website)
            .bind(&self.picture)
            .execute(db)
            .await?
            .last_insert_rowid();
        info!("inserted {} with id {}", self, id);
        Ok(id)
    }
}

impl Display for NewAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "author <{}> ({})", self.name, self.website)
    }
}

impl TryFrom<&SubmittedForm> for NewAuthor {
    type Error = Error;

    fn try_from(form: &SubmittedForm) -> Result<Self, Self::Error> {
        form.require(&["name", "website"])?;
        Ok(Self {
            name: form.text("name").unwrap_or_default().to_string(),
            website: normalize_website(form.text("website").unwrap_or_default())?,
            picture: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_pool;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_pool().await;
        let mut author =
            NewAuthor::try_from(&SubmittedForm::from_fields([("name", "Ada"), ("website", "ada.dev")]))
                .unwrap();
        author.picture = Some("ada.png".to_string());
        let id = author.insert(&db).await.unwrap();

        let stored = Author::get_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada");
        assert_eq!(stored.website, "https://ada.dev/");
        assert_eq!(stored.picture.as_deref(), Some("ada.png"));
        assert_eq!(Author::get_all(&db).await.unwrap().len(), 1);
    }

    #[test]
    fn test_validation() {
        let missing = SubmittedForm::from_fields([("name", "Ada")]);
        assert!(matches!(
            NewAuthor::try_from(&missing),
            Err(Error::MissingFields)
        ));
        let bad_website = SubmittedForm::from_fields([("name", "Ada"), ("website", "a b")]);
        assert!(matches!(
            NewAuthor::try_from(&bad_website),
            Err(Error::InvalidWebsite(_))
        ));
    }
}
