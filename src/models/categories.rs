use std::fmt::{self, Display};

use serde::Serialize;
use sqlx::prelude::FromRow;
use tracing::info;

use crate::{utils::SubmittedForm, Error};

#[derive(FromRow, Serialize, Debug, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    pub async fn get_all(db: &sqlx::SqlitePool) -> Result<Vec<Self>, Error> {
        sqlx::query_as("SELECT id, name FROM categories ORDER BY name ASC, id ASC")
            .fetch_all(db)
            .await
            .map_err(|e| e.into())
    }

    pub async fn get_by_id(db: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, Error> {
        sqlx::query_as("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(|e| e.into())
    }
}

#[derive(Debug)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub async fn insert(&self, db: &sqlx::SqlitePool) -> Result<i64, Error> {
        let id = sqlx::query("INSERT INTO categories (name) VALUES (?)")
            .bind(&self.name)
            .execute(db)
            .await?
            .last_insert_rowid();
        info!("inserted {} with id {}", self, id);
        Ok(id)
    }
}

impl Display for NewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category <{}>", self.name)
    }
}

impl TryFrom<&SubmittedForm> for NewCategory {
    type Error = Error;

    fn try_from(form: &SubmittedForm) -> Result<Self, Self::Error> {
        form.require(&["category"])?;
        Ok(Self {
            name: form.text("category").unwrap_or_default().to_string(),
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
        let form = SubmittedForm::from_fields([("category", " Rust ")]);
        let id = NewCategory::try_from(&form)
            .unwrap()
            .insert(&db)
            .await
            .unwrap();
        NewCategory {
            name: "Databases".to_string(),
        }
        .insert(&db)
        .await
        .unwrap();

        let category = Category::get_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(category.name, "Rust");
        assert!(Category::get_by_id(&db, id + 100).await.unwrap().is_none());

        let names: Vec<_> = Category::get_all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Databases", "Rust"]);
    }

    #[test]
    fn test_missing_name() {
        let form = SubmittedForm::from_fields([("category", "")]);
        assert!(matches!(
            NewCategory::try_from(&form),
            Err(Error::MissingFields)
        ));
    }
}
