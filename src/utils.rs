use std::{collections::HashMap, sync::Arc};

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::PathRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::error;
use url::Url;

use crate::{app::AppState, Error};

// A wrapper for `axum::extract::Path` that can render a 404 page if the path is rejected.
pub struct Path<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    Arc<AppState>: FromRef<S>,
    // derive the `FromRequestParts` implementation for `axum::extract::Path` for the type `T`.
    axum::extract::Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    T: Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => {
                error!("parse path rejection: {:?}", rejection);
                let state = Arc::<AppState>::from_ref(state);
                Err(state.render_not_found().await)
            }
        }
    }
}

pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

// The form field carrying the uploaded picture.
const PICTURE_FIELD: &str = "pic";

// A submitted creation form, read from either a urlencoded or a multipart body.
#[derive(Default)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
    pub picture: Option<UploadedFile>,
}

impl SubmittedForm {
    #[cfg(test)]
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            picture: None,
        }
    }

    // get the trimmed value of a field, an empty value is treated as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn require(&self, names: &[&str]) -> Result<(), Error> {
        if names.iter().any(|name| self.text(name).is_none()) {
            return Err(Error::MissingFields);
        }
        Ok(())
    }

    pub fn id(&self, name: &str, what: &'static str) -> Result<i64, Error> {
        self.text(name)
            .ok_or(Error::MissingFields)?
            .parse()
            .map_err(|_| Error::UnknownReference(what))
    }

    // the raw values, used to fill the form back in after a failed submission.
    pub fn values(&self) -> &HashMap<String, String> {
        &self.fields
    }

    async fn from_multipart(mut multipart: axum::extract::Multipart) -> Result<Self, Error> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if name == PICTURE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // browsers send an empty part when no file was chosen.
                if !file_name.is_empty() && !data.is_empty() {
                    form.picture = Some(UploadedFile { file_name, data });
                }
                continue;
            }
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for SubmittedForm
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        let result = if is_multipart {
            match axum::extract::Multipart::from_request(req, state).await {
                Ok(multipart) => Self::from_multipart(multipart)
                    .await
                    .map_err(|e| e.to_string()),
                Err(rejection) => Err(format!("{:?}", rejection)),
            }
        } else {
            match axum::extract::Form::<HashMap<String, String>>::from_request(req, state).await {
                Ok(form) => Ok(Self {
                    fields: form.0,
                    picture: None,
                }),
                Err(rejection) => Err(format!("{:?}", rejection)),
            }
        };

        match result {
            Ok(form) => Ok(form),
            Err(reason) => {
                error!("failed reading the submitted form: {}", reason);
                let app_state = Arc::<AppState>::from_ref(state);
                Err(app_state
                    .render_error(
                        StatusCode::BAD_REQUEST,
                        "Error",
                        "Oops, it seems like something went wrong during the posting...",
                    )
                    .await
                    .into_response())
            }
        }
    }
}

// Parse an optional publication date, dates without a time are taken at midnight UTC.
pub fn parse_date(value: Option<&str>) -> Result<DateTime<Utc>, Error> {
    let value = match value {
        Some(value) => value,
        None => return Ok(Utc::now()),
    };
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
        .ok_or_else(|| Error::InvalidDate(value.to_string()))
}

// Normalize a website into an absolute http(s) URL, a missing scheme defaults to https.
pub fn normalize_website(value: &str) -> Result<String, Error> {
    let parsed = match Url::parse(value) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{}", value)),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(url.to_string())
        }
        _ => Err(Error::InvalidWebsite(value.to_string())),
    }
}
