#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    MiniJinja(#[from] minijinja::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("config validation failed: {0}")]
    ConfigValidation(String),

    #[error("Please enter all the fields")]
    MissingFields,

    #[error("Unknown {0}, please pick one from the list")]
    UnknownReference(&'static str),

    #[error("Invalid date \"{0}\", expected YYYY-MM-DD or YYYY-MM-DDTHH:MM")]
    InvalidDate(String),

    #[error("Invalid website \"{0}\"")]
    InvalidWebsite(String),

    #[error("picture filename \"{0}\" is empty once sanitized")]
    InvalidPictureName(String),

    #[error("could not find a free filename for picture \"{0}\"")]
    PictureCollision(String),
}

impl Error {
    // validation errors are reported back to the submitter as a flash message,
    // everything else is a server failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingFields
                | Error::UnknownReference(_)
                | Error::InvalidDate(_)
                | Error::InvalidWebsite(_)
        )
    }
}
