use std::{path::PathBuf, sync::Arc};

use minijinja::{
    value::{Enumerator, Object},
    Value,
};
use serde::Deserialize;

use crate::error::Error;

const FORM_FIELDS_HEADROOM_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, Deserialize)]
struct Deploy {
    host: String,
    port: u16,
}

#[derive(Clone, Debug, Deserialize)]
struct Meta {
    blog_name: String,
    blog_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct Database {
    url: String,
    max_connections: u32,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite://blog.sqlite3".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct Uploads {
    pictures_dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_size_mb: usize,
}

impl Default for Uploads {
    fn default() -> Self {
        Self {
            pictures_dir: PathBuf::from("assets/pictures"),
            allowed_extensions: ["png", "jpg", "jpeg", "gif"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_size_mb: 16,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct Markdown {
    enable: bool,
    code_syntax_highlight_theme: String,
}

impl Default for Markdown {
    fn default() -> Self {
        Self {
            enable: true,
            code_syntax_highlight_theme: "base16-ocean.dark".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    deploy: Deploy,
    meta: Meta,
    #[serde(default)]
    database: Database,
    #[serde(default)]
    uploads: Uploads,
    #[serde(default)]
    markdown: Markdown,
}

impl Config {
    pub fn new(path: &str) -> Result<Self, Error> {
        let config_content = std::fs::read_to_string(path)?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content).map_err(Error::Toml)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        // check the deployment config.
        if self.deploy.host.is_empty() || self.deploy.port == 0 {
            return Err(Error::ConfigValidation(
                "invalid deployment config, please specify the host and port".to_string(),
            ));
        }
        if self.database.url.is_empty() || self.database.max_connections == 0 {
            return Err(Error::ConfigValidation(
                "invalid database config, please specify the connection URL and a non-zero pool size"
                    .to_string(),
            ));
        }
        // check the uploads config.
        if self.uploads.pictures_dir.as_os_str().is_empty()
            || self.uploads.allowed_extensions.is_empty()
            || self.uploads.max_size_mb == 0
        {
            return Err(Error::ConfigValidation(
                "invalid uploads config, please specify the pictures directory, at least one allowed extension and a size limit".to_string(),
            ));
        }

        Ok(())
    }

    // get the server URL according to the config, this will be used to run the server.
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.deploy.host, self.deploy.port)
    }

    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    pub fn database_max_connections(&self) -> u32 {
        self.database.max_connections
    }

    pub fn pictures_dir(&self) -> PathBuf {
        self.uploads.pictures_dir.clone()
    }

    pub fn allowed_extensions(&self) -> Vec<String> {
        self.uploads
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect()
    }

    pub fn max_picture_bytes(&self) -> usize {
        self.uploads.max_size_mb * 1024 * 1024
    }

    // the request body limit, a full-size picture plus the text fields and multipart framing.
    pub fn max_body_bytes(&self) -> usize {
        self.max_picture_bytes() + FORM_FIELDS_HEADROOM_BYTES
    }

    pub fn render_markdown(&self) -> bool {
        self.markdown.enable
    }

    pub fn code_syntax_highlight_theme(&self) -> String {
        self.markdown.code_syntax_highlight_theme.clone()
    }
}

impl Object for Config {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        // just expose those fields that will be used in the templates.
        match key.as_str()? {
            "blog_name" => Some(Value::from(self.meta.blog_name.clone())),
            "blog_description" => Some(Value::from(self.meta.blog_description.clone())),
            "render_markdown" => Some(Value::from(self.markdown.enable)),
            _ => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["blog_name", "blog_description", "render_markdown"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[deploy]
host = "127.0.0.1"
port = 5000

[meta]
blog_name = "Gazette"
"#;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.server_url(), "127.0.0.1:5000");
        assert_eq!(config.database_url(), "sqlite://blog.sqlite3");
        assert_eq!(config.database_max_connections(), 5);
        assert_eq!(config.pictures_dir(), PathBuf::from("assets/pictures"));
        assert_eq!(
            config.allowed_extensions(),
            vec!["png", "jpg", "jpeg", "gif"]
        );
        assert_eq!(config.max_picture_bytes(), 16 * 1024 * 1024);
        assert!(config.max_body_bytes() > config.max_picture_bytes());
        assert!(config.render_markdown());
    }

    #[test]
    fn test_overrides() {
        let content = format!(
            "{}\n{}",
            MINIMAL,
            r#"
[uploads]
pictures_dir = "/tmp/pictures"
allowed_extensions = [".PNG", "webp"]
max_size_mb = 2

[markdown]
enable = false
"#
        );
        let config = Config::from_toml(&content).unwrap();
        assert_eq!(config.pictures_dir(), PathBuf::from("/tmp/pictures"));
        assert_eq!(config.allowed_extensions(), vec!["png", "webp"]);
        assert_eq!(config.max_picture_bytes(), 2 * 1024 * 1024);
        assert_eq!(
            config.max_body_bytes(),
            2 * 1024 * 1024 + FORM_FIELDS_HEADROOM_BYTES
        );
        assert!(!config.render_markdown());
        // partially specified sections fall back to the defaults.
        assert_eq!(config.code_syntax_highlight_theme(), "base16-ocean.dark");
    }

    #[test]
    fn test_validation() {
        let bad_port = MINIMAL.replace("port = 5000", "port = 0");
        assert!(matches!(
            Config::from_toml(&bad_port),
            Err(Error::ConfigValidation(_))
        ));

        let no_extensions = format!("{}\n[uploads]\nallowed_extensions = []\n", MINIMAL);
        assert!(matches!(
            Config::from_toml(&no_extensions),
            Err(Error::ConfigValidation(_))
        ));

        assert!(matches!(
            Config::from_toml("[deploy]\nhost = \"x\"\n"),
            Err(Error::Toml(_))
        ));
    }
}
