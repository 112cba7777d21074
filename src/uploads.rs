use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use rand::Rng;
use regex::Regex;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::Error;

// How many random suffixes to try before giving up on a colliding filename.
const MAX_SAVE_ATTEMPTS: usize = 8;
const SUFFIX_UPPER_BOUND: u32 = 100_000;

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3",
];

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap())
}

// Turn an arbitrary client-supplied filename into one that is safe to store in a flat directory.
// The result may be empty, callers must check.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let stripped = unsafe_chars().replace_all(&joined, "");
    let filename = stripped.trim_matches(|c| c == '.' || c == '_').to_string();

    let stem = filename.split('.').next().unwrap_or_default().to_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        return format!("_{}", filename);
    }
    filename
}

// Split `name` at its last dot, the extension keeps its leading dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

fn with_suffix(name: &str, suffix: u32) -> String {
    let (stem, ext) = split_extension(name);
    format!("{}_{}{}", stem, suffix, ext)
}

// Stores uploaded pictures in a flat directory.
#[derive(Clone, Debug)]
pub struct PictureStore {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_attempts: usize,
}

impl PictureStore {
    pub fn new(dir: impl Into<PathBuf>, allowed_extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            allowed_extensions,
            max_attempts: MAX_SAVE_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn init(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn allowed_file(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((_, ext)) => self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    // Save the picture and return the filename it was stored under.
    pub async fn save(&self, name: &str, data: &[u8]) -> Result<String, Error> {
        let sanitized = secure_filename(name);
        if sanitized.is_empty() {
            return Err(Error::InvalidPictureName(name.to_string()));
        }

        let mut candidate = sanitized.clone();
        for _ in 0..self.max_attempts {
            let path = self.dir.join(&candidate);
            // `create_new` fails if the file exists, so the name is claimed atomically.
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(data).await {
                        drop(file);
                        let _ = fs::remove_file(&path).await;
                        return Err(e.into());
                    }
                    file.flush().await?;
                    info!("stored picture {} ({} bytes)", candidate, data.len());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let suffix = rand::thread_rng().gen_range(0..SUFFIX_UPPER_BOUND);
                    candidate = with_suffix(&sanitized, suffix);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::PictureCollision(sanitized))
    }

    pub async fn remove(&self, filename: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(filename)).await {
            warn!("failed removing picture {}: {}", filename, e);
        }
    }
}
