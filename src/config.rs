// src/config.rs
use std::env;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODELSCOPE_BASE: &str = "https://api-inference.modelscope.cn";
const DEFAULT_OBJECT_DIR: &str = "objects";
const DEFAULT_PUBLIC_BASE: &str = "http://localhost:8080/objects";

/// Server-side configuration, read once at startup. Provider base URLs are
/// overridable so tests (and self-hosted gateways) can point the adapters
/// elsewhere. Missing optional values degrade the matching feature instead
/// of failing startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub gemini_base_url: String,
    pub modelscope_base_url: String,
    /// Server-held fallback credentials, used when a request carries no
    /// credential header.
    pub gemini_api_key: Option<String>,
    pub modelscope_api_key: Option<String>,
    /// Object store root; `EASEL_OBJECT_DIR=""` disables storage entirely.
    pub object_store_dir: Option<PathBuf>,
    pub public_base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let object_store_dir = match env::var("EASEL_OBJECT_DIR") {
            Ok(dir) if dir.is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir)),
            Err(_) => Some(PathBuf::from(DEFAULT_OBJECT_DIR)),
        };

        Self {
            bind_addr: env::var("EASEL_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            gemini_base_url: env::var("EASEL_GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE.to_string()),
            modelscope_base_url: env::var("EASEL_MODELSCOPE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_MODELSCOPE_BASE.to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            modelscope_api_key: env::var("MODELSCOPE_API_KEY").ok().filter(|k| !k.is_empty()),
            object_store_dir,
            public_base_url: env::var("EASEL_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE.to_string()),
        }
    }
}
