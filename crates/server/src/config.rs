use std::path::PathBuf;

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub registration_open: bool,
    pub require_email_verification: bool,
    pub max_upload_bytes: usize,
    pub email: EmailConfig,
    pub assistant: AssistantConfig,
    pub web_dir: PathBuf,
}

/// Transactional email provider. No key means messages are only logged.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_EMAIL_FROM: &str = "Taskflow <noreply@localhost>";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env_nonempty(key).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = env_nonempty("TASKFLOW_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let base_url = env_nonempty("BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let port = match env_nonempty("PORT") {
            Some(p) => p
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{p}': {e}"))?,
            None => 3000,
        };

        let jwt_secret = match env_nonempty("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not set, using a random per-process secret (tokens and links die on restart)"
                );
                taskflow_api::crypto::generate_token().map_err(|e| anyhow::anyhow!("{e}"))?
            }
        };

        let registration_open = env_nonempty("TASKFLOW_REGISTRATION").as_deref() != Some("closed");

        let max_upload_bytes = match env_nonempty("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MAX_UPLOAD_BYTES '{v}': {e}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let email = EmailConfig {
            api_key: env_nonempty("EMAIL_API_KEY"),
            api_url: env_nonempty("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.into()),
            from: env_nonempty("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.into()),
        };

        let assistant = AssistantConfig {
            api_key: env_nonempty("ANTHROPIC_API_KEY"),
            model: env_nonempty("ASSISTANT_MODEL"),
        };

        let web_dir = env_nonempty("TASKFLOW_WEB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("web/build"));

        Ok(Self {
            data_dir,
            base_url,
            port,
            jwt_secret,
            registration_open,
            require_email_verification: env_flag("REQUIRE_EMAIL_VERIFICATION"),
            max_upload_bytes,
            email,
            assistant,
            web_dir,
        })
    }

    /// Configuration for in-process tests: fixed secret, no external services.
    pub fn for_tests(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            web_dir: data_dir.join("web"),
            data_dir,
            base_url: "http://localhost:3000".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            registration_open: true,
            require_email_verification: false,
            max_upload_bytes: 1024 * 1024,
            email: EmailConfig {
                api_key: None,
                api_url: DEFAULT_EMAIL_API_URL.into(),
                from: DEFAULT_EMAIL_FROM.into(),
            },
            assistant: AssistantConfig {
                api_key: None,
                model: None,
            },
        }
    }
}
