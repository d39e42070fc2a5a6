//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{AppError, AppResult};
use crate::provider::{GenerationDefaults, PollPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Pick from whichever credentials are present.
    Auto,
    Ltx,
    Runway,
    HuggingFace,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ProviderKind::Auto),
            "ltx" => Ok(ProviderKind::Ltx),
            "runway" => Ok(ProviderKind::Runway),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::Config(format!("unknown VIDEO_PROVIDER '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: String,
    pub static_drive_path: String,
    pub frontend_url: String,
    pub provider: ProviderKind,
    pub ltx_api_url: Option<String>,
    pub runway_api_key: Option<String>,
    pub runway_api_url: String,
    pub runway_model: String,
    pub hf_token: Option<String>,
    pub hf_api_url: String,
    pub hf_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub enhancer_model: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub generation: GenerationDefaults,
    pub mock_delay: Duration,
    pub max_concurrent_tasks: Option<usize>,
    pub task_ttl: Option<Duration>,
    pub mirror_remote_results: bool,
    pub http_timeout: Duration,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let generation = GenerationDefaults {
            frame_rate: parse(&get, "FRAME_RATE", 30)?,
            inference_steps: parse(&get, "INFERENCE_STEPS", 50)?,
            guidance_scale: parse(&get, "GUIDANCE_SCALE", 4.5)?,
            width: parse(&get, "VIDEO_WIDTH", 704)?,
            height: parse(&get, "VIDEO_HEIGHT", 480)?,
            ratio: or("VIDEO_RATIO", "1280:720"),
        };
        if generation.frame_rate == 0 {
            return Err(AppError::Config("FRAME_RATE must be positive".to_string()));
        }

        let poll_interval = Duration::from_secs(parse(&get, "POLL_INTERVAL_SECS", 3u64)?);
        if poll_interval.is_zero() {
            return Err(AppError::Config("POLL_INTERVAL_SECS must be positive".to_string()));
        }

        let max_concurrent_tasks: Option<usize> = parse_opt(&get, "MAX_CONCURRENT_TASKS")?;
        if let Some(n) = max_concurrent_tasks {
            if n == 0 || n > Semaphore::MAX_PERMITS {
                return Err(AppError::Config(format!(
                    "MAX_CONCURRENT_TASKS must be between 1 and {} (got {})",
                    Semaphore::MAX_PERMITS,
                    n
                )));
            }
        }

        Ok(Config {
            api_host: or("API_HOST", "0.0.0.0"),
            api_port: or("API_PORT", &or("PORT", "8000")),
            static_drive_path: or("STATIC_DRIVE_PATH", "./static"),
            frontend_url: or("FRONTEND_URL", "http://localhost:3000"),
            provider: get("VIDEO_PROVIDER").map(|v| v.parse::<ProviderKind>()).transpose()?.unwrap_or(ProviderKind::Auto),
            ltx_api_url: get("LTX_API_URL"),
            runway_api_key: get("RUNWAY_API_KEY"),
            runway_api_url: or("RUNWAY_API_URL", "https://api.dev.runwayml.com/v1"),
            runway_model: or("RUNWAY_MODEL", "gen3a_turbo"),
            hf_token: get("HF_TOKEN"),
            hf_api_url: or("HF_API_URL", "https://api-inference.huggingface.co"),
            hf_model: or("HF_MODEL", "Wan-AI/Wan2.2-TI2V-5B"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            enhancer_model: or("ENHANCER_MODEL", "gpt-4o-mini"),
            poll_interval,
            poll_timeout: Duration::from_secs(parse(&get, "POLL_TIMEOUT_SECS", 300u64)?),
            generation,
            mock_delay: Duration::from_millis(parse(&get, "MOCK_DELAY_MS", 3000u64)?),
            max_concurrent_tasks,
            task_ttl: parse_opt::<u64, _>(&get, "TASK_TTL_SECS")?.map(Duration::from_secs),
            mirror_remote_results: parse(&get, "MIRROR_REMOTE_RESULTS", false)?,
            http_timeout: Duration::from_secs(parse(&get, "HTTP_TIMEOUT_SECS", 600u64)?),
        })
    }

    /// The provider that will actually be used once `Auto` is resolved.
    pub fn resolved_provider(&self) -> ProviderKind {
        match self.provider {
            ProviderKind::Auto if self.ltx_api_url.is_some() => ProviderKind::Ltx,
            ProviderKind::Auto if self.runway_api_key.is_some() => ProviderKind::Runway,
            ProviderKind::Auto if self.hf_token.is_some() => ProviderKind::HuggingFace,
            ProviderKind::Auto => ProviderKind::Mock,
            explicit => explicit,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy { interval: self.poll_interval, budget: self.poll_timeout }
    }

    /// Origins allowed by CORS: local dev servers plus `FRONTEND_URL`.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = vec!["http://localhost:3000".to_string(), "http://127.0.0.1:3000".to_string()];
        let frontend = self.frontend_url.trim_end_matches('/').to_string();
        if !origins.contains(&frontend) {
            origins.push(frontend);
        }
        origins
    }

    /// Log the effective configuration. Secrets are reported as set/unset only.
    pub fn log_summary(&self) {
        let secret = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        tracing::info!("API_HOST: {}", self.api_host);
        tracing::info!("API_PORT: {}", self.api_port);
        tracing::info!("STATIC_DRIVE_PATH: {}", self.static_drive_path);
        tracing::info!("VIDEO_PROVIDER: {:?} (resolved: {:?})", self.provider, self.resolved_provider());
        tracing::info!("LTX_API_URL: {}", self.ltx_api_url.as_deref().unwrap_or("<unset>"));
        tracing::info!("RUNWAY_API_KEY: {}", secret(&self.runway_api_key));
        tracing::info!("HF_TOKEN: {} (model {})", secret(&self.hf_token), self.hf_model);
        tracing::info!("OPENAI_API_KEY: {}", secret(&self.openai_api_key));
        tracing::info!("ENHANCER_MODEL: {}", self.enhancer_model);
        tracing::info!("POLL: every {:?}, budget {:?}", self.poll_interval, self.poll_timeout);
        tracing::info!("MAX_CONCURRENT_TASKS: {:?}", self.max_concurrent_tasks);
        tracing::info!("TASK_TTL_SECS: {:?}", self.task_ttl.map(|d| d.as_secs()));
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

fn parse_opt<T, G>(get: &G, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AppError::Config(format!("{}='{}': {}", key, raw, e)))
        })
        .transpose()
}
