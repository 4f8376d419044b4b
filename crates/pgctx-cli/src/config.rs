use pgctx::{CacheConfig, FetcherConfig, JoinLimits};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            anyhow::anyhow!("failed to read config file {}: {e}", config_path.display())
        })?;
        let file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!("invalid config file {}: {e:#}", config_path.display())
        })?;

        Ok(Self { config_dir, file })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// `--database` wins over `database.url`.
    pub fn database_url(&self, overridden: Option<&str>) -> Option<String> {
        overridden
            .map(str::to_string)
            .or_else(|| self.file.database.as_ref().map(|db| db.url.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: String,
    /// Schema catalog file, JSON or TOML by extension.
    pub catalog: String,

    pub database: Option<DatabaseConfig>,

    pub profiles: ProfilesConfig,

    pub cache: Option<CacheSection>,

    #[serde(default)]
    pub fetch: FetchSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Where profiles come from: a JSON file or a database table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesConfig {
    pub file: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_ttl_secs() -> u64 {
    pgctx::cache::DEFAULT_CACHE_TTL.as_secs()
}

fn default_cache_capacity() -> usize {
    pgctx::cache::DEFAULT_CACHE_CAPACITY
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FetchSection {
    pub timeout_ms: Option<u64>,
    pub max_sql_log_length: usize,
    pub max_join_depth: usize,
    pub max_joins: usize,
}

impl Default for FetchSection {
    fn default() -> Self {
        let limits = JoinLimits::default();
        Self {
            timeout_ms: None,
            max_sql_log_length: pgctx::builder::DEFAULT_SQL_LOG_LENGTH,
            max_join_depth: limits.max_depth,
            max_joins: limits.max_joins,
        }
    }
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.expand_env()?;
        file.validate()?;
        Ok(file)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::new()
            .join_limits(JoinLimits {
                max_depth: self.fetch.max_join_depth,
                max_joins: self.fetch.max_joins,
            })
            .max_sql_log_length(self.fetch.max_sql_log_length);
        if let Some(ms) = self.fetch.timeout_ms {
            config = config.timeout(Duration::from_millis(ms));
        }
        config.cache = self.cache.as_ref().map(|c| CacheConfig {
            ttl: Duration::from_secs(c.ttl_secs),
            capacity: c.capacity,
        });
        config
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        self.catalog = expand_env_vars(&self.catalog)?;
        if let Some(db) = self.database.as_mut() {
            db.url = expand_env_vars(&db.url)?;
        }
        if let Some(file) = self.profiles.file.as_mut() {
            *file = expand_env_vars(file)?;
        }
        if let Some(table) = self.profiles.table.as_mut() {
            *table = expand_env_vars(table)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if self.catalog.trim().is_empty() {
            anyhow::bail!("catalog must not be empty");
        }
        if let Some(db) = &self.database {
            if db.url.trim().is_empty() {
                anyhow::bail!("database.url must not be empty");
            }
        }
        match (&self.profiles.file, &self.profiles.table) {
            (Some(_), Some(_)) => anyhow::bail!("set only one of profiles.file and profiles.table"),
            (None, None) => anyhow::bail!("one of profiles.file or profiles.table is required"),
            _ => {}
        }
        if self.fetch.timeout_ms == Some(0) {
            anyhow::bail!("fetch.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
