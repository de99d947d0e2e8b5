// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::fetch::BodyFormat;
use crate::rank::Metric;

pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/wcota/covid19br/master/cases-brazil-states.csv";

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "COVIDBR_CONFIG";

/// Top-level run configuration. Every section has defaults so an empty
/// file (or no file) yields a working setup against the public CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub exclusion: ExclusionConfig,
    pub ranking: RankingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub format: BodyFormat,
    pub timeout_secs: u64,
    /// Upper bound on `next` links followed for paginated JSON.
    pub max_pages: usize,
    /// Sent on the first request only; `next` links already carry theirs.
    pub query: BTreeMap<String, String>,
    pub auth: Option<AuthConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            format: BodyFormat::Csv,
            timeout_secs: 30,
            max_pages: 10,
            query: BTreeMap::new(),
            auth: None,
        }
    }
}

/// Static token auth. The token itself never lives in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_env: String,
    pub scheme: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: "BRASIL_IO_TOKEN".to_string(),
            scheme: "Token".to_string(),
        }
    }
}

/// Region names treated as aggregate rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Whole-name matches, case-insensitive.
    pub exact: Vec<String>,
    /// Regexes matched anywhere in the name.
    pub patterns: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            exact: vec!["TOTAL".to_string(), "BRASIL".to_string()],
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub metric: Metric,
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            metric: Metric::MortalityRate,
            top_n: 5,
        }
    }
}

/// Where (if anywhere) the enriched table is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Explicit file; wins over `dir`.
    pub path: Option<PathBuf>,
    /// Directory receiving `<prefix>_<YYYYMMDD>.<extension>`.
    pub dir: Option<PathBuf>,
    pub prefix: String,
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            dir: None,
            prefix: "dados_covid".to_string(),
            extension: "csv".to_string(),
        }
    }
}

impl Config {
    /// Read a YAML config file. Missing keys fall back to defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Resolve the config the binary should use: explicit path, then
    /// `COVIDBR_CONFIG`, then built-in defaults; env overrides applied last.
    pub fn resolve(cli_path: Option<PathBuf>) -> Result<Self> {
        let path = cli_path.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(p) => {
                debug!(path = %p.display(), "loading config file");
                Self::load_from_file(&p)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `COVIDBR_*` overrides. `lookup` is injected so tests need not
    /// touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COVIDBR_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(format) = lookup("COVIDBR_SOURCE_FORMAT") {
            self.source.format = BodyFormat::from_str(&format)?;
        }
        if let Some(output) = lookup("COVIDBR_OUTPUT") {
            self.output.path = Some(PathBuf::from(output));
        }
        if let Some(metric) = lookup("COVIDBR_METRIC") {
            self.ranking.metric = Metric::from_str(&metric)?;
        }
        if let Some(n) = lookup("COVIDBR_TOP_N") {
            self.ranking.top_n = n.trim().parse().map_err(|_| {
                PipelineError::Configuration(format!("COVIDBR_TOP_N is not a count: {n}"))
            })?;
        }
        Ok(())
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.url).map_err(|e| {
            PipelineError::Configuration(format!("invalid source url {}: {}", self.source.url, e))
        })?;
        if self.source.timeout_secs == 0 {
            return Err(PipelineError::Configuration(
                "source.timeout_secs must be positive".into(),
            ));
        }
        if self.source.max_pages == 0 {
            return Err(PipelineError::Configuration(
                "source.max_pages must be positive".into(),
            ));
        }
        if let Some(auth) = &self.source.auth {
            if auth.token_env.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "source.auth.token_env must name an environment variable".into(),
                ));
            }
        }
        Ok(())
    }
}
