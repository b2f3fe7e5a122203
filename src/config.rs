//! Relay configuration: defaults, config file, environment overlay.
//!
//! Precedence, highest first: command-line flags (applied by the binary),
//! environment, config file, built-in defaults. The resulting [`RelayConfig`]
//! is read-only for the lifetime of the server.

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::pipeline::DEFAULT_RESOLVE_CONCURRENCY;
use crate::upstream::DEFAULT_UPSTREAM_BASE_URL;

const TOKENS_ENV: &str = "CTRELAY_TOKENS";
const PASSWORD_ENV: &str = "CTRELAY_PASSWORD";
const UPSTREAM_ENV: &str = "CTRELAY_UPSTREAM";
const BIND_ENV: &str = "CTRELAY_BIND";
const DOWNLOAD_MODE_ENV: &str = "CTRELAY_DOWNLOAD_MODE";

/// How `/download` hands the file to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// `302` to the resolved URL.
    #[default]
    Redirect,
    /// Stream the file through the relay.
    Proxy,
}

impl DownloadMode {
    /// Returns the stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(Self::Redirect),
            "proxy" => Ok(Self::Proxy),
            other => Err(format!(
                "unknown download mode '{other}'; expected one of: redirect, proxy"
            )),
        }
    }
}

/// Effective relay settings.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub upstream_base_url: String,
    /// Upstream credential pool. May be empty when callers always supply one.
    pub tokens: Vec<String>,
    /// Shared secret callers must pass as `token`. `None` disables the gate.
    pub password: Option<String>,
    pub download_mode: DownloadMode,
    pub api_connect_timeout_secs: u64,
    pub api_timeout_secs: u64,
    pub download_connect_timeout_secs: u64,
    pub download_response_timeout_secs: u64,
    pub download_read_timeout_secs: u64,
    /// Resolve calls in flight per batch (1..=100).
    pub resolve_concurrency: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8787)),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            tokens: Vec::new(),
            password: None,
            download_mode: DownloadMode::Redirect,
            api_connect_timeout_secs: 10,
            api_timeout_secs: 30,
            download_connect_timeout_secs: 30,
            download_response_timeout_secs: 60,
            download_read_timeout_secs: 300,
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("upstream_base_url", &self.upstream_base_url)
            .field("tokens", &format_args!("[{} redacted]", self.tokens.len()))
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("download_mode", &self.download_mode)
            .field("api_connect_timeout_secs", &self.api_connect_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "download_connect_timeout_secs",
                &self.download_connect_timeout_secs,
            )
            .field(
                "download_response_timeout_secs",
                &self.download_response_timeout_secs,
            )
            .field("download_read_timeout_secs", &self.download_read_timeout_secs)
            .field("resolve_concurrency", &self.resolve_concurrency)
            .finish()
    }
}

impl RelayConfig {
    /// Overlays values present in a config file.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(bind) = file.bind {
            self.bind = bind;
        }
        if let Some(upstream) = &file.upstream_base_url {
            self.upstream_base_url.clone_from(upstream);
        }
        if let Some(tokens) = &file.tokens {
            self.tokens.clone_from(tokens);
        }
        if let Some(password) = &file.password {
            self.password = non_empty(password);
        }
        if let Some(mode) = file.download_mode {
            self.download_mode = mode;
        }
        apply_u64(&mut self.api_connect_timeout_secs, file.api_connect_timeout_secs);
        apply_u64(&mut self.api_timeout_secs, file.api_timeout_secs);
        apply_u64(
            &mut self.download_connect_timeout_secs,
            file.download_connect_timeout_secs,
        );
        apply_u64(
            &mut self.download_response_timeout_secs,
            file.download_response_timeout_secs,
        );
        apply_u64(
            &mut self.download_read_timeout_secs,
            file.download_read_timeout_secs,
        );
        if let Some(concurrency) = file.resolve_concurrency {
            self.resolve_concurrency = concurrency;
        }
    }

    /// Overlays `CTRELAY_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to an unparseable value.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| env::var(name).ok())
    }

    /// Overlays `CTRELAY_*` variables read through `lookup`.
    ///
    /// Empty values are ignored. `CTRELAY_TOKENS` is comma-separated.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to an unparseable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(tokens) = get(TOKENS_ENV) {
            self.tokens = split_token_list(&tokens);
        }
        if let Some(password) = get(PASSWORD_ENV) {
            self.password = Some(password);
        }
        if let Some(upstream) = get(UPSTREAM_ENV) {
            self.upstream_base_url = upstream.trim().to_string();
        }
        if let Some(bind) = get(BIND_ENV) {
            self.bind = bind
                .trim()
                .parse()
                .with_context(|| format!("Invalid `{BIND_ENV}` value '{bind}'"))?;
        }
        if let Some(mode) = get(DOWNLOAD_MODE_ENV) {
            self.download_mode = mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid `{DOWNLOAD_MODE_ENV}` value"))?;
        }
        Ok(())
    }

    /// Checks ranges that the individual sources cannot enforce alone.
    ///
    /// # Errors
    ///
    /// Names the offending setting.
    pub fn validate(&self) -> Result<()> {
        validate_resolve_concurrency(Some(self.resolve_concurrency))?;
        validate_timeout_secs("api_connect_timeout_secs", Some(self.api_connect_timeout_secs))?;
        validate_timeout_secs("api_timeout_secs", Some(self.api_timeout_secs))?;
        validate_timeout_secs(
            "download_connect_timeout_secs",
            Some(self.download_connect_timeout_secs),
        )?;
        validate_timeout_secs(
            "download_response_timeout_secs",
            Some(self.download_response_timeout_secs),
        )?;
        validate_timeout_secs(
            "download_read_timeout_secs",
            Some(self.download_read_timeout_secs),
        )?;
        let parsed = url::Url::parse(&self.upstream_base_url).with_context(|| {
            format!("Invalid upstream base URL '{}'", self.upstream_base_url)
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "Invalid upstream base URL '{}': expected http or https",
                self.upstream_base_url
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn api_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api_connect_timeout_secs)
    }

    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    #[must_use]
    pub fn download_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.download_connect_timeout_secs)
    }

    #[must_use]
    pub fn download_response_timeout(&self) -> Duration {
        Duration::from_secs(self.download_response_timeout_secs)
    }

    #[must_use]
    pub fn download_read_timeout(&self) -> Duration {
        Duration::from_secs(self.download_read_timeout_secs)
    }
}

fn apply_u64(target: &mut u64, value: Option<u64>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn split_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Values read from a config file. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub bind: Option<SocketAddr>,
    pub upstream_base_url: Option<String>,
    pub tokens: Option<Vec<String>>,
    pub password: Option<String>,
    pub download_mode: Option<DownloadMode>,
    pub api_connect_timeout_secs: Option<u64>,
    pub api_timeout_secs: Option<u64>,
    pub download_connect_timeout_secs: Option<u64>,
    pub download_response_timeout_secs: Option<u64>,
    pub download_read_timeout_secs: Option<u64>,
    pub resolve_concurrency: Option<usize>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Names the first key whose value is out of range.
    pub fn validate(&self) -> Result<()> {
        validate_resolve_concurrency(self.resolve_concurrency)?;
        validate_timeout_secs("api_connect_timeout_secs", self.api_connect_timeout_secs)?;
        validate_timeout_secs("api_timeout_secs", self.api_timeout_secs)?;
        validate_timeout_secs(
            "download_connect_timeout_secs",
            self.download_connect_timeout_secs,
        )?;
        validate_timeout_secs(
            "download_response_timeout_secs",
            self.download_response_timeout_secs,
        )?;
        validate_timeout_secs("download_read_timeout_secs", self.download_read_timeout_secs)?;
        Ok(())
    }
}

fn validate_resolve_concurrency(value: Option<usize>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=100).contains(&value) {
        bail!("Invalid config value for `resolve_concurrency`: {value}. Expected range: 1..=100");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/ctrelay/config.toml`
/// 2. `$HOME/.config/ctrelay/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("ctrelay")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("ctrelay")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. Without one, the default path is used when a
/// file is present there; otherwise `Ok(None)`.
///
/// # Errors
///
/// Fails when the file cannot be read or does not parse.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<(PathBuf, FileConfig)>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(Some((path, config)))
}

/// Parses `key = value` config text.
///
/// # Errors
///
/// Rejects unknown keys and malformed values, naming the key and line.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "bind" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.bind = Some(parsed.parse::<SocketAddr>().with_context(context)?);
            }
            "upstream_base_url" => {
                cfg.upstream_base_url = Some(parse_string_literal(value).with_context(context)?);
            }
            "tokens" => {
                cfg.tokens = Some(parse_string_array(value).with_context(context)?);
            }
            "password" => {
                cfg.password = Some(parse_string_literal(value).with_context(context)?);
            }
            "download_mode" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                let mode = parsed
                    .parse::<DownloadMode>()
                    .map_err(|e| anyhow::anyhow!(e))
                    .with_context(context)?;
                cfg.download_mode = Some(mode);
            }
            "api_connect_timeout_secs" => {
                cfg.api_connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "api_timeout_secs" => {
                cfg.api_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_connect_timeout_secs" => {
                cfg.download_connect_timeout_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_response_timeout_secs" => {
                cfg.download_response_timeout_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_read_timeout_secs" => {
                cfg.download_read_timeout_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "resolve_concurrency" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("resolve_concurrency out of range for usize"))
                    .with_context(context)?;
                cfg.resolve_concurrency = Some(n);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    let inner = &raw_value[1..raw_value.len() - 1];
    if inner.contains('"') {
        bail!("Unexpected quote inside string");
    }
    Ok(inner.to_string())
}

/// Parses `["a", "b"]`. A trailing comma is allowed.
fn parse_string_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array of double-quoted strings");
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in inner.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ',' if !in_string => {
                push_array_item(&mut items, &current)?;
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if in_string {
        bail!("Unterminated string in array");
    }
    push_array_item(&mut items, &current)?;
    Ok(items)
}

fn push_array_item(items: &mut Vec<String>, raw_item: &str) -> Result<()> {
    let item = raw_item.trim();
    if item.is_empty() {
        return Ok(());
    }
    items.push(parse_string_literal(item)?);
    Ok(())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
