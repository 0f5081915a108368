use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub chat: ChatConfig,
    pub fetch: FetchConfig,
    pub analysis: AnalysisConfig,
    pub formatting: FormattingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatConfig {
    /// Display name used in report headers.
    pub name: String,
    /// GroupMe group id, required only for fetching.
    pub group_id: String,
    /// GroupMe API access token, required only for fetching.
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    /// Messages per API request, 1..=200 (the API caps pages at 200).
    pub message_request_limit: u32,
    pub retry_attempts: u32,
    /// Oldest message to fetch, seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    /// Newest message to fetch (exclusive), seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Size of the most-liked-messages ranking.
    pub num_messages_rank: usize,
    /// Drop the automated assistant account from the member universe.
    pub exclude_assistant: bool,
    /// Keyword groups to tally, each an alias list matched as lowercase
    /// substrings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<KeywordGroup>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeywordGroup {
    #[serde(default)]
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FormattingConfig {
    pub number_comma: bool,
    pub number_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            name: "Group Chat".to_string(),
            group_id: String::new(),
            access_token: String::new(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            message_request_limit: 200,
            retry_attempts: 3,
            start_date: None,
            end_date: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_messages_rank: 10,
            exclude_assistant: true,
            keywords: None,
        }
    }
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            number_comma: false,
            number_human: false,
            locale: "en".to_string(),
            decimal_places: 2,
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".chatwrapped.toml"))
    }

    /// Load from the default location, or `None` if no file exists yet.
    pub fn load() -> Result<Option<Config>> {
        match Self::config_path()? {
            path if path.exists() => Ok(Some(Self::load_from(&path)?)),
            _ => Ok(None),
        }
    }

    /// Load and validate a config file from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path, silent: bool) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        if !silent {
            println!("Configuration saved to: {}", path.display());
        }

        Ok(())
    }

    /// Enforce the configuration contract and normalize keyword groups.
    /// Contract violations halt the run immediately.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=200).contains(&self.fetch.message_request_limit) {
            bail!(
                "message_request_limit must be between 1 and 200, got {}",
                self.fetch.message_request_limit
            );
        }
        if self.analysis.num_messages_rank == 0 {
            bail!("num_messages_rank must be at least 1");
        }
        if let Some(start) = self.fetch.start_date
            && let Some(end) = self.fetch.end_date
            && end <= start
        {
            bail!("end_date must be after start_date");
        }
        if let Some(keywords) = self.analysis.keywords.as_mut() {
            for group in keywords.iter_mut() {
                group.normalize()?;
            }
        }
        Ok(())
    }

    pub fn is_fetch_configured(&self) -> bool {
        !self.chat.group_id.is_empty() && !self.chat.access_token.is_empty()
    }
}

impl KeywordGroup {
    /// Lowercase every alias and default the group name to the first alias.
    fn normalize(&mut self) -> Result<()> {
        if self.aliases.is_empty() {
            bail!("keyword group {:?} has no aliases", self.name);
        }
        for alias in &mut self.aliases {
            *alias = alias.to_lowercase();
        }
        if self.name.is_empty() {
            self.name = self.aliases[0].trim().to_string();
        }
        Ok(())
    }
}

// CLI helper functions. `path` is the `--config` override; `None` means the
// default location.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path(),
    }
}

pub fn create_default_config(path: Option<&Path>, overwrite: bool) -> Result<()> {
    let path = resolve_path(path)?;
    if !std::fs::exists(&path)? || overwrite {
        Config::default().save_to(&path, true)?;

        println!("Created default configuration file.");
        println!("Edit it with your chat's group id and access token:");
        println!("   {}", path.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config(path: Option<&Path>) -> Result<()> {
    let path = resolve_path(path)?;
    let config = match path.exists() {
        true => Some(Config::load_from(&path)?),
        false => None,
    };
    match config {
        Some(config) => {
            println!("Current configuration:");
            println!("   Chat Name: {}", config.chat.name);
            println!(
                "   Group Id: {}",
                if config.chat.group_id.is_empty() {
                    "Not set"
                } else {
                    &config.chat.group_id
                }
            );
            println!(
                "   Access Token: {}",
                if config.chat.access_token.is_empty() {
                    "Not set"
                } else {
                    "Set"
                }
            );
            println!(
                "   Message Request Limit: {}",
                config.fetch.message_request_limit
            );
            println!("   Retry Attempts: {}", config.fetch.retry_attempts);
            println!("   Rank Size: {}", config.analysis.num_messages_rank);
            println!("   Exclude Assistant: {}", config.analysis.exclude_assistant);
            println!(
                "   Keyword Groups: {}",
                config.analysis.keywords.map_or(0, |k| k.len())
            );
        }
        None => {
            println!("No configuration file found.");
            println!("   Run 'chatwrapped config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = resolve_path(path)?;
    let mut config = match path.exists() {
        true => Config::load_from(&path)?,
        false => Config::default(),
    };

    match key {
        "chat-name" => config.chat.name = value.to_string(),
        "group-id" => config.chat.group_id = value.to_string(),
        "access-token" => config.chat.access_token = value.to_string(),
        "message-request-limit" => {
            config.fetch.message_request_limit =
                value.parse::<u32>().context("Invalid number value")?;
        }
        "retry-attempts" => {
            config.fetch.retry_attempts = value.parse::<u32>().context("Invalid number value")?;
        }
        "num-messages-rank" => {
            config.analysis.num_messages_rank =
                value.parse::<usize>().context("Invalid number value")?;
        }
        "exclude-assistant" => {
            config.analysis.exclude_assistant = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "number-comma" => {
            config.formatting.number_comma = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "number-human" => {
            config.formatting.number_human = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "locale" => config.formatting.locale = value.to_string(),
        "decimal-places" => {
            config.formatting.decimal_places =
                value.parse::<usize>().context("Invalid number value")?;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.validate()?;
    config.save_to(&path, false)?;
    Ok(())
}
