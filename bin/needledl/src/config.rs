use std::{num::NonZeroU32, path::Path, time::Duration};

use anyhow::{bail, Context};
use needle::{hls::UrlResolution, PaddingMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub downloads_directory: String,
    pub concurrency: NonZeroU32,
    pub retries: u32,
    pub timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// `name=value` pairs separated by `;`, sent to the manifest host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,

    pub url_resolution: UrlResolution,
    pub padding: PaddingMode,
    pub remux: bool,
    pub keep_intermediate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_directory: String::new(),
            concurrency: NonZeroU32::MIN,
            retries: 0,
            timeout_secs: 60,
            proxy: None,
            user_agent: None,
            cookies: None,
            url_resolution: UrlResolution::default(),
            padding: PaddingMode::default(),
            remux: true,
            keep_intermediate: false,
        }
    }
}

impl Config {
    pub fn load<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&data)
            .with_context(|| format!("failed to decode config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save<P>(&self, path: P) -> anyhow::Result<()>
    where
        P: AsRef<Path>,
    {
        let data = toml::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.downloads_directory.trim().is_empty() {
            bail!("no downloads directory provided");
        }

        if let Some(proxy) = &self.proxy {
            reqwest::Proxy::all(proxy).with_context(|| format!("invalid proxy: {proxy}"))?;
        }

        if self.remux && !needle::remux::ffmpeg_installed() {
            bail!("ffmpeg not found in PATH, install it or set `remux = false`");
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
