mod config;

use std::{num::NonZeroU32, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use config::Config;
use fake_user_agent::get_chrome_rua;
use needle::{
    hls::UrlResolution, CancellationToken, Fetcher, HttpClient, PaddingMode, RetryPolicy,
    TrackDownload,
};
use reqwest::{Client, Proxy, Url};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct NeedleArgs {
    /// Config file path
    #[clap(short, long, default_value = "config.toml", env = "NEEDLEDL_CONFIG")]
    config: PathBuf,

    /// Directory for decrypted files. Overrides `downloads_directory`.
    #[clap(long)]
    downloads_directory: Option<String>,

    /// Output file path
    ///
    /// Without it the decrypted stream is left in the downloads directory
    /// under a generated name.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Set key manually
    ///
    /// Hex encoded AES key, replaces the key referenced by the playlist.
    #[clap(long)]
    key: Option<String>,

    /// Segments fetched at the same time
    #[clap(long)]
    concurrency: Option<NonZeroU32>,

    /// Retry limit for network errors
    #[clap(long)]
    retries: Option<u32>,

    /// How segment uris are resolved against the playlist url
    #[clap(long, value_enum)]
    url_resolution: Option<Resolution>,

    /// Validate PKCS#7 padding instead of trusting the last byte
    #[clap(long)]
    strict_padding: bool,

    /// Move the decrypted stream to the output path without running ffmpeg
    #[clap(long)]
    no_remux: bool,

    /// Keep the decrypted stream after remuxing
    #[clap(short, long)]
    keep: bool,

    /// Write the config file back with the flags above applied
    #[clap(long)]
    save_config: bool,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// m3u8 playlist url
    manifest_url: Url,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum Resolution {
    Auto,
    ManifestRelative,
    Absolute,
}

impl From<Resolution> for UrlResolution {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Auto => UrlResolution::Auto,
            Resolution::ManifestRelative => UrlResolution::ManifestRelative,
            Resolution::Absolute => UrlResolution::Absolute,
        }
    }
}

impl NeedleArgs {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() || self.downloads_directory.is_none() {
            Config::load(&self.config)?
        } else {
            tracing::debug!("{} not found, using defaults.", self.config.display());
            Config::default()
        };

        if let Some(dir) = &self.downloads_directory {
            config.downloads_directory = dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(resolution) = self.url_resolution {
            config.url_resolution = resolution.into();
        }
        if self.strict_padding {
            config.padding = PaddingMode::Strict;
        }
        if self.no_remux {
            config.remux = false;
        }
        if self.keep {
            config.keep_intermediate = true;
        }

        if self.save_config {
            config.validate()?;
            config.save(&self.config)?;
            tracing::info!("Config saved to {}", self.config.display());
        }

        // nothing to remux into without an output path
        if self.output.is_none() {
            config.remux = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn client(&self, config: &Config) -> anyhow::Result<HttpClient> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| get_chrome_rua().to_string());
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout());
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        let client = HttpClient::new(builder).context("failed to build http client")?;
        if let Some(cookies) = &config.cookies {
            client.add_cookies(
                cookies.split(';').map(str::trim).filter(|c| !c.is_empty()),
                &self.manifest_url,
            );
        }
        Ok(client)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = NeedleArgs::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.config()?;
    let client = args.client(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping download...");
                cancel.cancel();
            }
        }
    });

    let fetcher = Fetcher::new(client)
        .with_retry(RetryPolicy::new(config.retries))
        .with_cancellation(cancel);

    let output = TrackDownload::new(
        fetcher,
        args.manifest_url.clone(),
        &config.downloads_directory,
    )
    .resolution(config.url_resolution)
    .padding(config.padding)
    .concurrency(config.concurrency)
    .manual_key(args.key.clone())
    .output(args.output.clone())
    .remux(config.remux)
    .keep_intermediate(config.keep_intermediate)
    .run()
    .await?;

    tracing::info!("Saved to {}", output.display());
    Ok(())
}
