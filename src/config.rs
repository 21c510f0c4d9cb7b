use std::{net::SocketAddr, path::PathBuf};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3001";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_MEDIA_URL: &str = "/media/";
const DEFAULT_PAGE_SIZE: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (a `.env` file is honoured by `main`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub address: SocketAddr,
    pub media_root: PathBuf,
    pub media_url: String,
    pub page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let address = lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned());
        let address = address.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDRESS",
            value: address.clone(),
        })?;

        let media_root = lookup("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT));

        let mut media_url = lookup("MEDIA_URL").unwrap_or_else(|| DEFAULT_MEDIA_URL.to_owned());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }
        // Media is mounted beside /api, so it needs a prefix of its own.
        if !media_url.starts_with('/') || media_url == "/" {
            return Err(ConfigError::Invalid {
                name: "MEDIA_URL",
                value: media_url,
            });
        }

        let page_size = match lookup("PAGE_SIZE") {
            Some(value) => match value.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "PAGE_SIZE",
                        value,
                    })
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            address,
            media_root,
            media_url,
            page_size,
        })
    }

    /// URL prefix under which `media_root` is served, without the trailing slash.
    pub fn media_mount(&self) -> &str {
        self.media_url.trim_end_matches('/')
    }
}
