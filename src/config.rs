use log::info;
use std::path::PathBuf;
use std::{env, fmt::Display, str::FromStr};

/// Runtime settings, loaded from the environment with logged defaults.
pub struct Config {
    pub addr: String,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub page_size: usize,
}

impl Config {
    pub fn load() -> Self {
        Self {
            addr: try_load("FOODGRAM_ADDR", "0.0.0.0:3000"),
            data_dir: PathBuf::from(try_load::<String>("FOODGRAM_DATA_DIR", "data")),
            media_dir: PathBuf::from(try_load::<String>("FOODGRAM_MEDIA_DIR", "media")),
            page_size: try_load("FOODGRAM_PAGE_SIZE", "6"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .unwrap_or_else(|e| panic!("Invalid {key} value: {e}"))
}
