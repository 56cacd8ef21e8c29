use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use argon2::Params;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_file: PathBuf,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub write_retries: u32,
    pub max_avatar_bytes: usize,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_file: PathBuf::from("data/users.json"),
            static_dir: PathBuf::from("public"),
            upload_dir: PathBuf::from("public/uploads"),
            write_retries: 3,
            max_avatar_bytes: 5 * 1024 * 1024,
            hash_memory_kib: Params::DEFAULT_M_COST,
            hash_iterations: Params::DEFAULT_T_COST,
        }
    }
}

impl Config {
    /// Reads settings from the environment, falling back to the defaults for
    /// anything unset.
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let static_dir = lookup("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir);
        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| static_dir.join("uploads"));

        Ok(Self {
            bind_addr: parsed(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            data_file: lookup("DATA_FILE").map(PathBuf::from).unwrap_or(defaults.data_file),
            static_dir,
            upload_dir,
            write_retries: parsed(&lookup, "STORE_WRITE_RETRIES", defaults.write_retries)?,
            max_avatar_bytes: parsed(&lookup, "MAX_AVATAR_BYTES", defaults.max_avatar_bytes)?,
            hash_memory_kib: parsed(&lookup, "HASH_MEMORY_KIB", defaults.hash_memory_kib)?,
            hash_iterations: parsed(&lookup, "HASH_ITERATIONS", defaults.hash_iterations)?,
        })
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid ({:?}): {}", key, raw, e))),
        None => Ok(default),
    }
}
