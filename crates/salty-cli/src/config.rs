//! Configuration system for the Salty CLI.

use salty_core::{EnvelopeConfig, MAX_CHUNK};
use salty_crypto::armor::KeyEncryptionParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Salty configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Encryption configuration
    #[serde(default)]
    pub encrypt: EncryptConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Directory holding `id_salty`, `id_salty.pub` and `imported_keys`
    #[serde(default = "default_wallet_dir")]
    pub dir: PathBuf,
    /// Argon2id cost for passphrase-protected wallets
    #[serde(default)]
    pub kdf: KeyEncryptionParams,
}

/// Encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptConfig {
    /// Plaintext bytes per frame
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Bytes per read when decrypting
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_wallet_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".salty")
}

fn default_chunk_size() -> usize {
    MAX_CHUNK
}

fn default_read_buffer() -> usize {
    salty_core::envelope::DEFAULT_READ_BUFFER
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            dir: default_wallet_dir(),
            kdf: KeyEncryptionParams::default(),
        }
    }
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            read_buffer: default_read_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("salty/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Wallet directory with a leading `~` expanded to the home directory
    #[must_use]
    pub fn wallet_dir(&self) -> PathBuf {
        match self.wallet.dir.strip_prefix("~") {
            Ok(rest) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(rest),
            Err(_) => self.wallet.dir.clone(),
        }
    }

    /// Envelope tuning derived from this configuration
    #[must_use]
    pub fn envelope(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            chunk_size: self.encrypt.chunk_size,
            read_buffer: self.encrypt.read_buffer,
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        // Validate chunk size
        if self.encrypt.chunk_size == 0 || self.encrypt.chunk_size > MAX_CHUNK {
            anyhow::bail!("Chunk size must be between 1 and {MAX_CHUNK} bytes");
        }

        // Validate read buffer
        if self.encrypt.read_buffer == 0 || self.encrypt.read_buffer > 16 * 1024 * 1024 {
            anyhow::bail!("Read buffer must be between 1 byte and 16MB");
        }

        // Validate KDF cost
        self.wallet
            .kdf
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid wallet KDF settings: {e}"))?;

        // Validate wallet dir
        if self.wallet.dir.as_os_str().is_empty() {
            anyhow::bail!("Wallet directory must not be empty");
        }

        Ok(())
    }
}
