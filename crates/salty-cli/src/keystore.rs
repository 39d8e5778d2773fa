//! On-disk wallet and pubkey storage.
//!
//! ```text
//! <dir>/id_salty        armored SALTY WALLET block (0600)
//! <dir>/id_salty.pub    own salty-id line (0644)
//! <dir>/imported_keys   one salty-id line per known contact (0600)
//! ```

use anyhow::{Context, Result, bail};
use salty_core::{Identity, Wallet};
use salty_crypto::armor::KeyEncryptionParams;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const WALLET_FILE: &str = "id_salty";
const PUBKEY_FILE: &str = "id_salty.pub";
const IMPORTED_FILE: &str = "imported_keys";

/// Outcome of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The identity was appended
    Added,
    /// An identity with the same keys was already present
    AlreadyKnown,
}

/// Key directory rooted at a wallet dir
#[derive(Debug, Clone)]
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    /// Open a keystore rooted at `dir`. Nothing is touched on disk.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Wallet file path
    #[must_use]
    pub fn wallet_path(&self) -> PathBuf {
        self.dir.join(WALLET_FILE)
    }

    /// Own pubkey file path
    #[must_use]
    pub fn pubkey_path(&self) -> PathBuf {
        self.dir.join(PUBKEY_FILE)
    }

    /// Imported keys file path
    #[must_use]
    pub fn imported_path(&self) -> PathBuf {
        self.dir.join(IMPORTED_FILE)
    }

    /// Whether a wallet has been initialised here
    #[must_use]
    pub fn has_wallet(&self) -> bool {
        self.wallet_path().exists()
    }

    /// Whether the stored wallet is passphrase protected
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet file cannot be read.
    pub fn wallet_is_encrypted(&self) -> Result<bool> {
        let text = fs::read_to_string(self.wallet_path())
            .with_context(|| format!("Failed to read {}", self.wallet_path().display()))?;
        Ok(salty_core::wallet::is_encrypted_armor(&text))
    }

    /// Write the wallet, its pubkey, and record the pubkey as imported.
    ///
    /// Re-saving a wallet under a new name or email replaces its imported
    /// entry, so lookups resolve to the current `salty-id` text.
    ///
    /// # Errors
    ///
    /// Returns an error if armoring fails or any file cannot be written.
    pub fn save_wallet(
        &self,
        wallet: &Wallet,
        passphrase: Option<&[u8]>,
        params: KeyEncryptionParams,
    ) -> Result<()> {
        create_private_dir(&self.dir)?;

        let armored = wallet
            .to_armored(passphrase, params)
            .context("Failed to armor wallet")?;
        write_with_mode(&self.wallet_path(), armored.as_bytes(), 0o600)?;

        let line = format!("{}\n", wallet.identity());
        write_with_mode(&self.pubkey_path(), line.as_bytes(), 0o644)?;

        self.import_or_replace(wallet.identity())?;

        tracing::info!(
            dir = %self.dir.display(),
            fingerprint = %wallet.identity().fingerprint(),
            "wallet saved"
        );
        Ok(())
    }

    /// Load the wallet, attaching the stored pubkey's name and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the files are missing, the passphrase is wrong,
    /// or the pubkey does not belong to the wallet.
    pub fn load_wallet(&self, passphrase: Option<&[u8]>) -> Result<Wallet> {
        let path = self.wallet_path();
        if !path.exists() {
            bail!(
                "No wallet at {}. Run `salty init` first",
                path.display()
            );
        }

        let text = zeroize::Zeroizing::new(
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        );
        let wallet = Wallet::from_armored(&text, passphrase).context("Failed to open wallet")?;

        if self.pubkey_path().exists() {
            let identity = self.load_pubkey()?;
            return wallet
                .with_identity(identity)
                .context("Stored pubkey does not match the wallet");
        }

        Ok(wallet)
    }

    /// Load the own pubkey line
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_pubkey(&self) -> Result<Identity> {
        let path = self.pubkey_path();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Identity::parse(text.trim()).with_context(|| format!("Invalid pubkey in {}", path.display()))
    }

    /// Every imported identity, skipping blank lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a
    /// valid `salty-id`.
    pub fn imported(&self) -> Result<Vec<Identity>> {
        let path = self.imported_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                Identity::parse(line).with_context(|| {
                    format!("Invalid pubkey on line {} of {}", index + 1, path.display())
                })
            })
            .collect()
    }

    /// Append `identity` to the imported keys unless its keys are known.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub fn import(&self, identity: &Identity) -> Result<ImportOutcome> {
        let mut known = self.imported()?;
        if known.iter().any(|entry| entry.same_keys(identity)) {
            tracing::debug!(fingerprint = %identity.fingerprint(), "pubkey already imported");
            return Ok(ImportOutcome::AlreadyKnown);
        }

        known.push(identity.clone());
        self.write_imported(&known)?;

        tracing::info!(
            identity = %identity.nice_string(),
            fingerprint = %identity.fingerprint(),
            "pubkey imported"
        );
        Ok(ImportOutcome::Added)
    }

    /// Import `identity`, overwriting any entry with the same keys.
    fn import_or_replace(&self, identity: &Identity) -> Result<()> {
        let mut known = self.imported()?;
        let Some(entry) = known.iter_mut().find(|entry| entry.same_keys(identity)) else {
            return self.import(identity).map(|_| ());
        };

        if entry.to_string() == identity.to_string() {
            return Ok(());
        }

        tracing::info!(
            old = %entry.nice_string(),
            new = %identity.nice_string(),
            "imported pubkey updated"
        );
        *entry = identity.clone();
        self.write_imported(&known)
    }

    fn write_imported(&self, identities: &[Identity]) -> Result<()> {
        create_private_dir(&self.dir)?;

        let contents: String = identities
            .iter()
            .map(|identity| format!("{identity}\n"))
            .collect();
        write_with_mode(&self.imported_path(), contents.as_bytes(), 0o600)
    }

    /// Find an imported identity by email, case-insensitively.
    ///
    /// The most recently imported match wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the imported keys cannot be read.
    pub fn lookup_email(&self, email: &str) -> Result<Option<Identity>> {
        Ok(self.imported()?.into_iter().rev().find(|identity| {
            identity
                .email()
                .is_some_and(|known| known.eq_ignore_ascii_case(email.trim()))
        }))
    }

    /// Resolve a `salty-id` line or an imported email to an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` is neither a valid `salty-id` nor a
    /// known email.
    pub fn resolve(&self, spec: &str) -> Result<Identity> {
        let spec = spec.trim();
        if spec.starts_with(salty_core::identity::ID_TAG) {
            return Identity::parse(spec).context("Invalid salty-id");
        }

        self.lookup_email(spec)?
            .with_context(|| format!("No imported pubkey for {spec}. Use `salty import` first"))
    }
}

/// Create `dir` (and parents), restricting it to the owner on Unix.
fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(dir)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(dir, perms)?;
    }

    Ok(())
}

/// Atomically replace `path` with `contents` at the given Unix mode.
///
/// The data goes to an owner-only temp file in the same directory first, so
/// the target never exists with looser permissions than `mode`.
#[cfg_attr(not(unix), allow(unused_variables))]
fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }

    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
