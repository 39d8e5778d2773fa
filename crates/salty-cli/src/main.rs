//! Salty CLI
//!
//! Identity-based, forward-secret, streaming authenticated encryption

mod config;
mod keystore;
mod progress;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::{Parser, Subcommand};
use console::style;
use salty_core::{Identity, Wallet, envelope};
use salty_crypto::signatures::Signature;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use config::Config;
use keystore::{ImportOutcome, Keystore};
use progress::{ByteProgress, format_bytes, format_duration};

/// Marker for reading from stdin
const STDIN_MARKER: &str = "-";

/// Salty - encrypt files and messages to a salty-id
#[derive(Parser)]
#[command(name = "salty")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to ~/.config/salty/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a wallet, or update the name and email of an existing one
    Init {
        /// Display name attached to the pubkey
        #[arg(long)]
        name: Option<String>,

        /// Email attached to the pubkey
        #[arg(long)]
        email: Option<String>,

        /// Store the wallet without a passphrase
        #[arg(long)]
        no_passphrase: bool,
    },

    /// Print your own pubkey
    Id,

    /// Import a pubkey string or a file of pubkey lines
    Import {
        /// `salty-id ...` line or path to a file
        #[arg(required = true)]
        pubkey: String,
    },

    /// Encrypt a file or stdin
    Encrypt {
        /// Input file, or `-` for stdin
        #[arg(required = true)]
        input: String,

        /// Output file (stdout when omitted)
        output: Option<PathBuf>,

        /// Recipient email or salty-id (yourself when omitted)
        #[arg(long)]
        to: Option<String>,
    },

    /// Decrypt a file or stdin
    Decrypt {
        /// Input file, or `-` for stdin
        #[arg(required = true)]
        input: String,

        /// Output file (stdout when omitted)
        output: Option<PathBuf>,
    },

    /// Print a detached signature of a file
    Sign {
        /// File to sign
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Verify a detached signature of a file
    Verify {
        /// Signed file
        #[arg(required = true)]
        input: PathBuf,

        /// Base64url signature, or a file containing it
        #[arg(required = true)]
        signature: String,

        /// Signer email or salty-id
        #[arg(long, required = true)]
        from: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    // Validate configuration
    config.validate()?;

    // Initialize logging; stdout may carry envelope bytes
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let store = Keystore::new(config.wallet_dir());

    match cli.command {
        Commands::Init {
            name,
            email,
            no_passphrase,
        } => {
            init_wallet(&store, &config, name, email, no_passphrase)?;
        }
        Commands::Id => {
            println!("{}", store.load_pubkey()?);
        }
        Commands::Import { pubkey } => {
            import_pubkeys(&store, &pubkey)?;
        }
        Commands::Encrypt { input, output, to } => {
            encrypt_file(&store, &config, &input, output.as_deref(), to.as_deref()).await?;
        }
        Commands::Decrypt { input, output } => {
            decrypt_file(&store, &config, &input, output.as_deref()).await?;
        }
        Commands::Sign { input } => {
            sign_file(&store, &input)?;
        }
        Commands::Verify {
            input,
            signature,
            from,
        } => {
            verify_file(&store, &input, &signature, &from)?;
        }
    }

    Ok(())
}

/// Create or update the wallet
fn init_wallet(
    store: &Keystore,
    config: &Config,
    name: Option<String>,
    email: Option<String>,
    no_passphrase: bool,
) -> anyhow::Result<()> {
    let existing = if store.has_wallet() {
        eprintln!("Updating wallet at {}", store.wallet_path().display());
        Some(open_wallet(store)?)
    } else {
        None
    };

    let current = existing.as_ref().map(Wallet::identity);
    let name = match name {
        Some(name) => Some(name),
        None => prompt_line("Name", current.and_then(Identity::name))?,
    };
    let email = match email {
        Some(email) => Some(email),
        None => prompt_line("Email", current.and_then(Identity::email))?,
    };

    let wallet = match existing {
        Some(wallet) => {
            let identity = Identity::new(
                *wallet.identity().encrypt_pk(),
                *wallet.identity().verify_pk(),
                name.as_deref(),
                email.as_deref(),
            );
            wallet.with_identity(identity)?
        }
        None => Wallet::generate(name.as_deref(), email.as_deref()),
    };

    let passphrase = if no_passphrase {
        None
    } else {
        prompt_new_passphrase()?
    };
    if passphrase.is_none() {
        tracing::warn!("wallet stored without a passphrase");
    }

    store.save_wallet(
        &wallet,
        passphrase.as_ref().map(|p| p.as_bytes()),
        config.wallet.kdf,
    )?;

    eprintln!(
        "{} Wallet saved to {}",
        style("✓").green(),
        store.wallet_path().display()
    );
    eprintln!("Fingerprint: {}", wallet.identity().fingerprint());
    println!("{}", wallet.identity());

    Ok(())
}

/// Import one pubkey line, or every line of a file
fn import_pubkeys(store: &Keystore, pubkey: &str) -> anyhow::Result<()> {
    let path = Path::new(pubkey);
    let lines: Vec<String> = if !pubkey.trim_start().starts_with(salty_core::identity::ID_TAG)
        && path.is_file()
    {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![pubkey.to_string()]
    };

    if lines.is_empty() {
        bail!("No pubkey found in {pubkey}");
    }

    for line in lines {
        let identity = Identity::parse(&line).context("Invalid pubkey")?;
        match store.import(&identity)? {
            ImportOutcome::Added => eprintln!(
                "{} Imported {} ({})",
                style("✓").green(),
                identity.nice_string(),
                identity.fingerprint()
            ),
            ImportOutcome::AlreadyKnown => eprintln!(
                "Already imported: {} ({})",
                identity.nice_string(),
                identity.fingerprint()
            ),
        }
    }

    Ok(())
}

/// Encrypt `input` to a recipient
async fn encrypt_file(
    store: &Keystore,
    config: &Config,
    input: &str,
    output: Option<&Path>,
    to: Option<&str>,
) -> anyhow::Result<()> {
    let recipient = to.map(|spec| store.resolve(spec)).transpose()?;
    let wallet = open_wallet(store)?;

    let (source, total_size): (Box<dyn AsyncRead + Unpin + Send>, u64) = if input == STDIN_MARKER {
        let (spool, size) = spool_stdin().await?;
        (Box::new(spool), size)
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open {input}"))?;
        let size = file.metadata().await?.len();
        (Box::new(file), size)
    };

    tracing::info!(
        input,
        size = total_size,
        to = to.unwrap_or("self"),
        "encrypting"
    );

    let progress = ByteProgress::new(total_size, "Encrypting", input, output.is_some());
    let mut source = BufReader::new(progress.wrap_reader(source));
    let mut sink = Sink::open(output)?;

    let summary = match envelope::encrypt(
        &config.envelope(),
        &wallet,
        recipient.as_ref(),
        total_size,
        &mut source,
        sink.writer(),
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            progress.abandon();
            return Err(e).context("Encryption failed");
        }
    };
    sink.commit().await?;

    progress.finish_with_message(format!(
        "Encrypted {} for {} in {}",
        format_bytes(total_size),
        summary.recipient.nice_string(),
        format_duration(progress.elapsed())
    ));
    tracing::debug!(
        frames = summary.frames,
        bytes_written = summary.bytes_written,
        "encrypt complete"
    );

    Ok(())
}

/// Decrypt `input` with the local wallet
async fn decrypt_file(
    store: &Keystore,
    config: &Config,
    input: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let wallet = open_wallet(store)?;

    let (source, total_size): (Box<dyn AsyncRead + Unpin + Send>, u64) = if input == STDIN_MARKER {
        (Box::new(tokio::io::stdin()), 0)
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open {input}"))?;
        let size = file.metadata().await?.len();
        (Box::new(file), size)
    };

    let progress = ByteProgress::new(
        total_size,
        "Decrypting",
        input,
        output.is_some() && input != STDIN_MARKER,
    );
    let mut source = progress.wrap_reader(source);
    let mut sink = Sink::open(output)?;

    let summary = match envelope::decrypt(&config.envelope(), &wallet, &mut source, sink.writer())
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            progress.abandon();
            return Err(e).context("Decryption failed");
        }
    };
    sink.commit().await?;

    progress.finish_with_message(format!(
        "Decrypted {} in {}",
        format_bytes(summary.plaintext_len),
        format_duration(progress.elapsed())
    ));

    if summary.signed {
        eprintln!(
            "{} Signed by {} ({})",
            style("✓").green(),
            summary.sender.nice_string(),
            summary.sender.fingerprint()
        );
    } else {
        eprintln!(
            "{} Unsigned envelope claiming to be from {}",
            style("!").yellow(),
            summary.sender.nice_string()
        );
    }

    Ok(())
}

/// Print a base64url detached signature of `input`
fn sign_file(store: &Keystore, input: &Path) -> anyhow::Result<()> {
    let wallet = open_wallet(store)?;
    let message =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let signature = wallet.sign_detached(&message);
    println!("{}", URL_SAFE_NO_PAD.encode(signature.as_bytes()));

    Ok(())
}

/// Check a detached signature of `input` against a signer
fn verify_file(store: &Keystore, input: &Path, signature: &str, from: &str) -> anyhow::Result<()> {
    let signer = store.resolve(from)?;
    let message =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let encoded = if Path::new(signature).is_file() {
        std::fs::read_to_string(signature)
            .with_context(|| format!("Failed to read {signature}"))?
    } else {
        signature.to_string()
    };
    let raw = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .context("Signature is not base64url")?;
    let signature = Signature::from_slice(&raw).context("Signature must be 64 bytes")?;

    if signer.verify_detached(&message, &signature).is_err() {
        bail!("BAD signature for {} from {}", input.display(), signer.nice_string());
    }

    eprintln!(
        "{} Good signature from {} ({})",
        style("✓").green(),
        signer.nice_string(),
        signer.fingerprint()
    );
    Ok(())
}

/// Load the wallet, prompting for its passphrase when it is encrypted
fn open_wallet(store: &Keystore) -> anyhow::Result<Wallet> {
    if !store.has_wallet() {
        return store.load_wallet(None);
    }

    let passphrase = if store.wallet_is_encrypted()? {
        Some(Zeroizing::new(
            rpassword::prompt_password("Wallet passphrase: ")
                .context("Failed to read passphrase")?,
        ))
    } else {
        None
    };

    store.load_wallet(passphrase.as_ref().map(|p| p.as_bytes()))
}

/// Prompt for a new passphrase twice; empty means none
fn prompt_new_passphrase() -> anyhow::Result<Option<Zeroizing<String>>> {
    let first = Zeroizing::new(
        rpassword::prompt_password("New passphrase (empty for none): ")
            .context("Failed to read passphrase")?,
    );
    if first.is_empty() {
        return Ok(None);
    }

    let confirm = Zeroizing::new(
        rpassword::prompt_password("Confirm passphrase: ").context("Failed to read passphrase")?,
    );
    if *first != *confirm {
        bail!("Passphrases do not match");
    }

    Ok(Some(first))
}

/// Ask for a line on the terminal, keeping `current` when the answer is empty.
///
/// Without a terminal the current value is kept.
fn prompt_line(label: &str, current: Option<&str>) -> anyhow::Result<Option<String>> {
    let term = console::Term::stderr();
    if !term.is_term() {
        return Ok(current.map(str::to_string));
    }

    match current {
        Some(value) => term.write_str(&format!("{label} [{value}]: "))?,
        None => term.write_str(&format!("{label}: "))?,
    }
    let answer = term.read_line().context("Failed to read input")?;
    let answer = answer.trim();

    Ok(if answer.is_empty() {
        current.map(str::to_string)
    } else {
        Some(answer.to_string())
    })
}

/// Copy stdin into an anonymous temp file so its size is known up front
async fn spool_stdin() -> anyhow::Result<(tokio::fs::File, u64)> {
    let spool = tempfile::tempfile().context("Failed to create spool file")?;
    let mut spool = tokio::fs::File::from_std(spool);

    let size = tokio::io::copy(&mut tokio::io::stdin(), &mut spool)
        .await
        .context("Failed to read stdin")?;
    spool.flush().await?;
    spool.seek(std::io::SeekFrom::Start(0)).await?;

    tracing::debug!(size, "spooled stdin");
    Ok((spool, size))
}

/// Output destination. Files are written to a temp file beside the target
/// and renamed into place only after the operation succeeds.
struct Sink {
    writer: BufWriter<Box<dyn AsyncWrite + Unpin + Send>>,
    pending: Option<(NamedTempFile, PathBuf)>,
}

impl Sink {
    fn open(output: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = output else {
            return Ok(Self {
                writer: BufWriter::new(Box::new(tokio::io::stdout())),
                pending: None,
            });
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        let file = tokio::fs::File::from_std(tmp.as_file().try_clone()?);

        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
            pending: Some((tmp, path.to_path_buf())),
        })
    }

    fn writer(&mut self) -> &mut BufWriter<Box<dyn AsyncWrite + Unpin + Send>> {
        &mut self.writer
    }

    async fn commit(mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;

        if let Some((tmp, path)) = self.pending.take() {
            tmp.persist(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }
}
