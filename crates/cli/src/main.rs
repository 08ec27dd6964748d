use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "clinic-relay")]
#[command(about = "WhatsApp webhook relay backed by a hosted completion API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway (health, webhook verify/receive, diagnostic send routes).
    Gateway {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.clinic-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Generate a webhook verify token, store it in an env file and print it with its SHA-256 hash.
    Token {
        /// Env file to update (WEBHOOK_VERIFY_TOKEN line is replaced or appended)
        #[arg(long, value_name = "PATH", default_value = ".env")]
        env_file: PathBuf,

        /// Random bytes per token
        #[arg(long, default_value_t = relay::token::DEFAULT_TOKEN_BYTES)]
        bytes: usize,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("clinic-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            let loaded = relay::config::load_config(config);
            match &loaded {
                Ok((c, _)) => init_logging(
                    c.environment.default_log_filter(),
                    c.logging.file.as_deref(),
                ),
                Err(_) => init_logging("info", None),
            }
            let result = match loaded {
                Ok((c, path)) => run_gateway(c, &path, port).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Token { env_file, bytes }) => {
            init_logging("warn", None);
            if let Err(e) = run_token(&env_file, bytes) {
                log::error!("token generation failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Writes every record to stderr and to an append-only log file.
struct Tee {
    file: std::fs::File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = std::io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = std::io::stderr().flush();
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// RUST_LOG overrides `default_filter`. When `file` is set (and can be opened) records are
/// also appended there.
fn init_logging(default_filter: &str, file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    let mut file_error = None;
    if let Some(path) = file {
        match open_log_file(path) {
            Ok(f) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file: f })));
            }
            Err(e) => file_error = Some((path.to_path_buf(), e)),
        }
    }
    builder.init();
    if let Some((path, e)) = file_error {
        log::warn!("log file {} unavailable, logging to stderr only: {}", path.display(), e);
    }
}

async fn run_gateway(
    mut config: relay::config::Config,
    path: &Path,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {}, environment {:?})",
        config.gateway.bind,
        config.gateway.port,
        path.display(),
        config.environment
    );
    relay::gateway::run_gateway(config).await
}

fn run_token(env_file: &Path, bytes: usize) -> anyhow::Result<()> {
    let generated = relay::token::generate_verify_token(bytes)?;
    relay::token::save_token_to_env(env_file, &generated.token)?;
    println!("webhook verify token (configure this in the WhatsApp Business app):");
    println!("{}", generated.token);
    println!("sha256: {}", generated.hash);
    println!("saved to {}", env_file.display());
    Ok(())
}
