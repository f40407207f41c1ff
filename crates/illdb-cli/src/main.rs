use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use illdb_core::{BrowserCommand, BrowserConfig, ConnectionOverrides, Profile, ProfileFile};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod commands;

/// Profile file picked up from the working directory when `--config` is absent.
const DEFAULT_PROFILE_FILE: &str = "illdb.toml";

/// Profile used when the file exists but `--profile` is not given.
const DEFAULT_PROFILE: &str = "default";

const DEFAULT_LOG_DIRECTIVE: &str = "illdb=info";

#[derive(Parser)]
#[command(
    name = "illdb-browser",
    about = "Read and rewrite documents in a sharded illdb deployment",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Profile file with one [profiles.<name>] table per server
    #[arg(long, env = "ILLDB_CONFIG", global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Profile to take connection settings from
    #[arg(long, global = true, value_name = "NAME")]
    profile: Option<String>,
    /// Management server host
    #[arg(long, global = true)]
    host: Option<String>,
    /// Management server port (default 3306)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Management database name
    #[arg(long, global = true)]
    bucket: Option<String>,
    #[arg(short = 'u', long, global = true)]
    username: Option<String>,
    #[arg(short = 'p', long, global = true)]
    password: Option<String>,
    /// Connect timeout in seconds (default 20)
    #[arg(long = "connect-timeout", global = true, value_name = "SECS")]
    connect_timeout: Option<u64>,
    /// Serve reads from nodes that are not active
    #[arg(long, global = true)]
    allow_inactive_reads: bool,
    /// Log every SQL statement at info level
    #[arg(long, global = true)]
    show_sql: bool,
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a document's payload
    Get { docid: String },
    /// Replace a document's payload (size-corrected, compressed like the stored row)
    Set { docid: String, document: String },
    /// Show where a document lives without touching its node
    Route { docid: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl From<Commands> for BrowserCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get { docid } => BrowserCommand::Get { docid },
            Commands::Set { docid, document } => BrowserCommand::Set { docid, document },
            Commands::Route { docid } => BrowserCommand::Route { docid },
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            bucket: self.bucket.clone(),
            connect_timeout_secs: self.connect_timeout,
            allow_inactive_reads: self.allow_inactive_reads,
            show_sql: self.show_sql,
        }
    }

    fn profile_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let local = PathBuf::from(DEFAULT_PROFILE_FILE);
            local.is_file().then_some(local)
        })
    }

    fn browser_config(&self) -> anyhow::Result<BrowserConfig> {
        let file = self
            .profile_path()
            .map(|path| {
                ProfileFile::from_file(&path)
                    .with_context(|| format!("cannot read profile file {}", path.display()))
            })
            .transpose()?;
        let profile = select_profile(file.as_ref(), self.profile.as_deref())?;
        Ok(BrowserConfig::resolve(profile, self.overrides())?)
    }
}

fn select_profile<'a>(
    file: Option<&'a ProfileFile>,
    name: Option<&str>,
) -> anyhow::Result<Option<&'a Profile>> {
    match (file, name) {
        (Some(file), Some(name)) => Ok(Some(file.profile(name)?)),
        (None, Some(name)) => anyhow::bail!("profile {name:?} requested but no profile file found"),
        (Some(file), None) => Ok(file.profiles.get(DEFAULT_PROFILE)),
        (None, None) => Ok(None),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.browser_config()?;
    debug!(?config, "configuration resolved");
    commands::execute(&config, &BrowserCommand::from(cli.command))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use illdb_core::InactiveReadPolicy;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("illdb-browser").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_get_with_connection_flags() {
        let cli = parse(&[
            "--host", "mgmt", "--bucket", "janus", "-u", "root", "-p", "pw", "get", "*:account:abc123",
        ]);
        assert_eq!(cli.host.as_deref(), Some("mgmt"));
        assert_eq!(cli.username.as_deref(), Some("root"));
        assert_eq!(cli.password.as_deref(), Some("pw"));
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(
            BrowserCommand::from(cli.command),
            BrowserCommand::Get {
                docid: "*:account:abc123".to_string()
            }
        );
    }

    #[test]
    fn parses_set_with_flags_after_subcommand() {
        let cli = parse(&[
            "set",
            "*:account:abc123",
            "{\"_meta\":{}}",
            "--host",
            "mgmt",
            "--show-sql",
            "--log-format",
            "json",
        ]);
        assert!(cli.show_sql);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(
            BrowserCommand::from(cli.command),
            BrowserCommand::Set { document, .. } if document == "{\"_meta\":{}}"
        ));
    }

    #[test]
    fn set_requires_a_document() {
        assert!(Cli::try_parse_from(["illdb-browser", "set", "*:account:abc123"]).is_err());
    }

    #[test]
    fn flags_override_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("illdb.toml");
        std::fs::write(
            &path,
            r#"
[profiles.staging]
host = "mgmt.staging"
port = 3307
username = "browser"
password = "from-file"
bucket = "janus"
connect_timeout_secs = 5
allow_inactive_reads = true
"#,
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();
        let cli = parse(&[
            "--config", &path, "--profile", "staging", "--host", "mgmt.override", "route", "a:b:c",
        ]);

        let config = cli.browser_config().unwrap();
        assert_eq!(config.host, "mgmt.override");
        assert_eq!(config.port, 3307);
        assert_eq!(config.password.as_deref(), Some("from-file"));
        assert_eq!(config.bucket, "janus");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.inactive_reads, InactiveReadPolicy::Allow);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("illdb.toml");
        std::fs::write(&path, "[profiles.prod]\nhost = \"mgmt\"\n").unwrap();
        let path = path.to_string_lossy().into_owned();
        let cli = parse(&["--config", &path, "--profile", "staging", "get", "a:b:c"]);
        assert!(cli.browser_config().is_err());
    }

    #[test]
    fn default_profile_applies_without_flag() {
        let file: ProfileFile =
            toml::from_str("[profiles.default]\nhost = \"mgmt\"\nbucket = \"janus\"\n").unwrap();
        let profile = select_profile(Some(&file), None).unwrap();
        assert_eq!(profile.and_then(|p| p.host.as_deref()), Some("mgmt"));
        assert!(select_profile(None, Some("prod")).is_err());
        assert!(select_profile(None, None).unwrap().is_none());
    }
}
