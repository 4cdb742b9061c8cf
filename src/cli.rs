//! CLI argument parsing and command dispatch.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::Engine;
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use rand::RngCore;

use crate::api::{self, AppState};
use crate::config::{Config, ConfigError};
use crate::runner;
use crate::service::{AgentVaultService, ProviderStatus, Reachability, SecretState};
use crate::util::is_loopback_host;

pub const DEFAULT_DASHBOARD_HOST: &str = "127.0.0.1";
pub const DEFAULT_DASHBOARD_PORT: u16 = 8765;

/// Local-first secrets manager for agent runtimes
#[derive(Parser, Debug)]
#[command(name = "agent-vault")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  agent-vault init                                Create the default manifest
  agent-vault set-key openai_pro                  Store a provider secret
  agent-vault doctor                              Check secrets and endpoints
  agent-vault run \"python agent.py\"               Run with the top-ranked provider
  agent-vault run --provider openrouter \"make\"    Run with a specific provider
  agent-vault dashboard --open-browser            Open the local dashboard
")]
pub struct Cli {
    /// Manifest path (overrides AGENT_VAULT_MANIFEST)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Secret-store service namespace (overrides AGENT_VAULT_SERVICE)
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Secret-store backend (overrides AGENT_VAULT_BACKEND)
    #[arg(long, global = true, value_parser = ["keyring", "file"])]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the manifest if it does not exist
    Init,

    /// Store or rotate a provider secret (read from stdin)
    SetKey {
        provider: String,
    },

    /// Remove a provider secret
    DeleteKey {
        provider: String,
    },

    /// Show every provider with secret and endpoint status
    List,

    /// Check one provider's secret and endpoint
    Test {
        provider: String,
    },

    /// Report missing secrets and unreachable endpoints
    Doctor,

    /// Run a command with the selected provider's secret in its environment
    Run {
        /// Command line to execute (shell-quoted)
        command: String,

        /// Provider to use instead of the top-ranked one
        #[arg(long)]
        provider: Option<String>,
    },

    /// Serve the local dashboard and HTTP API
    Dashboard {
        /// Bind host (loopback only)
        #[arg(long, default_value = DEFAULT_DASHBOARD_HOST)]
        host: String,

        /// Bind port
        #[arg(long, default_value_t = DEFAULT_DASHBOARD_PORT)]
        port: u16,

        /// Open the dashboard in the default browser
        #[arg(long)]
        open_browser: bool,

        /// Token for mutating API calls (random when omitted)
        #[arg(long)]
        auth_token: Option<String>,
    },
}

impl Cli {
    /// Layer command-line overrides on top of environment configuration.
    pub fn apply_overrides(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(path) = &self.manifest {
            config = config.with_manifest_path(path.clone());
        }
        if let Some(service) = &self.service {
            config.service_name = service.clone();
        }
        if let Some(backend) = &self.backend {
            config.backend = backend.parse()?;
        }
        Ok(config)
    }
}

/// Run one command. Returns the process exit code.
pub async fn execute(command: Commands, config: Config) -> anyhow::Result<i32> {
    let service = AgentVaultService::from_config(&config)?;

    match command {
        Commands::Init => {
            if service.initialize()? {
                println!("Manifest created: {}", service.manifest_path().display());
            } else {
                println!("Manifest already exists: {}", service.manifest_path().display());
            }
            Ok(0)
        }
        Commands::SetKey { provider } => {
            let secret = prompt_secret(&provider)?;
            service.set_provider_secret(&provider, &secret)?;
            println!("Secret stored for {}", provider);
            Ok(0)
        }
        Commands::DeleteKey { provider } => {
            if service.delete_provider_secret(&provider)? {
                println!("Secret deleted for {}", provider);
            } else {
                println!("No secret stored for {}", provider);
            }
            Ok(0)
        }
        Commands::List => {
            let statuses = service.list_provider_statuses().await?;
            print!("{}", format_status_table(&statuses));
            Ok(0)
        }
        Commands::Test { provider } => {
            let result = service.test_provider(&provider).await?;
            if result.ok() {
                println!("{}: ok", result.provider);
                Ok(0)
            } else {
                println!("{}: {}", result.provider, result.failures.join(", "));
                Ok(1)
            }
        }
        Commands::Doctor => {
            let statuses = service.list_provider_statuses().await?;
            let findings = doctor_findings(&statuses);
            if findings.is_empty() {
                println!("doctor checks passed");
                return Ok(0);
            }
            for finding in findings {
                println!("- {}", finding);
            }
            Ok(1)
        }
        Commands::Run { command, provider } => {
            let context = service.build_run_context(provider.as_deref())?;
            let argv = runner::parse_command(&command)?;
            Ok(runner::run_with_env(&argv, &context.injected_env).await?)
        }
        Commands::Dashboard {
            host,
            port,
            open_browser,
            auth_token,
        } => {
            if !is_loopback_host(&host) {
                bail!("Dashboard host must be loopback (127.0.0.1, localhost, ::1)");
            }

            let token = auth_token
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(generate_token);
            let url = dashboard_url(&host, port);

            println!("Dashboard: {}", url);
            println!("Use this token for write API calls (X-Agent-Vault-Token):");
            println!("{}", token);

            if open_browser {
                if let Err(e) = webbrowser::open(&url) {
                    tracing::warn!("Could not open browser: {}", e);
                }
            }

            let state = Arc::new(AppState::new(service, token));
            api::serve(state, &host, port).await?;
            Ok(0)
        }
    }
}

/// Prompt on stderr, then read the secret. A terminal gets no echo; piped
/// input is read as one line.
fn prompt_secret(provider: &str) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "Enter secret for {}: ", provider)?;
    stderr.flush()?;

    if std::io::stdin().is_terminal() {
        read_hidden_secret()
    } else {
        read_secret_line(std::io::stdin().lock())
    }
}

fn read_hidden_secret() -> anyhow::Result<String> {
    terminal::enable_raw_mode().context("Failed to disable terminal echo")?;
    let secret = read_secret_keys(event::read);
    let _ = terminal::disable_raw_mode();
    eprintln!();
    secret
}

fn read_secret_keys(mut next: impl FnMut() -> std::io::Result<Event>) -> anyhow::Result<String> {
    let mut secret = String::new();
    loop {
        match next().context("Failed to read secret from terminal")? {
            Event::Key(key) => match apply_secret_key(&mut secret, key) {
                SecretInput::Continue => {}
                SecretInput::Submit => return Ok(secret),
                SecretInput::Cancel => bail!("Cancelled"),
            },
            Event::Paste(text) => secret.push_str(text.trim_end_matches(['\r', '\n'])),
            _ => {}
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SecretInput {
    Continue,
    Submit,
    Cancel,
}

fn apply_secret_key(secret: &mut String, key: KeyEvent) -> SecretInput {
    if key.kind == KeyEventKind::Release {
        return SecretInput::Continue;
    }
    match key.code {
        KeyCode::Enter => SecretInput::Submit,
        KeyCode::Esc => SecretInput::Cancel,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            SecretInput::Cancel
        }
        KeyCode::Char(c) => {
            secret.push(c);
            SecretInput::Continue
        }
        KeyCode::Backspace => {
            secret.pop();
            SecretInput::Continue
        }
        _ => SecretInput::Continue,
    }
}

fn read_secret_line(mut reader: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read secret from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// 24 random bytes, URL-safe base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn dashboard_url(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("http://[{}]:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

/// One line per missing secret or unreachable endpoint, in status order.
pub fn doctor_findings(statuses: &[ProviderStatus]) -> Vec<String> {
    let mut findings = Vec::new();
    for status in statuses {
        if status.has_secret == SecretState::Absent {
            findings.push(format!("missing key for {}", status.name));
        }
        if status.endpoint_reachable == Reachability::Unreachable {
            findings.push(format!(
                "endpoint unreachable for {}: {}",
                status.name,
                status.endpoint.as_deref().unwrap_or_default()
            ));
        }
    }
    findings
}

fn secret_label(state: SecretState) -> &'static str {
    match state {
        SecretState::Present => "present",
        SecretState::Absent => "missing",
        SecretState::NotApplicable => "-",
    }
}

fn endpoint_label(state: Reachability) -> &'static str {
    match state {
        Reachability::Reachable => "reachable",
        Reachability::Unreachable => "unreachable",
        Reachability::NotApplicable => "-",
    }
}

pub fn format_status_table(statuses: &[ProviderStatus]) -> String {
    if statuses.is_empty() {
        return "No providers configured.\n".to_string();
    }

    let rows: Vec<[String; 5]> = statuses
        .iter()
        .map(|s| {
            [
                s.name.clone(),
                s.provider_type.to_string(),
                s.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                secret_label(s.has_secret).to_string(),
                endpoint_label(s.endpoint_reachable).to_string(),
            ]
        })
        .collect();

    let header = ["PROVIDER", "TYPE", "PRIORITY", "SECRET", "ENDPOINT"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let render = |cells: [&str; 5]| {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i + 1 == cells.len() {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
        line.push('\n');
        line
    };

    let mut out = render(header);
    for row in &rows {
        out.push_str(&render([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
            row[4].as_str(),
        ]));
    }
    out
}
