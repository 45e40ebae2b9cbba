//! Purpose: `recaf-mcp` CLI entry point.
//! Role: Binary crate root; selects the process role (bridge or relay) and runs it.
//! Invariants: The relay never writes diagnostics to stdout.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
use std::io::{self, IsTerminal};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tokio::time::Duration;

use recaf_mcp::bridge::server::{self, BridgeConfig, DEFAULT_PORT};
use recaf_mcp::core::error::{Error, ErrorKind, to_exit_code};
use recaf_mcp::engine::Services;
use recaf_mcp::relay::{self, RelayConfig};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

#[derive(Parser)]
#[command(
    name = "recaf-mcp",
    version,
    about = "MCP adapter for a Java reverse-engineering workbench",
    long_about = None,
    after_help = r#"EXAMPLES
  $ recaf-mcp bridge                       # HTTP bridge on 127.0.0.1:9847
  $ recaf-mcp relay                        # MCP over stdio, forwarding to the bridge
  $ recaf-mcp relay --bridge-port 9900 --skip-health-check"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the loopback HTTP bridge over the bundled engine")]
    Bridge(BridgeArgs),
    #[command(about = "Run the MCP stdio relay that forwards tool calls to the bridge")]
    Relay(RelayArgs),
}

#[derive(Args)]
struct BridgeArgs {
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), help = "Loopback address to bind")]
    bind: IpAddr,
    #[arg(long, default_value_t = DEFAULT_PORT, help = "Port to listen on")]
    port: u16,
    #[arg(
        long,
        default_value_t = 30_000,
        help = "Upper bound for a single decompilation, in milliseconds"
    )]
    decompile_timeout_ms: u64,
}

#[derive(Args)]
struct RelayArgs {
    #[arg(long, default_value = relay::client::DEFAULT_HOST, help = "Bridge host")]
    bridge_host: String,
    #[arg(long, default_value_t = DEFAULT_PORT, help = "Bridge port")]
    bridge_port: u16,
    #[arg(long, help = "Start without probing the bridge's /health endpoint")]
    skip_health_check: bool,
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `recaf-mcp --help`."));
            }
        },
    };

    match cli.command {
        Command::Bridge(args) => {
            let config = BridgeConfig {
                bind: SocketAddr::new(args.bind, args.port),
                decompile_timeout: Duration::from_millis(args.decompile_timeout_ms),
                ..BridgeConfig::default()
            };
            server::validate_config(&config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(server::serve(config, Services::bundled()))?;
            Ok(RunOutcome::ok())
        }
        Command::Relay(args) => {
            let config = RelayConfig {
                bridge_host: args.bridge_host,
                bridge_port: args.bridge_port,
                skip_health_check: args.skip_health_check,
            };
            relay::run(&config)?;
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", err.describe());
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.describe()));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
