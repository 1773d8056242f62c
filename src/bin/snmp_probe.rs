//! snmp-probe: command-line tool for ad-hoc SNMP GET/walk/SET operations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snmp_client::ber::tag;
use snmp_client::{handle, oid::Oid, util, value::Value, SessionConfig, SessionEvent, SnmpVersion};

#[derive(Parser)]
#[command(name = "snmp-probe", about = "Ad-hoc SNMP GET/walk/SET from the command line")]
struct Cli {
    /// Agent address, e.g. 192.0.2.1:161
    #[arg(short, long)]
    agent: String,

    /// Read (or write, for `set`) community string
    #[arg(short, long, default_value = "public")]
    community: String,

    /// SNMP protocol version
    #[arg(long, value_enum, default_value = "v2c")]
    version: CliVersion,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Enable debug output
    #[arg(short = 'D', long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum CliVersion {
    V1,
    V2c,
}

#[derive(Subcommand)]
enum Commands {
    /// GET one or more OIDs
    Get {
        /// Dotted OIDs, e.g. .1.3.6.1.2.1.1.5.0
        oids: Vec<String>,
    },
    /// Walk every OID under a subtree root via repeated GET-NEXT
    Walk {
        /// Subtree root OID
        base: String,
    },
    /// SET a single OID to an integer or string value
    Set {
        oid: String,
        #[arg(value_enum)]
        kind: SetKind,
        value: String,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum SetKind {
    Int,
    Str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(filter.parse()?))
        .init();

    let mut config = SessionConfig::new(
        cli.agent.parse().with_context(|| format!("invalid agent address {:?}", cli.agent))?,
        cli.community.clone(),
    );
    config.version = match cli.version {
        CliVersion::V1 => SnmpVersion::V1,
        CliVersion::V2c => SnmpVersion::V2c,
    };
    config.response_timeout = std::time::Duration::from_millis(cli.timeout_ms);

    let client = handle::SnmpHandle::connect(config).await?;
    let mut events = client.events();

    let job_id = match cli.command {
        Commands::Get { oids } => {
            let oids = oids
                .iter()
                .map(|text| text.parse::<Oid>())
                .collect::<Result<Vec<_>, _>>()
                .context("invalid OID")?;
            client.request_values(oids)
        }
        Commands::Walk { base } => {
            let base: Oid = base.parse().context("invalid OID")?;
            client.request_sub_values(base)
        }
        Commands::Set { oid, kind, value } => {
            let oid: Oid = oid.parse().context("invalid OID")?;
            let value = match kind {
                SetKind::Int => Value::integer(value.parse().context("value is not a valid integer")?),
                SetKind::Str => Value::string(value.into_bytes()),
            };
            client.set_value(cli.community, oid, value)
        }
    };

    loop {
        match events.recv().await {
            Ok(SessionEvent::ResponseReceived { job_id: id, values }) if id == job_id => {
                for binding in values {
                    println!("{} = {}", binding.oid, format_value(&binding.value));
                }
                break;
            }
            Ok(SessionEvent::RequestFailed { job_id: id }) if id == job_id => {
                eprintln!("request failed");
                std::process::exit(1);
            }
            Ok(_) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn format_value(value: &Value) -> String {
    if value.tag() == tag::TIME_TICKS {
        if let Some(ticks) = value.as_i64() {
            return util::format_uptime(ticks);
        }
    }
    if let Some(text) = value.as_text() {
        text
    } else if let Some(n) = value.as_i64() {
        n.to_string()
    } else {
        format!("{:?}", value.encode())
    }
}
