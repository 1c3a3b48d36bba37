// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubewire Control CLI
//!
//! Manage config maps and issue raw GETs against the API server.
//!
//! Usage:
//!   kubewire-ctl [--endpoint <url>] [-n <namespace>] [--protobuf] <command>
//!
//! Commands:
//!   get <name>                       Print one config map
//!   list [--selector <expr>] [--all-namespaces]
//!   watch [--resource-version <rv>] [--max-events <n>]
//!   create <name> [--data key=value]...
//!   delete <name>
//!   raw <path>                       GET an API path, e.g. /version

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kubewire_client::{
    Client, ClientConfig, Codec, ConfigMap, LabelSelector, ObjectMeta, RequestOptions,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kubewire-ctl", version, about = "Kubewire control CLI")]
struct Cli {
    /// API server URL (overrides KUBEWIRE_ENDPOINT)
    #[arg(long, global = true, env = "KUBEWIRE_ENDPOINT")]
    endpoint: Option<String>,

    /// Namespace (overrides KUBEWIRE_NAMESPACE)
    #[arg(short = 'n', long = "namespace", global = true)]
    namespace: Option<String>,

    /// Use the protobuf envelope encoding instead of JSON
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    protobuf: bool,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print one config map
    Get { name: String },
    /// List config maps
    List {
        /// Label requirements, e.g. "app=web" or "tier" (repeatable)
        #[arg(short = 'l', long = "selector")]
        selector: Vec<String>,
        /// List across every namespace
        #[arg(short = 'A', long = "all-namespaces", action = ArgAction::SetTrue)]
        all_namespaces: bool,
    },
    /// Watch config maps and print each event
    Watch {
        /// Start from this resource version
        #[arg(long = "resource-version")]
        resource_version: Option<String>,
        /// Stop after this many events
        #[arg(long = "max-events")]
        max_events: Option<usize>,
    },
    /// Create a config map
    Create {
        name: String,
        /// Data entries as key=value (repeatable)
        #[arg(long = "data")]
        data: Vec<String>,
    },
    /// Delete a config map
    Delete { name: String },
    /// GET an arbitrary API path
    Raw { path: String },
}

fn init_tracing() {
    let env = std::env::var("KUBEWIRE_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Turn `key=value` into an equality requirement and a bare `key` into existence.
fn parse_selector(parts: &[String]) -> LabelSelector {
    parts
        .iter()
        .fold(LabelSelector::new(), |selector, part| match part.split_once('=') {
            Some((key, value)) => selector.eq(key, value),
            None => match part.strip_prefix('!') {
                Some(key) => selector.not_exists(key),
                None => selector.exists(part.as_str()),
            },
        })
}

fn age(meta: &ObjectMeta) -> String {
    let Some(created) = meta.creation_timestamp.and_then(|t| t.to_datetime()) else {
        return "<unknown>".to_string();
    };
    let elapsed = Utc::now().signed_duration_since(created);
    match elapsed.num_seconds() {
        s if s < 120 => format!("{}s", s.max(0)),
        s if s < 7200 => format!("{}m", s / 60),
        s if s < 172_800 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

fn print_config_map(cm: &ConfigMap, output: Output) -> Result<()> {
    match output {
        Output::Human => println!(
            "{:<20} {:<40} {:<6} {}",
            cm.metadata.namespace,
            cm.metadata.name,
            cm.data.len(),
            age(&cm.metadata)
        ),
        Output::Json => println!("{}", serde_json::to_string(cm)?),
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("invalid environment configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace);
    }
    if cli.protobuf {
        config = config.with_content_type(Codec::Protobuf);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let client = Client::new(build_config(&cli)?)?;
    info!(endpoint = %client.config().endpoint, "kubewire-ctl invoked");

    match cli.command {
        Commands::Get { name } => {
            let cm: ConfigMap = client
                .get(None, &name, &RequestOptions::default())
                .await?;
            print_config_map(&cm, cli.output)?;
        }
        Commands::List {
            selector,
            all_namespaces,
        } => {
            let mut options = RequestOptions::new();
            if !selector.is_empty() {
                options = options.with_label_selector(parse_selector(&selector));
            }
            let list = if all_namespaces {
                client.list_all::<ConfigMap>(&options).await?
            } else {
                client.list::<ConfigMap>(None, &options).await?
            };
            for item in list.into_typed::<ConfigMap>()? {
                print_config_map(&item, cli.output)?;
            }
        }
        Commands::Watch {
            resource_version,
            max_events,
        } => {
            let mut options = RequestOptions::new();
            if let Some(rv) = resource_version {
                options = options.with_resource_version(rv);
            }
            let watcher = client.watch::<ConfigMap>(None, &options).await?;
            let mut seen = 0;
            while max_events.is_none_or(|max| seen < max) {
                let event = watcher.next().await?;
                seen += 1;
                match cli.output {
                    Output::Human => println!(
                        "{:<9} {}/{} rv={}",
                        event.event_type,
                        event.object.metadata.namespace,
                        event.object.metadata.name,
                        event.object.metadata.resource_version
                    ),
                    Output::Json => println!(
                        "{}",
                        serde_json::json!({
                            "type": event.event_type.as_str(),
                            "object": event.object,
                        })
                    ),
                }
            }
            watcher.close();
        }
        Commands::Create { name, data } => {
            let mut cm = ConfigMap::new(client.config().default_namespace(), name);
            for entry in &data {
                let Some((key, value)) = entry.split_once('=') else {
                    bail!("invalid --data entry {entry:?}, expected key=value");
                };
                cm = cm.with_data(key, value);
            }
            let created = client.create(&cm).await?;
            print_config_map(&created, cli.output)?;
        }
        Commands::Delete { name } => {
            client.delete_named::<ConfigMap>(None, &name).await?;
            println!("configmap {name:?} deleted");
        }
        Commands::Raw { path } => {
            let body = client.raw_get(&path).await?;
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}
