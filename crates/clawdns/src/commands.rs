//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use claw_clusterset::{
    ClustersetError, DirectorySnapshot, Node, NodeDirectory, Resolution, ResolverState,
};
use claw_headscale::HeadscaleClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

const READINESS_POLL: Duration = Duration::from_millis(250);

fn build_directory(config: &AppConfig) -> anyhow::Result<Arc<NodeDirectory<HeadscaleClient>>> {
    let client = config
        .headscale
        .build_client()
        .context("failed to create Headscale client")?;
    Ok(Arc::new(NodeDirectory::new(client, config.directory.clone())))
}

/// Keeps the directory refreshed until Ctrl-C. With `stdin`, answers one
/// query name per input line.
pub async fn run(config: AppConfig, stdin: bool) -> anyhow::Result<()> {
    let directory = build_directory(&config)?;
    let resolver = directory.resolver(&config.resolver);
    let cancel = CancellationToken::new();
    let task = directory.spawn_refresh_task(cancel.clone());

    info!(
        url = %config.headscale.url,
        refresh_interval_secs = config.directory.refresh_interval_secs,
        ttl_secs = config.resolver.ttl_secs,
        "clawdns running"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut readiness = tokio::time::interval(READINESS_POLL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ready = false;
    let mut reading = stdin;

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("Shutdown requested");
                break;
            }
            _ = readiness.tick(), if !ready => {
                if resolver.state() == ResolverState::Ready {
                    ready = true;
                    let nodes = directory.current().map(|s| s.len()).unwrap_or_default();
                    info!(nodes, "Directory ready, answering queries");
                }
            }
            line = lines.next_line(), if reading => {
                match line.context("failed to read stdin")? {
                    Some(name) if name.trim().is_empty() => {}
                    Some(name) => {
                        let name = name.trim();
                        for out in format_resolution(name, &resolver.resolve(name)) {
                            println!("{out}");
                        }
                    }
                    None => reading = false,
                }
            }
        }
    }

    cancel.cancel();
    task.shutdown().await;

    let stats = directory.stats();
    info!(
        attempts = stats.attempts,
        successes = stats.successes,
        failures = stats.failures,
        "clawdns stopped"
    );
    Ok(())
}

/// Refreshes once and resolves each name.
pub async fn resolve(config: AppConfig, names: &[String]) -> anyhow::Result<()> {
    let directory = build_directory(&config)?;
    directory
        .refresh(&CancellationToken::new())
        .await
        .context("failed to load the node directory")?;

    let resolver = directory.resolver(&config.resolver);
    for name in names {
        for line in format_resolution(name, &resolver.resolve(name)) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Refreshes once and prints the snapshot.
pub async fn nodes(config: AppConfig) -> anyhow::Result<()> {
    let directory = build_directory(&config)?;
    let snapshot = directory
        .refresh(&CancellationToken::new())
        .await
        .context("failed to load the node directory")?;

    for line in format_snapshot(&snapshot) {
        println!("{line}");
    }
    Ok(())
}

/// Calls the Headscale health endpoint.
pub async fn health(config: AppConfig) -> anyhow::Result<()> {
    let client = config
        .headscale
        .build_client()
        .context("failed to create Headscale client")?;
    let health = client.health().await.context("health check failed")?;

    if health.database_connectivity {
        println!("{}: healthy", client.base_url());
        Ok(())
    } else {
        warn!(url = %client.base_url(), "Headscale reports no database connectivity");
        bail!("{}: database unreachable", client.base_url())
    }
}

/// Writes a sample config file.
pub fn init_config(output: &Path, url: &str, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!(
            "'{}' already exists, pass --force to overwrite",
            output.display()
        );
    }

    AppConfig::sample(url).save(output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Export your Headscale API key, then run:");
    println!("  HEADSCALE_API_KEY=... clawdns --config {} run", output.display());
    Ok(())
}

/// Presentation-form lines for one query.
pub fn format_resolution(name: &str, result: &claw_clusterset::Result<Resolution>) -> Vec<String> {
    match result {
        Ok(Resolution::NotAuthoritative) => vec![format!("; {name}: not authoritative")],
        Ok(resolution) if !resolution.has_records() => vec![format!("; {name}: no instances")],
        Ok(resolution) => resolution.records().iter().map(ToString::to_string).collect(),
        Err(ClustersetError::DirectoryNotReady) => vec![format!("; {name}: directory not ready")],
        Err(err) => vec![format!("; {name}: {err}")],
    }
}

/// One line per node: id, name, state and addresses.
pub fn format_snapshot(snapshot: &DirectorySnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "; version {} fetched {} ({} nodes, {} online)",
        snapshot.version(),
        snapshot.fetched_at().to_rfc3339(),
        snapshot.len(),
        snapshot.online_count()
    )];
    lines.extend(snapshot.iter().map(format_node));
    lines
}

fn format_node(node: &Node) -> String {
    let addresses: Vec<&str> = node.addresses.iter().map(|a| a.as_str()).collect();
    let mut line = format!(
        "{}\t{}\t{}\t{}",
        node.id,
        node.name,
        if node.online { "online" } else { "offline" },
        addresses.join(",")
    );
    if !node.tags.is_empty() {
        let tags: Vec<String> = node
            .tags
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
            .collect();
        line.push('\t');
        line.push_str(&tags.join(","));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_clusterset::AddressRecord;

    const NAME: &str = "web.default.svc.clusterset.local";

    #[test]
    fn test_format_records() {
        let resolution = Resolution::Authoritative {
            records: vec![
                AddressRecord::new(NAME, "10.0.0.1".parse().expect("ip"), 30),
                AddressRecord::new(NAME, "fd11::1".parse().expect("ip"), 30),
            ],
        };

        let lines = format_resolution(NAME, &Ok(resolution));

        assert_eq!(
            lines,
            vec![
                "web.default.svc.clusterset.local. 30 IN A 10.0.0.1",
                "web.default.svc.clusterset.local. 30 IN AAAA fd11::1",
            ]
        );
    }

    #[test]
    fn test_format_negative_answers() {
        assert_eq!(
            format_resolution("example.com", &Ok(Resolution::NotAuthoritative)),
            vec!["; example.com: not authoritative"]
        );
        assert_eq!(
            format_resolution(NAME, &Ok(Resolution::Authoritative { records: vec![] })),
            vec![format!("; {NAME}: no instances")]
        );
        assert_eq!(
            format_resolution(NAME, &Err(ClustersetError::DirectoryNotReady)),
            vec![format!("; {NAME}: directory not ready")]
        );
    }

    #[test]
    fn test_format_snapshot() {
        let now = chrono::Utc::now();
        let snapshot = DirectorySnapshot::new(
            3,
            now,
            now,
            vec![
                Node::builder("node1", "web-service.default")
                    .address("10.0.0.1")
                    .address("fd11::1")
                    .tag("service", "web")
                    .build(),
                Node::builder("node3", "database-service.default")
                    .address("10.0.0.3")
                    .online(false)
                    .build(),
            ],
        );

        let lines = format_snapshot(&snapshot);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("; version 3 fetched "));
        assert!(lines[0].ends_with("(2 nodes, 1 online)"));
        assert_eq!(
            lines[1],
            "node1\tweb-service.default\tonline\t10.0.0.1,fd11::1\tservice=web"
        );
        assert_eq!(lines[2], "node3\tdatabase-service.default\toffline\t10.0.0.3");
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clawdns.toml");

        init_config(&path, "http://hs:8080", false).expect("first write");
        assert!(init_config(&path, "http://hs:8080", false).is_err());
        init_config(&path, "http://other:8080", true).expect("forced");

        let config = AppConfig::from_file(&path).expect("load");
        assert_eq!(config.headscale.url, "http://other:8080");
    }
}
