use std::fs::File;

use anyhow::Context;
use colored::Colorize;
use depot_content::{ContentStore, FileSystemContentStore};
use depot_crypto::ContentHasher;
use depot_engine::CacheConfig;
use depot_server::{DepotServer, ServerConfig};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Estimate(args) => cmd_estimate(args, &cli.format),
        Command::Checksum(args) => cmd_checksum(args, &cli.format),
    }
}

/// Merge command-line overrides into the file (or default) configuration.
fn server_config(args: ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.bind_addr = bind;
        if args.base_url.is_none() && args.config.is_none() {
            config.base_url = format!("http://{bind}");
        }
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(dir) = args.dir {
        config.engine.content_root = dir;
    }
    if let Some(metadata) = args.metadata {
        config.engine.metadata_path = Some(metadata);
    }
    if let Some(quota) = args.quota {
        config.engine.quota = Some(quota);
    }
    if args.cache_max.is_some() || args.cache_stretch.is_some() {
        let mut cache = config.engine.cache.unwrap_or_default();
        if let Some(maximum_size) = args.cache_max {
            cache.maximum_size = maximum_size;
        }
        if let Some(stretch_size) = args.cache_stretch {
            cache.stretch_size = stretch_size;
        }
        config.engine.cache = Some(cache);
    }

    config.engine.validate().context("invalid storage configuration")?;
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(args)?;
    println!(
        "{} Depot on {} (root: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.engine.content_root.display()
    );

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(DepotServer::new(config).serve())?;
    Ok(())
}

fn cmd_estimate(args: EstimateArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = FileSystemContentStore::open(&args.dir)?;
    let bytes = store.estimate_size_of_managed_content()?;
    match format {
        OutputFormat::Text => println!("{} bytes under {}", bytes.to_string().bold(), args.dir.display()),
        OutputFormat::Json => println!("{}", json!({ "dir": args.dir, "bytes": bytes })),
    }
    Ok(())
}

fn cmd_checksum(args: ChecksumArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut file = File::open(&args.file).with_context(|| format!("cannot open {}", args.file.display()))?;
    let (checksum, size) = ContentHasher::hash_reader(&mut file)?;
    match format {
        OutputFormat::Text => println!("{}  {} ({} bytes)", checksum.cyan(), args.file.display(), size),
        OutputFormat::Json => println!("{}", json!({ "file": args.file, "checksum": checksum, "size": size })),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let mut full = vec!["depot", "serve"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Serve(args) => args,
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = server_config(serve_args(&[
            "--bind", "0.0.0.0:9000", "--dir", "/srv/blobs", "--cache-max", "100", "--cache-stretch", "60",
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.base_url, "http://0.0.0.0:9000");
        assert_eq!(config.engine.content_root, PathBuf::from("/srv/blobs"));
        assert_eq!(
            config.engine.cache,
            Some(CacheConfig { maximum_size: 100, stretch_size: 60 })
        );
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(
            &path,
            "base_url = \"https://blobs.example.com\"\n[engine]\ncontent_root = \"/from/file\"\nquota = 5\n",
        )
        .unwrap();

        let config = server_config(serve_args(&["--config", path.to_str().unwrap(), "--quota", "10"])).unwrap();
        assert_eq!(config.base_url, "https://blobs.example.com");
        assert_eq!(config.engine.content_root, PathBuf::from("/from/file"));
        assert_eq!(config.engine.quota, Some(10));
    }

    #[test]
    fn single_cache_flag_keeps_other_bound() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(&path, "[engine.cache]\nmaximum_size = 1000\nstretch_size = 800\n").unwrap();

        let config = server_config(serve_args(&["--config", path.to_str().unwrap(), "--cache-stretch", "500"])).unwrap();
        assert_eq!(
            config.engine.cache,
            Some(CacheConfig { maximum_size: 1000, stretch_size: 500 })
        );

        let config = server_config(serve_args(&["--cache-max", "100000000"])).unwrap();
        assert_eq!(
            config.engine.cache,
            Some(CacheConfig {
                maximum_size: 100_000_000,
                stretch_size: CacheConfig::default().stretch_size,
            })
        );
    }

    #[test]
    fn inverted_cache_flags_rejected() {
        assert!(server_config(serve_args(&["--cache-max", "100"])).is_err());
    }

    #[test]
    fn checksum_and_estimate_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("1");
        std::fs::write(&file, b"abc").unwrap();

        cmd_checksum(ChecksumArgs { file }, &OutputFormat::Json).unwrap();
        cmd_estimate(EstimateArgs { dir: dir.path().to_path_buf() }, &OutputFormat::Text).unwrap();
        assert!(cmd_estimate(EstimateArgs { dir: dir.path().join("missing") }, &OutputFormat::Text).is_err());
    }
}
