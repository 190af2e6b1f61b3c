// src/main.rs
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use moviedir::app::{MovieDirectory, RefetchMsg, ScanMsg};
use moviedir::config::load_config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"Movie directory (headless).

Usage:
  moviedir <category_dir> [--update]
      List movie folders with cached metadata. --update fetches uncached ones.

  moviedir --categories [base_dir]
      List category folders (defaults to base_directory from config.json).

  moviedir --refetch <identifier>
      Force a fresh lookup for one folder name."#
    );
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let cfg = load_config();
    let dir = match MovieDirectory::from_config(&cfg) {
        Ok(dir) => dir,
        Err(e) => {
            error!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("cache at {}", cfg.cache_dir().display());

    if args[0] == "--categories" {
        let Some(base) = args
            .get(1)
            .cloned()
            .or_else(|| cfg.base_directory.clone())
        else {
            eprintln!("No base directory given and none configured.");
            return ExitCode::FAILURE;
        };
        return match dir.categories(&PathBuf::from(&base)) {
            Ok(names) => {
                for name in names {
                    println!("{name}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Cannot list {base}: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if args[0] == "--refetch" {
        let Some(id) = args.get(1) else {
            eprintln!("Missing identifier after --refetch");
            return ExitCode::FAILURE;
        };
        let rx = dir.refetch(id.clone());
        return match rx.recv_timeout(cfg.request_timeout() * 4) {
            Ok(RefetchMsg::Done {
                identifier,
                record: Some(rec),
                thumbnail,
            }) => {
                println!("{identifier}: {} ★{:.1}", rec.display_title(), rec.rating);
                if let Some(p) = thumbnail {
                    println!("  thumbnail: {}", p.display());
                }
                ExitCode::SUCCESS
            }
            Ok(RefetchMsg::Done { identifier, .. }) => {
                println!("{identifier}: no match");
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("refetch did not finish: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let force_update = args.iter().any(|a| a == "--update");
    let handle = dir.start_scan(PathBuf::from(&args[0]), force_update);
    loop {
        match handle.receiver().recv_timeout(Duration::from_millis(250)) {
            Ok(ScanMsg::Entry(entry)) => {
                let rating = entry
                    .record
                    .as_ref()
                    .map(|r| format!(" ★{:.1}", r.rating))
                    .unwrap_or_default();
                let media = if entry.entry.media_file.is_some() { "" } else { " (no video)" };
                println!("[{}] {}{rating}{media}", entry.entry.category, entry.label());
            }
            Ok(ScanMsg::Error(e)) => eprintln!("{e}"),
            Ok(ScanMsg::Done { processed }) => {
                println!("{processed} entries.");
                break;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    handle.join();
    ExitCode::SUCCESS
}
