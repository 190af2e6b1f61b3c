use moviedir::app::{MetadataStore, TracingSink};
use moviedir::config::load_config;
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();

    if args.len() == 1 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let root = load_config().cache_dir();
    let store = match MetadataStore::open(&root, TracingSink::shared("cache_explorer")) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Cannot open cache at {}: {e}", root.display());
            return ExitCode::FAILURE;
        }
    };
    println!("Opening metadata cache: {}", root.display());

    if args.iter().any(|a| a == "--list") {
        return list(&store);
    }

    if args.iter().any(|a| a == "--sweep") {
        return match store.sweep_partials() {
            Ok(n) => {
                println!("Removed {n} leftover file(s).");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Sweep failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if let Some(idx) = args.iter().position(|a| a == "--show") {
        let Some(id) = args.get(idx + 1) else {
            eprintln!("Missing identifier after --show");
            return ExitCode::FAILURE;
        };
        return show(&store, id);
    }

    print_usage();
    ExitCode::FAILURE
}

fn print_usage() {
    println!(
        r#"Metadata cache explorer.

Usage:
  cargo run --bin cache_explorer -- --list
      List cached identifiers with title, year and thumbnail status.

  cargo run --bin cache_explorer -- --show <identifier>
      Print the stored record for <identifier>.

  cargo run --bin cache_explorer -- --sweep
      Remove leftover .part files and empty thumbnails."#
    );
}

fn list(store: &MetadataStore) -> ExitCode {
    let ids = match store.identifiers() {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Cannot read cache: {e}");
            return ExitCode::FAILURE;
        }
    };
    for id in &ids {
        let thumb = if store.thumbnail_path(id).is_some() { "thumb" } else { "-" };
        match store.read_checked(id) {
            Ok(Some(rec)) => println!(
                "{id:<40} {:<40} {:>4} {thumb}",
                rec.title,
                rec.year.as_deref().unwrap_or("")
            ),
            Ok(None) => {}
            Err(e) => println!("{id:<40} <unreadable: {e}>"),
        }
    }
    println!("{} record(s).", ids.len());
    ExitCode::SUCCESS
}

fn show(store: &MetadataStore, id: &str) -> ExitCode {
    match store.read_checked(id) {
        Ok(Some(rec)) => {
            println!("identifier: {}", rec.identifier);
            println!("title:      {}", rec.title);
            println!("year:       {}", rec.year.as_deref().unwrap_or("—"));
            println!("rating:     {:.1}", rec.rating);
            println!("cover_url:  {}", rec.cover_url);
            println!("cached_at:  {}", rec.cached_at.to_rfc3339());
            match store.thumbnail_path(id) {
                Some(p) => println!("thumbnail:  {}", p.display()),
                None => println!("thumbnail:  (none)"),
            }
            println!();
            println!("{}", rec.plot);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("No cached record for `{id}`.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
