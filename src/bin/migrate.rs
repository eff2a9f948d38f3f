use anyhow::{anyhow, Context, Result};
use std::env;
use std::io;
use std::path::Path;
use volley_club_bot::config::database_url_from_env;
use volley_club_bot::database::connection::DatabaseManager;
use volley_club_bot::database::store::{Document, JsonDirStore, Store};
use volley_club_bot::database::{collections, open_store};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("migrate");
    let dir = args.get(2).map(|s| s.as_str());

    match (command, dir) {
        ("migrate" | "up", _) => run_migrations().await,
        ("check", _) => check_database().await,
        ("import", Some(dir)) => import_collections(dir).await,
        ("export", Some(dir)) => export_collections(dir).await,
        ("reset", _) => reset_database().await,
        ("help" | "--help" | "-h", _) => {
            print_help();
            Ok(())
        }
        ("import" | "export", None) => {
            eprintln!("{command} needs a directory argument");
            print_help();
            std::process::exit(1);
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_help();
            std::process::exit(1);
        }
    }
}

async fn run_migrations() -> Result<()> {
    println!("🏐 Volley Club Bot - Database Migration Tool");
    println!("============================================");

    let database_url = database_url_from_env();
    println!("📊 Database URL: {}", mask_url(&database_url));

    if !database_url.starts_with("sqlite:") {
        println!("ℹ️  Only SQLite stores have a schema; nothing to migrate.");
        return Ok(());
    }

    if let Some(parent) = sqlite_path(&database_url).and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            println!("📁 Creating directory: {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("🚀 Running database migrations...");
    let db_manager = DatabaseManager::new(&database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

    match db_manager.run_migrations().await {
        Ok(_) => println!("✅ Migrations completed successfully!"),
        Err(e) => {
            eprintln!("❌ Migration failed: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn check_database() -> Result<()> {
    println!("🔍 Checking store...");

    let database_url = database_url_from_env();
    println!("📊 Database URL: {}", mask_url(&database_url));

    let store = match open_store(&database_url).await {
        Ok(store) => store,
        Err(e) => {
            println!("⚠️  Store check failed: {e}");
            println!("💡 Try running 'migrate up' to create the schema");
            return Ok(());
        }
    };

    println!("✅ Store reachable ({})", store.backend());
    println!("📋 Collections:");
    for name in collections::ALL {
        match store.get(name).await {
            Ok(document) => println!("  • {name}: {} entries", document.len()),
            Err(e) => println!("  • {name}: unreadable ({e})"),
        }
    }
    Ok(())
}

/// Loads every `<collection>.json` found in `dir` into the configured store.
async fn import_collections(dir: &str) -> Result<()> {
    let source = JsonDirStore::open(dir).await?;
    let target = open_store(&database_url_from_env()).await?;

    let mut imported = 0;
    for name in collections::ALL {
        if !Path::new(dir).join(format!("{name}.json")).exists() {
            println!("  • {name}: no file, skipped");
            continue;
        }
        let document = source
            .get(name)
            .await
            .with_context(|| format!("failed to read {name}.json"))?;
        target.put(name, &document).await?;
        println!("  • {name}: {} entries", document.len());
        imported += 1;
    }
    println!("✅ Imported {imported} collection(s) into {}", target.backend());
    Ok(())
}

async fn export_collections(dir: &str) -> Result<()> {
    let source = open_store(&database_url_from_env()).await?;
    let target = JsonDirStore::open(dir).await?;

    for name in collections::ALL {
        let document: Document = source.get(name).await?;
        target.put(name, &document).await?;
        println!("  • {name}: {} entries", document.len());
    }
    println!("✅ Exported {} collections to {dir}", collections::ALL.len());
    Ok(())
}

async fn reset_database() -> Result<()> {
    let database_url = database_url_from_env();
    let Some(path) = sqlite_path(&database_url) else {
        return Err(anyhow!("Reset is only supported for SQLite databases"));
    };

    println!("⚠️  WARNING: This will delete ALL data in the database!");
    println!("🤔 Are you sure you want to continue? (yes/no)");

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim().to_lowercase() != "yes" {
        println!("❌ Reset cancelled.");
        return Ok(());
    }

    if path.exists() {
        std::fs::remove_file(path)?;
        println!("🗑️  Deleted database file: {}", path.display());
    }

    println!("🔄 Recreating database schema...");
    run_migrations().await?;
    println!("✅ Database reset completed!");
    Ok(())
}

fn sqlite_path(url: &str) -> Option<&Path> {
    url.strip_prefix("sqlite:")
        .map(|p| p.trim_start_matches("//"))
        .map(Path::new)
}

fn mask_url(url: &str) -> String {
    match sqlite_path(url).and_then(|p| p.file_name()) {
        Some(filename) => format!("sqlite:.../{}", filename.to_string_lossy()),
        None => url.to_string(),
    }
}

fn print_help() {
    println!("🏐 Volley Club Bot - Database Migration Tool");
    println!();
    println!("USAGE:");
    println!("    migrate [COMMAND] [DIR]");
    println!();
    println!("COMMANDS:");
    println!("    migrate, up    Create the SQLite schema (default)");
    println!("    check          Show every collection and its size");
    println!("    import <dir>   Load <collection>.json files into the store");
    println!("    export <dir>   Write every collection to <dir>/<collection>.json");
    println!("    reset          Reset database (SQLite only) - DESTRUCTIVE!");
    println!("    help           Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    DATABASE_URL   sqlite:<path>, json:<dir> or memory: (default: sqlite:./data/volley.db)");
    println!();
}
