//! shopcache - an offline-first command line front end for a product catalog.
//!
//! The first invocation pulls the full catalog from the upstream API and
//! persists it locally; every later invocation works entirely against the
//! local snapshot, including creates, edits and deletes.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopcache_core::{
    derive, CacheCoordinator, Config, Debouncer, InvalidationBus, LocalStore, MutationService,
    Product, ProductDraft, ProductPatch, QuerySpec, RemoteCatalog, Snapshot, SortKey,
    PRODUCTS_TOPIC, SEARCH_DEBOUNCE,
};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Everything a command needs: configuration plus the cache service objects.
struct AppContext {
    config: Config,
    coordinator: Arc<CacheCoordinator<RemoteCatalog>>,
    mutations: MutationService<RemoteCatalog>,
    bus: Arc<InvalidationBus>,
}

impl AppContext {
    fn new() -> Result<Self> {
        let config = Config::load()?;
        let store = LocalStore::new(config.cache_dir()?)
            .context("Failed to open the local snapshot store")?;
        let source = RemoteCatalog::with_base_url(config.api_base_url())
            .context("Failed to build the catalog client")?;

        let coordinator = Arc::new(CacheCoordinator::new(source, store));
        let bus = Arc::new(InvalidationBus::new());
        let mutations = MutationService::new(coordinator.clone(), bus.clone());

        Ok(Self {
            config,
            coordinator,
            mutations,
            bus,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    info!(command = %command, "shopcache starting");
    let app = AppContext::new()?;

    match command.as_str() {
        "list" => cmd_list(&app, &args[2..]).await,
        "show" => cmd_show(&app, &args[2..]).await,
        "add" => cmd_add(&app, &args[2..]).await,
        "edit" => cmd_edit(&app, &args[2..]).await,
        "rm" => cmd_rm(&app, &args[2..]).await,
        "reset" => cmd_reset(&app).await,
        "refresh" => cmd_refresh(&app).await,
        "search" => cmd_search(&app).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    eprintln!(
        "shopcache - offline-first product catalog

Usage:
  shopcache list [--search TERM] [--sort KEY] [--desc] [--page N] [--page-size N]
  shopcache show <id>
  shopcache add --title T --price P --brand B --description D
                [--rating R] [--stock N] [--category C] [--discount D]
  shopcache edit <id> [--title T] [--price P] [--brand B] [--description D]
                [--rating R] [--stock N] [--category C] [--discount D]
  shopcache rm <id>
  shopcache search          interactive, debounced search
  shopcache refresh         drop the snapshot and refetch from upstream
  shopcache reset           drop the snapshot without refetching

Sort keys: id, title, description, price, discount, rating, stock, brand, category"
    );
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_list(app: &AppContext, args: &[String]) -> Result<()> {
    let spec = QuerySpec {
        search: flag_value(args, "--search").unwrap_or_default().to_string(),
        sort: match flag_value(args, "--sort") {
            Some(name) => {
                Some(SortKey::parse(name).with_context(|| format!("Unknown sort key: {}", name))?)
            }
            None => None,
        },
        descending: has_flag(args, "--desc"),
        page_index: parse_flag(args, "--page")?.unwrap_or(0),
        page_size: parse_flag(args, "--page-size")?.unwrap_or_else(|| app.config.page_size()),
    };

    let snapshot = app.coordinator.get_snapshot().await?;
    let page = derive(&snapshot, &spec)?;

    print_rows(&page.items);
    let age = app
        .coordinator
        .age_display()
        .await
        .unwrap_or_else(|| "never".to_string());
    println!(
        "page {} of {} ({} matching, cache: {})",
        spec.page_index + 1,
        page.page_count(spec.page_size).max(1),
        page.total_count,
        age
    );
    Ok(())
}

async fn cmd_show(app: &AppContext, args: &[String]) -> Result<()> {
    let id = positional_id(args)?;
    let product = app
        .coordinator
        .find(id)
        .await?
        .with_context(|| format!("No product with id {}", id))?;

    println!("{} - {}", product.id, product.title);
    println!("  price:    {}", product.price_display());
    if product.has_discount() {
        println!("  discount: {}% off", product.discount_percentage);
    }
    println!("  rating:   {}/5", product.rating);
    println!("  brand:    {}", product.brand);
    println!("  category: {}", product.category);
    println!("  stock:    {} units", product.stock);
    if !product.description.is_empty() {
        println!("  {}", product.description);
    }
    Ok(())
}

async fn cmd_add(app: &AppContext, args: &[String]) -> Result<()> {
    let draft = ProductDraft {
        title: flag_value(args, "--title")
            .context("--title is required")?
            .to_string(),
        price: parse_flag(args, "--price")?.context("--price is required")?,
        description: flag_value(args, "--description")
            .context("--description is required")?
            .to_string(),
        brand: flag_value(args, "--brand")
            .context("--brand is required")?
            .to_string(),
        category: flag_value(args, "--category")
            .unwrap_or_default()
            .to_string(),
        rating: parse_flag(args, "--rating")?.unwrap_or(0.0),
        stock: parse_flag(args, "--stock")?.unwrap_or(0),
        discount_percentage: parse_flag(args, "--discount")?.unwrap_or(0.0),
        ..Default::default()
    };

    let product = app.mutations.create(draft).await?;
    println!("Created product {} ({})", product.id, product.title);
    Ok(())
}

async fn cmd_edit(app: &AppContext, args: &[String]) -> Result<()> {
    let id = positional_id(args)?;
    let patch = ProductPatch {
        title: flag_value(args, "--title").map(str::to_string),
        description: flag_value(args, "--description").map(str::to_string),
        brand: flag_value(args, "--brand").map(str::to_string),
        category: flag_value(args, "--category").map(str::to_string),
        price: parse_flag(args, "--price")?,
        rating: parse_flag(args, "--rating")?,
        stock: parse_flag(args, "--stock")?,
        discount_percentage: parse_flag(args, "--discount")?,
        ..Default::default()
    };

    let product = app.mutations.update(id, patch).await?;
    println!("Updated product {} ({})", product.id, product.title);
    Ok(())
}

async fn cmd_rm(app: &AppContext, args: &[String]) -> Result<()> {
    let id = positional_id(args)?;
    app.mutations.delete(id).await?;
    println!("Deleted product {}", id);
    Ok(())
}

async fn cmd_reset(app: &AppContext) -> Result<()> {
    app.coordinator.reset().await?;
    println!("Cache cleared");
    Ok(())
}

async fn cmd_refresh(app: &AppContext) -> Result<()> {
    let snapshot = app.coordinator.refresh().await?;
    println!("Refreshed: {} products", snapshot.len());
    Ok(())
}

/// Interactive search: each input line re-derives the first page after the
/// quiescence delay, against whatever snapshot is current at that moment.
async fn cmd_search(app: &AppContext) -> Result<()> {
    let initial = app.coordinator.get_snapshot().await?;
    let current: Arc<Mutex<Snapshot>> = Arc::new(Mutex::new(initial));

    // Keep the working snapshot fresh: every published invalidation replaces
    // it wholesale, and the next derivation picks it up.
    let mut invalidations = app.bus.subscribe(PRODUCTS_TOPIC);
    let listener_slot = current.clone();
    let listener = tokio::spawn(async move {
        while let Some(snapshot) = invalidations.recv().await {
            *listener_slot.lock().expect("snapshot slot poisoned") = snapshot;
        }
    });

    let page_size = app.config.page_size();
    let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type to search title/brand; empty line to quit.");
    while let Some(line) = lines.next_line().await? {
        let term = line.trim().to_string();
        if term.is_empty() {
            break;
        }

        let current = current.clone();
        debouncer.call(move || {
            let snapshot = current.lock().expect("snapshot slot poisoned").clone();
            let spec = QuerySpec {
                search: term.clone(),
                page_size,
                ..Default::default()
            };
            match derive(&snapshot, &spec) {
                Ok(page) => {
                    print_rows(&page.items);
                    println!("{} matching \"{}\"", page.total_count, term);
                }
                Err(e) => eprintln!("Search failed: {}", e),
            }
        });
    }

    listener.abort();
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_rows(items: &[Product]) {
    for p in items {
        println!(
            "{:>5}  {:<40} {:<16} {:>9}  {}/5",
            p.id,
            truncate(&p.title, 40),
            truncate(&p.brand, 16),
            p.price_display(),
            p.rating
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}

/// First non-flag argument, parsed as a product id.
fn positional_id(args: &[String]) -> Result<i64> {
    let raw = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .context("Expected a product id")?;
    raw.parse()
        .with_context(|| format!("Not a valid product id: {}", raw))
}

/// Value following `--name`, if present.
fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// Parse the value of `--name`, reporting which flag failed.
fn parse_flag<T>(args: &[String], name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match flag_value(args, name) {
        Some(raw) => {
            let value = raw
                .parse()
                .with_context(|| format!("Invalid value for {}: {}", name, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_parsing() {
        let a = args(&["--search", "phone", "--desc", "--page", "2"]);
        assert_eq!(flag_value(&a, "--search"), Some("phone"));
        assert!(has_flag(&a, "--desc"));
        assert_eq!(parse_flag::<usize>(&a, "--page").unwrap(), Some(2));
        assert_eq!(parse_flag::<usize>(&a, "--page-size").unwrap(), None);
    }

    #[test]
    fn test_invalid_flag_value_is_reported() {
        let a = args(&["--page", "two"]);
        assert!(parse_flag::<usize>(&a, "--page").is_err());
    }

    #[test]
    fn test_positional_id_skips_flags() {
        let a = args(&["--title", "New", "17"]);
        // "--title" is a flag, "New" is its value; still finds the id
        assert_eq!(positional_id(&args(&["17", "--title", "New"])).unwrap(), 17);
        assert!(positional_id(&a).is_err()); // "New" is not an id
    }

    #[test]
    fn test_truncate_preserves_short_strings() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10).chars().count(), 10);
    }
}
