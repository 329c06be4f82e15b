//! Command-line front end for the goods priority engine.
//!
//! # Responsibility
//! - Load configuration, start logging and wire store, cache and notifier.
//! - Relay committed change events from the configured channel to the
//!   downstream topic.
//! - Print one JSON envelope per invocation on stdout.
//!
//! # Invariants
//! - Every failure is reported as `{"success":false,"error":...}` with a
//!   non-zero exit code.

use clap::{Parser, Subcommand};
use goodsrank_core::config::CacheBackend;
use goodsrank_core::notify::{ChannelNotifier, Forwarder};
use goodsrank_core::{
    open_db, AppConfig, ChangeNotifier, GoodsCache, GoodsPage, GoodsService, GroupRepository,
    ListQuery, LogNotifier, MemoryCache, ReadThrough, RepoError, ServiceOptions, SqliteCache,
    SqliteGoodsRepository, SqliteGroupRepository,
};
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

const ERR_INTERNAL: &str = "errors.internal";
const ERR_GOOD_NOT_FOUND: &str = "errors.good.notFound";
const ERR_WRONG_PARAMS: &str = "wrong.params";

#[derive(Debug, Parser)]
#[command(name = "goodsrank", version, about = "Goods ordering engine")]
struct Cli {
    /// Config file; defaults to `goodsrank.toml` in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, Subcommand)]
enum Commands {
    /// Health check.
    Ping,
    /// Groups.
    Groups {
        #[command(subcommand)]
        action: GroupCommands,
    },
    #[command(flatten)]
    Goods(GoodsCommands),
}

#[derive(Clone, Debug, Subcommand)]
enum GoodsCommands {
    /// Create a good ranked after every existing one.
    Create {
        #[arg(long = "group-id")]
        group_id: i64,
        #[arg(long)]
        name: String,
    },
    /// Replace name and description of a good.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long = "group-id")]
        group_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Soft-delete a good.
    Delete {
        #[arg(long)]
        id: i64,
        #[arg(long = "group-id")]
        group_id: i64,
    },
    /// List one page of goods with counters.
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Move a good to a new priority and renumber its window.
    Reprioritize {
        #[arg(long)]
        id: i64,
        #[arg(long = "group-id")]
        group_id: i64,
        #[arg(long = "new-priority")]
        new_priority: i64,
    },
}

#[derive(Clone, Debug, Subcommand)]
enum GroupCommands {
    /// List groups.
    List,
    /// Create a group.
    Create {
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct ListMeta {
    total: usize,
    removed: usize,
    limit: u32,
    offset: u32,
}

/// Failure reported in the error envelope.
#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let code = match &err {
            RepoError::NotFound { .. } => ERR_GOOD_NOT_FOUND,
            RepoError::Validation(_) => ERR_WRONG_PARAMS,
            _ => {
                error!("event=command module=cli status=error error={err}");
                ERR_INTERNAL
            }
        };
        Self::new(code, err.to_string())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(body) => {
            println!("{body}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", json!({ "success": false, "error": err.code }));
            eprintln!("goodsrank: {}", err.message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|err| CliError::new(ERR_WRONG_PARAMS, err.to_string()))?;

    goodsrank_core::init_logging_from_config(&config.logging)
        .map_err(|message| CliError::new(ERR_INTERNAL, message))?;

    match cli.command {
        Commands::Ping => Ok(json!({
            "success": true,
            "version": goodsrank_core::core_version(),
        })),
        Commands::Groups { action } => run_groups(&config, action),
        Commands::Goods(command) => run_goods(&config, command, LogNotifier),
    }
}

/// Runs one goods command and relays its change events to `downstream`
/// under the configured topic.
fn run_goods<N: ChangeNotifier>(
    config: &AppConfig,
    command: GoodsCommands,
    downstream: N,
) -> Result<Value, CliError> {
    let conn = open_db(&config.database.path)
        .map_err(|err| CliError::new(ERR_INTERNAL, err.to_string()))?;
    let (notifier, published) = ChannelNotifier::new();
    let relay = Forwarder::from_config(&config.notify, downstream);
    let service = GoodsService::new(
        SqliteGoodsRepository::new(&conn),
        ReadThrough::new(open_cache(config), config.cache.ttl()),
        Box::new(notifier),
        ServiceOptions::from_config(config),
    );

    let body = dispatch_goods(&service, config, command);

    let relayed = relay.drain(&published);
    debug!(
        "event=change_relay module=cli status=ok topic={} relayed={relayed}",
        config.notify.topic
    );
    body
}

fn dispatch_goods<C: GoodsCache>(
    service: &GoodsService<SqliteGoodsRepository<'_>, C>,
    config: &AppConfig,
    command: GoodsCommands,
) -> Result<Value, CliError> {
    match command {
        GoodsCommands::Create { group_id, name } => {
            to_value(&service.create_good(group_id, &name)?)
        }
        GoodsCommands::Update {
            id,
            group_id,
            name,
            description,
        } => to_value(&service.update_good(id, group_id, &name, &description)?),
        GoodsCommands::Delete { id, group_id } => to_value(&service.delete_good(id, group_id)?),
        GoodsCommands::List { limit, offset } => {
            let query = ListQuery {
                limit: limit.unwrap_or(config.list.default_limit),
                offset,
            };
            list_envelope(service.list_goods(&query)?)
        }
        GoodsCommands::Reprioritize {
            id,
            group_id,
            new_priority,
        } => {
            let window = service.reprioritize_good(id, group_id, new_priority)?;
            Ok(json!({ "success": true, "priorities": to_value(&window)? }))
        }
    }
}

fn run_groups(config: &AppConfig, action: GroupCommands) -> Result<Value, CliError> {
    let conn = open_db(&config.database.path)
        .map_err(|err| CliError::new(ERR_INTERNAL, err.to_string()))?;
    let groups = SqliteGroupRepository::new(&conn);
    let body = match action {
        GroupCommands::List => {
            json!({ "success": true, "groups": to_value(&groups.list_groups()?)? })
        }
        GroupCommands::Create { name } => {
            json!({ "success": true, "group": to_value(&groups.create_group(&name)?)? })
        }
    };
    Ok(body)
}

fn open_cache(config: &AppConfig) -> Box<dyn GoodsCache> {
    match config.cache.backend {
        CacheBackend::Memory => Box::new(MemoryCache::new()),
        CacheBackend::Sqlite => match SqliteCache::open(&config.cache.path) {
            Ok(cache) => Box::new(cache),
            Err(err) => {
                warn!(
                    "event=cache_open module=cli status=degraded backend=sqlite fallback=memory error={err}"
                );
                Box::new(MemoryCache::new())
            }
        },
    }
}

fn list_envelope(page: GoodsPage) -> Result<Value, CliError> {
    let meta = ListMeta {
        total: page.total,
        removed: page.removed,
        limit: page.limit,
        offset: page.offset,
    };
    Ok(json!({
        "success": true,
        "meta": to_value(&meta)?,
        "goods": to_value(&page.goods)?,
    }))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|err| {
        error!("event=encode_response module=cli status=error error={err}");
        CliError::new(ERR_INTERNAL, format!("failed to encode response: {err}"))
    })
}
