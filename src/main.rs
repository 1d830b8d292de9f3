//! Sheet Dashboard - command-line entry point
//!
//! Reads dealer, interaction, attendance and sales sheets through the gviz
//! endpoint and writes through the Apps Script web app.
//!
//! Configuration comes from `SHEETS_*` environment variables, an optional
//! `--config` JSON file, and the global flags below, in that order.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use sheet_dashboard::config::{ConfigLayer, DashboardConfig};
use sheet_dashboard::gsheets::auth::authenticate;
use sheet_dashboard::gsheets::notify::{Notification, Notifier, TracingNotifier};
use sheet_dashboard::gsheets::session::SessionStore;
use sheet_dashboard::gsheets::validation::FormValues;
use sheet_dashboard::gsheets::{RefreshPolicy, SheetLayout, SheetView, SheetsClient};
use sheet_dashboard::reports::load_dashboard_report;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet_dashboard")]
#[command(version, about = "Spreadsheet-backed dealer and sales dashboard", long_about = None)]
struct Cli {
    /// JSON config file overriding environment settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    spreadsheet_id: Option<String>,

    /// Apps Script web app URL used for writes
    #[arg(long, global = true)]
    webapp_url: Option<String>,

    /// `opaque` (fire-and-forget) or `confirmed`
    #[arg(long, global = true)]
    write_mode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct Search {
    /// Case-insensitive search over the view's search columns
    #[arg(long, default_value = "")]
    search: String,

    /// Substring filter on a field, as field=value (at most two)
    #[arg(long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured views
    Views,

    /// Print a view's rows
    Show {
        view: String,
        #[command(flatten)]
        search: Search,
    },

    /// Write a view's visible rows to a CSV file
    Export {
        view: String,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        search: Search,
    },

    /// Sales totals and attendance summary
    Report,

    /// Append a row
    Insert {
        view: String,
        /// Field values, as field=value
        #[arg(long = "set", value_parser = parse_pair)]
        set: Vec<(String, String)>,
        /// Full ordered row as a JSON array of strings
        #[arg(long, conflicts_with = "set")]
        row: Option<String>,
    },

    /// Change fields of an existing row
    Update {
        view: String,
        /// Business key of the row (views with a key field)
        #[arg(long, conflicts_with = "row_index")]
        key: Option<String>,
        /// 1-based physical sheet row
        #[arg(long)]
        row_index: Option<usize>,
        #[arg(long = "set", value_parser = parse_pair, required = true)]
        set: Vec<(String, String)>,
    },

    /// Check credentials against the users sheet and save the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Clear the saved session
    Logout,

    /// Show the signed-in user
    Whoami,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((field.to_string(), value.to_string()))
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("SHEETS_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let overrides = ConfigLayer {
        spreadsheet_id: cli.spreadsheet_id,
        webapp_url: cli.webapp_url,
        write_mode: cli.write_mode,
        ..ConfigLayer::default()
    };
    let config = DashboardConfig::load(cli.config.as_deref(), overrides)
        .context("failed to load configuration")?;

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let sessions = SessionStore::new(config.session_file.clone());

    match cli.command {
        Commands::Views => {
            for name in config.layouts.names() {
                let layout = config.layout(name)?;
                println!("{:<14} {}", name, layout.sheet_ref()?);
            }
        }

        Commands::Show { view, search } => {
            let client = config.client()?;
            let view = load_view(&client, config.layout(&view)?, &notifier, &search).await?;
            print_rows(&view);
        }

        Commands::Export { view, out, search } => {
            let client = config.client()?;
            let view = load_view(&client, config.layout(&view)?, &notifier, &search).await?;
            let count = view.export_to(&out)?;
            println!("Exported {} rows to {}", count, out.display());
        }

        Commands::Report => {
            let client = config.client()?;
            let report = load_dashboard_report(&client, &config.layouts)
                .await
                .map_err(|e| {
                    notifier.notify(e.notification());
                    e
                })?;
            print!("{}", report);
        }

        Commands::Insert { view, set, row } => {
            let client = config.client()?;
            let layout = config.layout(&view)?;
            let form = match row {
                Some(json) => form_from_row(layout, &json)?,
                None => set.into_iter().collect(),
            };

            let mut view = SheetView::new(layout.clone(), notifier.clone())?;
            let outcome = view.insert(&client, config.write_mode, &form).await?;
            println!("Inserted into {} ({:?})", layout.name, outcome);
        }

        Commands::Update {
            view,
            key,
            row_index,
            set,
        } => {
            let client = config.client()?;
            let layout = config.layout(&view)?;
            let changes: FormValues = set.into_iter().collect();

            let mut view = SheetView::new(layout.clone(), notifier.clone())?;
            view.load(&client, RefreshPolicy::KeepOnError).await?;

            let row_id = match (key, row_index) {
                (Some(key), _) => view
                    .find_by_key(&key)?
                    .map(|r| r.id)
                    .ok_or_else(|| anyhow!("no row with key '{}' in {}", key, layout.name))?,
                (None, Some(index)) => view
                    .find_by_row_index(index)
                    .map(|r| r.id)
                    .ok_or_else(|| anyhow!("no data row {} in {}", index, layout.name))?,
                (None, None) => bail!("pass --key or --row-index"),
            };

            let outcome = view.update(&client, config.write_mode, row_id, &changes).await?;
            println!("Updated {} ({:?})", layout.name, outcome);
        }

        Commands::Login { username, password } => {
            let client = config.client()?;
            let users = config.layout("users")?;
            let user = authenticate(&client, users, &username, &password, config.auth_timeout)
                .await
                .map_err(|e| {
                    notifier.notify(e.notification());
                    e
                })?;
            sessions.login(user.clone())?;
            notifier.notify(Notification::success(format!(
                "Welcome, {}",
                display_name(&user.name, &user.username)
            )));
            println!("Signed in as {} ({})", user.username, user.role);
        }

        Commands::Logout => {
            sessions.logout()?;
            println!("Signed out");
        }

        Commands::Whoami => match sessions.current_user() {
            Some(user) => println!("{} ({}, {})", user.username, user.name, user.role),
            None => println!("Not signed in"),
        },
    }

    Ok(())
}

fn display_name<'a>(name: &'a str, username: &'a str) -> &'a str {
    if name.trim().is_empty() {
        username
    } else {
        name
    }
}

async fn load_view(
    client: &SheetsClient,
    layout: &SheetLayout,
    notifier: &Arc<dyn Notifier>,
    search: &Search,
) -> anyhow::Result<SheetView> {
    let mut view = SheetView::new(layout.clone(), notifier.clone())?;
    view.load(client, RefreshPolicy::KeepOnError).await?;

    view.set_search(search.search.clone());
    for (field, needle) in &search.filters {
        view.add_filter(field, needle.clone())?;
    }
    Ok(view)
}

/// Map a positional row onto the layout's named fields
///
/// Values in columns the layout does not name are rejected rather than
/// silently dropped.
fn form_from_row(layout: &SheetLayout, json: &str) -> anyhow::Result<FormValues> {
    let values: Vec<String> =
        serde_json::from_str(json).context("--row must be a JSON array of strings")?;

    let mut form = FormValues::new();
    for (index, value) in values.into_iter().enumerate() {
        match layout.columns.field_at(index) {
            Some(field) => {
                form.insert(field.to_string(), value);
            }
            None if value.trim().is_empty() => {}
            None => bail!("column {} is not part of the {} layout", index, layout.name),
        }
    }
    Ok(form)
}

fn print_rows(view: &SheetView) {
    let headers: Vec<&str> = view.headers().iter().map(|h| h.label.as_str()).collect();
    println!("row\t{}", headers.join("\t"));

    let rows = view.visible_rows();
    for row in &rows {
        let cells: Vec<&str> = view.headers().iter().map(|h| row.get(h.index)).collect();
        println!("{}\t{}", row.row_index, cells.join("\t"));
    }
    println!("({} of {} rows)", rows.len(), view.rows().len());
}
