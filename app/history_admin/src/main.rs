mod cli;

use std::sync::Arc;

use anyhow::Context;
use cli::{Cli, Commands, Format};
use db_repo::{HistoryFilter, MySqlHistoryRepo};
use model_history::{logging, History, HistoryAdmin, HistoryConfig, HistoryDetail, PageResult};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => HistoryConfig::load_from_file(path)?,
        None => HistoryConfig::default(),
    };

    // RUST_LOG 优先于配置文件中的 log_filter
    logging::init(&config.log_filter)?;

    if let Commands::Schema = cli.command {
        for ddl in MySqlHistoryRepo::schema_sql() {
            println!("{ddl};\n");
        }
        return Ok(());
    }

    let url = cli
        .database_url
        .clone()
        .or_else(|| config.database_url.clone())
        .context("no database url: pass --database-url or set database_url in the config file")?;
    let repo = Arc::new(MySqlHistoryRepo::new(&url)?);
    let admin = HistoryAdmin::new(repo, config.admin.clone());

    match cli.command {
        Commands::List { app_label, model, search, page } => {
            let filter = HistoryFilter { app_label, model, search };
            tracing::debug!(?filter, page, "listing histories");
            let result = admin.list(&filter, admin.page(page))?;
            print_page(&result, cli.format)?;
        }
        Commands::Show { id } => match admin.detail(id)? {
            Some(detail) => print_detail(&detail, cli.format)?,
            None => anyhow::bail!("history {id} not found"),
        },
        Commands::Schema => {}
    }

    Ok(())
}

fn print_page(page: &PageResult<History>, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&page.content)?);
        return Ok(());
    }

    for history in &page.content {
        let state = if history.is_detached() { " (deleted)" } else { "" };
        println!(
            "{:>8}  {:<40}  created {}  modified {}{state}",
            history.id,
            history.label(None),
            history.created_at,
            history.last_modified_at
        );
    }
    println!(
        "-- page {}/{} ({} histories)",
        page.page + 1,
        page.total_pages().max(1),
        page.total_elements
    );
    Ok(())
}

fn print_detail(detail: &HistoryDetail, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(detail)?),
        Format::Text => {
            println!("{}", detail.label);
            for row in &detail.rows {
                println!("\n#{} {}", row.id, row.label);
                println!("fields:\n{}", row.fields);
                println!("updated fields:\n{}", row.updated);
            }
        }
        Format::Html => {
            println!("<h2>{}</h2>", detail.label);
            for row in &detail.rows {
                println!("<h3>#{}</h3>", row.id);
                println!("{}", row.fields_html);
                println!("{}", row.updated_html);
            }
        }
    }
    Ok(())
}
