use std::time::Duration;

use anyhow::{bail, Result};
use clap::FromArgMatches;
use serde_json::Value;
use tokio::runtime::Builder;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use consolectl::bulk::BatchReport;
use consolectl::cli::{self, Cli, Commands, MatchesSource, ModelCommand, ReadOnlyCommand};
use consolectl::config::{self, Config, Context, Overrides};
use consolectl::core::Console;
use consolectl::fields::LinePrompt;
use consolectl::models::{BulkModel, Device, Policy, Resource, User};
use consolectl::output::{render, render_list, OutputFormat, Printer};

fn main() -> Result<()> {
    let matches = cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing(cli.verbose);

    // Requests run one after another; the watch poller is the only background task
    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli, cli::leaf_matches(&matches)))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn async_main(cli: Cli, leaf: &clap::ArgMatches) -> Result<()> {
    let overrides = Overrides {
        api_key: cli.api_key.clone(),
        base_url: cli.base_url.clone(),
        page_size: cli.page_size,
        timeout_ms: cli.timeout_ms,
    };
    let format = cli.output;
    if let Some(resource) = cli.command.resource() {
        debug!("Dispatching {} command", resource.path());
    }

    match cli.command {
        Commands::Configure => configure(overrides),
        Commands::ConfigShow => {
            let ctx = Context::resolve(overrides)?;
            println!("{}", render(&ctx.masked(), format)?);
            Ok(())
        }
        Commands::Users(cmd) => run_model::<User>(cmd, &Context::resolve(overrides)?, leaf, format).await,
        Commands::Devices(cmd) => run_model::<Device>(cmd, &Context::resolve(overrides)?, leaf, format).await,
        Commands::Policies(cmd) => run_model::<Policy>(cmd, &Context::resolve(overrides)?, leaf, format).await,
        Commands::Proxies(cmd) => run_read_only(cmd, &Context::resolve(overrides)?, leaf, format).await,
    }
}

fn configure(overrides: Overrides) -> Result<()> {
    let path = config::config_path()?;
    config::save(
        &path,
        Config {
            api_key: overrides.api_key,
            base_url: overrides.base_url,
            page_size: overrides.page_size,
        },
    )?;
    info!("Configuration written to {}", path.display());
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn run_model<M: BulkModel>(
    cmd: ModelCommand,
    ctx: &Context,
    leaf: &clap::ArgMatches,
    format: OutputFormat,
) -> Result<()> {
    let console = Console::new(ctx)?;
    let resource = M::RESOURCE;
    let flags = MatchesSource::new(leaf);
    let mut prompt = LinePrompt::stdio();
    let mut printer = Printer::stdio(format);

    let report = match cmd {
        ModelCommand::List(args) => return print_list(&console.list(resource, &args.range()).await?, format),
        ModelCommand::Get { id } => return print_one(&console.get(resource, &id).await?, format),
        ModelCommand::Watch(args) => return watch(&console, resource, args.interval_secs, format).await,
        ModelCommand::Create(args) => {
            console
                .create::<M>(&args.source()?, args.options(), &flags, &mut prompt, &mut printer)
                .await?
        }
        ModelCommand::Edit { id } => console.edit::<M>(&id, &flags, &mut prompt, &mut printer).await?,
        ModelCommand::Delete(args) => {
            console
                .delete(resource, &args.source()?, args.options(), &flags, &mut prompt, &mut printer)
                .await?
        }
    };
    finish(&report)
}

async fn run_read_only(
    cmd: ReadOnlyCommand,
    ctx: &Context,
    leaf: &clap::ArgMatches,
    format: OutputFormat,
) -> Result<()> {
    let console = Console::new(ctx)?;
    let resource = Resource::Proxies;

    let report = match cmd {
        ReadOnlyCommand::List(args) => return print_list(&console.list(resource, &args.range()).await?, format),
        ReadOnlyCommand::Get { id } => return print_one(&console.get(resource, &id).await?, format),
        ReadOnlyCommand::Watch(args) => return watch(&console, resource, args.interval_secs, format).await,
        ReadOnlyCommand::Delete(args) => {
            let flags = MatchesSource::new(leaf);
            console
                .delete(
                    resource,
                    &args.source()?,
                    args.options(),
                    &flags,
                    &mut LinePrompt::stdio(),
                    &mut Printer::stdio(format),
                )
                .await?
        }
    };
    finish(&report)
}

fn print_one(item: &Value, format: OutputFormat) -> Result<()> {
    println!("{}", render(item, format)?);
    Ok(())
}

fn print_list(items: &[Value], format: OutputFormat) -> Result<()> {
    println!("{}", render_list(items, format)?);
    Ok(())
}

async fn watch(console: &Console, resource: Resource, interval_secs: u64, format: OutputFormat) -> Result<()> {
    let watch = console.watch(resource, Duration::from_secs(interval_secs.max(1)));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    watch
        .drain(shutdown, |item| {
            println!("{}", render(&item, format)?);
            Ok(())
        })
        .await
}

fn finish(report: &BatchReport<Value>) -> Result<()> {
    if report.has_failures() {
        bail!(
            "{} of {} records failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}
