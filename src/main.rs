use std::sync::Arc;

use clap::Parser;
use modresolve::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::{
            build_engine, cache_directory, do_clear_cache, do_list_versions, do_resolve,
            parse_repository, EngineOptions,
        },
    },
    config::ModresolveConfig,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = ModresolveConfig::load(Some(&cli_args.config))?;
    let extra_repositories = cli_args
        .repositories
        .iter()
        .map(|entry| parse_repository(entry))
        .collect::<anyhow::Result<Vec<_>>>()?;

    match cli_args.cmd {
        Command::Resolve {
            dependencies,
            reject,
            attributes,
            first_match,
            refresh_dependencies,
            jobs,
        } => {
            let engine = build_engine(
                &config,
                EngineOptions {
                    cache_directory: cli_args.cache_directory,
                    extra_repositories,
                    first_match,
                    refresh: refresh_dependencies,
                },
            )?;
            do_resolve(
                Arc::new(engine),
                &dependencies,
                reject.as_deref(),
                &attributes,
                jobs,
            )
        }
        Command::ListVersions { module } => {
            let engine = build_engine(
                &config,
                EngineOptions {
                    cache_directory: cli_args.cache_directory,
                    extra_repositories,
                    ..Default::default()
                },
            )?;
            do_list_versions(&engine, &module)
        }
        Command::ClearCache => do_clear_cache(cache_directory(
            &config,
            cli_args.cache_directory.as_deref(),
        )),
    }
}
