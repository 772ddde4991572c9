use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use wpmigrate::{
    cache,
    config::Config,
    pipeline::{ImportPipeline, Phase, RunOutcome},
    store::{HttpFetcher, LocalStore, TargetEnvironment},
    util::timestamped_destination,
    wxr::scan,
    UserStrategy,
};

use super::{resolve_export, scan::print_summary};

/// Flags of the `import` subcommand
#[derive(Debug, Default)]
pub struct ImportArgs {
    pub file: Option<PathBuf>,
    pub dry_run: bool,
    pub fresh: bool,
    pub yes: bool,
    pub create_users: bool,
    pub publish: bool,
    pub no_media: bool,
    pub quiet: bool,
}

/// Operator's answer to the pre-run confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Abort,
}

pub fn run_import(mut config: Config, args: ImportArgs) -> Result<RunOutcome> {
    let migration = &mut config.migration;
    migration.dry_run |= args.dry_run;
    migration.auto_publish |= args.publish;
    if args.create_users {
        migration.user_strategy = UserStrategy::CreateUsers;
    }
    if args.no_media {
        migration.import_media = false;
    }
    config.validate()?;

    let path = resolve_export(&config, args.file)?;
    let summary =
        scan(&path).with_context(|| format!("Failed to scan export {}", path.display()))?;
    if !args.quiet {
        print_summary(&summary);
    }

    let fetcher = HttpFetcher::new(config.fetch.clone()).context("Failed to build HTTP client")?;
    let mut store = LocalStore::open(config.store_dir(), fetcher)
        .with_context(|| format!("Failed to open target store {}", config.store_dir().display()))?;

    let mut environment =
        TargetEnvironment::query(&store).context("Failed to query target store")?;
    environment.validate(&summary.requirements(), &config.migration)?;

    let plan = Phase::plan(&summary, &config.migration);
    if confirm(&plan, &config, args.fresh, args.yes)? == Confirmation::Abort {
        info!("Migration cancelled by operator");
        return Ok(RunOutcome::Aborted);
    }

    // The store may have changed while the prompt was open
    environment
        .refresh(&store)
        .context("Failed to re-query target store")?;
    environment.validate(&summary.requirements(), &config.migration)?;

    let cache_path = config.cache_path();
    let mut pipeline =
        ImportPipeline::new(&mut store, &path, &summary, &environment, &config.migration)
            .with_quiet(args.quiet);

    if args.fresh && config.migration.dry_run {
        info!("Dry run with --fresh: ignoring the existing mapping cache");
    } else {
        if args.fresh {
            let destination = timestamped_destination(&cache_path, Utc::now());
            if !cache::archive(&cache_path, &destination)? {
                warn!("--fresh given but there is no mapping cache to archive");
            }
        }
        pipeline = pipeline
            .with_cache_file(&cache_path)
            .with_context(|| format!("Failed to load mapping cache {}", cache_path.display()))?;
    }

    let start = Instant::now();
    let stats = pipeline.run()?;

    if !args.quiet {
        stats.print_summary(start.elapsed());
    }

    Ok(RunOutcome::Completed(stats))
}

/// Show what is about to happen and ask on stdin unless `assume_yes`.
/// End of input counts as a "no".
fn confirm(plan: &[Phase], config: &Config, fresh: bool, assume_yes: bool) -> Result<Confirmation> {
    let phases: Vec<&str> = plan.iter().map(|p| p.as_str()).collect();
    let m = &config.migration;

    println!("\nPlanned phases: {}", phases.join(" -> "));
    println!("User strategy:  {}", m.user_strategy);
    println!("Import media:   {}", m.import_media);
    println!("Auto-publish:   {}", m.auto_publish);
    if m.dry_run {
        println!("Dry run: nothing will be written");
    }
    if fresh && !m.dry_run {
        println!("The existing mapping cache will be archived");
    }

    if assume_yes {
        return Ok(Confirmation::Proceed);
    }

    print!("\nProceed? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> Confirmation {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Confirmation::Proceed,
        _ => Confirmation::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Confirmation::Proceed);
        assert_eq!(parse_answer(" YES "), Confirmation::Proceed);
        assert_eq!(parse_answer("n"), Confirmation::Abort);
        assert_eq!(parse_answer(""), Confirmation::Abort);
        assert_eq!(parse_answer("yep"), Confirmation::Abort);
    }

    #[test]
    fn test_unattended_import_writes_store_and_cache() {
        let temp = tempfile::TempDir::new().unwrap();
        let export = temp.path().join("site.xml");
        std::fs::write(
            &export,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
  <link>https://old.example.com</link>
  <item>
    <title>Only post</title>
    <wp:post_id>7</wp:post_id>
    <wp:post_date_gmt>2024-05-01 08:00:00</wp:post_date_gmt>
    <wp:status>publish</wp:status>
    <wp:post_type>post</wp:post_type>
  </item>
</channel>
</rss>
"#,
        )
        .unwrap();

        let config = Config {
            data_dir: temp.path().join("data"),
            ..Config::default()
        };
        let cache_path = config.cache_path();
        let store_dir = config.store_dir();
        let args = ImportArgs {
            file: Some(export),
            yes: true,
            quiet: true,
            no_media: true,
            ..ImportArgs::default()
        };

        let RunOutcome::Completed(stats) = run_import(config, args).unwrap() else {
            panic!("import was not completed");
        };
        assert_eq!(stats.nodes.created, 1);
        assert!(cache_path.exists());

        let fetcher = HttpFetcher::new(Default::default()).unwrap();
        let store = LocalStore::open(&store_dir, fetcher).unwrap();
        assert_eq!(store.nodes().count(), 1);
    }
}
