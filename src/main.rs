use anyhow::{bail, Context};
use clap::Parser;
use mentor_match::cli::{Cli, Commands};
use mentor_match::config::{LoggingSettings, Settings, SourceKind};
use mentor_match::core::{FairnessAdjuster, MatchingEngine};
use mentor_match::models::{MatchingConstraints, ValidationTestCase};
use mentor_match::services::{
    FeatureSource, FeatureVectorStore, Fixture, InMemorySource, ProfileServiceClient, ProfileSource,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let Cli { config, fixture, command } = Cli::parse();

    let mut settings = match &config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&settings.logging);

    if let Some(path) = fixture {
        settings.source.kind = SourceKind::Fixture;
        settings.source.fixture_path = Some(path);
    }

    let engine = build_engine(&settings)?;
    let output = run(command, &engine).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingSettings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn build_engine(settings: &Settings) -> anyhow::Result<MatchingEngine> {
    let (features, profiles): (Arc<dyn FeatureSource>, Arc<dyn ProfileSource>) = match settings.source.kind {
        SourceKind::Fixture => {
            let path = settings
                .source
                .fixture_path
                .as_deref()
                .context("A fixture path is required (--fixture or source.fixture_path)")?;
            let fixture = Fixture::load(path)
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            info!(
                "Loaded fixture {} ({} vectors, {} profiles)",
                path.display(),
                fixture.vectors.len(),
                fixture.profiles.len()
            );
            let source = Arc::new(InMemorySource::from_fixture(fixture));
            (source.clone() as Arc<dyn FeatureSource>, source as Arc<dyn ProfileSource>)
        }
        SourceKind::ProfileService => {
            let client = ProfileServiceClient::new(
                settings.source.endpoint.clone(),
                settings.source.api_key.clone(),
                settings.source.database_id.clone(),
                settings.source.collections(),
                settings.source.timeout(),
            )
            .context("Failed to build profile service client")?
            .with_page_size(settings.source.page_size);
            info!("Profile service client initialized ({})", settings.source.endpoint);
            let client = Arc::new(client);
            (client.clone() as Arc<dyn FeatureSource>, client as Arc<dyn ProfileSource>)
        }
    };

    let store = Arc::new(FeatureVectorStore::new(features, settings.cache.store_config()));
    let adjuster = FairnessAdjuster::new(settings.fairness);
    let defaults = settings.matching.defaults();

    info!("Matching engine initialized with defaults: {:?}", defaults);

    Ok(MatchingEngine::new(store, profiles, adjuster, defaults))
}

async fn run(command: Commands, engine: &MatchingEngine) -> anyhow::Result<Value> {
    let output = match command {
        Commands::FindMatches(args) => {
            let defaults = engine.defaults();
            let response = engine
                .find_matches(
                    &args.criteria(),
                    args.limit.unwrap_or(defaults.limit),
                    args.threshold.unwrap_or(defaults.threshold),
                    args.algorithm.unwrap_or(defaults.algorithm),
                )
                .await?;
            serde_json::to_value(response)?
        }
        Commands::FairMatches(args) => {
            let constraints: MatchingConstraints = match &args.constraints {
                Some(path) => read_json(path)?,
                None => MatchingConstraints::default(),
            };
            let assignments = engine.create_fair_matches(&constraints).await?;
            serde_json::to_value(assignments)?
        }
        Commands::Validate(args) => {
            let cases: Vec<ValidationTestCase> = read_json(&args.cases)?;
            let report = engine.run_validation(&cases).await?;
            info!(
                "Validation finished: {}/{} test cases passed, accuracy {}",
                report.passed_test_cases, report.total_test_cases, report.metrics.accuracy
            );
            if args.strict && report.failed_test_cases > 0 {
                println!("{}", serde_json::to_string_pretty(&report)?);
                bail!("{} of {} test cases failed", report.failed_test_cases, report.total_test_cases);
            }
            serde_json::to_value(report)?
        }
    };
    Ok(output)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
