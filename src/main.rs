use clap::Parser;
use user_processing_etl::core::schedule::{run_scheduled, DailySchedule, RunMarker};
use user_processing_etl::utils::error::ErrorSeverity;
use user_processing_etl::utils::{logger, validation::Validate};
use user_processing_etl::{
    CliConfig, Connections, EtlEngine, LocalStorage, PgUserStore, PipelineConfig, RunContext,
    StepId, UserPipeline,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 日誌格式取決於設定檔，先讀設定再初始化
    let loaded = args.load_pipeline_config();
    let json_logs = args.json_logs
        || loaded
            .as_ref()
            .map(|c| c.monitoring.log_format == "json")
            .unwrap_or(false);
    if json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }
    if args.uses_builtin_defaults() {
        tracing::warn!(
            "⚠️ Config file '{}' not found, using built-in defaults",
            args.config
        );
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    tracing::info!("🚀 Starting DAG '{}'", config.dag.dag_id);
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let connections = Connections::from_config(&config);

    if args.dry_run {
        display_plan(&config, &connections, &args);
        return Ok(());
    }

    let monitor_enabled = args.monitor || config.monitoring.enabled;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.staging.directory.clone());
    let store = PgUserStore::new(
        connections.clone(),
        config.load.connection.clone(),
        config.load.table.clone(),
    );
    let schedule = DailySchedule::from_config(&config.dag);
    let marker = RunMarker::new(
        LocalStorage::new(config.staging.directory.clone()),
        &config.dag.dag_id,
    );
    let pipeline = UserPipeline::new(storage, store, connections, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    if args.schedule {
        tracing::info!(
            "📅 Scheduling '{}' @daily from {} (catchup: {})",
            engine.pipeline().config().dag.dag_id,
            schedule.start().date_naive(),
            engine.pipeline().config().dag.catchup
        );
        tracing::info!("📌 Schedule state: {}", marker.location().display());
        tokio::select! {
            _ = run_scheduled(&engine, &schedule, &marker) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Interrupted, stopping scheduler");
            }
        }
        return Ok(());
    }

    let mut run = RunContext::manual(chrono::Utc::now());
    if let Some(run_id) = &args.run_id {
        run = run.with_run_id(run_id.clone());
    }

    let (report, result) = engine.run_with_report(&run).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    match result {
        Ok(()) => {
            println!("✅ Run {} completed successfully!", report.run_id);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

fn display_plan(config: &PipelineConfig, connections: &Connections, args: &CliConfig) {
    println!("🔍 DRY RUN - no step will be executed");
    println!("DAG: {}", config.dag.dag_id);
    println!(
        "Schedule: {} from {} (catchup: {})",
        config.dag.schedule, config.dag.start_date, config.dag.catchup
    );
    println!("Tags: {}", config.dag.tags.join(", "));
    println!();

    let run = match &args.run_id {
        Some(run_id) => RunContext::manual(chrono::Utc::now()).with_run_id(run_id.clone()),
        None => RunContext::manual(chrono::Utc::now()),
    };
    let staging_key = user_processing_etl::core::transform::render_staging_key(
        &config.staging.filename_template,
        &run,
        &config.dag.dag_id,
    );

    for (index, step) in StepId::CHAIN.iter().enumerate() {
        let detail = match step {
            StepId::CreateTable => format!(
                "{} -> table '{}'",
                connections.describe(&config.load.connection),
                config.load.table
            ),
            StepId::IsApiAvailable => format!(
                "GET {}{} every {}s, timeout {}s",
                connections.describe(&config.probe.connection),
                config.probe.endpoint,
                config.probe.poke_interval_seconds,
                config.probe.timeout_seconds
            ),
            StepId::ExtractUser => format!(
                "GET {}{}",
                connections.describe(&config.fetch.connection),
                config.fetch.endpoint
            ),
            StepId::ProcessUser => format!("{}/{}", config.staging.directory, staging_key),
            StepId::StoreUser => format!(
                "COPY {} FROM {}/{}",
                config.load.table, config.staging.directory, staging_key
            ),
        };
        println!("  {}. {:<17} {} ({})", index + 1, step.as_str(), step.description(), detail);
    }
}
