//! `streambot chat` — single-message or interactive streaming chat.

use std::io::Write;
use std::sync::Arc;
use streambot_agent::{Engine, EngineError, EngineSettings, RequestSummary};
use streambot_channels::{CliSink, render_frames, spawn_stdin_reader};
use streambot_config::AppConfig;
use streambot_core::usage::{NoopUsageSink, UsageSink};
use streambot_providers::build_from_config;
use streambot_telemetry::MetricsRegistry;
use tracing::debug;

pub async fn run(message: Option<String>, user: String, show_metrics: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let router = match build_from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            print_setup_help(&config);
            return Err(format!("Provider setup failed: {e}").into());
        }
    };
    let provider = router.default_provider().ok_or("No default provider configured")?;
    let history = super::open_history(&config).await?;
    let tools = Arc::new(streambot_tools::default_registry());

    let metrics = Arc::new(MetricsRegistry::new());
    let usage: Arc<dyn UsageSink> = if config.telemetry.enabled {
        metrics.clone()
    } else {
        Arc::new(NoopUsageSink)
    };

    let engine = Engine::new(
        provider,
        history,
        tools,
        Arc::clone(&usage),
        EngineSettings::from_config(&config),
    );
    let sink = CliSink::stdout();

    if let Some(msg) = message {
        // Single message mode
        let summary = ask(&engine, &sink, usage.as_ref(), &user, &msg).await?;
        debug!(tokens = summary.token_count, iterations = summary.iterations, "Answered");
    } else {
        // Interactive mode
        println!();
        println!("  StreamBot — Interactive Mode");
        println!();
        println!("  Provider:  {}", config.provider);
        println!("  Model:     {}", config.model);
        println!("  User:      {user}");
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit' or Ctrl+D to quit.");
        println!();

        let mut prompts = spawn_stdin_reader();
        prompt_marker()?;

        while let Some(line) = prompts.recv().await {
            match line {
                Ok(prompt) => {
                    println!();
                    if let Err(e) = ask(&engine, &sink, usage.as_ref(), &user, &prompt).await {
                        eprintln!("  [Error] {e}");
                    }
                    println!();
                    prompt_marker()?;
                }
                Err(e) => {
                    eprintln!("  [Input Error] {e}");
                    break;
                }
            }
        }

        println!();
        println!("  Goodbye!");
        println!();
    }

    if show_metrics {
        println!();
        print!("{}", metrics.render_prometheus());
    }

    Ok(())
}

/// Run one request, streaming its frames to the terminal.
async fn ask(
    engine: &Engine,
    sink: &CliSink,
    usage: &dyn UsageSink,
    user: &str,
    prompt: &str,
) -> Result<RequestSummary, EngineError> {
    usage.record_app_request("cli");
    let handle = engine.run_request(user, prompt)?;

    render_frames(handle.frames, sink).await;
    if let Err(e) = sink.end_answer() {
        debug!(error = %e, "Failed to finish terminal output");
    }

    match handle.completion.await {
        Ok(result) => result,
        Err(e) => Err(EngineError::TaskFailed(e.to_string())),
    }
}

fn prompt_marker() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_setup_help(config: &AppConfig) {
    eprintln!();
    eprintln!("  Provider '{}' could not be set up.", config.provider);
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    STREAMBOT_API_KEY    (any provider)");
    eprintln!("    DEEPSEEK_API_KEY     (deepseek, the default)");
    eprintln!("    OPENAI_API_KEY       (openai)");
    eprintln!("    OPENROUTER_API_KEY   (openrouter)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}
