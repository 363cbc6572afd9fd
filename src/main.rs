// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! Demo CLI for the courier agent execution core: wires a model provider,
//! a small builtin tool registry, and an `Executor` together, streams the
//! resulting events to stdout, and supports pausing on human-in-the-loop
//! interrupts and resuming them across process runs via a checkpointer.
mod cli;

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use courier_core::{
    Agent, Answer, Executor, ExecutorConfig, ExecutorInput, InMemoryCheckpointer,
    SharedCheckpointer, SqliteCheckpointer, TracingEventBus,
};
use courier_model::ModelProvider;
use courier_tools::{AskQuestionTool, CalcTool, ExecutorEvent, SearchTool, ToolRegistry};

use cli::{Cli, Commands};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("courier={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn build_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(SearchTool::new());
    registry.register(CalcTool);
    registry.register(AskQuestionTool);
    Arc::new(registry)
}

fn build_agent(tools: Arc<ToolRegistry>) -> Arc<Agent> {
    Arc::new(
        Agent::new(
            "assistant",
            "General-purpose assistant with search, calculator, and clarifying-question tools",
            tools,
        )
        .with_system_prompt(|| {
            "You are a careful assistant. Use tools when they help, and ask the user \
             a clarifying question through ask_user_question when a request is ambiguous."
                .to_string()
        }),
    )
}

fn build_checkpointer(path: Option<&std::path::Path>) -> anyhow::Result<SharedCheckpointer> {
    match path {
        Some(p) => {
            let cp = SqliteCheckpointer::new(p)?;
            Ok(Arc::new(cp) as SharedCheckpointer)
        }
        None => Ok(Arc::new(InMemoryCheckpointer::new()) as SharedCheckpointer),
    }
}

fn resolve_provider(
    config: &courier_config::Config,
    model_override: Option<&str>,
) -> anyhow::Result<Box<dyn ModelProvider>> {
    let cfg = match model_override {
        Some(spec) => courier_model::resolve_model_from_config(config, spec),
        None => config.model.clone(),
    };
    courier_model::from_config(&cfg)
}

async fn drain(mut seq: courier_core::LazySequence<ExecutorEvent>) -> anyhow::Result<()> {
    loop {
        match seq.next().await {
            Ok(event) => match event {
                ExecutorEvent::Content { delta, .. } => {
                    print!("{delta}");
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                }
                ExecutorEvent::Thinking { .. } => {}
                ExecutorEvent::ToolStart { name, call_id, .. } => {
                    eprintln!("\n[tool:start] {name} ({call_id})");
                }
                ExecutorEvent::ToolEnd { name, call_id, output, .. } => {
                    eprintln!("[tool:end] {name} ({call_id}) ok={}", !output.is_error);
                }
                ExecutorEvent::Interrupt(interrupt) => {
                    println!();
                    println!("--- paused for input ---");
                    for q in &interrupt.questions {
                        println!("{}: {}", q.header, q.question);
                        for opt in &q.options {
                            println!("  [{}] {} - {}", opt.id, opt.label, opt.description);
                        }
                    }
                    if let Some(id) = &interrupt.checkpoint_id {
                        println!(
                            "resume with: courier --resume {id} --answer <question_id>=<answer>"
                        );
                    }
                    seq.close();
                    return Ok(());
                }
                ExecutorEvent::Done { finish_reason, usage, .. } => {
                    println!();
                    eprintln!(
                        "[done] reason={finish_reason} input_tokens={} output_tokens={}",
                        usage.input_tokens, usage.output_tokens
                    );
                }
                ExecutorEvent::Error { message, kind } => {
                    seq.close();
                    anyhow::bail!("execution failed ({kind}): {message}");
                }
            },
            Err(courier_core::SequenceError::Done) => break,
            Err(courier_core::SequenceError::Closed) => break,
            Err(courier_core::SequenceError::Other(e)) => {
                seq.close();
                return Err(e);
            }
        }
    }
    seq.close();
    Ok(())
}

fn print_list_providers(verbose: bool, json: bool) -> anyhow::Result<()> {
    let drivers = courier_model::list_drivers();
    if json {
        let out: Vec<_> = drivers
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "description": d.description,
                    "requires_api_key": d.requires_api_key,
                    "default_api_key_env": d.default_api_key_env,
                    "default_base_url": d.default_base_url,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for d in drivers {
        if verbose {
            println!("{} ({})", d.name, d.id);
            println!("  {}", d.description);
            println!("  requires_api_key: {}", d.requires_api_key);
            if let Some(env) = d.default_api_key_env {
                println!("  api_key_env: {env}");
            }
            if let Some(url) = d.default_base_url {
                println!("  base_url: {url}");
            }
        } else {
            println!("{:<14} {}", d.id, d.description);
        }
    }
    Ok(())
}

fn print_list_models(provider: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut models = courier_model::catalog::static_catalog();
    if let Some(p) = provider {
        models.retain(|m| m.provider == p);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }
    for m in &models {
        println!(
            "{:<10} {:<24} ctx={:<8} out={}",
            m.provider, m.id, m.context_window, m.max_output_tokens
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(command) = &cli.command {
        return match command {
            Commands::ListModels { provider, json } => print_list_models(provider.as_deref(), *json),
            Commands::ListProviders { verbose, json } => print_list_providers(*verbose, *json),
            Commands::ShowConfig => {
                let config = courier_config::load(cli.config.as_deref())?;
                println!("{}", serde_yaml::to_string(&config)?);
                Ok(())
            }
        };
    }

    let config = courier_config::load(cli.config.as_deref())?;
    let provider = resolve_provider(&config, cli.model.as_deref())?;
    let tools = build_registry();
    let agent = build_agent(tools);
    let checkpointer = build_checkpointer(cli.checkpoint_db.as_deref())?;

    let executor = Executor::new(
        agent,
        Arc::from(provider),
        ExecutorConfig {
            checkpointer: Some(checkpointer),
            event_bus: Arc::new(TracingEventBus),
            max_iterations: cli.max_iterations,
            ..ExecutorConfig::default()
        },
    );

    if let Some(checkpoint_id) = &cli.resume {
        let mut answers = HashMap::new();
        for spec in &cli.answers {
            let (id, value) = cli::parse_answer(spec)?;
            answers.insert(id, Answer { value });
        }
        let seq = executor.resume(cli.tenant.clone(), checkpoint_id.clone(), answers).await?;
        return drain(seq).await;
    }

    let prompt = cli
        .prompt
        .ok_or_else(|| anyhow::anyhow!("a prompt is required unless --resume or a subcommand is given"))?;

    let input = ExecutorInput {
        messages: vec![courier_model::Message::user(prompt)],
        session_id: uuid::Uuid::new_v4().to_string(),
        tenant_id: cli.tenant,
        thread_id: None,
        trace_id: None,
        provider_continuity_token: None,
        is_resume: false,
    };
    drain(executor.execute(input)).await
}
