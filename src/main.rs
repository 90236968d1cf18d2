//! Hive - Rust 多智能体监督系统
//!
//! 入口：初始化日志与配置，构建 SupervisorSystem，运行终端交互循环（quit/exit 退出，new 开启新对话）。

use std::io::Write;

use anyhow::Context;
use hive::config::{load_config, AppConfig};
use hive::{SupervisorSystem, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn prompt(text: &str) -> anyhow::Result<()> {
    print!("{}", text);
    std::io::stdout().flush().context("Failed to flush stdout")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    tracing::info!("Model: {}", cfg.llm.model);
    tracing::info!("Confluence MCP: {}", cfg.capabilities.documents.url);
    tracing::info!("Obsidian MCP: {}", cfg.capabilities.notes.url);
    tracing::info!(
        "Human-in-the-loop: {}",
        if cfg.supervisor.enable_human_approval { "Enabled" } else { "Disabled" }
    );

    let system = SupervisorSystem::new(cfg);
    system
        .initialize()
        .await
        .context("Failed to initialize supervisor system")?;
    tracing::info!("System ready! Commands: 'quit'/'exit' - exit, 'new' - new dialog");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut thread_id = new_thread_id();

    loop {
        prompt("\nYou: ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" => {
                tracing::info!("Goodbye!");
                break;
            }
            "new" => {
                thread_id = new_thread_id();
                tracing::info!("New dialog started: {}", &thread_id[..8]);
                continue;
            }
            _ => {}
        }

        let mut result = system.run(input, &thread_id).await;
        while let Ok(TurnOutcome::PendingApproval { actions }) = &result {
            println!("\nProposed actions:");
            for action in actions {
                println!("  - {} {}", action.name, action.args);
            }
            prompt("Approve? [y/N]: ")?;
            let answer = lines.next_line().await?.unwrap_or_default();
            let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
            result = system.resume(&thread_id, approved).await;
        }

        match result {
            Ok(outcome) => println!("\nAssistant: {}", outcome.content()),
            Err(e) => {
                tracing::error!("Error processing request: {}", e);
                println!("\nError: {}", e);
            }
        }
    }

    Ok(())
}
