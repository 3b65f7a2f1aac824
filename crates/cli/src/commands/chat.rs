//! `loopwright chat` — interactive mode. Each user message starts one
//! bounded run over the same growing conversation.

use super::{build_session, spawn_event_printer};
use loopwright_core::message::{Conversation, Message};
use loopwright_runner::prompt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let session = build_session(None)?;
    let printer = spawn_event_printer(&session.events);

    let tool_names = session.registry.read().unwrap().snapshot().names();

    println!();
    println!("  LoopWright — Interactive Mode");
    println!();
    println!("  Tools: {}", tool_names.join(", "));
    println!("  Type your task and press Enter. Type 'exit' to quit.");
    println!();

    let mut conversation = Conversation::with_system(prompt::system_prompt(&tool_names));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        conversation.append(Message::user(input));
        let report = session.step_loop.run(&mut conversation).await;

        println!();
        if let Some(text) = conversation.snapshot().iter().rev().find_map(|m| match m {
            Message::ModelOutput(out) if !out.text.is_empty() => Some(out.text.clone()),
            _ => None,
        }) {
            for line in text.lines() {
                println!("  Assistant > {line}");
            }
        }
        println!("  ({})", report.summary);
        println!();

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    printer.abort();
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
