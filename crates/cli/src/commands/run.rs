//! `loopwright run` — execute one task autonomously.

use super::{build_session, ctrl_c_cancellation, spawn_event_printer};
use loopwright_core::message::{Conversation, Message};
use loopwright_runner::prompt;

pub async fn run(task: String, max_steps: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let session = build_session(max_steps)?;
    let printer = spawn_event_printer(&session.events);

    let tool_names = session.registry.read().unwrap().snapshot().names();
    let mut conversation = Conversation::with_system(prompt::system_prompt(&tool_names));
    conversation.append(Message::user(&task));

    let step_loop = session.step_loop.with_cancellation(ctrl_c_cancellation());

    println!();
    println!("  Task: {task}");
    println!();

    let report = step_loop.run(&mut conversation).await;

    printer.abort();
    println!();
    println!("  {}", report.summary);

    // Show the model's final words, if any.
    if let Some(text) = conversation.snapshot().iter().rev().find_map(|m| match m {
        Message::ModelOutput(out) if !out.text.is_empty() => Some(out.text.clone()),
        _ => None,
    }) {
        println!();
        for line in text.lines() {
            println!("  {line}");
        }
    }
    println!();

    Ok(())
}
