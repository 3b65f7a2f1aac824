//! The default task system prompt.

/// Build the system prompt for a run, listing the tools available at start.
pub fn system_prompt(tool_names: &[String]) -> String {
    format!(
        "You are an autonomous task runner with access to tools.\n\
         \n\
         TOOLS YOU HAVE: {tools}\n\
         \n\
         YOUR WORKFLOW:\n\
         1. Understand the task\n\
         2. Choose which tools to use\n\
         3. Call the tools in the right order, one step at a time\n\
         4. Analyze each result before deciding the next action\n\
         5. When the task is done, call task_complete with a summary\n\
         \n\
         RULES:\n\
         - Always use tools to verify facts - never guess\n\
         - Invoke tools through the tools interface only. Do NOT write tool \
         calls as plain text, JSON, or XML in your reply - text like that \
         executes nothing\n\
         - Never create a tool that duplicates an existing capability\n\
         - After updating a tool, test it before updating it again\n\
         - Fix files in place instead of writing 'fixed_' copies\n\
         - When a tool errors, read the error message and address the actual \
         cause",
        tools = tool_names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_tools() {
        let prompt = system_prompt(&["read_file".into(), "task_complete".into()]);
        assert!(prompt.contains("read_file, task_complete"));
        assert!(prompt.contains("Do NOT write tool calls as plain text"));
    }
}
