//! Prompt construction for unit analysis

use crate::review::{ContextMetadata, WHOLE_CHANGE_UNIT};

/// System prompt sent with every request
pub const SYSTEM_PROMPT: &str = "You are a meticulous senior code reviewer. \
Review only the changes you are shown. Report concrete problems with line references. \
Answer with a single JSON object and nothing else.";

/// Build the user prompt for one unit
pub fn build_prompt(unit_id: &str, content: &str, metadata: &ContextMetadata) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Code Review Request\n\n");

    if !metadata.title.is_empty() {
        prompt.push_str("## Pull Request\n\n");
        prompt.push_str(&format!("- Title: {}\n", metadata.title));
        if !metadata.author.is_empty() {
            prompt.push_str(&format!("- Author: {}\n", metadata.author));
        }
        if !metadata.base_branch.is_empty() {
            prompt.push_str(&format!(
                "- Merging `{}` into `{}`\n",
                metadata.head_branch, metadata.base_branch
            ));
        }
        prompt.push('\n');
    }

    if unit_id == WHOLE_CHANGE_UNIT {
        prompt.push_str("## Changes to Review\n\nThe complete diff of the pull request:\n\n");
    } else {
        prompt.push_str(&format!(
            "## Changes to Review\n\nThe patch for `{}` only. Other files are reviewed separately.\n\n",
            unit_id
        ));
    }
    prompt.push_str("```diff\n");
    prompt.push_str(content);
    prompt.push_str("\n```\n\n");

    prompt.push_str("## Focus Areas\n\n");
    for area in [
        "Correctness of implementation",
        "Security considerations",
        "Performance implications",
        "Code quality and readability",
    ] {
        prompt.push_str(&format!("- {}\n", area));
    }
    prompt.push('\n');

    prompt.push_str("## Expected Output Format\n\n");
    prompt.push_str("```json\n");
    prompt.push_str("{\n");
    prompt.push_str("  \"verdict\": \"approve\" | \"request_changes\" | \"comment\",\n");
    prompt.push_str("  \"summary\": \"one paragraph overview\",\n");
    prompt.push_str("  \"issues\": [\n");
    prompt.push_str("    {\n");
    prompt.push_str("      \"severity\": \"critical\" | \"high\" | \"medium\" | \"low\" | \"info\",\n");
    prompt.push_str("      \"category\": \"security\" | \"bug\" | \"performance\" | \"maintainability\" | \"style\" | \"testing\" | \"documentation\" | \"other\",\n");
    prompt.push_str("      \"message\": \"what is wrong and how to fix it\",\n");
    prompt.push_str("      \"line\": 42\n");
    prompt.push_str("    }\n");
    prompt.push_str("  ]\n");
    prompt.push_str("}\n");
    prompt.push_str("```\n");

    prompt
}
