//! Prompt construction for test generation.

use std::fmt::Write;

use covboost_core::GenerationRequest;

use crate::client::{ChatMessage, Role};

pub const SYSTEM_PROMPT: &str =
    "You are an expert Rust developer who writes high-quality, comprehensive unit tests.";

/// The user message for `request`.
pub fn build_user_prompt(request: &GenerationRequest) -> String {
    let cov = &request.coverage;
    let mut prompt = String::new();

    // Writing to a String cannot fail.
    let _ = write!(
        prompt,
        "I have a Rust source file that currently has {:.2}% line coverage \
         ({}/{} lines covered, {}/{} functions covered).\n\n\
         File path: {}\n\n\
         Here is the file content:\n\n```rust\n{}\n```\n\n",
        request.coverage_percent,
        cov.lines_covered,
        cov.lines_total,
        cov.functions_covered,
        cov.functions_total,
        request.target_path.display(),
        request.content.trim_end(),
    );

    if !request.siblings.is_empty() {
        prompt.push_str("Related files from the same module, for context only:\n\n");
        for sibling in &request.siblings {
            let _ = write!(
                prompt,
                "`{}`{}:\n```rust\n{}\n```\n\n",
                sibling.path.display(),
                if sibling.truncated { " (truncated)" } else { "" },
                sibling.content.trim_end(),
            );
        }
    }

    prompt.push_str(
        "Write unit tests for this file:\n\
         1. Focus on the functions and branches that are currently uncovered.\n\
         2. Cover normal cases, edge cases, boundary conditions and error paths.\n\
         3. Keep tests self-contained; do not add dependencies.\n\
         4. Follow the style already used in the file and use descriptive test names.\n\
         5. The code is placed inside the file's existing `#[cfg(test)] mod tests` \
         module (or a new one with `use super::*;`), so do not repeat the module wrapper \
         or the file content.\n\n\
         Reply with only the test code in a single fenced block:\n\
         ```rust\n// test code\n```\n",
    );
    prompt
}

pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: build_user_prompt(request),
        },
    ]
}
