//! Boundary to the external completion service that drafts answers

use serde::{Deserialize, Serialize};

/// What the completion service receives for a matched query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Display name of the matched topic
    pub topic: String,
    /// Body of the matched topic document
    pub context: String,
    /// The user's original question
    pub query: String,
}

/// Drafts a narrative answer from a topic body and a question.
///
/// Implementations own their timeout and retry policy.
pub trait CompletionService: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

/// Offline completion that quotes the start of the topic body
#[derive(Debug, Clone)]
pub struct ExcerptCompletion {
    lines: usize,
}

impl Default for ExcerptCompletion {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ExcerptCompletion {
    pub fn new(lines: usize) -> Self {
        Self {
            lines: lines.max(1),
        }
    }
}

impl CompletionService for ExcerptCompletion {
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let excerpt: Vec<&str> = request
            .context
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .take(self.lines)
            .collect();

        if excerpt.is_empty() {
            anyhow::bail!("topic '{}' has no body text to quote", request.topic);
        }

        Ok(format!("{}\n\n{}", request.topic, excerpt.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(context: &str) -> CompletionRequest {
        CompletionRequest {
            topic: "餐饮选项".to_string(),
            context: context.to_string(),
            query: "食堂几点开门".to_string(),
        }
    }

    #[test]
    fn test_excerpt_takes_leading_lines() {
        let completion = ExcerptCompletion::new(2);
        let text = completion
            .complete(&request("一食堂 7:00 开门\n\n二食堂 6:30 开门\n清真食堂在北区"))
            .unwrap();

        assert_eq!(text, "餐饮选项\n\n一食堂 7:00 开门\n二食堂 6:30 开门");
    }

    #[test]
    fn test_empty_body_fails() {
        assert!(ExcerptCompletion::default().complete(&request(" \n ")).is_err());
    }
}
