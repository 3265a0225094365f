use serde::{Deserialize, Serialize};

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Separator line framing the retrieved context inside a prompt.
const CONTEXT_RULE: &str = "---------------------";

/// A fully composed generation request.
///
/// Holds the instruction preamble, the retrieved chunk texts in ranked order
/// and the raw user query. Providers that distinguish system and user turns
/// send [`Prompt::instruction`] as the system turn and
/// [`Prompt::user_message`] as the user turn; others send [`Prompt::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// System preamble; may be empty.
    pub instruction: String,
    /// Retrieved chunk texts, best match first.
    pub context: Vec<String>,
    /// The user's question as typed.
    pub query: String,
}

impl Prompt {
    /// Creates a prompt from its three parts.
    pub fn new<I: Into<String>, Q: Into<String>>(instruction: I, context: Vec<String>, query: Q) -> Self {
        Self {
            instruction: instruction.into(),
            context,
            query: query.into(),
        }
    }

    /// Context block followed by the query.
    #[must_use]
    pub fn user_message(&self) -> String {
        let mut message = String::from("Context information is below.\n");
        message.push_str(CONTEXT_RULE);
        message.push('\n');
        message.push_str(&self.context.join("\n\n"));
        message.push('\n');
        message.push_str(CONTEXT_RULE);
        message.push_str(
            "\nGiven the context information and not prior knowledge, answer the query.\nQuery: ",
        );
        message.push_str(&self.query);
        message.push_str("\nAnswer: ");
        message
    }

    /// The whole prompt as a single text.
    #[must_use]
    pub fn render(&self) -> String {
        if self.instruction.trim().is_empty() {
            return self.user_message();
        }
        format!("{}\n\n{}", self.instruction.trim(), self.user_message())
    }

    /// Rough token count at four bytes per token.
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        let context_len: usize = self.context.iter().map(String::len).sum();
        (self.instruction.len() + context_len + self.query.len()) / 4
    }
}

/// Text returned by a generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Generated answer text.
    pub text: String,
    /// Token accounting for the call.
    pub tokens_used: TokenUsage,
    /// Provider label, e.g. `Groq/mixtral-8x7b-32768`.
    pub provider: String,
    /// Wall-clock time of the call.
    pub latency_ms: u64,
}

/// Token counts reported by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_orders_sections() {
        let prompt = Prompt::new(
            "You are an expert.",
            vec!["first chunk".to_owned(), "second chunk".to_owned()],
            "What is a BAN?",
        );
        let rendered = prompt.render();

        let instruction_at = rendered.find("You are an expert.").unwrap_or(usize::MAX);
        let first_at = rendered.find("first chunk").unwrap_or(usize::MAX);
        let second_at = rendered.find("second chunk").unwrap_or(usize::MAX);
        let query_at = rendered.find("Query: What is a BAN?").unwrap_or(usize::MAX);
        assert!(instruction_at < first_at);
        assert!(first_at < second_at);
        assert!(second_at < query_at);
        assert!(query_at < usize::MAX);
    }

    #[test]
    fn test_prompt_without_instruction() {
        let prompt = Prompt::new("  ", vec!["only".to_owned()], "q");
        assert!(prompt.render().starts_with("Context information is below."));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage { input: 12, output: 30 };
        assert_eq!(usage.total(), 42);
        assert_eq!(TokenUsage::default().total(), 0);
    }
}
