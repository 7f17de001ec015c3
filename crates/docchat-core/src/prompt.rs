//! Prompt templates, passed to components at construction.
//!
//! Templates use `{placeholder}` substitution:
//!
//! | Template | Placeholders |
//! |----------|--------------|
//! | `context_template` | `{context_str}` |
//! | `rewrite_template` | `{chat_history}`, `{question}` |

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a Q&A bot. You are here to answer questions based on the context given. \
You are prohibited from using prior knowledge and you can only use the context given. \
If you need more information, please ask the user.";

pub const DEFAULT_CONTEXT_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the question.";

pub const DEFAULT_REWRITE_SYSTEM_PROMPT: &str = "You rewrite follow-up questions into standalone questions. \
Use the conversation only to resolve references such as pronouns or omitted subjects. \
Reply with the rewritten question and nothing else.";

pub const DEFAULT_REWRITE_TEMPLATE: &str = "Chat history:\n{chat_history}\n\n\
Follow-up question: {question}\n\n\
Standalone question:";

pub const DEFAULT_SQL_AGENT_PROMPT: &str = "You are an expert SQL database assistant. \
You will take the user's questions and turn them into SQL queries using the tools available.
Follow these guidelines:
1. Always start by understanding the database structure
2. Break down complex questions into step-by-step reasoning
3. Use tools to explore the database schema
4. Generate precise, efficient SQL queries
5. Handle errors gracefully
6. Provide clear explanations of your reasoning

When solving a problem:
- First, list available tables using list_tables
- Then, examine relevant table schemas using describe_table
- Generate an appropriate SQL query
- Execute the query and interpret results using execute_sql_query
- Provide a human-readable answer";

/// Immutable set of prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// System instruction for every chat completion.
    pub system: String,
    /// Wraps rendered passages; must contain `{context_str}`.
    pub context_template: String,
    /// System instruction for the query-rewrite call.
    pub rewrite_system: String,
    /// User message of the query-rewrite call.
    pub rewrite_template: String,
    /// System instruction for the SQL agent.
    pub sql_agent: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_template: DEFAULT_CONTEXT_TEMPLATE.to_string(),
            rewrite_system: DEFAULT_REWRITE_SYSTEM_PROMPT.to_string(),
            rewrite_template: DEFAULT_REWRITE_TEMPLATE.to_string(),
            sql_agent: DEFAULT_SQL_AGENT_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn render_context(&self, context_str: &str) -> String {
        self.context_template.replace("{context_str}", context_str)
    }

    /// Fill both placeholders in one pass. Substituted values are never
    /// re-scanned, so a literal `{question}` inside the history survives.
    pub fn render_rewrite(&self, chat_history: &str, question: &str) -> String {
        self.rewrite_template
            .split("{question}")
            .map(|piece| piece.replace("{chat_history}", chat_history))
            .collect::<Vec<_>>()
            .join(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_have_placeholders() {
        let p = PromptConfig::default();
        assert!(p.context_template.contains("{context_str}"));
        assert!(p.rewrite_template.contains("{chat_history}"));
        assert!(p.rewrite_template.contains("{question}"));
    }

    #[test]
    fn test_render_rewrite() {
        let p = PromptConfig {
            rewrite_template: "H={chat_history}|Q={question}".to_string(),
            ..Default::default()
        };
        assert_eq!(p.render_rewrite("user: hi", "why?"), "H=user: hi|Q=why?");
    }

    #[test]
    fn test_render_rewrite_keeps_placeholder_text_in_history() {
        let p = PromptConfig::default();
        let out = p.render_rewrite("user: what does {question} mean in a template?", "Q2");
        assert!(out.contains("user: what does {question} mean in a template?"));
        assert!(out.contains("Follow-up question: Q2"));

        let p = PromptConfig {
            rewrite_template: "{question}/{chat_history}".to_string(),
            ..Default::default()
        };
        assert_eq!(p.render_rewrite("{chat_history}", "{question}"), "{question}/{chat_history}");
    }
}
