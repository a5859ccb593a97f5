//! Planner output parsing
//!
//! The planner is asked to answer with a JSON array such as
//! `[{"task": "查询AAPL股票价格"}, {"task": "查询AAPL股票财务数据"}]`. Anything
//! that is not exactly that shape is taken as a direct answer to the user.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of work handed to the executor agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    /// Natural-language task description
    pub task: String,
}

impl SubTask {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }
}

/// Result of reading the planner's final message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A non-empty, ordered list of sub-tasks
    SubTasks(Vec<SubTask>),
    /// The planner answered the question itself; holds its text verbatim
    DirectAnswer(String),
}

impl ParseOutcome {
    /// Whether the planner produced sub-tasks
    pub fn is_plan(&self) -> bool {
        matches!(self, Self::SubTasks(_))
    }
}

/// Parse the planner's final message text.
///
/// The text is accepted as a plan when it is a JSON array with at least one
/// element and every element is an object whose `task` is a non-blank string.
/// Extra keys are ignored and surrounding whitespace is trimmed. Everything
/// else, including an empty array or a Markdown code fence, becomes
/// [`ParseOutcome::DirectAnswer`] with the original text.
///
/// The function is pure: the same input always gives the same outcome.
pub fn parse_plan(text: &str) -> ParseOutcome {
    match sub_tasks(text.trim()) {
        Some(tasks) => ParseOutcome::SubTasks(tasks),
        None => ParseOutcome::DirectAnswer(text.to_string()),
    }
}

fn sub_tasks(candidate: &str) -> Option<Vec<SubTask>> {
    let Value::Array(items) = serde_json::from_str::<Value>(candidate).ok()? else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| {
            item.as_object()?
                .get("task")?
                .as_str()
                .filter(|task| !task.trim().is_empty())
                .map(SubTask::new)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(names: &[&str]) -> ParseOutcome {
        ParseOutcome::SubTasks(names.iter().map(|n| SubTask::new(*n)).collect())
    }

    #[test]
    fn test_valid_plan() {
        let outcome = parse_plan(r#"[{"task": "查询AAPL股票价格"},{"task": "查询AAPL股票财务数据"}]"#);
        assert_eq!(outcome, tasks(&["查询AAPL股票价格", "查询AAPL股票财务数据"]));
        assert!(outcome.is_plan());
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let outcome = parse_plan(r#"[{"task": "A", "priority": 1}]"#);
        assert_eq!(outcome, tasks(&["A"]));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_plan("\n  [{\"task\": \"A\"}]  \n"), tasks(&["A"]));
    }

    #[test]
    fn test_code_fence_is_direct_answer() {
        for text in [
            "```json\n[{\"task\": \"A\"}, {\"task\": \"B\"}]\n```",
            "```\n[{\"task\": \"A\"}]\n```",
            "```[{\"task\": \"A\"}]```",
        ] {
            assert_eq!(parse_plan(text), ParseOutcome::DirectAnswer(text.to_string()));
        }
    }

    #[test]
    fn test_prose_is_direct_answer() {
        let text = "抱歉，我不太理解您的问题";
        assert_eq!(parse_plan(text), ParseOutcome::DirectAnswer(text.to_string()));
    }

    #[test]
    fn test_prose_around_json_is_direct_answer() {
        let text = "好的，子任务如下：[{\"task\": \"A\"}]";
        assert_eq!(parse_plan(text), ParseOutcome::DirectAnswer(text.to_string()));
    }

    #[test]
    fn test_wrong_shapes_are_direct_answers() {
        for text in [
            "[]",
            "{\"task\": \"A\"}",
            "[\"A\", \"B\"]",
            "[{\"name\": \"A\"}]",
            "[{\"task\": \"\"}]",
            "[{\"task\": \"   \"}]",
            "[{\"task\": 42}]",
            "[{\"task\": \"A\"}, 3]",
            "\"just a string\"",
            "",
        ] {
            assert_eq!(
                parse_plan(text),
                ParseOutcome::DirectAnswer(text.to_string()),
                "input: {text:?}"
            );
        }
    }

    #[test]
    fn test_direct_answer_keeps_original_text() {
        let text = "  直接回答  ";
        assert_eq!(parse_plan(text), ParseOutcome::DirectAnswer(text.to_string()));
    }

    #[test]
    fn test_parse_is_idempotent() {
        for text in ["[{\"task\": \"A\"}]", "抱歉", "[]", "```json\n[{\"task\": \"B\"}]\n```"] {
            assert_eq!(parse_plan(text), parse_plan(text));
        }
    }
}
