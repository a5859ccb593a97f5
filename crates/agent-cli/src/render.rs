//! Terminal rendering of snapshots and tool lists

use agent_llm::{ContentBlock, Message, MessageContent, Role};
use agent_tools::Tool;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use std::sync::Arc;

const PREVIEW_CHARS: usize = 80;

/// Tracks how much of a cumulative snapshot has been shown.
///
/// The last message of a snapshot may still be replaced by the next one, so
/// only messages that have been followed by another are reported.
#[derive(Debug, Default)]
pub struct Progress {
    shown: usize,
}

impl Progress {
    /// Progress lines for the part of `snapshot` not reported yet
    pub fn advance(&mut self, snapshot: &[Message]) -> Vec<String> {
        let settled = snapshot.len().saturating_sub(1);
        if settled <= self.shown {
            return Vec::new();
        }
        let lines = snapshot[self.shown..settled].iter().filter_map(describe).collect();
        self.shown = settled;
        lines
    }
}

/// One-line summary of a message, `None` for messages not worth showing
fn describe(message: &Message) -> Option<String> {
    if let Some(MessageContent::Blocks(blocks)) = &message.content {
        let calls: Vec<&str> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        if !calls.is_empty() {
            return Some(format!("🔧 调用工具: {}", calls.join(", ")));
        }
    }

    let text = message.full_text();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let label = match message.role {
        Role::Assistant => "💬 回复",
        Role::Tool => "📊 工具结果",
        Role::User | Role::System => return None,
    };
    Some(format!("{label}: {}", preview(text)))
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}

/// Table of tool names and descriptions
pub fn tool_table(tools: &[Arc<dyn Tool>]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["工具", "说明"]);
    for tool in tools {
        table.add_row(vec![tool.name(), tool.description()]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_holds_back_last_message() {
        let mut progress = Progress::default();
        let first = vec![Message::assistant("计划")];
        assert!(progress.advance(&first).is_empty());

        let second = vec![
            Message::assistant("计划"),
            Message::tool_result("call_1", "{\"currentPrice\": 190.0}"),
            Message::assistant("AAPL 收盘价 190 美元"),
        ];
        let lines = progress.advance(&second);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("💬 回复: 计划"));
        assert!(lines[1].starts_with("📊 工具结果: {"));

        assert!(progress.advance(&second).is_empty());
    }

    #[test]
    fn test_tool_calls_are_named() {
        let message = Message::from_blocks(
            Role::Assistant,
            vec![ContentBlock::ToolUse {
                id: "1".into(),
                name: "get_stock_info".into(),
                input: serde_json::json!({"ticker": "AAPL"}),
            }],
        );
        assert_eq!(describe(&message).as_deref(), Some("🔧 调用工具: get_stock_info"));
        assert!(describe(&Message::user("查询AAPL股票价格")).is_none());
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "数".repeat(200);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("a\n  b"), "a b");
    }
}
