//! China A-share tools backed by East Money

mod financials;
mod historical;
mod info;
mod news;
mod technical;

pub use financials::ZhFinancialStatementsTool;
pub use historical::ZhHistoricalDataTool;
pub use info::ZhStockInfoTool;
pub use news::ZhNewsTool;
pub use technical::ZhTechnicalIndicatorsTool;

use serde_json::json;

/// Source name reported by the A-share tools
const DATA_SOURCE: &str = "东方财富";

/// Schema of the `code` parameter shared by every A-share tool
fn code_property() -> serde_json::Value {
    json!({"type": "string", "description": "股票代码，如000001或000001.SZ"})
}
