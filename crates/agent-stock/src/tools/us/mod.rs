//! US market tools backed by Yahoo Finance

mod financials;
mod historical;
mod info;
mod news;
mod technical;

pub use financials::FinancialStatementsTool;
pub use historical::HistoricalDataTool;
pub use info::StockInfoTool;
pub use news::NewsTool;
pub use technical::TechnicalIndicatorsTool;
