//! System prompts of the planner and executor agents
//!
//! Both prompts carry today's date so that relative periods ("近一个月")
//! resolve correctly.

use chrono::NaiveDate;
use minijinja::{Environment, context};

use crate::error::Result;

const PLANNER_TEMPLATE: &str = r#"你是一AI助手，专注于任务拆解。请将我的问题拆解成多个子任务，不要直接调用方法，并以json格式返回给我。或者，当用户输入包含“请帮我汇总”等关键词时，对用户提供的信息进行总结，并以友好的方式输出。
json格式示例：
[
    {
        "task": "查询AAPL股票价格"
    },
    {
        "task": "查询AAPL股票财务数据"
    }
]
今天的日期是: {{ date }}
"#;

const EXECUTOR_TEMPLATE: &str = "你是一个股票分析助手，请调用工具查询但尽量少调用，根据数据事实整理总结，并返回结果，结果尽量简洁，不超过500字。今天的日期是: {{ date }}";

/// Renders the agent system prompts
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    /// Load the templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)?;
        env.add_template("executor", EXECUTOR_TEMPLATE)?;
        Ok(Self { env })
    }

    /// System prompt of the task-splitting planner
    pub fn planner(&self, date: NaiveDate) -> Result<String> {
        self.render("planner", date)
    }

    /// System prompt of the sub-task executor
    pub fn executor(&self, date: NaiveDate) -> Result<String> {
        self.render("executor", date)
    }

    fn render(&self, name: &str, date: NaiveDate) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(context! { date => date.format("%Y-%m-%d").to_string() })?)
    }
}
