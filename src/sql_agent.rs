//! SQL tools for the [`ToolAgent`].
//!
//! | Tool | Arguments | Result |
//! |------|-----------|--------|
//! | `list_tables` | none | JSON array of table names |
//! | `describe_table` | `table_name` | JSON array of `{name, type}` |
//! | `execute_sql_query` | `query` | JSON array of rows, or `"Error executing query: …"` |
//!
//! `execute_sql_query` never fails: execution errors are returned as text so
//! the model can read them and retry with a corrected statement.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use docchat_core::agent::{AgentTool, ToolAgent};
use docchat_core::llm::ChatModel;

use crate::config::SqlConfig;
use crate::sql::SqliteDatabase;

fn string_arg(params: &Value, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("missing required string argument '{}'", name))
}

pub struct ListTablesTool {
    db: Arc<SqliteDatabase>,
}

#[async_trait]
impl AgentTool for ListTablesTool {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn description(&self) -> &str {
        "List all tables in the database."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let tables = self.db.list_tables().await?;
        Ok(serde_json::to_string(&tables)?)
    }
}

pub struct DescribeTableTool {
    db: Arc<SqliteDatabase>,
}

#[async_trait]
impl AgentTool for DescribeTableTool {
    fn name(&self) -> &str {
        "describe_table"
    }

    fn description(&self) -> &str {
        "Get the schema (column names and types) for a specific table."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Name of the table to describe"
                }
            },
            "required": ["table_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let table = string_arg(&params, "table_name")?;
        let columns = self.db.describe_table(&table).await?;
        Ok(serde_json::to_string(&columns)?)
    }
}

pub struct ExecuteQueryTool {
    db: Arc<SqliteDatabase>,
}

#[async_trait]
impl AgentTool for ExecuteQueryTool {
    fn name(&self) -> &str {
        "execute_sql_query"
    }

    fn description(&self) -> &str {
        "Execute a SQL query and return results."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "SQL statement to execute"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = match string_arg(&params, "query") {
            Ok(q) => q,
            Err(e) => return Ok(format!("Error executing query: {}", e)),
        };
        match self.db.execute_query(&query).await {
            Ok(rows) => Ok(serde_json::to_string(&rows)?),
            Err(e) => Ok(format!("Error executing query: {}", e)),
        }
    }
}

/// The three SQL tools over one shared connection.
pub fn sql_tools(db: Arc<SqliteDatabase>) -> Vec<Arc<dyn AgentTool>> {
    vec![
        Arc::new(ListTablesTool { db: db.clone() }) as Arc<dyn AgentTool>,
        Arc::new(DescribeTableTool { db: db.clone() }),
        Arc::new(ExecuteQueryTool { db }),
    ]
}

pub fn build_sql_agent(
    model: Arc<dyn ChatModel>,
    db: Arc<SqliteDatabase>,
    system_prompt: &str,
    config: &SqlConfig,
) -> ToolAgent {
    ToolAgent::new(model, sql_tools(db), system_prompt)
        .with_max_iterations(config.max_iterations)
        .with_temperature(config.temperature)
}
