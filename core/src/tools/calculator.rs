use crate::tools::extract_f64_arg;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;

pub struct SquareRootTool;

#[async_trait]
impl Tool for SquareRootTool {
    fn name(&self) -> &str {
        "square_root"
    }

    fn description(&self) -> &str {
        "Calculate the square root of a number"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "number": {
                    "type": "number",
                    "description": "Non-negative number to take the square root of"
                }
            },
            "required": ["number"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let number = extract_f64_arg(&args, "number")?;

        if number < 0.0 {
            return Ok(ToolResult::error(format!(
                "Cannot take the square root of negative number {}",
                number
            )));
        }

        Ok(ToolResult::success(number.sqrt().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn large_integer_argument() {
        let result = SquareRootTool
            .execute(json!({ "number": 485906798473894056u64 }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("697070153.19399"));
    }

    #[tokio::test]
    async fn negative_number_is_reported() {
        let result = SquareRootTool
            .execute(json!({ "number": -1 }))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
