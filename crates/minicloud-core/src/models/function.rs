use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaFunction {
    pub id: Option<i64>,
    #[serde(rename = "functionName")]
    pub function_name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    /// Execution timeout in seconds
    pub timeout: Option<i32>,
    /// Memory limit in MB
    #[serde(rename = "memoryLimit")]
    pub memory_limit: Option<i32>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<NaiveDateTime>,
}

impl LambdaFunction {
    pub fn display_runtime(&self) -> &str {
        self.runtime.as_deref().unwrap_or("unknown")
    }
}

/// Body of a create-function call.
#[derive(Debug, Clone, Serialize)]
pub struct NewFunction {
    #[serde(rename = "functionName")]
    pub function_name: String,
    pub runtime: String,
    pub code: String,
}

/// Outcome of one function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "executionId", default)]
    pub execution_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "executionTimeMs", default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl ExecutionResult {
    /// Output on success, error text otherwise
    pub fn message(&self) -> &str {
        let text = if self.success { &self.output } else { &self.error };
        text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_function_wire_names() {
        let body = NewFunction {
            function_name: "resize".to_string(),
            runtime: "python".to_string(),
            code: "def main(event): return event".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["functionName"], "resize");
        assert_eq!(value["runtime"], "python");
    }

    #[test]
    fn test_parse_function_defaults() {
        let json = r#"{"id": 3, "functionName": "resize", "runtime": "python",
                       "handler": "main", "timeout": 30, "memoryLimit": 128}"#;
        let function: LambdaFunction = serde_json::from_str(json).unwrap();
        assert_eq!(function.display_runtime(), "python");
        assert_eq!(function.memory_limit, Some(128));
        assert!(function.code.is_none());
    }

    #[test]
    fn test_parse_execution_result() {
        let json = r#"{"executionId": "e-1", "success": false, "output": null,
                       "error": "NameError: x", "executionTimeMs": 42,
                       "timestamp": "2024-05-01T10:15:30"}"#;
        let result: ExecutionResult = serde_json::from_str(json).unwrap();
        assert!(!result.success);
        assert_eq!(result.execution_time_ms, 42);
        assert_eq!(result.message(), "NameError: x");
    }
}
