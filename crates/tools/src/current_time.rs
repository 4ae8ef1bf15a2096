//! Current time tool — tells the model what "now" is.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::Value;
use streambot_core::error::ToolError;
use streambot_core::tool::{Tool, ToolArguments};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time. Optionally pass a UTC offset in hours \
         (e.g. 8 for Beijing, -5 for New York) to get local time."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "utc_offset_hours": {
                    "type": "number",
                    "description": "Offset from UTC in hours, between -12 and 14. Defaults to 0."
                }
            }
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let offset_hours = match arguments.get("utc_offset_hours") {
            None | Some(Value::Null) => 0.0,
            Some(v) => v.as_f64().ok_or_else(|| {
                ToolError::InvalidArguments("utc_offset_hours must be a number".into())
            })?,
        };

        if !(-12.0..=14.0).contains(&offset_hours) {
            return Err(ToolError::InvalidArguments(format!(
                "utc_offset_hours out of range: {offset_hours}"
            )));
        }

        let offset_secs = (offset_hours * 3600.0).round() as i32;
        let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            ToolError::InvalidArguments(format!("invalid utc offset: {offset_hours}"))
        })?;

        let now = Utc::now().with_timezone(&offset);
        Ok(format!("{} ({})", now.to_rfc3339(), now.format("%A")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn defaults_to_utc() {
        let out = CurrentTimeTool.execute(ToolArguments::new()).await.unwrap();
        let (stamp, _) = out.split_once(' ').unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[tokio::test]
    async fn applies_offset() {
        let out = CurrentTimeTool
            .execute(args(serde_json::json!({"utc_offset_hours": 8})))
            .await
            .unwrap();
        let (stamp, _) = out.split_once(' ').unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 8 * 3600);
    }

    #[tokio::test]
    async fn rejects_bad_offset() {
        let err = CurrentTimeTool
            .execute(args(serde_json::json!({"utc_offset_hours": 30})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = CurrentTimeTool
            .execute(args(serde_json::json!({"utc_offset_hours": "eight"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
