use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSONL record on the events-out stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub v: i32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EventRecord {
    pub fn new(event_type: &str) -> Self {
        Self {
            v: 1,
            event_type: event_type.to_string(),
            ts: chrono::Utc::now().to_rfc3339(),
            run_id: None,
            data: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_line(&self) -> String {
        // Serializing plain strings and `Value`s cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_are_omitted() {
        let line = EventRecord::new("ui.notify").to_line();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], "ui.notify");
        assert_eq!(v["v"], 1);
        assert!(v.get("run_id").is_none());
        assert!(v.get("data").is_none());
    }

    #[test]
    fn run_id_and_data_are_serialized() {
        let line = EventRecord::new("run.end")
            .with_run_id("r1")
            .with_data(json!({"status": "success"}))
            .to_line();
        let back: EventRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back.run_id.as_deref(), Some("r1"));
        assert_eq!(back.data, Some(json!({"status": "success"})));
    }
}
