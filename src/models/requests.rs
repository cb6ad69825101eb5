use serde::{Deserialize, Deserializer};
use serde_json::Value;

// Service ids arrive as strings or, from bigint-keyed schemas, as numbers
fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "serviceId must be a string or number, got {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub threshold: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub service_id: Option<String>,
}

/// A caller-supplied probe target for test-multiple
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeTarget {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TestMultipleRequest {
    #[serde(default)]
    pub services: Option<serde_json::Value>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestAllRequest {
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}
