use serde::Serialize;
use serde_json::{Map, Value};

const LOCAL_DEFAULT: &str = "local";
const UP_STATUS: &str = "200";

/// Body of `GET /up`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpResponse {
    pub status: String,
    pub app_name: String,
    pub org_name: String,
    pub space_name: String,
}

impl UpResponse {
    pub fn local() -> Self {
        Self {
            status: UP_STATUS.to_string(),
            app_name: LOCAL_DEFAULT.to_string(),
            org_name: LOCAL_DEFAULT.to_string(),
            space_name: LOCAL_DEFAULT.to_string(),
        }
    }

    /// Builds the status from the platform's application descriptor
    /// (`VCAP_APPLICATION`). Fields that are absent, not strings, or inside a
    /// descriptor that fails to parse fall back to `local`.
    pub fn from_platform_descriptor(raw: Option<&str>) -> Self {
        let descriptor = match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => match serde_json::from_str::<Map<String, Value>>(raw) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    tracing::warn!(
                        op = "receiver.platform.parse_failed",
                        error = %err,
                        "failed to parse platform application descriptor"
                    );
                    Map::new()
                }
            },
            None => Map::new(),
        };

        Self {
            status: UP_STATUS.to_string(),
            app_name: descriptor_field(&descriptor, "application_name"),
            org_name: descriptor_field(&descriptor, "organization_name"),
            space_name: descriptor_field(&descriptor, "space_name"),
        }
    }
}

impl Default for UpResponse {
    fn default() -> Self {
        Self::local()
    }
}

fn descriptor_field(descriptor: &Map<String, Value>, key: &str) -> String {
    descriptor
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(LOCAL_DEFAULT)
        .to_string()
}
