use serde::{Deserialize, Serialize};

pub const ANALYSIS_COMPLETE: &str = "Analysis complete";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub is_authentic: bool,
    pub confidence: f32,
    pub message: String,
}

impl AnalysisResponse {
    pub fn complete(is_authentic: bool, confidence: f32) -> Self {
        Self {
            is_authentic,
            confidence,
            message: ANALYSIS_COMPLETE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_response_uses_camel_case_keys() {
        let value = serde_json::to_value(AnalysisResponse::complete(true, 0.75)).unwrap();
        assert_eq!(value["isAuthentic"], true);
        assert_eq!(value["confidence"], 0.75);
        assert_eq!(value["message"], "Analysis complete");
        assert!(value.get("is_authentic").is_none());
    }

    #[test]
    fn error_response_has_single_error_key() {
        let value = serde_json::to_value(ErrorResponse::new("Invalid file type")).unwrap();
        assert_eq!(value, serde_json::json!({ "error": "Invalid file type" }));
    }
}
