//! API client for communicating with the attrition agent

use anyhow::{Context, Result};
use attrition_lib::{LoadedArtifacts, PredictionResult, RawInputRecord};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the attrition agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    pub async fn predict(&self, record: &RawInputRecord) -> Result<PredictionResult> {
        self.post("api/v1/predict", record).await
    }

    pub async fn schema(&self) -> Result<SchemaInfo> {
        self.get("api/v1/schema").await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => anyhow::bail!("{} ({}): {}", err.error, status, err.message),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

/// Error body returned by the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub features: Vec<String>,
    pub threshold: f64,
    pub classifier: String,
    pub version: String,
    pub layout: LayoutInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub families: Vec<FamilyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyInfo {
    pub field: String,
    /// (value, column) pairs
    pub columns: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
}

impl SchemaInfo {
    /// Describe locally loaded artifacts the way the agent does
    pub fn from_artifacts(artifacts: &LoadedArtifacts) -> Self {
        let classifier = artifacts.classifier();
        let families = artifacts
            .layout()
            .families
            .iter()
            .map(|f| FamilyInfo {
                field: f.field.to_string(),
                columns: f
                    .columns
                    .iter()
                    .map(|(value, column)| (value.to_string(), column.clone()))
                    .collect(),
                baseline: f.baseline.map(str::to_string),
            })
            .collect();

        Self {
            features: artifacts.schema().names().to_vec(),
            threshold: classifier.threshold(),
            classifier: classifier.kind().to_string(),
            version: classifier.version().to_string(),
            layout: LayoutInfo { families },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrition_lib::AttritionLabel;

    #[tokio::test]
    async fn test_predict_posts_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/predict")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "Age": 30,
                "JobRole": "Human Resources",
                "BusinessTravel": "Non-Travel"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"label":"WillLeave","probability":0.81}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client.predict(&RawInputRecord::default()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.label, AttritionLabel::WillLeave);
        assert!((result.stay_probability() - 0.19).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/predict")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"schema_mismatch","message":"expected 25 features, got 24"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .predict(&RawInputRecord::default())
            .await
            .unwrap_err()
            .to_string();

        assert!(err.starts_with("schema_mismatch"));
        assert!(err.contains("expected 25 features"));
    }

    #[tokio::test]
    async fn test_schema_parses_layout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/schema")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "features": ["Age", "MaritalStatus_Married", "MaritalStatus_Single"],
                    "threshold": 0.5,
                    "classifier": "logistic_regression",
                    "version": "v3",
                    "layout": {"families": [{
                        "field": "MaritalStatus",
                        "columns": [["Married", "MaritalStatus_Married"], ["Single", "MaritalStatus_Single"]],
                        "baseline": "Divorced"
                    }]}
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let schema = client.schema().await.unwrap();

        assert_eq!(schema.features.len(), 3);
        assert_eq!(schema.version, "v3");
        let family = &schema.layout.families[0];
        assert_eq!(family.baseline.as_deref(), Some("Divorced"));
        assert_eq!(family.columns[1].1, "MaritalStatus_Single");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
