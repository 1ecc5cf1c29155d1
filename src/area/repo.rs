use super::schema::{Area, AreaError, AreaInput, AreaRejection, AreaStatusReport};
use crate::conf::Conf;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;
use url::Url;

/// Remote owner of the watch areas. The lifecycle controller only ever talks
/// to this seam, never to the transport directly.
pub trait AreaRepository {
    fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, AreaError>> + Send;
    fn get_area_status(
        &self,
        area_id: &str,
    ) -> impl Future<Output = Result<AreaStatusReport, AreaError>> + Send;
    fn create_area(
        &self,
        input: &AreaInput,
    ) -> impl Future<Output = Result<Area, AreaRejection>> + Send;
    fn update_area(
        &self,
        id: &str,
        input: &AreaInput,
    ) -> impl Future<Output = Result<Area, AreaRejection>> + Send;
    fn delete_area(&self, id: &str) -> impl Future<Output = Result<(), AreaError>> + Send;
}

/// Structured failure body returned by the backend. Every field is optional
/// on the wire, absence is handled here and nowhere else.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub existing_area_name: Option<String>,
    #[serde(default)]
    pub max_areas: Option<usize>,
}

pub struct HttpAreaRepository {
    client: reqwest::Client,
    base_url: Url,
    // Used when a quota rejection arrives without a limit in the body
    quota_fallback: usize,
}

impl HttpAreaRepository {
    pub fn new(base_url: Url, conf: &Conf) -> Self {
        HttpAreaRepository {
            client: reqwest::Client::new(),
            base_url,
            quota_fallback: conf.max_areas,
        }
    }

    fn areas_url(&self) -> Result<Url, AreaError> {
        self.base_url.join("areas").map_err(|e| AreaError::Unknown {
            title: "Bad configuration".into(),
            message: e.to_string(),
        })
    }

    fn area_url(&self, id: &str) -> Result<Url, AreaError> {
        self.base_url
            .join(&format!("areas/{}", id))
            .map_err(|e| AreaError::Unknown {
                title: "Bad configuration".into(),
                message: e.to_string(),
            })
    }

    async fn classify_write_failure(&self, response: reqwest::Response) -> AreaRejection {
        let status = response.status();
        let body = response.json::<ApiError>().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to parse error body");
            ApiError::default()
        });
        classify_failure(status, body, self.quota_fallback)
    }
}

impl AreaRepository for HttpAreaRepository {
    async fn list_areas(&self) -> Result<Vec<Area>, AreaError> {
        let response = self
            .client
            .get(self.areas_url()?)
            .send()
            .await
            .map_err(network)?;
        if !response.status().is_success() {
            return Err(network_status(response.status()));
        }
        response.json::<Vec<Area>>().await.map_err(unexpected_body)
    }

    async fn get_area_status(&self, area_id: &str) -> Result<AreaStatusReport, AreaError> {
        let url = self
            .base_url
            .join(&format!("areas/{}/status", area_id))
            .map_err(|e| AreaError::Unknown {
                title: "Bad configuration".into(),
                message: e.to_string(),
            })?;
        let response = self.client.get(url).send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(network_status(response.status()));
        }
        response
            .json::<AreaStatusReport>()
            .await
            .map_err(unexpected_body)
    }

    async fn create_area(&self, input: &AreaInput) -> Result<Area, AreaRejection> {
        let url = self.areas_url().map_err(AreaRejection::Error)?;
        let response = self
            .client
            .post(url)
            .json(input)
            .send()
            .await
            .map_err(|e| AreaRejection::Error(network(e)))?;
        if response.status().is_success() {
            return response
                .json::<Area>()
                .await
                .map_err(|e| AreaRejection::Error(unexpected_body(e)));
        }
        Err(self.classify_write_failure(response).await)
    }

    async fn update_area(&self, id: &str, input: &AreaInput) -> Result<Area, AreaRejection> {
        let url = self.area_url(id).map_err(AreaRejection::Error)?;
        let response = self
            .client
            .put(url)
            .json(input)
            .send()
            .await
            .map_err(|e| AreaRejection::Error(network(e)))?;
        if response.status().is_success() {
            return response
                .json::<Area>()
                .await
                .map_err(|e| AreaRejection::Error(unexpected_body(e)));
        }
        Err(self.classify_write_failure(response).await)
    }

    async fn delete_area(&self, id: &str) -> Result<(), AreaError> {
        let response = self
            .client
            .delete(self.area_url(id)?)
            .send()
            .await
            .map_err(network)?;
        if !response.status().is_success() {
            return Err(network_status(response.status()));
        }
        Ok(())
    }
}

fn network(error: reqwest::Error) -> AreaError {
    AreaError::Network {
        title: "Connection failed".into(),
        message: error.to_string(),
    }
}

fn network_status(status: StatusCode) -> AreaError {
    AreaError::Network {
        title: "Server error".into(),
        message: format!("Unexpected status code: {}", status),
    }
}

fn unexpected_body(error: reqwest::Error) -> AreaError {
    AreaError::Unknown {
        title: "Unexpected response".into(),
        message: error.to_string(),
    }
}

/// Maps an HTTP failure onto the domain taxonomy. The backend's `code` field
/// wins over the raw status code when both are present.
pub fn classify_failure(status: StatusCode, body: ApiError, quota_fallback: usize) -> AreaRejection {
    let message = body.message.unwrap_or_else(|| "Request failed".into());
    match body.code.as_deref() {
        Some("duplicate_location") => {
            return AreaRejection::Error(AreaError::Duplicate {
                existing_area_name: body
                    .existing_area_name
                    .unwrap_or_else(|| "another area".into()),
            })
        }
        Some("quota_exceeded") => {
            return AreaRejection::Quota {
                max_areas: body.max_areas.unwrap_or(quota_fallback),
            }
        }
        Some("validation") => {
            return AreaRejection::Error(AreaError::Validation {
                title: "Invalid input".into(),
                message,
            })
        }
        _ => {}
    }
    match status {
        StatusCode::CONFLICT => AreaRejection::Error(AreaError::Duplicate {
            existing_area_name: body
                .existing_area_name
                .unwrap_or_else(|| "another area".into()),
        }),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AreaRejection::Error(AreaError::Validation {
                title: "Invalid input".into(),
                message,
            })
        }
        status if status.is_server_error() => AreaRejection::Error(AreaError::Network {
            title: "Server error".into(),
            message,
        }),
        _ => AreaRejection::Error(AreaError::Unknown {
            title: "Something went wrong".into(),
            message,
        }),
    }
}
