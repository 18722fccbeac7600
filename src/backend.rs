use std::sync::Arc;

use http::StatusCode;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Session;
use crate::membership::Membership;
use crate::models::{
    ErrorBody, ReservationRequest, ReservationResponse, ReservationSummary, ScheduledClass,
    StudentEnvelope,
};

pub const GENERIC_FAILURE: &str = "Something went wrong, please try again";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("You must be logged in to do this")]
    MissingToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

/// REST client for the studio backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
}

impl BackendClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn checked(request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            debug!(%status, %message, "backend rejected request");
            return Err(BackendError::Rejected { status, message });
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = Self::checked(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// A 2xx on a reservation change means the backend committed it, so an
    /// unreadable body only loses the remaining-class counts.
    async fn send_committed(
        &self,
        request: RequestBuilder,
    ) -> Result<ReservationResponse, BackendError> {
        let response = Self::checked(request).await?;
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%status, error = %err, "reservation committed but body could not be read");
                return Ok(ReservationResponse::default());
            }
        };
        match serde_json::from_str::<ReservationResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                warn!(%status, error = %err, "reservation committed with unreadable body");
                Ok(ReservationResponse::default())
            }
        }
    }

    pub async fn fetch_classes(&self) -> Result<Vec<ScheduledClass>, BackendError> {
        let url = self.endpoint("api/classes")?;
        self.send(self.client.get(url)).await
    }

    pub async fn fetch_membership(
        &self,
        session: &Session,
    ) -> Result<Option<Membership>, BackendError> {
        let url = self.endpoint(&format!("api/student/{}", session.student_id()))?;
        let request = Self::authorize(self.client.get(url), session.token());
        let envelope: StudentEnvelope = self.send(request).await?;
        Ok(envelope.membership.map(Membership::from))
    }

    pub async fn fetch_booked_class_ids(
        &self,
        session: &Session,
    ) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&format!(
            "api/class-reservations/student/{}",
            session.student_id()
        ))?;
        let request = Self::authorize(self.client.get(url), session.token());
        let reservations: Vec<ReservationSummary> = self.send(request).await?;
        Ok(reservations.into_iter().map(|r| r.class_id).collect())
    }

    pub async fn reserve(
        &self,
        session: &Session,
        class_id: &str,
    ) -> Result<ReservationResponse, BackendError> {
        let token = session.require_token()?;
        let url = self.endpoint("api/class-reservations/")?;
        let body = ReservationRequest {
            student_id: session.student_id(),
            class_id,
        };
        self.send_committed(self.client.post(url).bearer_auth(token).json(&body))
            .await
    }

    pub async fn cancel(
        &self,
        session: &Session,
        class_id: &str,
    ) -> Result<ReservationResponse, BackendError> {
        let token = session.require_token()?;
        let url = self.endpoint("api/class-reservations/")?;
        let body = ReservationRequest {
            student_id: session.student_id(),
            class_id,
        };
        self.send_committed(self.client.delete(url).bearer_auth(token).json(&body))
            .await
    }
}
