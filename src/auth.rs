use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::backend::BackendError;

/// Who is booking, and the bearer token forwarded to the studio backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    student_id: String,
    token: Option<String>,
}

impl Session {
    pub fn new(student_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            student_id: student_id.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Header token wins over the `token` query parameter.
    pub fn from_request(
        student_id: impl Into<String>,
        auth: Option<Authorization<Bearer>>,
        query_token: Option<&str>,
    ) -> Self {
        let token = auth
            .map(|a| a.token().to_string())
            .or_else(|| query_token.map(|s| s.to_string()));
        Self::new(student_id, token)
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn require_token(&self) -> Result<&str, BackendError> {
        self.token().ok_or(BackendError::MissingToken)
    }
}
