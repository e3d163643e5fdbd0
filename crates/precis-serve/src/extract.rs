//! Request body extraction for `POST /summarize/`.
//!
//! Accepts JSON, urlencoded forms and multipart forms, all carrying the same
//! field names. Form values arrive as strings and are coerced later together
//! with JSON values.

use std::collections::HashMap;

use axum::Form;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use precis_core::RawParams;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Fields of a summarize request, still untyped.
#[derive(Debug, Clone, Default)]
pub struct SummarizeInput {
    pub text: Option<Value>,
    pub params: RawParams,
}

impl SummarizeInput {
    fn from_fields(mut fields: Map<String, Value>) -> Self {
        Self {
            text: fields.remove("text"),
            params: RawParams {
                max_length: fields.remove("max_length"),
                min_length: fields.remove("min_length"),
                num_beams: fields.remove("num_beams"),
            },
        }
    }

    /// The text to summarize.
    ///
    /// Absent, `null` and `""` all count as no text; whitespace-only text is
    /// accepted.
    pub fn text(&self) -> Result<&str, ApiError> {
        match &self.text {
            None | Some(Value::Null) => Err(ApiError::NoText),
            Some(Value::String(s)) if s.is_empty() => Err(ApiError::NoText),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ApiError::bad_request("text must be a string")),
        }
    }
}

impl<S> FromRequest<S> for SummarizeInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mime = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match mime.as_str() {
            "application/x-www-form-urlencoded" => {
                let Form(form) = Form::<HashMap<String, String>>::from_request(req, state)
                    .await
                    .map_err(|e| {
                        ApiError::body_rejection("Malformed form body", e.status(), e.body_text())
                    })?;
                Ok(Self::from_fields(string_fields(form)))
            }
            "multipart/form-data" => {
                let mut multipart =
                    Multipart::from_request(req, state).await.map_err(|e| {
                        ApiError::body_rejection(
                            "Malformed multipart body",
                            e.status(),
                            e.body_text(),
                        )
                    })?;
                let mut form = HashMap::new();
                while let Some(field) = multipart.next_field().await.map_err(|e| {
                    ApiError::body_rejection("Malformed multipart body", e.status(), e.body_text())
                })? {
                    let Some(name) = field.name().map(str::to_owned) else {
                        continue;
                    };
                    let value = field.text().await.map_err(|e| {
                        ApiError::body_rejection(
                            &format!("Malformed multipart field {name}"),
                            e.status(),
                            e.body_text(),
                        )
                    })?;
                    form.insert(name, value);
                }
                Ok(Self::from_fields(string_fields(form)))
            }
            "" | "application/json" => json_fields(req, state).await,
            other if other.ends_with("+json") => json_fields(req, state).await,
            other => Err(ApiError::UnsupportedMediaType(other.to_string())),
        }
    }
}

async fn json_fields<S: Send + Sync>(
    req: Request,
    state: &S,
) -> Result<SummarizeInput, ApiError> {
    let body = Bytes::from_request(req, state).await.map_err(|e| {
        ApiError::body_rejection("Could not read request body", e.status(), e.body_text())
    })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SummarizeInput::default());
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) => Ok(SummarizeInput::from_fields(fields)),
        Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(e) => Err(ApiError::bad_request(format!("Malformed JSON: {e}"))),
    }
}

fn string_fields(form: HashMap<String, String>) -> Map<String, Value> {
    form.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}
