use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult, FieldError};
use crate::state::AppState;
use crate::uploads::{UploadField, UploadedFile};

/// Text fields of a submitted form. Multipart forms deliver every value as a
/// string, JSON bodies deliver typed values; readers accept both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFields(Map<String, Value>);

impl FormFields {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Trimmed text value; blank strings read as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_text(&self, key: &str, label: &str, errors: &mut Vec<FieldError>) -> String {
        self.text(key).unwrap_or_else(|| {
            errors.push(FieldError::new(key, format!("{label} is required")));
            String::new()
        })
    }

    pub fn bool(&self, key: &str) -> AppResult<Option<bool>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "1" | "on" | "yes" => Ok(Some(true)),
                "false" | "0" | "off" | "no" => Ok(Some(false)),
                _ => Err(AppError::invalid(key, "Must be true or false")),
            },
            Some(_) => Err(AppError::invalid(key, "Must be true or false")),
        }
    }

    pub fn int(&self, key: &str) -> AppResult<Option<i64>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| AppError::invalid(key, "Must be a whole number")),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| AppError::invalid(key, "Must be a whole number")),
            Some(_) => Err(AppError::invalid(key, "Must be a whole number")),
        }
    }

    /// Reads a structured sub-field that multipart clients send JSON-encoded.
    pub fn json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let parsed = match self.0.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s),
            Some(other) => serde_json::from_value(other.clone()),
        };
        parsed
            .map(Some)
            .map_err(|e| AppError::invalid(key, format!("Invalid JSON: {e}")))
    }
}

/// A submitted form: text fields plus any files, from multipart or JSON.
#[derive(Debug, Default)]
pub struct FormPayload {
    pub fields: FormFields,
    pub files: Vec<UploadedFile>,
}

#[async_trait]
impl FromRequest<AppState> for FormPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
            return match body {
                Value::Object(map) => Ok(Self {
                    fields: FormFields::new(map),
                    files: Vec::new(),
                }),
                _ => Err(AppError::bad_request("Request body must be a JSON object")),
            };
        }

        let max_bytes = *state.config.max_upload_bytes();
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        let mut payload = FormPayload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if field.file_name().is_none() {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                payload.fields.insert(name, Value::String(value));
                continue;
            }

            let upload_field = UploadField::from_name(&name)
                .ok_or_else(|| AppError::bad_request(format!("Unexpected file field: {name}")))?;
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().and_then(|ct| ct.parse().ok());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;

            // Browsers send an empty part for an untouched file input.
            if bytes.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                continue;
            }
            if bytes.len() > max_bytes {
                return Err(AppError::bad_request(format!(
                    "File too large: {name} exceeds {} MB",
                    max_bytes / (1024 * 1024)
                )));
            }

            payload.files.push(UploadedFile {
                field: upload_field,
                file_name,
                content_type,
                bytes,
            });
        }

        Ok(payload)
    }
}
