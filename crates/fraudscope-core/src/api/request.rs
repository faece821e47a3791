//! Request description types.
//!
//! An `ApiRequest` is a plain, replayable description of an outbound call.
//! Nothing here touches the network; the client turns it into a
//! `reqwest::RequestBuilder` on every attempt so a request can be re-issued
//! after a token refresh.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;

use super::{ApiError, ApiResult};

/// A single multipart form field.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_image_mime(&file_name).map(str::to_string);
        FormPart::File {
            name: name.into(),
            file_name,
            mime,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

fn guess_image_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

/// A replayable description of one backend call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Whether the stored access token is attached and 401s trigger a refresh.
    pub authenticated: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Mark the request as sent without credentials (login, register).
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Append query parameters from any serializable struct.
    ///
    /// `None` fields are skipped, scalars are rendered without quotes.
    pub fn query<Q: Serialize>(mut self, params: &Q) -> ApiResult<Self> {
        let value = serde_json::to_value(params)
            .map_err(|e| ApiError::InvalidRequest(format!("Unserializable query: {}", e)))?;
        match value {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    if let Some(rendered) = render_query_value(&value) {
                        self.query.push((key, rendered));
                    }
                }
                Ok(self)
            }
            serde_json::Value::Null => Ok(self),
            other => Err(ApiError::InvalidRequest(format!(
                "Query parameters must be an object, got {}",
                other
            ))),
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Unserializable body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Build a fresh multipart form; forms are consumed on send so each
    /// attempt gets its own.
    pub(crate) fn build_form(parts: &[FormPart]) -> ApiResult<Form> {
        let mut form = Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|e| {
                            ApiError::InvalidRequest(format!("Invalid mime type {}: {}", mime, e))
                        })?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

fn render_query_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A request together with how many times it has already been sent after
/// an authorization failure.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub request: ApiRequest,
    pub attempt: u32,
}

impl Attempt {
    pub fn first(request: ApiRequest) -> Self {
        Self {
            request,
            attempt: 0,
        }
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    pub fn retried(self) -> Self {
        Self {
            request: self.request,
            attempt: self.attempt + 1,
        }
    }
}
