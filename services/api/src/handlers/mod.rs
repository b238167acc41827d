pub mod admin;
pub mod auth;
pub mod comment;
pub mod post;
pub mod user;

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use commune_core::error::ApiError;

/// A parsed multipart body: text fields by name, file parts in order.
/// File parts are the fields named `image` / `images`.
pub(crate) struct FormBody {
    pub text: HashMap<String, String>,
    pub images: Vec<Bytes>,
}

impl FormBody {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.text.remove(name).filter(|v| !v.trim().is_empty())
    }
}

pub(crate) async fn read_form(mut multipart: Multipart) -> Result<FormBody, ApiError> {
    let mut text = HashMap::new();
    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("malformed form body"))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "image" || name == "images" {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::validation("malformed form body"))?;
            images.push(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|_| ApiError::validation("malformed form body"))?;
            text.insert(name, value);
        }
    }
    Ok(FormBody { text, images })
}
