use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use imagehoster_core::ImageId;
use imagehoster_gallery::{ImageEdit, NewImageForm, Registration};

use crate::error::ServerError;

/// `imageId`, as sent in a query string or a urlencoded form.
#[derive(Debug, Default, Deserialize)]
pub struct ImageIdParam {
    #[serde(rename = "imageId")]
    pub image_id: Option<String>,
}

/// Parse the first `imageId` present.
pub fn parse_image_id<'a>(
    candidates: impl IntoIterator<Item = Option<&'a str>>,
) -> Result<ImageId, ServerError> {
    let raw = candidates
        .into_iter()
        .flatten()
        .find(|raw| !raw.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("missing imageId".into()))?;
    raw.parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid imageId: {raw}")))
}

/// The multipart fields shared by the upload and edit forms.
#[derive(Debug, Default)]
pub struct ImageFields {
    pub title: String,
    pub description: String,
    /// Base64 of the uploaded file; empty when no file was chosen.
    pub image_file: String,
    pub tags: String,
    pub image_id: Option<String>,
}

fn bad_multipart(e: MultipartError) -> ServerError {
    ServerError::BadRequest(format!("invalid multipart body: {e}"))
}

impl ImageFields {
    /// Drain a multipart body. Unknown fields are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut fields = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "file" => {
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    fields.image_file = STANDARD.encode(&bytes);
                }
                "title" => fields.title = field.text().await.map_err(bad_multipart)?,
                "description" => fields.description = field.text().await.map_err(bad_multipart)?,
                "tags" => fields.tags = field.text().await.map_err(bad_multipart)?,
                "imageId" => fields.image_id = Some(field.text().await.map_err(bad_multipart)?),
                _ => {}
            }
        }
        Ok(fields)
    }

    pub fn into_new_image(self) -> NewImageForm {
        NewImageForm {
            title: self.title,
            description: self.description,
            image_file: self.image_file,
            tags: self.tags,
        }
    }

    pub fn into_edit(self) -> ImageEdit {
        ImageEdit {
            title: self.title,
            description: self.description,
            image_file: Some(self.image_file).filter(|file| !file.is_empty()),
            tags: self.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form. Profile fields also accept their `profile.`-prefixed
/// names.
#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "fullName", alias = "profile.fullName")]
    pub full_name: String,
    #[serde(default, rename = "emailAddress", alias = "profile.emailAddress")]
    pub email_address: String,
    #[serde(default, rename = "mobileNumber", alias = "profile.mobileNumber")]
    pub mobile_number: String,
}

impl From<RegistrationForm> for Registration {
    fn from(form: RegistrationForm) -> Self {
        Self {
            username: form.username,
            password: form.password,
            full_name: form.full_name,
            email_address: form.email_address,
            mobile_number: form.mobile_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_id_from_first_present_source() {
        let id = parse_image_id([None, Some("12")]).unwrap();
        assert_eq!(id, ImageId::new(12));

        let id = parse_image_id([Some("3"), Some("12")]).unwrap();
        assert_eq!(id, ImageId::new(3));

        let id = parse_image_id([Some(""), Some(" 5 ")]).unwrap();
        assert_eq!(id, ImageId::new(5));
    }

    #[test]
    fn image_id_missing_or_invalid() {
        assert!(matches!(
            parse_image_id([None, None]),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            parse_image_id([Some("abc")]),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_file_field_keeps_existing_upload() {
        let edit = ImageFields {
            title: "t".into(),
            ..ImageFields::default()
        }
        .into_edit();
        assert!(edit.image_file.is_none());

        let edit = ImageFields {
            image_file: "aGk=".into(),
            ..ImageFields::default()
        }
        .into_edit();
        assert_eq!(edit.image_file.as_deref(), Some("aGk="));
    }

    #[test]
    fn registration_accepts_prefixed_profile_fields() {
        let form: RegistrationForm = serde_json::from_value(serde_json::json!({
            "username": "alice",
            "password": "abc#1",
            "profile.fullName": "Alice Example",
            "emailAddress": "alice@example.com",
        }))
        .unwrap();
        let registration = Registration::from(form);
        assert_eq!(registration.full_name, "Alice Example");
        assert_eq!(registration.email_address, "alice@example.com");
        assert!(registration.mobile_number.is_empty());
    }
}
