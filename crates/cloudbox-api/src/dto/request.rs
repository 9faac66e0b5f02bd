//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use cloudbox_core::error::AppError;
use cloudbox_core::traits::storage::Disposition;
use cloudbox_service::account::Registration;

/// Run derived validation and flatten the failures into one message.
pub fn validate<T: Validate>(req: &T) -> Result<(), AppError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))
}

/// POST /user/register
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name.
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    /// Login email, unique across accounts.
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
        }
    }
}

/// PATCH /file/{id}
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileRequest {
    /// New display name.
    #[validate(length(min = 1, message = "A file name is required"))]
    pub new_filename: String,
}

/// PATCH /directory/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameDirectoryRequest {
    /// New name; blank falls back to "New Folder".
    #[serde(default)]
    pub new_dir_name: Option<String>,
}

/// Query string of GET /file/{id}.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadFileQuery {
    /// `download` forces a save dialog; anything else renders inline.
    #[serde(default)]
    pub action: Option<String>,
}

impl ReadFileQuery {
    /// The requested disposition.
    pub fn disposition(&self) -> Disposition {
        match self.action.as_deref() {
            Some("download") => Disposition::Attachment,
            _ => Disposition::Inline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_maps_to_disposition() {
        let download = ReadFileQuery {
            action: Some("download".to_string()),
        };
        assert_eq!(download.disposition(), Disposition::Attachment);
        assert_eq!(ReadFileQuery::default().disposition(), Disposition::Inline);
    }

    #[test]
    fn test_rename_bodies_use_camel_case() {
        let file: RenameFileRequest = serde_json::from_str(r#"{"newFilename":"a.txt"}"#).unwrap();
        assert_eq!(file.new_filename, "a.txt");
        let dir: RenameDirectoryRequest = serde_json::from_str(r#"{"newDirName":"x"}"#).unwrap();
        assert_eq!(dir.new_dir_name.as_deref(), Some("x"));
    }

    #[test]
    fn test_register_request_requires_email() {
        let bad = RegisterRequest {
            name: "Alice".to_string(),
            email: "not-an-email".to_string(),
        };
        assert!(validate(&bad).is_err());

        let good = RegisterRequest {
            email: "alice@example.com".to_string(),
            ..bad
        };
        assert!(validate(&good).is_ok());
    }
}
