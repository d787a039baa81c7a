// src/website/validators.rs

use super::models::*;
use crate::common::validation::is_http_url;
use crate::common::{ValidationResult, Validator};

pub const MAX_DISPLAY_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 300;
pub const MAX_LINK_TITLE_LEN: usize = 50;
pub const MAX_URL_LEN: usize = 2048;

// ============================================================================
// Website Validators
// ============================================================================

pub struct WebsiteUpdateValidator;

impl Validator<UpdateWebsiteRequest> for WebsiteUpdateValidator {
    fn validate(&self, data: &UpdateWebsiteRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(name) = &data.display_name {
            if name.chars().count() > MAX_DISPLAY_NAME_LEN {
                result.add_error("display_name", "Display name must be at most 50 characters");
            }
        }

        if let Some(bio) = &data.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                result.add_error("bio", "Bio must be at most 300 characters");
            }
        }

        if let Some(avatar) = &data.avatar_url {
            check_url(&mut result, "avatar_url", avatar);
        }

        if let Some(theme) = &data.theme {
            if !THEMES.contains(&theme.as_str()) {
                result.add_error("theme", "Theme must be one of: light, dark, sunset, ocean, forest");
            }
        }

        result
    }
}

// ============================================================================
// Social Link Validators
// ============================================================================

pub struct CreateLinkValidator;

impl Validator<CreateLinkRequest> for CreateLinkValidator {
    fn validate(&self, data: &CreateLinkRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_title(&mut result, &data.title);
        check_url(&mut result, "url", &data.url);
        result
    }
}

pub struct UpdateLinkValidator;

impl Validator<UpdateLinkRequest> for UpdateLinkValidator {
    fn validate(&self, data: &UpdateLinkRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.title.is_none() && data.url.is_none() {
            result.add_error("link", "Provide a title or a url to update");
        }
        if let Some(title) = &data.title {
            check_title(&mut result, title);
        }
        if let Some(url) = &data.url {
            check_url(&mut result, "url", url);
        }

        result
    }
}

fn check_title(result: &mut ValidationResult, title: &str) {
    let len = title.trim().chars().count();
    if len == 0 {
        result.add_error("title", "Title is required");
    } else if len > MAX_LINK_TITLE_LEN {
        result.add_error("title", "Title must be at most 50 characters");
    }
}

fn check_url(result: &mut ValidationResult, field: &str, url: &str) {
    if url.len() > MAX_URL_LEN {
        result.add_error(field, "URL must be at most 2048 characters");
    } else if !is_http_url(url.trim()) {
        result.add_error(field, "URL must start with http:// or https://");
    }
}
