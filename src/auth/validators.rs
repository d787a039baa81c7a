//! Request validators for account endpoints

use super::models::{LoginRequest, RegisterRequest};
use crate::common::validation::{check_email, check_password, check_username};
use crate::common::{ValidationResult, Validator};

pub struct RegisterValidator;

impl Validator<RegisterRequest> for RegisterValidator {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_email(&mut result, data.email.trim());
        check_username(&mut result, &data.username);
        check_password(&mut result, &data.password);
        result
    }
}

/// Only checks presence; credential correctness is the handler's job.
pub struct LoginValidator;

impl Validator<LoginRequest> for LoginValidator {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        if data.email.trim().is_empty() {
            result.add_error("email", "Email is required");
        }
        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }
        result
    }
}
