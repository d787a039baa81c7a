// src/services/mod.rs
//
// Shared services: the collaborators handlers are built on. Each one is
// constructed once in `main` and handed to handlers through `AppState`.

pub mod accounts;
pub mod images;
pub mod oauth;
pub mod passwords;
pub mod tokens;

// Re-export commonly used types for convenience
pub use accounts::{AccountStore, NewAccount, NewOAuthLink, StoreError};
pub use images::ImageHostService;
pub use oauth::{OAuthService, Provider};
pub use passwords::PasswordHasher;
pub use tokens::{LinkTarget, TokenPair, TokenService};
