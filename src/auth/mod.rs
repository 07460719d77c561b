// Authentication module
// Azure AD token sources used as database passwords

mod azure_cli;
mod client_secret;
mod credentials;
mod managed_identity;
mod types;

pub use azure_cli::AzureCliCredential;
pub use client_secret::{ClientSecretCredential, EnvironmentCredential, DEFAULT_AUTHORITY_HOST};
pub use credentials::{DefaultAzureCredential, TokenCredential};
pub use managed_identity::{ManagedIdentityCredential, ManagedIdentityEndpoint, IMDS_ENDPOINT};
pub use types::AccessToken;
