pub mod credentials;
pub mod gcal;
pub mod oauth;

pub use credentials::{
    AuthError, BoxedIdentityProvider, Credential, CredentialManager, CredentialStore,
    IdentityProvider,
};
pub use gcal::{CalendarClient, GcalError};
pub use oauth::{ClientSecrets, GoogleIdentity};
