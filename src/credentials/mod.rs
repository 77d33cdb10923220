//! Refresh-credential rotation and session-token caching.
//!
//! - [`pool`] - [`pool::CredentialPool`], the single owner of cached session
//!   tokens and the active-credential cursor.

pub mod pool;
