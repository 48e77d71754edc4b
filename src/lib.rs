//! Edit-lock client for admin change forms.
//!
//! A [`client::LockClient`] acquires and renews a pessimistic edit lock on
//! one object, keeps the form disabled whenever the lock is not held, and
//! releases the lock when the page goes away. The UI is abstracted behind
//! [`surface::EditSurface`] and the network behind
//! [`transport::LockTransport`].

pub mod background;
pub mod badge;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod form;
pub mod logging;
pub mod registry;
pub mod session;
pub mod status;
pub mod surface;
pub mod transport;

#[cfg(test)]
mod test_support;

use shadow_rs::shadow;

shadow!(build);
