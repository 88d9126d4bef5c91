//! Provider-facing app registrations (data) and strategies (behavior).
//!
//! `app` exposes validated registrations (`OAuthApp`) covering the HTTPS-only token
//! endpoint, client credentials, redirect semantics, and client authentication
//! preferences, plus the `ProviderRegistry` the custodian resolves records against.
//! `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by flows
//! to augment outgoing refresh requests and map responses into the custodian error taxonomy.

pub mod app;
pub mod strategy;

pub use app::*;
pub use strategy::*;
