//! # Auth Cell
//!
//! Session handling for the dashboard: sign-up, password sign-in, Google and
//! Apple sign-in, sign-out, and the gating of protected views.
//!
//! - `services::identity` - `IdentityProvider` trait and the Supabase GoTrue client
//! - `services::session` - `SessionProvider`, the explicit session handle
//! - `navigation` - the three views and which of them need an identity
//!
//! ## API Endpoints
//!
//! - `POST /auth/signup` - Create an account (optional display name)
//! - `POST /auth/signin` - Email/password sign-in
//! - `POST /auth/signin/google` - Exchange a Google ID token
//! - `POST /auth/signin/apple` - Exchange an Apple ID token
//! - `POST /auth/signout` - End the bearer's session
//! - `POST /auth/validate`, `POST /auth/verify` - Check a bearer JWT

pub mod handlers;
pub mod models;
pub mod navigation;
pub mod router;
pub mod services;

pub use models::{AuthError, OAuthProvider};
pub use navigation::View;
pub use router::auth_routes;
pub use services::identity::{IdentityProvider, SupabaseIdentityProvider};
pub use services::session::SessionProvider;
