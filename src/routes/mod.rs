//! Routers grouped by access level.
//!
//! `public` needs no identity. `authenticated` and `admin` sit behind the auth middleware
//! applied in `create_router`; permission checks happen inside the handlers.

/// Unauthenticated routes (health).
pub mod public;

/// Routes for any authenticated member, under `/api`.
pub mod authenticated;

/// Organization administration, nested under `/api/admin`.
pub mod admin;
