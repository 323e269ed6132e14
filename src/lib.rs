//! Mentorlink
//!
//! Client of the hosted backend behind the Mentorlink mentorship
//! marketplace: session and role lookup, route guards, navigation chrome,
//! mentorship and onboarding workflows, dashboards and admin tooling.
//!
//! ```no_run
//! use mentorlink::{guard, session, Backend};
//!
//! # async fn run() -> mentorlink::Result<()> {
//! let backend = Backend::from_env()?;
//! let user = session::sign_in(&backend, "ada@example.com", "correct horse").await?;
//! let decision = guard::evaluate(&backend, &guard::Requirement::dashboard(
//!     user.primary_role().unwrap_or(mentorlink::Role::Candidate),
//! ))
//! .await;
//! println!("{} -> {:?}", user.home_path(), decision);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod insights;
pub mod learning;
pub mod mentorship;
pub mod models;
pub mod navigation;
pub mod onboarding;
pub mod profile;
pub mod seed;
pub mod server;
pub mod session;

pub use client::Backend;
pub use config::{AppConfig, SuperAdminSeed};
pub use error::{AppError, Result};
pub use models::{MentorshipStatus, OnboardingKind, OnboardingStatus, Role};
pub use session::CurrentUser;

pub use mentorlink_auth as auth;
pub use mentorlink_functions as functions;
pub use mentorlink_postgrest as postgrest;

/// The types most callers need.
pub mod prelude {
    pub use crate::client::Backend;
    pub use crate::config::AppConfig;
    pub use crate::error::{AppError, Result};
    pub use crate::guard::{Decision, Requirement};
    pub use crate::mentorship::StatusFilter;
    pub use crate::models::*;
    pub use crate::session::CurrentUser;
}
