//! Route guards.
//!
//! [`decide`] is a pure function of the facts gathered about a visitor;
//! [`evaluate`] gathers those facts with sequential reads and falls back to
//! [`paths::UNAUTHORIZED`] when any read fails.

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::Backend;
use crate::error::Result;
use crate::models::{OnboardingStatus, Role};
use crate::{onboarding, session};

pub mod paths {
    use crate::models::Role;

    pub const AUTH: &str = "/auth";
    pub const ONBOARDING: &str = "/onboarding";
    pub const PENDING_APPROVAL: &str = "/pending-approval";
    pub const APPLICATION_REJECTED: &str = "/application-rejected";
    pub const UNAUTHORIZED: &str = "/unauthorized";

    pub fn dashboard(role: Role) -> &'static str {
        match role {
            Role::Candidate => "/candidate/dashboard",
            Role::Mentor => "/mentor/dashboard",
            Role::Admin | Role::SuperAdmin => "/admin/dashboard",
        }
    }
}

/// What a route demands of its visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Any one of these suffices. Empty means any signed-in user.
    pub roles: Vec<Role>,
    /// Whether the onboarding state gates the route.
    pub check_onboarding: bool,
}

impl Requirement {
    pub fn authenticated() -> Self {
        Self {
            roles: Vec::new(),
            check_onboarding: false,
        }
    }

    pub fn roles(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
            check_onboarding: true,
        }
    }

    /// The requirement of a role's dashboard.
    pub fn dashboard(role: Role) -> Self {
        match role {
            Role::Admin | Role::SuperAdmin => Self {
                roles: vec![Role::Admin],
                check_onboarding: false,
            },
            other => Self::roles(&[other]),
        }
    }

    pub fn with_onboarding_check(mut self, check: bool) -> Self {
        self.check_onboarding = check;
        self
    }
}

/// Everything [`decide`] looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessFacts {
    pub authenticated: bool,
    pub roles: Vec<Role>,
    /// Status of the newest onboarding request across both tables.
    pub latest_onboarding: Option<OnboardingStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum Decision {
    Render,
    Redirect(&'static str),
}

impl Decision {
    pub fn is_render(&self) -> bool {
        matches!(self, Decision::Render)
    }
}

pub fn decide(requirement: &Requirement, facts: &AccessFacts) -> Decision {
    if !facts.authenticated {
        return Decision::Redirect(paths::AUTH);
    }

    let allowed = if requirement.roles.is_empty() {
        !facts.roles.is_empty()
    } else {
        requirement
            .roles
            .iter()
            .any(|required| facts.roles.iter().any(|held| held.satisfies(*required)))
    };

    if requirement.check_onboarding {
        match facts.latest_onboarding {
            Some(OnboardingStatus::Pending) => return Decision::Redirect(paths::PENDING_APPROVAL),
            Some(OnboardingStatus::Rejected) if !allowed => {
                return Decision::Redirect(paths::APPLICATION_REJECTED)
            }
            _ => {}
        }
    }

    if !requirement.roles.is_empty() && !allowed {
        return if facts.roles.is_empty() {
            Decision::Redirect(paths::ONBOARDING)
        } else {
            Decision::Redirect(paths::UNAUTHORIZED)
        };
    }

    Decision::Render
}

/// Reads session, roles and latest onboarding request in that order.
pub async fn gather_facts(backend: &Backend, requirement: &Requirement) -> Result<AccessFacts> {
    if backend.session().is_none() {
        return Ok(AccessFacts::default());
    }
    let user_id = backend.current_user_id()?;
    let roles = session::fetch_roles(backend, user_id).await?;
    let latest_onboarding = if requirement.check_onboarding {
        onboarding::latest_for_user(backend, user_id)
            .await?
            .map(|request| request.status)
    } else {
        None
    };

    Ok(AccessFacts {
        authenticated: true,
        roles,
        latest_onboarding,
    })
}

/// Decides access for the signed-in visitor. Decisions are never cached.
pub async fn evaluate(backend: &Backend, requirement: &Requirement) -> Decision {
    match gather_facts(backend, requirement).await {
        Ok(facts) => {
            let decision = decide(requirement, &facts);
            debug!(?requirement, ?facts, ?decision, "guard decision");
            decision
        }
        Err(err) => {
            warn!(error = %err, "guard read failed, denying access");
            Decision::Redirect(paths::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(roles: &[Role], latest: Option<OnboardingStatus>) -> AccessFacts {
        AccessFacts {
            authenticated: true,
            roles: roles.to_vec(),
            latest_onboarding: latest,
        }
    }

    #[test]
    fn anonymous_goes_to_auth() {
        let req = Requirement::roles(&[Role::Mentor]);
        assert_eq!(
            decide(&req, &AccessFacts::default()),
            Decision::Redirect("/auth")
        );
    }

    #[test]
    fn approved_mentor_renders() {
        let req = Requirement::roles(&[Role::Mentor]);
        let facts = facts(&[Role::Mentor], Some(OnboardingStatus::Approved));
        assert_eq!(decide(&req, &facts), Decision::Render);
        assert_eq!(decide(&req, &self::facts(&[Role::Mentor], None)), Decision::Render);
    }

    #[test]
    fn pending_onboarding_wins_over_any_role() {
        for roles in [&[][..], &[Role::Candidate][..], &[Role::Mentor][..]] {
            let req = Requirement::roles(&[Role::Mentor]);
            let facts = facts(roles, Some(OnboardingStatus::Pending));
            assert_eq!(decide(&req, &facts), Decision::Redirect("/pending-approval"));
        }
    }

    #[test]
    fn pending_is_ignored_when_the_route_skips_onboarding() {
        let req = Requirement::roles(&[Role::Mentor]).with_onboarding_check(false);
        let facts = facts(&[Role::Mentor], Some(OnboardingStatus::Pending));
        assert_eq!(decide(&req, &facts), Decision::Render);
    }

    #[test]
    fn rejected_without_allowed_role() {
        let req = Requirement::roles(&[Role::Mentor]);
        assert_eq!(
            decide(&req, &facts(&[], Some(OnboardingStatus::Rejected))),
            Decision::Redirect("/application-rejected")
        );
        // a role granted later outranks an old rejection
        assert_eq!(
            decide(&req, &facts(&[Role::Mentor], Some(OnboardingStatus::Rejected))),
            Decision::Render
        );
    }

    #[test]
    fn missing_role() {
        let req = Requirement::roles(&[Role::Mentor]);
        assert_eq!(decide(&req, &facts(&[], None)), Decision::Redirect("/onboarding"));
        assert_eq!(
            decide(&req, &facts(&[Role::Candidate], None)),
            Decision::Redirect("/unauthorized")
        );
    }

    #[test]
    fn super_admin_passes_admin_routes() {
        let req = Requirement::dashboard(Role::Admin);
        assert_eq!(decide(&req, &facts(&[Role::SuperAdmin], None)), Decision::Render);
        assert_eq!(
            decide(&req, &facts(&[Role::Mentor], None)),
            Decision::Redirect("/unauthorized")
        );
    }

    #[test]
    fn authenticated_only_route() {
        let req = Requirement::authenticated();
        assert_eq!(decide(&req, &facts(&[], None)), Decision::Render);
    }
}
