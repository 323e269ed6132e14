//! Layout chrome: header, sidebar, breadcrumbs and the navigation guide.
//!
//! Everything here is a pure function of the role and the route.

use serde::Serialize;
use uuid::Uuid;

use crate::guard::paths;
use crate::models::{Profile, Role};
use crate::session::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
}

const fn item(label: &'static str, href: &'static str) -> NavItem {
    NavItem { label, href }
}

const CANDIDATE_NAV: &[NavItem] = &[
    item("Dashboard", "/candidate/dashboard"),
    item("Find Mentors", "/candidate/mentors"),
    item("My Requests", "/candidate/requests"),
    item("Learning Progress", "/candidate/progress"),
    item("Roadmaps", "/candidate/roadmaps"),
    item("Profile", "/profile"),
];

const MENTOR_NAV: &[NavItem] = &[
    item("Dashboard", "/mentor/dashboard"),
    item("Requests", "/mentor/requests"),
    item("My Mentees", "/mentor/mentees"),
    item("Insights", "/mentor/insights"),
    item("Profile", "/profile"),
];

const ADMIN_NAV: &[NavItem] = &[
    item("Dashboard", "/admin/dashboard"),
    item("Users", "/admin/users"),
    item("Onboarding", "/admin/onboarding"),
    item("Mentorships", "/admin/mentorships"),
    item("Profile", "/profile"),
];

const NO_ROLE_NAV: &[NavItem] = &[item("Get Started", paths::ONBOARDING)];

/// Sidebar entries, in display order.
pub fn sidebar_for(role: Option<Role>) -> &'static [NavItem] {
    match role {
        Some(Role::Candidate) => CANDIDATE_NAV,
        Some(Role::Mentor) => MENTOR_NAV,
        Some(Role::Admin) | Some(Role::SuperAdmin) => ADMIN_NAV,
        None => NO_ROLE_NAV,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub href: String,
}

fn title_case(segment: &str) -> String {
    segment
        .split(|c: char| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `/mentor/requests/<uuid>` becomes Home › Mentor › Requests › Details.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut crumbs = vec![Breadcrumb {
        label: "Home".to_string(),
        href: "/".to_string(),
    }];

    let mut href = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        href.push('/');
        href.push_str(segment);
        let label = if Uuid::parse_str(segment).is_ok() {
            "Details".to_string()
        } else {
            title_case(segment)
        };
        crumbs.push(Breadcrumb {
            label,
            href: href.clone(),
        });
    }
    crumbs
}

/// Ordered tips shown to first-time visitors of a dashboard.
pub fn navigation_guide(role: Option<Role>) -> &'static [&'static str] {
    match role {
        Some(Role::Candidate) => &[
            "Browse mentors and open a profile that matches your goals.",
            "Send a mentorship request with a short message about what you want to learn.",
            "Track answers to your requests under My Requests.",
            "Record your skills in Learning Progress to see your average on the dashboard.",
        ],
        Some(Role::Mentor) => &[
            "Review incoming requests under Requests.",
            "Accept or reject pending requests; answered requests cannot change again.",
            "Follow your acceptance and response rates under Insights.",
        ],
        Some(Role::Admin) | Some(Role::SuperAdmin) => &[
            "Review pending candidate and mentor applications under Onboarding.",
            "Create, edit or remove accounts under Users.",
            "Watch platform-wide request figures on the dashboard.",
        ],
        None => &[
            "Choose whether you join as a candidate or as a mentor.",
            "Submit the application form; an admin reviews it before your dashboard opens.",
        ],
    }
}

/// What the top bar shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderModel {
    pub display_name: String,
    pub initials: String,
    pub role_label: Option<&'static str>,
    pub home: &'static str,
}

impl HeaderModel {
    pub fn for_user(profile: Option<&Profile>, user: &CurrentUser) -> Self {
        let full_name = profile
            .and_then(|p| p.full_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let display_name = match full_name {
            Some(name) => name.to_string(),
            None => user
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .unwrap_or("User")
                .to_string(),
        };

        let initials: String = display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();

        Self {
            display_name,
            initials,
            role_label: user.primary_role().map(|role| role.label()),
            home: user.home_path(),
        }
    }
}
