//! Dashboard figures aggregated in memory from fetched rows.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::client::Backend;
use crate::error::Result;
use crate::models::{
    LearningProgress, MentorshipRequest, MentorshipStatus, OnboardingKind, OnboardingStatus,
    Profile, Role, RoleAssignment, PROFILES, USER_ROLES,
};
use crate::{learning, mentorship, onboarding};

fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestStats {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub cancelled: usize,
    /// accepted / (accepted + rejected), in percent
    pub acceptance_rate: f64,
    /// answered / (total - cancelled), in percent
    pub response_rate: f64,
}

impl RequestStats {
    pub fn from_requests(requests: &[MentorshipRequest]) -> Self {
        let count = |status| requests.iter().filter(|r| r.status == status).count();
        let total = requests.len();
        let pending = count(MentorshipStatus::Pending);
        let accepted = count(MentorshipStatus::Accepted);
        let rejected = count(MentorshipStatus::Rejected);
        let cancelled = count(MentorshipStatus::Cancelled);

        Self {
            total,
            pending,
            accepted,
            rejected,
            cancelled,
            acceptance_rate: percentage(accepted, accepted + rejected),
            response_rate: percentage(accepted + rejected, total - cancelled),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentorInsights {
    pub requests: RequestStats,
    pub distinct_candidates: usize,
    /// No payment data source exists yet.
    pub earnings: Option<f64>,
}

impl MentorInsights {
    pub fn from_requests(requests: &[MentorshipRequest]) -> Self {
        let candidates: HashSet<Uuid> = requests.iter().map(|r| r.candidate_id).collect();
        Self {
            requests: RequestStats::from_requests(requests),
            distinct_candidates: candidates.len(),
            earnings: None,
        }
    }

    pub async fn fetch(backend: &Backend, mentor_id: Uuid) -> Result<Self> {
        let requests = mentorship::list_for_mentor(backend, mentor_id).await?;
        Ok(Self::from_requests(&requests))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateInsights {
    pub requests: RequestStats,
    pub active_mentors: usize,
    pub skills_tracked: usize,
    /// Mean of the tracked skills, one decimal; `None` with nothing tracked.
    pub average_progress: Option<f64>,
}

impl CandidateInsights {
    pub fn from_rows(requests: &[MentorshipRequest], progress: &[LearningProgress]) -> Self {
        let mentors: HashSet<Uuid> = requests
            .iter()
            .filter(|r| r.status == MentorshipStatus::Accepted)
            .map(|r| r.mentor_id)
            .collect();
        let average_progress = (!progress.is_empty()).then(|| {
            let sum: u32 = progress.iter().map(|p| u32::from(p.progress_percentage)).sum();
            (f64::from(sum) / progress.len() as f64 * 10.0).round() / 10.0
        });

        Self {
            requests: RequestStats::from_requests(requests),
            active_mentors: mentors.len(),
            skills_tracked: progress.len(),
            average_progress,
        }
    }

    pub async fn fetch(backend: &Backend, candidate_id: Uuid) -> Result<Self> {
        let requests = mentorship::list_for_candidate(backend, candidate_id).await?;
        let progress = learning::list_progress(backend, candidate_id).await?;
        Ok(Self::from_rows(&requests, &progress))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminInsights {
    pub total_users: usize,
    pub users_by_role: BTreeMap<Role, usize>,
    pub pending_onboarding: BTreeMap<&'static str, usize>,
    pub requests: RequestStats,
}

impl AdminInsights {
    pub fn from_rows(
        profiles: &[Profile],
        roles: &[RoleAssignment],
        pending_candidates: usize,
        pending_mentors: usize,
        requests: &[MentorshipRequest],
    ) -> Self {
        let mut users_by_role = BTreeMap::new();
        let distinct: HashSet<(Uuid, Role)> = roles.iter().map(|r| (r.user_id, r.role)).collect();
        for (_, role) in distinct {
            *users_by_role.entry(role).or_insert(0) += 1;
        }

        let mut pending_onboarding = BTreeMap::new();
        pending_onboarding.insert("candidate", pending_candidates);
        pending_onboarding.insert("mentor", pending_mentors);

        Self {
            total_users: profiles.len(),
            users_by_role,
            pending_onboarding,
            requests: RequestStats::from_requests(requests),
        }
    }

    pub async fn fetch(backend: &Backend) -> Result<Self> {
        let profiles: Vec<Profile> = backend.privileged_from(PROFILES)?.select("*").execute().await?;
        let roles: Vec<RoleAssignment> = backend.privileged_from(USER_ROLES)?.select("*").execute().await?;
        let pending_candidates =
            onboarding::list(backend, OnboardingKind::Candidate, Some(OnboardingStatus::Pending))
                .await?
                .len();
        let pending_mentors =
            onboarding::list(backend, OnboardingKind::Mentor, Some(OnboardingStatus::Pending))
                .await?
                .len();
        let requests = mentorship::list_all(backend).await?;

        Ok(Self::from_rows(
            &profiles,
            &roles,
            pending_candidates,
            pending_mentors,
            &requests,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(status: MentorshipStatus, candidate: Uuid) -> MentorshipRequest {
        MentorshipRequest {
            id: Uuid::new_v4(),
            candidate_id: candidate,
            mentor_id: Uuid::nil(),
            message: None,
            status,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn rates_round_to_one_decimal() {
        let c = Uuid::new_v4();
        let rows = vec![
            request(MentorshipStatus::Accepted, c),
            request(MentorshipStatus::Accepted, c),
            request(MentorshipStatus::Rejected, c),
            request(MentorshipStatus::Pending, c),
            request(MentorshipStatus::Cancelled, c),
        ];
        let stats = RequestStats::from_requests(&rows);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.acceptance_rate, 66.7);
        assert_eq!(stats.response_rate, 75.0);
    }

    #[test]
    fn empty_denominators_yield_zero() {
        let stats = RequestStats::from_requests(&[]);
        assert_eq!(stats, RequestStats::default());

        let only_cancelled = vec![request(MentorshipStatus::Cancelled, Uuid::nil())];
        let stats = RequestStats::from_requests(&only_cancelled);
        assert_eq!(stats.response_rate, 0.0);
        assert_eq!(stats.acceptance_rate, 0.0);
    }

    #[test]
    fn mentor_counts_distinct_candidates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![
            request(MentorshipStatus::Pending, a),
            request(MentorshipStatus::Accepted, a),
            request(MentorshipStatus::Pending, b),
        ];
        let insights = MentorInsights::from_requests(&rows);
        assert_eq!(insights.distinct_candidates, 2);
        assert_eq!(insights.earnings, None);
    }

    #[test]
    fn candidate_average_progress() {
        let user = Uuid::new_v4();
        let progress = |skill: &str, pct| LearningProgress {
            id: None,
            user_id: user,
            skill_name: skill.to_string(),
            progress_percentage: pct,
            updated_at: None,
        };
        let insights =
            CandidateInsights::from_rows(&[], &[progress("rust", 40), progress("sql", 75)]);
        assert_eq!(insights.average_progress, Some(57.5));
        assert_eq!(insights.skills_tracked, 2);

        assert_eq!(CandidateInsights::from_rows(&[], &[]).average_progress, None);
    }

    #[test]
    fn admin_counts_each_role_once_per_user() {
        let user = Uuid::new_v4();
        let assignment = |role| RoleAssignment {
            id: None,
            user_id: user,
            role,
            created_at: None,
        };
        let insights = AdminInsights::from_rows(
            &[],
            &[assignment(Role::Mentor), assignment(Role::Mentor), assignment(Role::Admin)],
            3,
            1,
            &[],
        );
        assert_eq!(insights.users_by_role.get(&Role::Mentor), Some(&1));
        assert_eq!(insights.users_by_role.get(&Role::Admin), Some(&1));
        assert_eq!(insights.pending_onboarding["candidate"], 3);
    }
}
