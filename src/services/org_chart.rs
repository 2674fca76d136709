use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;
use serde::Serialize;

use crate::database::repositories::{FollowingRepository, ProfileRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObservationReason {
    #[serde(rename = "direct manager of")]
    DirectManagerOf,
    #[serde(rename = "indirect manager of")]
    IndirectManagerOf,
    #[serde(rename = "your manager")]
    YourManager,
    #[serde(rename = "curious")]
    Curious,
    #[serde(rename = "teammate")]
    Teammate,
}

impl ObservationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationReason::DirectManagerOf => "direct manager of",
            ObservationReason::IndirectManagerOf => "indirect manager of",
            ObservationReason::YourManager => "your manager",
            ObservationReason::Curious => "curious",
            ObservationReason::Teammate => "teammate",
        }
    }
}

impl std::fmt::Display for ObservationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of manager pointers plus follow and blacklist edges.
#[derive(Debug, Clone, Default)]
pub struct OrgChart {
    manager_of: HashMap<i64, i64>,
    reports: HashMap<i64, Vec<i64>>,
    follows: Vec<(i64, i64)>,
    blacklist: HashSet<(i64, i64)>,
}

impl OrgChart {
    /// `managers` holds `(user, manager)` pairs, `follows` `(follower,
    /// following)` in insertion order, `blacklist` `(observer, observable)`.
    pub fn new(
        managers: Vec<(i64, i64)>,
        follows: Vec<(i64, i64)>,
        blacklist: Vec<(i64, i64)>,
    ) -> Self {
        let mut manager_of = HashMap::new();
        let mut reports: HashMap<i64, Vec<i64>> = HashMap::new();
        for (user, manager) in managers {
            manager_of.insert(user, manager);
            reports.entry(manager).or_default().push(user);
        }
        for direct in reports.values_mut() {
            direct.sort_unstable();
        }

        Self {
            manager_of,
            reports,
            follows,
            blacklist: blacklist.into_iter().collect(),
        }
    }

    pub async fn load(
        profiles: &ProfileRepository,
        following: &FollowingRepository,
    ) -> Result<Self> {
        Ok(Self::new(
            profiles.manager_pointers().await?,
            following.follow_edges().await?,
            following.blacklist_edges().await?,
        ))
    }

    pub fn manager(&self, user: i64) -> Option<i64> {
        self.manager_of.get(&user).copied()
    }

    pub fn direct_reports(&self, user: i64) -> &[i64] {
        self.reports.get(&user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_blacklisted(&self, observer: i64, observable: i64) -> bool {
        self.blacklist.contains(&(observer, observable))
    }

    /// Subordinates breadth-first, at most `max_depth` levels down. Each
    /// appears once even if the pointers form a cycle.
    pub fn minions(&self, user: i64, max_depth: usize) -> Vec<i64> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([user]);
        let mut queue = VecDeque::from([(user, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &report in self.direct_reports(current) {
                if visited.insert(report) {
                    found.push(report);
                    queue.push_back((report, depth + 1));
                }
            }
        }

        found
    }

    pub fn siblings(&self, user: i64) -> Vec<i64> {
        match self.manager(user) {
            Some(manager) => self
                .direct_reports(manager)
                .iter()
                .copied()
                .filter(|&other| other != user)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn followed(&self, user: i64) -> Vec<i64> {
        self.follows
            .iter()
            .filter(|(follower, _)| *follower == user)
            .map(|(_, following)| *following)
            .collect()
    }

    pub fn followers(&self, user: i64) -> Vec<i64> {
        self.follows
            .iter()
            .filter(|(_, following)| *following == user)
            .map(|(follower, _)| *follower)
            .collect()
    }

    /// Whose time off `user` sees: minions, siblings and the manager unless
    /// blacklisted, then explicit follows regardless.
    pub fn observed_users(&self, user: i64, max_depth: usize) -> Vec<i64> {
        let mut observed = Vec::new();
        let mut push = |candidate: i64, suppressible: bool| {
            if candidate == user || observed.contains(&candidate) {
                return;
            }
            if suppressible && self.is_blacklisted(user, candidate) {
                return;
            }
            observed.push(candidate);
        };

        for minion in self.minions(user, max_depth) {
            push(minion, true);
        }
        for sibling in self.siblings(user) {
            push(sibling, true);
        }
        if let Some(manager) = self.manager(user) {
            push(manager, true);
        }
        for followed in self.followed(user) {
            push(followed, false);
        }

        observed
    }

    /// Who sees `user`'s time off: direct reports, siblings and the direct
    /// manager unless they blacklisted `user`, then the managers above up to
    /// `max_depth` levels and the followers regardless.
    pub fn observing_users(&self, user: i64, max_depth: usize) -> Vec<i64> {
        let mut observing = Vec::new();
        let mut push = |candidate: i64, suppressible: bool| {
            if candidate == user || observing.contains(&candidate) {
                return;
            }
            if suppressible && self.is_blacklisted(candidate, user) {
                return;
            }
            observing.push(candidate);
        };

        for &report in self.direct_reports(user) {
            push(report, true);
        }
        for sibling in self.siblings(user) {
            push(sibling, true);
        }

        let mut current = user;
        let mut seen = HashSet::from([user]);
        for level in 0..max_depth.max(1) {
            match self.manager(current) {
                Some(manager) if seen.insert(manager) => {
                    push(manager, level == 0);
                    current = manager;
                }
                _ => break,
            }
        }

        for follower in self.followers(user) {
            push(follower, false);
        }

        observing
    }

    pub fn observation_reason(&self, viewer: i64, user: i64) -> ObservationReason {
        if self.direct_reports(viewer).contains(&user) {
            ObservationReason::DirectManagerOf
        } else if self.minions(viewer, 2).contains(&user) {
            ObservationReason::IndirectManagerOf
        } else if self.manager(viewer) == Some(user) {
            ObservationReason::YourManager
        } else if self.followed(viewer).contains(&user) {
            ObservationReason::Curious
        } else {
            ObservationReason::Teammate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GARY: i64 = 1;
    const TODD: i64 = 2;
    const MIKE: i64 = 3;
    const BEN: i64 = 4;
    const LAURA: i64 = 5;
    const PETER: i64 = 6;
    const LARS: i64 = 7;

    fn managers() -> Vec<(i64, i64)> {
        vec![
            (TODD, GARY),
            (MIKE, TODD),
            (BEN, TODD),
            (LAURA, MIKE),
            (PETER, LAURA),
            (LARS, LAURA),
        ]
    }

    fn chart() -> OrgChart {
        OrgChart::new(managers(), vec![], vec![])
    }

    #[test]
    fn test_minions_breadth_first() {
        let chart = chart();
        assert_eq!(chart.minions(TODD, 1), vec![MIKE, BEN]);
        assert_eq!(chart.minions(TODD, 2), vec![MIKE, BEN, LAURA]);
        assert_eq!(chart.minions(TODD, 3), vec![MIKE, BEN, LAURA, PETER, LARS]);
        assert!(chart.minions(TODD, 0).is_empty());
    }

    #[test]
    fn test_minions_deeper_than_chain_adds_nothing() {
        let chart = chart();
        assert_eq!(chart.minions(GARY, 10), chart.minions(GARY, 5));
        assert_eq!(chart.minions(GARY, 10).len(), 6);
    }

    #[test]
    fn test_minions_survive_cycles() {
        let chart = OrgChart::new(vec![(1, 2), (2, 1)], vec![], vec![]);
        assert_eq!(chart.minions(1, 10), vec![2]);
    }

    #[test]
    fn test_siblings() {
        let chart = chart();
        assert_eq!(chart.siblings(PETER), vec![LARS]);
        assert!(chart.siblings(GARY).is_empty());
    }

    #[test]
    fn test_observed_users() {
        let chart = chart();
        assert_eq!(chart.observed_users(PETER, 2), vec![LARS, LAURA]);
        assert_eq!(chart.observed_users(MIKE, 2), vec![LAURA, PETER, LARS, BEN, TODD]);
        assert_eq!(chart.observed_users(MIKE, 1), vec![LAURA, BEN, TODD]);
    }

    #[test]
    fn test_follow_bypasses_blacklist_and_blacklist_hides_teammate() {
        let chart = OrgChart::new(managers(), vec![(PETER, GARY)], vec![(PETER, LARS)]);
        assert_eq!(chart.observed_users(PETER, 2), vec![LAURA, GARY]);

        let chart = OrgChart::new(managers(), vec![(PETER, LAURA)], vec![(PETER, LAURA)]);
        assert_eq!(chart.observed_users(PETER, 2), vec![LARS, LAURA]);
    }

    #[test]
    fn test_observing_users() {
        let chart = chart();
        assert_eq!(chart.observing_users(GARY, 2), vec![TODD]);
        assert_eq!(chart.observing_users(GARY, 1), vec![TODD]);
        assert_eq!(chart.observing_users(TODD, 2), vec![MIKE, BEN, GARY]);
        assert_eq!(chart.observing_users(TODD, 1), vec![MIKE, BEN, GARY]);
        assert_eq!(chart.observing_users(LAURA, 2), vec![PETER, LARS, MIKE, TODD]);
        assert_eq!(chart.observing_users(LAURA, 1), vec![PETER, LARS, MIKE]);
        assert_eq!(chart.observing_users(PETER, 2), vec![LARS, LAURA, MIKE]);
        assert_eq!(chart.observing_users(PETER, 1), vec![LARS, LAURA]);
    }

    #[test]
    fn test_observing_users_with_followers_and_blacklist() {
        let chart = OrgChart::new(managers(), vec![(GARY, PETER)], vec![]);
        assert_eq!(chart.observing_users(PETER, 2), vec![LARS, LAURA, MIKE, GARY]);
        assert_eq!(chart.observing_users(PETER, 1), vec![LARS, LAURA, GARY]);

        let chart = OrgChart::new(managers(), vec![(GARY, PETER)], vec![(LARS, PETER)]);
        assert_eq!(chart.observing_users(PETER, 2), vec![LAURA, MIKE, GARY]);
    }

    #[test]
    fn test_blacklist_only_hides_from_the_direct_manager() {
        let chart = OrgChart::new(managers(), vec![], vec![(LAURA, PETER), (MIKE, PETER)]);
        assert_eq!(chart.observing_users(PETER, 2), vec![LARS, MIKE]);
        assert_eq!(chart.observing_users(PETER, 1), vec![LARS]);
    }

    #[test]
    fn test_observation_reason() {
        let chart = OrgChart::new(managers(), vec![(MIKE, GARY)], vec![]);
        assert_eq!(chart.observation_reason(MIKE, LAURA), ObservationReason::DirectManagerOf);
        assert_eq!(chart.observation_reason(MIKE, PETER), ObservationReason::IndirectManagerOf);
        assert_eq!(chart.observation_reason(MIKE, TODD), ObservationReason::YourManager);
        assert_eq!(chart.observation_reason(MIKE, GARY), ObservationReason::Curious);
        assert_eq!(chart.observation_reason(MIKE, BEN), ObservationReason::Teammate);
        assert_eq!(ObservationReason::Curious.to_string(), "curious");
    }
}
