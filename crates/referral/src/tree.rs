use std::collections::HashMap;

use serde::Serialize;

use crate::user::User;

/// Levels returned when the caller does not ask for a specific depth.
pub const DEFAULT_MAX_DEPTH: u32 = 7;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeUser {
    pub user_id: i64,
    pub username: String,
    pub wallet_address: String,
    pub created_at: i64,
}

impl From<&User> for TreeUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            wallet_address: user.wallet_address.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralTreeNode {
    pub user: TreeUser,
    /// Distance from the query root; direct referrals are depth 1.
    pub depth: u32,
    pub children: Vec<ReferralTreeNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LevelStat {
    pub level: u32,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamTree {
    pub tree: Vec<ReferralTreeNode>,
    pub total_team_size: u64,
    pub level_stats: Vec<LevelStat>,
}

impl TeamTree {
    fn empty() -> Self {
        Self {
            tree: Vec::new(),
            total_team_size: 0,
            level_stats: Vec::new(),
        }
    }
}

/// Builds the bounded-depth downline tree of `root_user_id` from one flat
/// snapshot of the forest.
///
/// Edges are attached by following `sponsor_id` parent pointers; records
/// whose pointer does not resolve within the snapshot, or points at the
/// record itself, are simply never attached as anyone's child. Siblings are
/// ordered newest registration first, ties keeping snapshot order, so the
/// output is fully deterministic for a given snapshot.
///
/// `max_depth` below 1 is clamped to 1. A `root_user_id` absent from the
/// snapshot yields an empty team; callers that need to distinguish that
/// case resolve the root before building.
pub fn build_team_tree(all_users: &[User], root_user_id: i64, max_depth: u32) -> TeamTree {
    let max_depth = max_depth.max(1);

    let mut index: HashMap<i64, usize> = HashMap::with_capacity(all_users.len());
    for (i, user) in all_users.iter().enumerate() {
        index.insert(user.user_id, i);
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); all_users.len()];
    for (i, user) in all_users.iter().enumerate() {
        // A record naming itself as sponsor never becomes its own child.
        if user.sponsor_id == user.user_id {
            continue;
        }
        if let Some(&sponsor) = index.get(&user.sponsor_id) {
            adjacency[sponsor].push(i);
        }
    }

    let Some(&root) = index.get(&root_user_id) else {
        return TeamTree::empty();
    };

    let mut level_counts: Vec<u64> = Vec::new();
    let tree = build_children(root, 1, max_depth, all_users, &adjacency, &mut level_counts);

    let total_team_size = level_counts.iter().sum();
    let level_stats = level_counts
        .iter()
        .enumerate()
        .map(|(i, &count)| LevelStat {
            level: i as u32 + 1,
            count,
        })
        .collect();

    TeamTree {
        tree,
        total_team_size,
        level_stats,
    }
}

fn build_children(
    parent: usize,
    depth: u32,
    max_depth: u32,
    all_users: &[User],
    adjacency: &[Vec<usize>],
    level_counts: &mut Vec<u64>,
) -> Vec<ReferralTreeNode> {
    if depth > max_depth {
        return Vec::new();
    }

    let mut nodes: Vec<ReferralTreeNode> = adjacency[parent]
        .iter()
        .map(|&child| {
            if level_counts.len() < depth as usize {
                level_counts.resize(depth as usize, 0);
            }
            level_counts[depth as usize - 1] += 1;

            ReferralTreeNode {
                user: TreeUser::from(&all_users[child]),
                depth,
                children: build_children(
                    child,
                    depth + 1,
                    max_depth,
                    all_users,
                    adjacency,
                    level_counts,
                ),
            }
        })
        .collect();

    // Newest referral first. The sort is stable, so equal timestamps keep
    // snapshot order.
    nodes.sort_by(|a, b| b.user.created_at.cmp(&a.user.created_at));
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_id: i64, sponsor_id: i64, created_at: i64) -> User {
        User {
            user_id,
            username: format!("user{}", user_id),
            sponsor_id,
            sponsor_wallet: String::new(),
            wallet_address: format!("0x{:040x}", user_id),
            purchased_packages: Vec::new(),
            created_at,
        }
    }

    fn ids(nodes: &[ReferralTreeNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.user.user_id).collect()
    }

    fn max_node_depth(nodes: &[ReferralTreeNode]) -> u32 {
        nodes
            .iter()
            .map(|n| n.depth.max(max_node_depth(&n.children)))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn siblings_ordered_newest_first() {
        let users = vec![user(1, 0, 10), user(2, 1, 20), user(3, 1, 50)];
        let team = build_team_tree(&users, 1, 7);

        assert_eq!(ids(&team.tree), vec![3, 2]);
        assert_eq!(team.total_team_size, 2);
        assert_eq!(team.level_stats, vec![LevelStat { level: 1, count: 2 }]);
    }

    #[test]
    fn equal_timestamps_keep_snapshot_order() {
        let users = vec![user(1, 0, 10), user(2, 1, 30), user(3, 1, 30), user(4, 1, 30)];
        let team = build_team_tree(&users, 1, 7);
        assert_eq!(ids(&team.tree), vec![2, 3, 4]);
    }

    #[test]
    fn self_referential_record_is_never_anyones_child() {
        // userId 3 claims itself as sponsor; it must not show up under any
        // root, itself included.
        let users = vec![user(1, 0, 10), user(2, 1, 20), user(3, 3, 30), user(4, 3, 40)];

        let from_one = build_team_tree(&users, 1, 7);
        assert_eq!(ids(&from_one.tree), vec![2]);

        let from_three = build_team_tree(&users, 3, 7);
        assert_eq!(ids(&from_three.tree), vec![4]);
        assert_eq!(from_three.total_team_size, 1);
    }

    #[test]
    fn depth_bound_hides_deeper_levels() {
        // Straight chain 1 <- 2 <- 3 <- 4.
        let users = vec![user(1, 0, 10), user(2, 1, 20), user(3, 2, 30), user(4, 3, 40)];

        let team = build_team_tree(&users, 1, 1);
        assert_eq!(ids(&team.tree), vec![2]);
        assert!(team.tree[0].children.is_empty());
        assert_eq!(team.total_team_size, 1);
        assert_eq!(team.level_stats, vec![LevelStat { level: 1, count: 1 }]);
        assert_eq!(max_node_depth(&team.tree), 1);

        let deeper = build_team_tree(&users, 1, 3);
        assert_eq!(deeper.total_team_size, 3);
        assert_eq!(max_node_depth(&deeper.tree), 3);
    }

    #[test]
    fn total_matches_level_stat_sum_at_every_depth() {
        let users = vec![
            user(1, 0, 10),
            user(2, 1, 20),
            user(3, 1, 30),
            user(4, 2, 40),
            user(5, 2, 50),
            user(6, 4, 60),
            user(7, 6, 70),
        ];

        for max_depth in 1..=6 {
            let team = build_team_tree(&users, 1, max_depth);
            let stat_sum: u64 = team.level_stats.iter().map(|s| s.count).sum();
            assert_eq!(team.total_team_size, stat_sum, "max_depth {}", max_depth);
        }
    }

    #[test]
    fn identical_snapshots_produce_identical_output() {
        let users = vec![
            user(1, 0, 10),
            user(2, 1, 30),
            user(3, 1, 30),
            user(4, 3, 40),
        ];

        let first = serde_json::to_string(&build_team_tree(&users, 1, 7)).unwrap();
        let second = serde_json::to_string(&build_team_tree(&users, 1, 7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn orphaned_sponsor_pointer_is_tolerated() {
        // userId 5 points at a sponsor that does not exist; it attaches
        // nowhere but still roots its own subtree.
        let users = vec![user(1, 0, 10), user(2, 1, 20), user(5, 99, 30), user(6, 5, 40)];

        let from_one = build_team_tree(&users, 1, 7);
        assert_eq!(ids(&from_one.tree), vec![2]);

        let from_orphan = build_team_tree(&users, 5, 7);
        assert_eq!(ids(&from_orphan.tree), vec![6]);
        assert_eq!(from_orphan.total_team_size, 1);
    }

    #[test]
    fn childless_root_yields_empty_team() {
        let users = vec![user(1, 0, 10)];
        let team = build_team_tree(&users, 1, 7);

        assert!(team.tree.is_empty());
        assert_eq!(team.total_team_size, 0);
        assert!(team.level_stats.is_empty());
    }

    #[test]
    fn missing_root_yields_empty_team() {
        let users = vec![user(1, 0, 10)];
        let team = build_team_tree(&users, 42, 7);
        assert!(team.tree.is_empty());
        assert_eq!(team.total_team_size, 0);
    }

    #[test]
    fn zero_depth_is_clamped_to_one() {
        let users = vec![user(1, 0, 10), user(2, 1, 20), user(3, 2, 30)];
        let team = build_team_tree(&users, 1, 0);

        assert_eq!(ids(&team.tree), vec![2]);
        assert_eq!(team.total_team_size, 1);
    }

    #[test]
    fn mutual_sponsor_cycle_terminates_at_depth_bound() {
        // 1 and 2 sponsor each other; the walk repeats them but the depth
        // bound keeps it finite and the counts consistent.
        let users = vec![user(1, 2, 10), user(2, 1, 20)];
        let team = build_team_tree(&users, 1, 4);

        assert_eq!(max_node_depth(&team.tree), 4);
        let stat_sum: u64 = team.level_stats.iter().map(|s| s.count).sum();
        assert_eq!(team.total_team_size, stat_sum);
    }
}
