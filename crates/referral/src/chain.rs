use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mongodb::Database;
use serde::Serialize;

use sbal_common::ZERO_ADDRESS;

use crate::user::{PurchasedPackage, User};

/// Hops walked when the caller does not ask for a specific bound.
pub const DEFAULT_MAX_HOPS: u32 = 10;

/// External "who sponsored this wallet" primitive. Implementations return
/// the zero address to signal "no further sponsor"; `Err` is reserved for
/// genuine resolution failure. Retry policy belongs to the resolver, never
/// to the walk.
#[async_trait]
pub trait SponsorResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<String>;
}

/// Optional per-wallet purchase enrichment for chain nodes.
#[async_trait]
pub trait PackageLookup: Send + Sync {
    async fn purchased_packages(&self, address: &str) -> Result<Vec<PurchasedPackage>>;
}

/// Memoized sponsor resolutions for one session (one root wallet on one
/// chain context). Referrer pointers are immutable per address, so entries
/// stay valid until the session itself changes; call `clear` when the root
/// address or the underlying network context does.
#[derive(Debug, Default)]
pub struct ReferrerCache {
    entries: HashMap<String, String>,
}

impl ReferrerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<&String> {
        self.entries.get(address)
    }

    pub fn insert(&mut self, address: String, referrer: String) {
        self.entries.insert(address, referrer);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    pub address: String,
    /// Hops walked from the starting wallet; the start itself is depth 0.
    pub depth: u32,
    /// Resolved sponsor wallet (possibly the zero sentinel), or `None` when
    /// resolution failed at this hop.
    pub referrer: Option<String>,
    pub packages: Vec<PurchasedPackage>,
    #[serde(skip_serializing_if = "is_false")]
    pub error: bool,
    pub children: Vec<ChainNode>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Walks sponsor pointers upward from `start_address`, one hop per
/// `resolve` call, and links the result into a strictly linear tree so it
/// renders through the same contract as a branching team tree.
///
/// The walk stops at the zero address, after `max_hops` hops, or on
/// revisiting an address already placed in the chain; the upstream pointer
/// source is mutable external state and cannot be assumed acyclic. A failed
/// resolution marks its node `error` and ends the walk, still returning the
/// partial chain. Per-node package enrichment failures are swallowed to an
/// empty list. Returns `None` only when the start itself is the sentinel or
/// empty.
pub async fn build_referral_chain(
    start_address: &str,
    resolver: &dyn SponsorResolver,
    packages: Option<&dyn PackageLookup>,
    cache: &mut ReferrerCache,
    max_hops: u32,
) -> Option<ChainNode> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut chain: Vec<ChainNode> = Vec::new();
    let mut current = start_address.to_string();
    let mut depth = 0u32;

    while !current.is_empty()
        && current != ZERO_ADDRESS
        && depth < max_hops
        && !visited.contains(&current)
    {
        visited.insert(current.clone());

        let resolved = match cache.get(&current) {
            Some(referrer) => Ok(referrer.clone()),
            None => resolver.resolve(&current).await.map(|referrer| {
                cache.insert(current.clone(), referrer.clone());
                referrer
            }),
        };

        match resolved {
            Ok(referrer) => {
                let node_packages = match packages {
                    Some(lookup) => lookup
                        .purchased_packages(&current)
                        .await
                        .unwrap_or_else(|err| {
                            tracing::debug!("package lookup failed for {}: {}", current, err);
                            Vec::new()
                        }),
                    None => Vec::new(),
                };

                chain.push(ChainNode {
                    address: current.clone(),
                    depth,
                    referrer: Some(referrer.clone()),
                    packages: node_packages,
                    error: false,
                    children: Vec::new(),
                });

                current = referrer;
                depth += 1;
            }
            Err(err) => {
                tracing::warn!("sponsor resolution failed at hop {}: {}", depth, err);
                chain.push(ChainNode {
                    address: current.clone(),
                    depth,
                    referrer: None,
                    packages: Vec::new(),
                    error: true,
                    children: Vec::new(),
                });
                break;
            }
        }
    }

    // Fold the flat walk into chain[i].children = [chain[i + 1]].
    let mut tail: Option<ChainNode> = None;
    for mut node in chain.into_iter().rev() {
        if let Some(next) = tail.take() {
            node.children.push(next);
        }
        tail = Some(node);
    }
    tail
}

/// Resolver that replays sponsor pointers from the durable store instead of
/// a chain RPC: the sponsor wallet cached on each record at registration.
#[derive(Clone)]
pub struct StoreSponsorResolver {
    db: Database,
}

impl StoreSponsorResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SponsorResolver for StoreSponsorResolver {
    async fn resolve(&self, address: &str) -> Result<String> {
        let user = User::find_by_wallet(&self.db, address)
            .await?
            .ok_or_else(|| anyhow!("no user registered for {}", address))?;

        // The root's sponsor wallet is stored as an empty string; map it to
        // the sentinel the walk terminates on.
        if user.sponsor_wallet.is_empty() {
            Ok(ZERO_ADDRESS.to_string())
        } else {
            Ok(user.sponsor_wallet)
        }
    }
}

#[derive(Clone)]
pub struct StorePackageLookup {
    db: Database,
}

impl StorePackageLookup {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PackageLookup for StorePackageLookup {
    async fn purchased_packages(&self, address: &str) -> Result<Vec<PurchasedPackage>> {
        let user = User::find_by_wallet(&self.db, address).await?;
        Ok(user.map(|u| u.purchased_packages).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct MapResolver {
        referrers: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MapResolver {
        fn new(edges: &[(&str, &str)]) -> Self {
            Self {
                referrers: edges
                    .iter()
                    .map(|(a, b)| (a.to_string(), b.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self, address: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.as_str() == address)
                .count()
        }
    }

    #[async_trait]
    impl SponsorResolver for MapResolver {
        async fn resolve(&self, address: &str) -> Result<String> {
            self.calls.lock().unwrap().push(address.to_string());
            self.referrers
                .get(address)
                .cloned()
                .ok_or_else(|| anyhow!("unknown address {}", address))
        }
    }

    struct FailingPackages;

    #[async_trait]
    impl PackageLookup for FailingPackages {
        async fn purchased_packages(&self, _address: &str) -> Result<Vec<PurchasedPackage>> {
            Err(anyhow!("lookup offline"))
        }
    }

    struct MapPackages(HashMap<String, Vec<PurchasedPackage>>);

    #[async_trait]
    impl PackageLookup for MapPackages {
        async fn purchased_packages(&self, address: &str) -> Result<Vec<PurchasedPackage>> {
            Ok(self.0.get(address).cloned().unwrap_or_default())
        }
    }

    fn flatten(root: &ChainNode) -> Vec<&ChainNode> {
        let mut nodes = vec![root];
        let mut cursor = root;
        while let Some(next) = cursor.children.first() {
            assert_eq!(cursor.children.len(), 1);
            nodes.push(next);
            cursor = next;
        }
        nodes
    }

    #[tokio::test]
    async fn cycle_terminates_with_each_address_once() {
        let resolver = MapResolver::new(&[("0xA", "0xB"), ("0xB", "0xA")]);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0xA", &resolver, None, &mut cache, 10)
            .await
            .unwrap();

        let nodes = flatten(&root);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].address, "0xA");
        assert_eq!(nodes[1].address, "0xB");
        assert_eq!(nodes[1].referrer.as_deref(), Some("0xA"));
    }

    #[tokio::test]
    async fn walk_stops_at_zero_address() {
        let resolver = MapResolver::new(&[("0xA", "0xB"), ("0xB", ZERO_ADDRESS)]);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0xA", &resolver, None, &mut cache, 10)
            .await
            .unwrap();

        let nodes = flatten(&root);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].referrer.as_deref(), Some(ZERO_ADDRESS));
        assert!(nodes.iter().all(|n| !n.error));
    }

    #[tokio::test]
    async fn starting_at_zero_address_yields_nothing() {
        let resolver = MapResolver::new(&[]);
        let mut cache = ReferrerCache::new();

        let chain = build_referral_chain(ZERO_ADDRESS, &resolver, None, &mut cache, 10).await;
        assert!(chain.is_none());
    }

    #[tokio::test]
    async fn max_hops_bounds_the_walk() {
        let edges: Vec<(String, String)> = (0..20)
            .map(|i| (format!("0x{:02x}", i), format!("0x{:02x}", i + 1)))
            .collect();
        let borrowed: Vec<(&str, &str)> = edges
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let resolver = MapResolver::new(&borrowed);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0x00", &resolver, None, &mut cache, 5)
            .await
            .unwrap();

        let nodes = flatten(&root);
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes.last().unwrap().depth, 4);
    }

    #[tokio::test]
    async fn failed_hop_marks_node_and_returns_partial_chain() {
        // 0xB resolves to an address the resolver has never heard of.
        let resolver = MapResolver::new(&[("0xA", "0xB")]);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0xA", &resolver, None, &mut cache, 10)
            .await
            .unwrap();

        let nodes = flatten(&root);
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[0].error);
        assert!(nodes[1].error);
        assert_eq!(nodes[1].referrer, None);
    }

    #[tokio::test]
    async fn cache_memoizes_within_a_session_and_clears_between() {
        let resolver = MapResolver::new(&[("0xA", "0xB"), ("0xB", ZERO_ADDRESS)]);
        let mut cache = ReferrerCache::new();

        build_referral_chain("0xA", &resolver, None, &mut cache, 10).await;
        build_referral_chain("0xA", &resolver, None, &mut cache, 10).await;
        assert_eq!(resolver.call_count("0xA"), 1);
        assert_eq!(resolver.call_count("0xB"), 1);

        cache.clear();
        assert!(cache.is_empty());
        build_referral_chain("0xA", &resolver, None, &mut cache, 10).await;
        assert_eq!(resolver.call_count("0xA"), 2);
    }

    #[tokio::test]
    async fn package_enrichment_failure_is_swallowed_per_node() {
        let resolver = MapResolver::new(&[("0xA", ZERO_ADDRESS)]);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0xA", &resolver, Some(&FailingPackages), &mut cache, 10)
            .await
            .unwrap();

        assert!(!root.error);
        assert!(root.packages.is_empty());
    }

    #[tokio::test]
    async fn packages_are_attached_per_address() {
        let resolver = MapResolver::new(&[("0xA", "0xB"), ("0xB", ZERO_ADDRESS)]);
        let mut cache = ReferrerCache::new();

        let pkg = PurchasedPackage {
            package_id: 3,
            package_name: "Starter".into(),
            price: "100".into(),
            transaction_hash: "0x01".into(),
            purchase_date: 1,
        };
        let lookup = MapPackages(HashMap::from([("0xB".to_string(), vec![pkg.clone()])]));

        let root = build_referral_chain("0xA", &resolver, Some(&lookup), &mut cache, 10)
            .await
            .unwrap();

        let nodes = flatten(&root);
        assert!(nodes[0].packages.is_empty());
        assert_eq!(nodes[1].packages, vec![pkg]);
    }

    #[tokio::test]
    async fn depths_increase_hop_by_hop() {
        let resolver = MapResolver::new(&[("0xA", "0xB"), ("0xB", "0xC"), ("0xC", ZERO_ADDRESS)]);
        let mut cache = ReferrerCache::new();

        let root = build_referral_chain("0xA", &resolver, None, &mut cache, 10)
            .await
            .unwrap();

        let depths: Vec<u32> = flatten(&root).iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
    }
}
