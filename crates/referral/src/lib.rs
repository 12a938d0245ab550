mod chain;
mod tree;
mod user;

pub use chain::{
    build_referral_chain, ChainNode, PackageLookup, ReferrerCache, SponsorResolver,
    StorePackageLookup, StoreSponsorResolver, DEFAULT_MAX_HOPS,
};
pub use tree::{
    build_team_tree, LevelStat, ReferralTreeNode, TeamTree, TreeUser, DEFAULT_MAX_DEPTH,
};
pub use user::{PurchasedPackage, User, UserError, ROOT_SPONSOR_ID};
