//! # mergeguard-rules
//!
//! Built-in rule implementations and the default registry.
//!
//! Every rule here implements the [`Rule`](mergeguard_core::Rule) contract
//! from `mergeguard-core`. Hosts that need custom rules register them next
//! to (or instead of) the defaults via [`RuleRegistry::builder`].

use mergeguard_core::RuleRegistry;

pub mod comment_only;
pub mod owner_change;
pub mod size_change;

pub use comment_only::CommentOnlyRule;
pub use owner_change::OwnerChangeRule;
pub use size_change::SizeChangeRule;

/// A registry pre-populated with all built-in rules.
pub fn defaults() -> RuleRegistry {
    RuleRegistry::builder()
        .register(SizeChangeRule::default())
        .register(OwnerChangeRule::default())
        .register(CommentOnlyRule)
        .build()
}
