use crate::value::GoerId;
use std::hash::{Hash, Hasher};

/// Subscription tier reported by the music provider for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTier {
    Premium,
    Free,
}

impl TryFrom<&str> for SubscriptionTier {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "premium" => Ok(SubscriptionTier::Premium),
            "free" | "open" => Ok(SubscriptionTier::Free),
            other => Err(format!("unknown subscription product: {}", other)),
        }
    }
}

/// A participant of a party, host or listener.
///
/// Carries the per-user settings the provider calls depend on. Identity is
/// the external user id; two goers with the same id are the same person no
/// matter what their settings say.
#[derive(Debug, Clone)]
pub struct PartyGoer {
    id: GoerId,
    filter_explicit_content: bool,
    market: String,
    subscription: SubscriptionTier,
}

impl PartyGoer {
    pub fn new(
        id: GoerId,
        filter_explicit_content: bool,
        market: &str,
        subscription: SubscriptionTier,
    ) -> Self {
        Self {
            id,
            filter_explicit_content,
            market: market.to_string(),
            subscription,
        }
    }

    /// A goer with provider defaults, used when settings have not been fetched yet.
    pub fn with_defaults(id: GoerId) -> Self {
        Self::new(id, false, "US", SubscriptionTier::Premium)
    }

    pub fn id(&self) -> &GoerId {
        &self.id
    }

    pub fn filters_explicit_content(&self) -> bool {
        self.filter_explicit_content
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn subscription(&self) -> SubscriptionTier {
        self.subscription
    }

    pub fn set_filter_explicit_content(&mut self, filter: bool) {
        self.filter_explicit_content = filter;
    }

    pub fn set_market(&mut self, market: &str) {
        self.market = market.to_string();
    }

    pub fn set_subscription(&mut self, subscription: SubscriptionTier) {
        self.subscription = subscription;
    }
}

impl PartialEq for PartyGoer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PartyGoer {}

impl Hash for PartyGoer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
