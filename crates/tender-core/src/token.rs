//! Entry tokens
//!
//! A token of integer size denotes the means to enter an allocation auction
//! of that task size. Serial numbers give the allocation process a traceable
//! audit trail.

use crate::ids::TokenId;
use serde::{Deserialize, Serialize};

/// Sized ticket of entry into an auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryToken {
    id: TokenId,
    size: u32,
    auction_live: bool,
}

impl EntryToken {
    pub(crate) fn new(id: TokenId, size: u32) -> Self {
        Self { id, size, auction_live: false }
    }

    /// Serial number of this token
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Task size this token grants entry for
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the auction this token entered is currently being called
    pub fn auction_live(&self) -> bool {
        self.auction_live
    }

    /// Mark the token as belonging to a live (or no longer live) auction
    pub fn set_auction_live(&mut self, live: bool) {
        self.auction_live = live;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_size_and_serial() {
        let token = EntryToken::new(TokenId::new(5), 3);
        assert_eq!(token.id(), TokenId::new(5));
        assert_eq!(token.size(), 3);
        assert!(!token.auction_live());
    }

    #[test]
    fn test_live_toggle() {
        let mut token = EntryToken::new(TokenId::new(0), 1);
        token.set_auction_live(true);
        assert!(token.auction_live());
        token.set_auction_live(false);
        assert!(!token.auction_live());
    }
}
