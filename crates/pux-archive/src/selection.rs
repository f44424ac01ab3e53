//! Selection of accounts and vaults to keep.
//!
//! A [`SelectionSpec`] is an ordered list of tokens naming vaults, optionally
//! scoped to an account. Names and uuids are interchangeable and `*` matches
//! anything. [`ResolvedSelection`] folds the tokens into a per-account
//! [`VaultSelector`].

use std::collections::{BTreeSet, HashMap};

/// Wildcard accepted in either position of a selection token.
pub const WILDCARD: &str = "*";

/// One selection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    /// Vault name or uuid, in every account.
    Vault(String),
    /// Vault name or uuid within one account (by name or uuid).
    AccountVault { account: String, vault: String },
}

impl SelectionToken {
    pub fn vault(vault: impl Into<String>) -> Self {
        SelectionToken::Vault(vault.into())
    }

    pub fn account_vault(account: impl Into<String>, vault: impl Into<String>) -> Self {
        SelectionToken::AccountVault {
            account: account.into(),
            vault: vault.into(),
        }
    }

    /// Account and vault components with the wildcard normalized to `None`.
    pub fn components(&self) -> (Option<&str>, Option<&str>) {
        match self {
            SelectionToken::Vault(vault) => (None, non_wild(vault)),
            SelectionToken::AccountVault { account, vault } => (non_wild(account), non_wild(vault)),
        }
    }
}

fn non_wild(token: &str) -> Option<&str> {
    if token == WILDCARD {
        None
    } else {
        Some(token)
    }
}

/// Ordered list of selection tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSpec {
    tokens: Vec<SelectionToken>,
}

impl SelectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: SelectionToken) {
        self.tokens.push(token);
    }

    /// Add a vault token applying to every account.
    pub fn with_vault(mut self, vault: impl Into<String>) -> Self {
        self.push(SelectionToken::vault(vault));
        self
    }

    /// Add a vault token scoped to one account.
    pub fn with_account_vault(mut self, account: impl Into<String>, vault: impl Into<String>) -> Self {
        self.push(SelectionToken::account_vault(account, vault));
        self
    }

    pub fn tokens(&self) -> &[SelectionToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<SelectionToken> for SelectionSpec {
    fn from_iter<I: IntoIterator<Item = SelectionToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

/// Vault include tokens for one account.
///
/// `include_all` plays the role of the wildcard token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultSelector {
    include_all: bool,
    tokens: BTreeSet<String>,
}

impl VaultSelector {
    /// Selector matching every vault.
    pub fn all() -> Self {
        Self {
            include_all: true,
            tokens: BTreeSet::new(),
        }
    }

    /// Selector matching nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a token; `None` is the wildcard.
    pub fn insert(&mut self, token: Option<&str>) {
        match token {
            None => self.include_all = true,
            Some(token) => {
                self.tokens.insert(token.to_string());
            }
        }
    }

    /// Union with another selector.
    pub fn extend(&mut self, other: &VaultSelector) {
        self.include_all |= other.include_all;
        self.tokens.extend(other.tokens.iter().cloned());
    }

    pub fn includes_all(&self) -> bool {
        self.include_all
    }

    /// Specific name/uuid tokens.
    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    /// Whether nothing can match.
    pub fn is_empty(&self) -> bool {
        !self.include_all && self.tokens.is_empty()
    }

    /// A vault matches on the wildcard, its uuid, or its name.
    pub fn matches(&self, uuid: &str, name: &str) -> bool {
        self.include_all || self.tokens.contains(uuid) || self.tokens.contains(name)
    }
}

impl<'t> FromIterator<Option<&'t str>> for VaultSelector {
    fn from_iter<I: IntoIterator<Item = Option<&'t str>>>(iter: I) -> Self {
        let mut selector = VaultSelector::none();
        for token in iter {
            selector.insert(token);
        }
        selector
    }
}

/// Selection folded by account token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    select_everything: bool,
    wildcard_account: Option<VaultSelector>,
    by_account: HashMap<String, VaultSelector>,
}

impl ResolvedSelection {
    /// Selection that keeps every account and vault.
    pub fn everything() -> Self {
        Self {
            select_everything: true,
            ..Self::default()
        }
    }

    /// Fold a selection; `None` selects everything.
    pub fn from_spec(spec: Option<&SelectionSpec>) -> Self {
        let Some(spec) = spec else {
            return Self::everything();
        };

        let mut resolved = Self::default();
        for token in spec.tokens() {
            let (account, vault) = token.components();
            let selector = match account {
                None => resolved.wildcard_account.get_or_insert_with(VaultSelector::none),
                Some(account) => resolved.by_account.entry(account.to_string()).or_default(),
            };
            selector.insert(vault);
        }
        resolved
    }

    /// Every account is kept when nothing was specified or any token
    /// applies to all accounts.
    pub fn include_all_accounts(&self) -> bool {
        self.select_everything || self.wildcard_account.is_some()
    }

    /// Vault tokens registered for every account.
    pub fn wildcard_account_vaults(&self) -> Option<&VaultSelector> {
        self.wildcard_account.as_ref()
    }

    /// Vault selector for an account, or `None` if the account is not kept.
    ///
    /// The account is matched by name and by uuid. An account kept only
    /// because all accounts are kept, with no tokens aimed at it, keeps all
    /// its vaults.
    pub fn selector_for(&self, account_name: &str, account_uuid: &str) -> Option<VaultSelector> {
        let by_name = self.by_account.get(account_name);
        let by_uuid = self.by_account.get(account_uuid);

        if !(self.include_all_accounts() || by_name.is_some() || by_uuid.is_some()) {
            return None;
        }

        let mut selector = VaultSelector::none();
        if self.select_everything {
            selector.insert(None);
        }
        for source in [self.wildcard_account.as_ref(), by_name, by_uuid]
            .into_iter()
            .flatten()
        {
            selector.extend(source);
        }
        if by_name.is_none() && by_uuid.is_none() && self.wildcard_account.is_none() {
            selector.insert(None);
        }

        Some(selector)
    }
}
