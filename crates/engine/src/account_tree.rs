//! Parent-pointer view of a realm's chart of accounts.
//!
//! Built once per operation from the realm's account rows. Paths to the root
//! are memoized while building, so each account is walked at most once.

use std::collections::HashMap;

use crate::{Account, AccountKind, EngineError, ResultEngine, StandardAccount};

#[derive(Debug, Default)]
pub struct AccountTree {
    parents: HashMap<String, Option<String>>,
    /// Root first, the account itself last.
    paths: HashMap<String, Vec<String>>,
}

impl AccountTree {
    /// Builds the tree and checks that every chain ends at a standard root.
    pub fn build<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> ResultEngine<Self> {
        let parents: HashMap<String, Option<String>> = accounts
            .into_iter()
            .map(|a| (a.id.clone(), a.parent_account_id.clone()))
            .collect();

        let mut tree = Self {
            parents,
            paths: HashMap::new(),
        };
        let ids: Vec<String> = tree.parents.keys().cloned().collect();
        for id in ids {
            tree.memoize_path(&id)?;
        }
        Ok(tree)
    }

    fn memoize_path(&mut self, id: &str) -> ResultEngine<()> {
        // Walk up until a memoized ancestor or a root.
        let mut pending: Vec<String> = Vec::new();
        let mut cursor = Some(id.to_string());
        let mut prefix: Vec<String> = Vec::new();
        while let Some(current) = cursor {
            if let Some(path) = self.paths.get(&current) {
                prefix = path.clone();
                break;
            }
            if pending.contains(&current) {
                return Err(EngineError::Validation(format!(
                    "account {current} is part of a cycle"
                )));
            }
            let parent = self
                .parents
                .get(&current)
                .ok_or_else(|| EngineError::NotFound(format!("parent account {current}")))?
                .clone();
            pending.push(current);
            cursor = parent;
        }

        if prefix.is_empty() {
            let root = pending
                .last()
                .ok_or_else(|| EngineError::NotFound(format!("account {id}")))?;
            if StandardAccount::try_from(root.as_str())
                .map(|s| s.parent().is_some())
                .unwrap_or(true)
            {
                return Err(EngineError::Validation(format!(
                    "account {root} is a root but not a standard root account"
                )));
            }
        }

        for account in pending.into_iter().rev() {
            prefix.push(account.clone());
            self.paths.insert(account, prefix.clone());
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Root first, `id` last.
    pub fn path(&self, id: &str) -> ResultEngine<&[String]> {
        self.paths
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::NotFound(format!("account {id}")))
    }

    pub fn root_of(&self, id: &str) -> ResultEngine<StandardAccount> {
        let path = self.path(id)?;
        let root = path
            .first()
            .ok_or_else(|| EngineError::NotFound(format!("account {id}")))?;
        StandardAccount::try_from(root.as_str())
    }

    pub fn kind_of(&self, id: &str) -> ResultEngine<AccountKind> {
        Ok(self.root_of(id)?.kind())
    }

    /// `true` if `ancestor` is on the path from the root to `id` (inclusive).
    pub fn is_within(&self, id: &str, ancestor: &str) -> bool {
        self.paths
            .get(id)
            .is_some_and(|path| path.iter().any(|p| p == ancestor))
    }

    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.parents
            .iter()
            .filter(move |(_, parent)| parent.as_deref() == Some(id))
            .map(|(child, _)| child.as_str())
    }

    /// `id` and every account below it.
    pub fn subtree(&self, id: &str) -> Vec<String> {
        self.paths
            .iter()
            .filter(|(_, path)| path.iter().any(|p| p == id))
            .map(|(account, _)| account.clone())
            .collect()
    }
}
