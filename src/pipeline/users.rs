//! Users phase

use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::coordinator::{ImportPipeline, ItemError, ItemOutcome};
use crate::store::{StoreError, TargetStore, UserLookup};
use crate::types::{EntityKind, UserStrategy, ADMIN_ID, SENTINEL_ID};
use crate::wxr::AuthorInfo;

impl<S: TargetStore + ?Sized> ImportPipeline<'_, S> {
    pub(super) fn import_users(&mut self) {
        let summary = self.summary;

        if self.config.user_strategy == UserStrategy::MapToAdmin {
            for email in summary.authors.keys() {
                self.cache.users.insert(email.clone(), ADMIN_ID);
                self.record(EntityKind::User, Ok(ItemOutcome::Mapped(ADMIN_ID)));
            }
            debug!("Mapped {} authors to the admin account", summary.authors.len());
            return;
        }

        // Login names handed out during this run, so dry runs suffix consistently
        let mut assigned: BTreeSet<String> = BTreeSet::new();

        for (email, author) in &summary.authors {
            let result = match self.cache.users.get(email).copied() {
                Some(id) => Ok(ItemOutcome::Mapped(id)),
                None => self.import_user(email, author, &mut assigned),
            };

            match &result {
                Ok(ItemOutcome::Created(id) | ItemOutcome::Mapped(id)) => {
                    self.cache.users.insert(email.clone(), *id);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("{}; mapping author to admin", e);
                    self.cache.users.insert(email.clone(), ADMIN_ID);
                }
            }
            self.stats.record(EntityKind::User, &result);
        }
    }

    fn import_user(
        &mut self,
        email: &str,
        author: &AuthorInfo,
        assigned: &mut BTreeSet<String>,
    ) -> Result<ItemOutcome, ItemError> {
        let lookup = |e| ItemError::write(EntityKind::User, email, e);

        if let Some(id) = self
            .store
            .find_user(UserLookup::Email(email))
            .map_err(lookup)?
        {
            return Ok(ItemOutcome::Mapped(id));
        }

        let name = self.unique_login(&author.login, assigned).map_err(lookup)?;
        assigned.insert(name.clone());

        if self.config.dry_run {
            return Ok(ItemOutcome::Created(SENTINEL_ID));
        }

        let id = self.store.create_user(&name, email).map_err(lookup)?;
        debug!("Created user {} for {}", name, email);
        Ok(ItemOutcome::Created(id))
    }

    /// `login`, or `login_2`, `login_3`, ... until free in the store and this run
    fn unique_login(
        &self,
        login: &str,
        assigned: &BTreeSet<String>,
    ) -> Result<String, StoreError> {
        let mut candidate = login.to_string();
        let mut suffix = 2;
        while assigned.contains(&candidate)
            || self.store.find_user(UserLookup::Name(&candidate))?.is_some()
        {
            candidate = format!("{}_{}", login, suffix);
            suffix += 1;
        }
        Ok(candidate)
    }
}
