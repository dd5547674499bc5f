//! Registration, sign-in and staff management.

use common::{Role, User, UserId, WalletAddress};
use market_store::{ChangeSet, MarketStore, MarketStoreExt, StoreError};

use crate::commands::NewStaff;
use crate::credentials::{hash_password, validate_password, validate_username, verify_password};
use crate::error::{MarketError, Result};
use crate::service::{Marketplace, stage_user};

impl<S: MarketStore> Marketplace<S> {
    /// Registers a customer account with an empty wallet.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        self.create_account(username, password, Role::Customer, None)
            .await
    }

    /// Checks a username and password.
    ///
    /// Unknown users and wrong passwords are indistinguishable to the caller.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let Some(user) = self.store().find_user_by_username(username).await? else {
            metrics::counter!("marketplace_logins_total", "outcome" => "rejected").increment(1);
            return Err(MarketError::InvalidCredential);
        };

        if !verify_password(password, &user.password_hash).await? {
            metrics::counter!("marketplace_logins_total", "outcome" => "rejected").increment(1);
            return Err(MarketError::InvalidCredential);
        }

        if !user.active {
            metrics::counter!("marketplace_logins_total", "outcome" => "disabled").increment(1);
            return Err(MarketError::AccountDisabled);
        }

        metrics::counter!("marketplace_logins_total", "outcome" => "accepted").increment(1);
        Ok(user)
    }

    #[tracing::instrument(skip(self, new_password))]
    pub async fn change_password(&self, user_id: UserId, new_password: &str) -> Result<User> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password).await?;

        self.commit_with_retry("change_password", move || {
            let password_hash = password_hash.clone();
            async move {
                let mut user = self.user(user_id).await?;
                user.password_hash = password_hash;

                let mut changes = ChangeSet::new();
                let stored = stage_user(&mut changes, user);
                Ok::<_, MarketError>((changes, stored))
            }
        })
        .await
    }

    /// Creates an organizer (by an admin) or a reseller (by an organizer).
    #[tracing::instrument(skip(self))]
    pub async fn create_staff(&self, actor_id: UserId, cmd: NewStaff) -> Result<User> {
        let actor = self.user(actor_id).await?;
        if !actor.role.can_create(cmd.role) {
            return Err(MarketError::PermissionDenied(format!(
                "{} accounts cannot create {} accounts",
                actor.role, cmd.role
            )));
        }

        self.create_account(&cmd.username, &cmd.password, cmd.role, Some(actor.wallet))
            .await
    }

    /// Enables or disables a managed account.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_active(&self, actor_id: UserId, target_id: UserId) -> Result<User> {
        let updated = self
            .commit_with_retry("toggle_active", move || async move {
                let actor = self.user(actor_id).await?;
                let mut target = self.user(target_id).await?;
                ensure_manages(&actor, &target)?;

                target.active = !target.active;
                let mut changes = ChangeSet::new();
                let stored = stage_user(&mut changes, target);
                Ok::<_, MarketError>((changes, stored))
            })
            .await?;

        tracing::info!(user_id = %updated.id, active = updated.active, "account toggled");
        Ok(updated)
    }

    /// Deletes a managed account that has no tickets, events, staff or
    /// ledger entries.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, actor_id: UserId, target_id: UserId) -> Result<()> {
        let actor = self.user(actor_id).await?;
        let target = self.user(target_id).await?;
        ensure_manages(&actor, &target)?;

        match self.store().delete_user(target_id).await {
            Ok(()) => {
                tracing::info!(user_id = %target_id, "account deleted");
                Ok(())
            }
            Err(StoreError::ConstraintViolation(_)) => Err(MarketError::ConstraintViolation(
                format!("{} has trading history and cannot be deleted", target.username),
            )),
            Err(StoreError::NotFound { .. }) => {
                Err(MarketError::UserNotFound(target_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Seeds the admin account once.
    ///
    /// Returns `None` if an admin already exists.
    #[tracing::instrument(skip(self, password))]
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Option<User>> {
        if self.store().has_admin().await? {
            tracing::debug!("admin account already present");
            return Ok(None);
        }

        let admin = self
            .create_account(username, password, Role::Admin, None)
            .await?;
        Ok(Some(admin))
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        role: Role,
        parent: Option<WalletAddress>,
    ) -> Result<User> {
        validate_username(username)?;
        validate_password(password)?;

        if self
            .store()
            .find_user_by_username(username)
            .await?
            .is_some()
        {
            return Err(MarketError::DuplicateUser(username.to_string()));
        }

        let password_hash = hash_password(password).await?;
        let user = User::new(username, password_hash, role, parent);
        let mut changes = ChangeSet::new();
        changes.insert_user(user.clone());

        match self.store().commit(changes).await {
            Ok(()) => {}
            // A concurrent registration took the name between the check and the commit
            Err(StoreError::ConstraintViolation(_)) => {
                return Err(MarketError::DuplicateUser(username.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("marketplace_accounts_created_total", "role" => role.as_str())
            .increment(1);
        tracing::info!(user_id = %user.id, role = role.as_str(), "account created");
        Ok(user)
    }
}

fn ensure_manages(actor: &User, target: &User) -> Result<()> {
    if actor.can_manage(target) {
        Ok(())
    } else {
        Err(MarketError::PermissionDenied(format!(
            "{} cannot manage {}",
            actor.username, target.username
        )))
    }
}
