use crate::error::{Error, Result};
use crate::ledger::SharedLedger;
use crate::model::{authority::ElectoralAuthority, common::Identity};

/// The self-expanding set of identities allowed to perform privileged writes.
/// Members can grant membership to others; nobody can revoke it.
#[derive(Clone)]
pub struct AuthorityRegistry {
    ledger: SharedLedger,
}

impl AuthorityRegistry {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }

    /// Make `creator` the initial member if it is not one already.
    /// Returns true if it was added.
    pub async fn bootstrap(&self, creator: &Identity) -> Result<bool> {
        let authority = ElectoralAuthority {
            identity: creator.clone(),
            granted_by: None,
        };
        let added = self.ledger.insert_authority(&authority).await?;
        if added {
            info!("Bootstrapped electoral authority {creator}");
        }
        Ok(added)
    }

    pub async fn is_authority(&self, identity: &Identity) -> Result<bool> {
        self.ledger.is_authority(identity).await
    }

    /// Fail with `Unauthorized` unless `caller` is a member.
    pub async fn require(&self, caller: &Identity) -> Result<()> {
        if self.is_authority(caller).await? {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "{caller} is not an electoral authority"
            )))
        }
    }

    /// Grant authority to `new_identity`, on behalf of the existing member `by`.
    /// Granting to an existing member is a no-op that keeps the original grant.
    pub async fn grant_authority(&self, by: &Identity, new_identity: &Identity) -> Result<()> {
        self.require(by).await?;
        let authority = ElectoralAuthority {
            identity: new_identity.clone(),
            granted_by: Some(by.clone()),
        };
        if self.ledger.insert_authority(&authority).await? {
            info!("{by} granted electoral authority to {new_identity}");
        } else {
            debug!("{new_identity} is already an electoral authority");
        }
        Ok(())
    }

    pub async fn authorities(&self) -> Result<Vec<ElectoralAuthority>> {
        self.ledger.authorities().await
    }
}
