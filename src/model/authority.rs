use serde::{Deserialize, Serialize};

use crate::model::common::Identity;

/// A member of the append-only set of identities allowed to perform privileged writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectoralAuthority {
    #[serde(rename = "_id")]
    pub identity: Identity,
    /// Who granted this authority. `None` only for the bootstrap member.
    pub granted_by: Option<Identity>,
}

/// A member of the authority set, as listed to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityMember {
    pub identity: Identity,
    pub granted_by: Option<Identity>,
}

impl From<ElectoralAuthority> for AuthorityMember {
    fn from(authority: ElectoralAuthority) -> Self {
        Self {
            identity: authority.identity,
            granted_by: authority.granted_by,
        }
    }
}

/// Request body for granting authority to a new identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityGrant {
    pub identity: Identity,
}

/// Answer to an authority membership query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityCheck {
    pub is_authority: bool,
}
