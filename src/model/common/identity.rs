use std::fmt::{Display, Formatter};

use rocket::{
    http::Status,
    request::{FromParam, FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

/// Header carrying the caller's asserted identity. Proving ownership of the
/// identity (e.g. a wallet signature) happens upstream of this service.
pub const IDENTITY_HEADER: &str = "X-Identity";

/// An opaque caller identity, such as a ledger address or key.
/// Never empty, and never has surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create an identity, trimming surrounding whitespace.
    /// Returns `None` for an empty identity.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = &'static str;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Identity::new(raw).ok_or("identity must not be blank")
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> FromParam<'a> for Identity {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        Identity::new(param).ok_or(param)
    }
}

/// The identity a request was made as.
/// Requests without the header fail with 401 before reaching any handler.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Identity {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one(IDENTITY_HEADER).and_then(Identity::new) {
            Some(identity) => Outcome::Success(identity),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
