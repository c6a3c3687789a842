use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{ElectionId, ElectionStatus},
    election::{Election, Voter, VoterSpec},
};

/// Latest accepted start or end time: the last second of year 9999.
const LATEST_TIMESTAMP: i64 = 253_402_300_799;

/// A request to create an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Start of voting, in unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    /// End of voting, in unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_private: bool,
    /// The exhaustive voter roster of a private election.
    #[serde(default)]
    pub voters: Vec<VoterSpec>,
}

impl ElectionSpec {
    /// Reject malformed specs before they reach the state machine.
    pub fn validate(self) -> Result<ValidatedSpec> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("election name must not be empty"));
        }
        for time in [self.start_time, self.end_time] {
            if !(0..=LATEST_TIMESTAMP).contains(&time.timestamp()) {
                return Err(Error::validation(format!(
                    "election times must lie between 1970 and 9999 (got {})",
                    time.timestamp()
                )));
            }
        }
        if self.start_time >= self.end_time {
            return Err(Error::validation(format!(
                "election must end after it starts (start {}, end {})",
                self.start_time.timestamp(),
                self.end_time.timestamp()
            )));
        }

        if self.is_private {
            if self.voters.is_empty() {
                return Err(Error::validation(
                    "a private election needs a non-empty voter roster",
                ));
            }
            let mut ids = HashSet::new();
            let mut emails = HashSet::new();
            for voter in &self.voters {
                if voter.id.trim().is_empty() {
                    return Err(Error::validation("roster entries need a voter ID"));
                }
                if !voter.email.contains('@') {
                    return Err(Error::validation(format!(
                        "voter {} has an invalid e-mail address",
                        voter.id
                    )));
                }
                if !ids.insert(voter.id.as_str()) {
                    return Err(Error::validation(format!(
                        "voter ID {} appears twice in the roster",
                        voter.id
                    )));
                }
                if !emails.insert(voter.email.to_lowercase()) {
                    return Err(Error::validation(format!(
                        "e-mail {} appears twice in the roster",
                        voter.email
                    )));
                }
            }
        } else if !self.voters.is_empty() {
            return Err(Error::validation(
                "a public election cannot carry a voter roster",
            ));
        }

        Ok(ValidatedSpec(self))
    }
}

/// An election spec that has passed validation and may be given an ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSpec(ElectionSpec);

impl ValidatedSpec {
    /// Build the new election record. Roster entries start out not having voted.
    pub fn into_election(self, id: ElectionId) -> Election {
        let spec = self.0;
        Election {
            id,
            name: spec.name.trim().to_string(),
            description: spec.description,
            start_time: spec.start_time,
            end_time: spec.end_time,
            is_private: spec.is_private,
            status: ElectionStatus::Scheduled,
            candidates: Vec::new(),
            voters: spec.voters.into_iter().map(Voter::registered).collect(),
            revision: 0,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};

    #[test]
    fn valid_specs_become_scheduled_elections() {
        let election = ElectionSpec::private_example()
            .validate()
            .unwrap()
            .into_election(7);
        assert_eq!(election.id, 7);
        assert_eq!(election.status, ElectionStatus::Scheduled);
        assert_eq!(election.voters.len(), 2);
        assert!(election.voters.iter().all(|v| !v.has_voted));
        assert!(election.candidates.is_empty());
    }

    #[test]
    fn end_must_follow_start() {
        let mut spec = ElectionSpec::public_example();
        spec.end_time = spec.start_time;
        assert!(matches!(spec.clone().validate(), Err(Error::Validation(_))));
        spec.end_time = spec.start_time - Duration::seconds(1);
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn times_must_be_in_range() {
        let mut spec = ElectionSpec::public_example();
        spec.end_time = DateTime::<Utc>::MAX_UTC - Duration::seconds(1);
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        let mut spec = ElectionSpec::public_example();
        spec.start_time = DateTime::<Utc>::MIN_UTC;
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        let mut spec = ElectionSpec::public_example();
        spec.end_time = Utc.timestamp_opt(LATEST_TIMESTAMP, 0).unwrap();
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn blank_names_are_rejected() {
        let spec = ElectionSpec {
            name: "  ".to_string(),
            ..ElectionSpec::public_example()
        };
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn rosters_are_checked() {
        // Private without a roster.
        let spec = ElectionSpec {
            voters: Vec::new(),
            ..ElectionSpec::private_example()
        };
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        // Duplicate voter IDs.
        let mut spec = ElectionSpec::private_example();
        spec.voters[1].id = spec.voters[0].id.clone();
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        // Duplicate e-mails, differing only in case.
        let mut spec = ElectionSpec::private_example();
        spec.voters[1].email = spec.voters[0].email.to_uppercase();
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        // Bad e-mail.
        let mut spec = ElectionSpec::private_example();
        spec.voters[0].email = "nobody".to_string();
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        // Public with a roster.
        let spec = ElectionSpec {
            is_private: false,
            ..ElectionSpec::private_example()
        };
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));
    }
}
