use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::domain::UserId;

/// Identities allowed to vote. Loaded once at startup and never refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibleVoterSet {
    voters: BTreeSet<UserId>,
}

impl EligibleVoterSet {
    /// Read a one-identity-per-line list from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EligibilityError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EligibilityError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut voters = BTreeSet::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            if record.len() > 1 {
                return Err(EligibilityError::InvalidIdentity {
                    line,
                    value: record.iter().collect::<Vec<_>>().join(","),
                });
            }
            let Some(raw) = record.get(0).filter(|value| !value.is_empty()) else {
                continue;
            };

            let identity = raw
                .parse::<i64>()
                .map_err(|_| EligibilityError::InvalidIdentity {
                    line,
                    value: raw.to_string(),
                })?;
            voters.insert(UserId(identity));
        }

        Ok(Self { voters })
    }

    pub fn contains(&self, identity: UserId) -> bool {
        self.voters.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}

impl FromIterator<UserId> for EligibleVoterSet {
    fn from_iter<T: IntoIterator<Item = UserId>>(iter: T) -> Self {
        Self {
            voters: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug)]
pub enum EligibilityError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidIdentity { line: u64, value: String },
}

impl std::fmt::Display for EligibilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EligibilityError::Io(err) => write!(f, "failed to read eligible voter list: {}", err),
            EligibilityError::Csv(err) => write!(f, "invalid eligible voter list: {}", err),
            EligibilityError::InvalidIdentity { line, value } => write!(
                f,
                "eligible voter list line {}: '{}' is not a user id",
                line, value
            ),
        }
    }
}

impl std::error::Error for EligibilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EligibilityError::Io(err) => Some(err),
            EligibilityError::Csv(err) => Some(err),
            EligibilityError::InvalidIdentity { .. } => None,
        }
    }
}

impl From<std::io::Error> for EligibilityError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for EligibilityError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}
