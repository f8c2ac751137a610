//! Candidate record parsing and deduplication.

use std::collections::HashSet;
use std::fmt;

use crate::error::RecordError;

const FIELD_DELIMITER: char = ',';

/// One relay endpoint to validate, as declared in the input list.
///
/// `group` and `org` are the declared values; the validator replaces them
/// with what the resolution service reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: String,
    pub port: u16,
    pub group: String,
    pub org: String,
}

impl Candidate {
    /// Parse one `address,port,group,org` record. Fields past the fourth are
    /// ignored.
    pub fn parse_record(record: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = record.split(FIELD_DELIMITER).map(str::trim).collect();
        if fields.len() < 4 {
            return Err(RecordError::MissingFields(fields.len()));
        }

        let port = fields[1]
            .parse::<u16>()
            .map_err(|_| RecordError::InvalidPort(fields[1].to_string()))?;

        Ok(Self {
            address: fields[0].to_string(),
            port,
            group: fields[2].to_string(),
            org: sanitize_org(fields[3]),
        })
    }

    /// Identity of the endpoint for deduplication.
    pub fn key(&self) -> (&str, u16) {
        (self.address.as_str(), self.port)
    }

    /// The `address,port,group,org` form written back to the raw list.
    pub fn raw_record(&self) -> String {
        format!("{},{},{},{}", self.address, self.port, self.group, self.org)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Upstream lists encode spaces in organisation names as `+`.
fn sanitize_org(org: &str) -> String {
    org.replace('+', " ")
}

/// Deduplicated candidates in first-seen input order.
#[derive(Debug, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    skipped: usize,
    duplicates: usize,
}

impl CandidateSet {
    /// Parse raw records, skipping blank and malformed ones and keeping the
    /// first occurrence of every `(address, port)`.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = CandidateSet::default();
        let mut seen: HashSet<(String, u16)> = HashSet::new();

        for (index, record) in records.into_iter().enumerate() {
            if record.trim().is_empty() {
                continue;
            }
            let candidate = match Candidate::parse_record(record) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping malformed record");
                    set.skipped += 1;
                    continue;
                }
            };
            let (address, port) = candidate.key();
            if !seen.insert((address.to_string(), port)) {
                set.duplicates += 1;
                continue;
            }
            set.candidates.push(candidate);
        }

        set
    }

    /// Parse the full text of a candidate list file.
    pub fn from_text(text: &str) -> Self {
        Self::from_records(text.lines())
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of non-blank records that failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of records dropped as repeats of an earlier `(address, port)`.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Sanitized raw records, in input order.
    pub fn raw_records(&self) -> Vec<String> {
        self.candidates.iter().map(Candidate::raw_record).collect()
    }
}
