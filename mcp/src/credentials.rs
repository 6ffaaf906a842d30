//! Multi-project credential table.
//!
//! Parses `projectId:token,projectId:token` into an ordered, immutable table.

use std::{collections::HashMap, fmt};

use tracing::warn;

use crate::error::CredentialError;

/// Opaque per-project access token. Formatting only ever shows a masked tail.
#[derive(Clone, PartialEq, Eq)]
pub struct ProjectToken(String);

impl ProjectToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for attaching to a backend request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        mask_token(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ProjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProjectToken").field(&self.masked()).finish()
    }
}

impl fmt::Display for ProjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Tokens shorter than this are masked completely.
const MIN_LEN_FOR_TAIL: usize = 8;

/// `****` followed by the last four characters; short tokens are fully masked.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < MIN_LEN_FOR_TAIL {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    entries: Vec<(String, ProjectToken)>,
    index: HashMap<String, usize>,
}

impl CredentialTable {
    /// Parse a credential string. Segments without a separator or project id
    /// are skipped with a warning; an empty token is kept and warned about.
    pub fn parse(raw: &str) -> Self {
        let mut table = Self::default();

        for (index, segment) in raw.split(',').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match Self::parse_entry(index, segment) {
                Ok((project_id, token)) => {
                    if token.is_empty() {
                        warn!(
                            "Credential {}",
                            CredentialError::EmptyToken {
                                index,
                                project_id: project_id.clone(),
                            }
                        );
                    }
                    table.insert(project_id, token);
                }
                Err(e) => warn!("Skipping credential {}", e),
            }
        }

        table
    }

    fn parse_entry(index: usize, segment: &str) -> Result<(String, ProjectToken), CredentialError> {
        let (project_id, token) = segment
            .split_once(':')
            .ok_or(CredentialError::MissingSeparator { index })?;

        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(CredentialError::EmptyProjectId { index });
        }

        Ok((project_id.to_string(), ProjectToken::new(token.trim())))
    }

    // Repeated ids keep their first position and take the latest token.
    fn insert(&mut self, project_id: String, token: ProjectToken) {
        if let Some(&pos) = self.index.get(&project_id) {
            self.entries[pos].1 = token;
        } else {
            self.index.insert(project_id.clone(), self.entries.len());
            self.entries.push((project_id, token));
        }
    }

    pub fn lookup(&self, project_id: &str) -> Option<&ProjectToken> {
        self.index
            .get(project_id)
            .map(|&pos| &self.entries[pos].1)
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.index.contains_key(project_id)
    }

    /// Project ids in configuration order.
    pub fn project_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let table = CredentialTable::parse("10:abc,20:def");
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("10").map(|t| t.expose()), Some("abc"));
        assert_eq!(table.lookup("20").map(|t| t.expose()), Some("def"));
        assert_eq!(table.project_ids().collect::<Vec<_>>(), vec!["10", "20"]);
    }

    #[test]
    fn test_parse_skips_malformed_segments() {
        let table = CredentialTable::parse("10:abc, broken ,:nokey,30:,40: ghi ");
        assert_eq!(table.project_ids().collect::<Vec<_>>(), vec!["10", "30", "40"]);
        assert_eq!(table.lookup("40").map(|t| t.expose()), Some("ghi"));
        assert!(table.lookup("30").is_some_and(ProjectToken::is_empty));
    }

    #[test]
    fn test_parse_entry_errors() {
        assert_eq!(
            CredentialTable::parse_entry(0, "nocolon").unwrap_err(),
            CredentialError::MissingSeparator { index: 0 }
        );
        assert_eq!(
            CredentialTable::parse_entry(3, " :tok").unwrap_err(),
            CredentialError::EmptyProjectId { index: 3 }
        );
        let (id, token) = CredentialTable::parse_entry(1, "12: ").unwrap();
        assert_eq!(id, "12");
        assert!(token.is_empty());
    }

    #[test]
    fn test_repeated_project_last_write_wins() {
        let table = CredentialTable::parse("10:first,20:x,10:second");
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("10").map(|t| t.expose()), Some("second"));
        assert_eq!(table.project_ids().collect::<Vec<_>>(), vec!["10", "20"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(CredentialTable::parse("").is_empty());
        assert!(CredentialTable::parse(" , ,").is_empty());
    }

    #[test]
    fn test_token_is_masked_in_formatting() {
        let token = ProjectToken::new("0123456789abcdef");
        assert_eq!(token.to_string(), "****cdef");
        assert_eq!(format!("{:?}", token), "ProjectToken(\"****cdef\")");
        assert_eq!(mask_token("abc"), "****");
        assert_eq!(mask_token("abcde"), "****");
        assert_eq!(mask_token("abcdefg"), "****");
        assert_eq!(mask_token("abcdefgh"), "****efgh");
    }

    #[test]
    fn test_error_message_omits_token() {
        let err = CredentialError::EmptyToken {
            index: 2,
            project_id: "55".to_string(),
        };
        assert_eq!(err.to_string(), "entry 2 (project '55') has an empty token");
    }
}
