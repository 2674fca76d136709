use async_trait::async_trait;
use serde::Deserialize;

use super::{Directory, DirectoryAccount, DirectoryError, DirectoryRecord, manager::clean_manager_attr};
use crate::database::utils::is_valid_email;

/// A person in the static directory, with optional credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticPerson {
    #[serde(flatten)]
    pub record: DirectoryRecord,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default, rename = "physicalDeliveryOfficeName")]
    pub office: Option<String>,
}

/// In-memory directory for development and tests. Searches mimic the LDAP
/// filters, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    people: Vec<StaticPerson>,
}

fn starts_with(haystack: &str, prefix: &str) -> bool {
    !haystack.is_empty() && haystack.to_lowercase().starts_with(&prefix.to_lowercase())
}

impl StaticDirectory {
    pub fn new(people: Vec<StaticPerson>) -> Self {
        Self { people }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a JSON array of people from disk.
    pub fn from_file(path: &str) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Fixture(format!("{}: {}", path, e)))?;
        let people: Vec<StaticPerson> = serde_json::from_str(&raw)
            .map_err(|e| DirectoryError::Fixture(format!("{}: {}", path, e)))?;
        log::info!("Loaded {} people from {}", people.len(), path);
        Ok(Self { people })
    }

    pub fn with_person(mut self, person: StaticPerson) -> Self {
        self.people.push(person);
        self
    }

    fn matches(record: &DirectoryRecord, query: &str, autocomplete: bool) -> bool {
        if record.mail.is_empty() {
            return false;
        }
        if autocomplete {
            if let Some(uid) = query.strip_prefix(':') {
                return starts_with(&record.uid, uid);
            }
            starts_with(&record.given_name, query)
                || starts_with(&record.sn, query)
                || starts_with(&record.mail, query)
                || (query.contains(' ') && starts_with(&record.cn, query))
        } else if query.contains('@') && is_valid_email(query) {
            record.mail.eq_ignore_ascii_case(query)
        } else if let Some(uid) = query.strip_prefix(':') {
            record.uid == uid
        } else {
            record.cn.to_lowercase().contains(&query.to_lowercase())
        }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        autocomplete: bool,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let matches = self
            .people
            .iter()
            .filter(|person| Self::matches(&person.record, query, autocomplete))
            .map(|person| person.record.clone());

        Ok(if limit > 0 {
            matches.take(limit).collect()
        } else {
            matches.collect()
        })
    }

    async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<DirectoryAccount>, DirectoryError> {
        if password.is_empty() {
            return Ok(None);
        }

        let account = self
            .people
            .iter()
            .find(|person| {
                (person.record.mail.eq_ignore_ascii_case(login) || person.record.uid == login)
                    && person.password.as_deref() == Some(password)
            })
            .map(|person| DirectoryAccount {
                record: person.record.clone(),
                manager: person.manager.as_deref().map(clean_manager_attr),
                office: person.office.clone(),
            });

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn person(given: &str, sn: &str, mail: &str, uid: &str) -> StaticPerson {
        StaticPerson {
            record: DirectoryRecord {
                cn: format!("{} {}", given, sn),
                given_name: given.to_string(),
                sn: sn.to_string(),
                mail: mail.to_string(),
                uid: uid.to_string(),
            },
            ..Default::default()
        }
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::empty()
            .with_person(person("Peter", "Bengtsson", "peter@mozilla.com", "peterbe"))
            .with_person(person("Laura", "Thomson", "laura@mozilla.com", "laura"))
            .with_person(StaticPerson {
                password: Some("secret".to_string()),
                manager: Some("mail=laura@mozilla.com,o=com,dc=mozilla".to_string()),
                office: Some("London:::GB".to_string()),
                ..person("Bob", "Builder", "bob@mozilla.com", "bob")
            })
    }

    #[tokio::test]
    async fn test_autocomplete_matches_prefixes() {
        let found = directory().search("pet", 30, true).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].mail, "peter@mozilla.com");

        let found = directory().search("laura t", 30, true).await.unwrap();
        assert_eq!(found.len(), 1);

        let found = directory().search(":bo", 30, true).await.unwrap();
        assert_eq!(found[0].uid, "bob");
    }

    #[tokio::test]
    async fn test_exact_search_by_email() {
        let found = directory().search("LAURA@mozilla.com", 1, false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].given_name, "Laura");

        let found = directory().search("nobody@mozilla.com", 1, false).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_returns_manager_email() {
        let account = directory()
            .authenticate("bob@mozilla.com", "secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.manager.as_deref(), Some("laura@mozilla.com"));
        assert_eq!(account.office.as_deref(), Some("London:::GB"));

        assert!(directory().authenticate("bob@mozilla.com", "wrong").await.unwrap().is_none());
        assert!(directory().authenticate("peter@mozilla.com", "").await.unwrap().is_none());
    }
}
