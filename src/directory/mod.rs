//! Identity lookups against the corporate directory.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::database::utils::is_valid_email;

pub mod cache;
pub mod ldap;
pub mod manager;
pub mod static_directory;

pub use cache::DirectoryLookup;
pub use ldap::LdapDirectory;
pub use static_directory::StaticDirectory;

/// Attributes read for every person record.
pub const PERSON_ATTRIBUTES: [&str; 6] = ["cn", "sn", "mail", "givenName", "uid", "objectClass"];

/// One person as the directory describes them. Field names follow the LDAP
/// attribute names so records serialize the way clients expect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    #[serde(default)]
    pub cn: String,
    #[serde(rename = "givenName", default)]
    pub given_name: String,
    #[serde(default)]
    pub sn: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub uid: String,
}

impl DirectoryRecord {
    /// "Given Sn <mail>"
    pub fn label(&self) -> String {
        format!("{} {} <{}>", self.given_name, self.sn, self.mail)
    }
}

/// A successful directory bind, with the raw attributes login needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAccount {
    pub record: DirectoryRecord,
    /// Raw `manager` attribute, usually a DN.
    pub manager: Option<String>,
    /// Raw `physicalDeliveryOfficeName`, `City:::Country`.
    pub office: Option<String>,
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    #[error("LDAP operation failed with result code {rc}: {text}")]
    Result { rc: u32, text: String },

    #[error("Directory fixture error: {0}")]
    Fixture(String),
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Exact (or substring) search, or a prefix search when `autocomplete`.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        autocomplete: bool,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError>;

    /// Bind as the user. `Ok(None)` means the credentials were rejected.
    async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<DirectoryAccount>, DirectoryError>;
}

/// LDAP when a URI is configured, else the JSON fixture, else nobody.
pub fn directory_from_config(config: &Config) -> Result<Arc<dyn Directory>, DirectoryError> {
    if !config.ldap.uri.is_empty() {
        log::info!("Using LDAP directory at {}", config.ldap.uri);
        return Ok(Arc::new(LdapDirectory::new(config.ldap.clone())));
    }
    match &config.directory_fixture {
        Some(path) => Ok(Arc::new(StaticDirectory::from_file(path)?)),
        None => {
            log::warn!("No directory configured, only local accounts can log in");
            Ok(Arc::new(StaticDirectory::empty()))
        }
    }
}

/// Prefix every value the way `filter_format` would, wrapped to people with
/// a mail address.
pub fn build_search_filter(query: &str, autocomplete: bool) -> String {
    let inner = if autocomplete {
        let searches: Vec<(&str, &str)> = if let Some(uid) = query.strip_prefix(':') {
            vec![("uid", uid)]
        } else {
            let mut searches = vec![("givenName", query), ("sn", query), ("mail", query)];
            if query.contains(' ') {
                // e.g. "Peter b"
                searches.push(("cn", query));
            }
            searches
        };

        let elements = searches
            .iter()
            .map(|(key, value)| format!("({}={}*)", key, ldap3::ldap_escape(*value)))
            .collect::<Vec<_>>();
        if elements.len() > 1 {
            format!("(|{})", elements.join(""))
        } else {
            elements.join("")
        }
    } else if query.contains('@') && is_valid_email(query) {
        format!("(mail={})", ldap3::ldap_escape(query))
    } else if let Some(uid) = query.strip_prefix(':') {
        format!("(uid={})", ldap3::ldap_escape(uid))
    } else {
        format!("(cn=*{}*)", ldap3::ldap_escape(query))
    };

    wrap_account_filter(&inner)
}

pub fn wrap_account_filter(filter: &str) -> String {
    let filter = if filter.starts_with('(') && filter.ends_with(')') {
        filter.to_string()
    } else {
        format!("({})", filter)
    };
    format!("(&(objectClass=inetOrgPerson)(mail=*){})", filter)
}
