use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions, SearchResult,
    dn_escape,
};

use super::{
    Directory, DirectoryAccount, DirectoryError, DirectoryRecord, PERSON_ATTRIBUTES,
    build_search_filter, manager::clean_manager_attr,
};
use crate::config::LdapConfig;

const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;

pub struct LdapDirectory {
    config: LdapConfig,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let settings = LdapConnSettings::new().set_starttls(self.config.start_tls);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.uri).await?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    /// Logins without a domain get the configured one.
    fn login_email(&self, login: &str) -> String {
        if login.contains('@') {
            login.to_string()
        } else {
            format!("{}@{}", login, self.config.email_domain)
        }
    }

    fn user_dn(&self, email: &str) -> String {
        self.config
            .user_dn_template
            .replace("%(user)s", &dn_escape(email))
    }

    async fn run_search(
        &self,
        ldap: &mut Ldap,
        filter: &str,
        attrs: Vec<&str>,
        limit: usize,
    ) -> Result<Vec<HashMap<String, Vec<String>>>, DirectoryError> {
        if limit > 0 {
            ldap.with_search_options(
                SearchOptions::new().sizelimit(i32::try_from(limit).unwrap_or(i32::MAX)),
            );
        }
        let SearchResult(rs, res) = ldap
            .search(&self.config.search_base, Scope::Subtree, filter, attrs)
            .await?;
        if res.rc != RC_SUCCESS && res.rc != RC_SIZE_LIMIT_EXCEEDED {
            return Err(DirectoryError::Result {
                rc: res.rc,
                text: res.text,
            });
        }

        Ok(rs
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).attrs)
            .collect())
    }
}

fn first(attrs: &HashMap<String, Vec<String>>, key: &str) -> Option<String> {
    attrs.get(key).and_then(|values| values.first()).cloned()
}

fn record_from_attrs(attrs: &HashMap<String, Vec<String>>) -> DirectoryRecord {
    DirectoryRecord {
        cn: first(attrs, "cn").unwrap_or_default(),
        given_name: first(attrs, "givenName").unwrap_or_default(),
        sn: first(attrs, "sn").unwrap_or_default(),
        mail: first(attrs, "mail").unwrap_or_default(),
        uid: first(attrs, "uid").unwrap_or_default(),
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        autocomplete: bool,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let filter = build_search_filter(query, autocomplete);
        log::debug!("LDAP search {}", filter);

        let mut ldap = self.connect().await?;
        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await?
            .success()?;

        let entries = self
            .run_search(&mut ldap, &filter, PERSON_ATTRIBUTES.to_vec(), limit)
            .await;
        let _ = ldap.unbind().await;

        let mut records: Vec<DirectoryRecord> =
            entries?.iter().map(record_from_attrs).collect();
        if limit > 0 {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<DirectoryAccount>, DirectoryError> {
        // An empty password would be an anonymous bind
        if password.is_empty() {
            return Ok(None);
        }

        let email = self.login_email(login);
        let mut ldap = self.connect().await?;
        let bind = ldap.simple_bind(&self.user_dn(&email), password).await?;
        if bind.rc == RC_INVALID_CREDENTIALS {
            log::info!("Directory rejected credentials for {}", email);
            return Ok(None);
        }
        bind.success()?;

        // Manager and office are only readable with the user's own bind
        let filter = format!("(mail={})", ldap3::ldap_escape(email.as_str()));
        let mut attrs = PERSON_ATTRIBUTES.to_vec();
        attrs.push("manager");
        attrs.push("physicalDeliveryOfficeName");
        let entries = self.run_search(&mut ldap, &filter, attrs, 1).await;
        let _ = ldap.unbind().await;

        let account = match entries?.first() {
            Some(attrs) => DirectoryAccount {
                record: record_from_attrs(attrs),
                manager: first(attrs, "manager").map(|dn| clean_manager_attr(&dn)),
                office: first(attrs, "physicalDeliveryOfficeName"),
            },
            None => DirectoryAccount {
                record: DirectoryRecord {
                    mail: email.clone(),
                    ..Default::default()
                },
                manager: None,
                office: None,
            },
        };

        Ok(Some(account))
    }
}
