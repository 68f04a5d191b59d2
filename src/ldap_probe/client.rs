use async_trait::async_trait;
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions,
    SearchResult,
};
use url::Url;

use super::error::DirectoryError;

/// Parameters of the search phase. Scope, alias dereferencing and limits are
/// fixed: whole subtree, never dereference, no size or time limit.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub base: &'a str,
    pub filter: &'a str,
    pub attributes: &'a [String],
}

const SEARCH_SCOPE: Scope = Scope::Subtree;

fn search_options() -> SearchOptions {
    SearchOptions::new()
        .deref(DerefAliases::Never)
        .sizelimit(0)
        .timelimit(0)
        .typesonly(false)
}

/// Opens directory sessions. One session is opened per probe cycle.
#[async_trait]
pub trait DirectoryClient: Send + Sync + 'static {
    type Session: DirectorySession;

    async fn connect(&self, url: &Url) -> Result<Self::Session, DirectoryError>;
}

/// An open directory session owned by a single probe cycle.
#[async_trait]
pub trait DirectorySession: Send {
    async fn bind(&mut self, principal: &str, credential: &str) -> Result<(), DirectoryError>;

    /// Returns the DN of every entry found.
    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<String>, DirectoryError>;

    async fn close(&mut self);
}

/// [`DirectoryClient`] backed by `ldap3`.
#[derive(Clone)]
pub struct LdapClient {
    settings: LdapConnSettings,
}

impl LdapClient {
    pub fn new() -> Self {
        Self {
            settings: LdapConnSettings::new(),
        }
    }
}

pub struct LdapSession {
    ldap: Ldap,
}

#[async_trait]
impl DirectoryClient for LdapClient {
    type Session = LdapSession;

    async fn connect(&self, url: &Url) -> Result<LdapSession, DirectoryError> {
        let (conn, ldap) = LdapConnAsync::with_settings(self.settings.clone(), url.as_str()).await?;

        // The connection driver owns the socket; it exits once the session is unbound.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!(error = %e, "LDAP connection driver stopped");
            }
        });

        Ok(LdapSession { ldap })
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, principal: &str, credential: &str) -> Result<(), DirectoryError> {
        let result = self.ldap.simple_bind(principal, credential).await?;
        if result.rc != 0 {
            return Err(DirectoryError::Result {
                rc: result.rc,
                text: result.text,
            });
        }
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<String>, DirectoryError> {
        let SearchResult(entries, result) = self
            .ldap
            .with_search_options(search_options())
            .search(
                request.base,
                SEARCH_SCOPE,
                request.filter,
                request.attributes,
            )
            .await?;

        if result.rc != 0 {
            return Err(DirectoryError::Result {
                rc: result.rc,
                text: result.text,
            });
        }

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).dn)
            .collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            tracing::warn!(error = %e, "Error during LDAP unbind");
        }
    }
}
