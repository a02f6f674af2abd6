//! Identifier resolution with request-scoped memoization
//!
//! Turns human identifiers (emails, group names, datasource names) into the
//! opaque ids the service addresses entities by. Every workflow owns one
//! resolver for the duration of one invocation; the cache is never shared
//! across invocations, since credentials differ and directories go stale.
//!
//! Resolution is lazy: each directory (users, groups, datasources) is walked
//! at most once, and only when a workflow first needs that identifier kind.

use std::collections::{HashMap, HashSet};

use pulseops_api::{Datasource, FetchError, Paginator, Session};
use thiserror::Error;
use tracing::debug;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Identifier resolution failures
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No user with this email on the site
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No group with this name on the site
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// No datasource with this exact name (names are not guaranteed unique;
    /// the first exact case-sensitive match wins, otherwise not found)
    #[error("datasource not found: {0}")]
    DatasourceNotFound(String),

    /// The directory walk backing the lookup failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Request-scoped identifier resolver
pub struct IdentifierResolver {
    paginator: Paginator,
    users_by_email: Option<HashMap<String, String>>,
    groups_by_name: Option<HashMap<String, String>>,
    datasources: Option<Vec<Datasource>>,
    group_members: HashMap<String, HashSet<String>>,
    remote_walks: usize,
}

impl IdentifierResolver {
    pub fn new(paginator: Paginator) -> Self {
        IdentifierResolver {
            paginator,
            users_by_email: None,
            groups_by_name: None,
            datasources: None,
            group_members: HashMap::new(),
            remote_walks: 0,
        }
    }

    /// Resolve a user id from an email address (case-insensitive match)
    pub async fn user_id_by_email(&mut self, session: &Session, email: &str) -> Result<String> {
        if self.users_by_email.is_none() {
            let users = session.list_users(&self.paginator).await?;
            self.remote_walks += 1;
            debug!("cached {} users for email resolution", users.len());
            self.users_by_email = Some(
                users
                    .into_iter()
                    .map(|u| (u.email.to_lowercase(), u.id))
                    .collect(),
            );
        }

        self.users_by_email
            .as_ref()
            .and_then(|m| m.get(&email.trim().to_lowercase()))
            .cloned()
            .ok_or_else(|| ResolveError::UserNotFound(email.to_string()))
    }

    /// Resolve a group id from its name (case-insensitive match)
    pub async fn group_id_by_name(&mut self, session: &Session, name: &str) -> Result<String> {
        if self.groups_by_name.is_none() {
            let groups = session.list_groups(&self.paginator).await?;
            self.remote_walks += 1;
            debug!("cached {} groups for name resolution", groups.len());
            self.groups_by_name = Some(
                groups
                    .into_iter()
                    .map(|g| (g.name.to_lowercase(), g.id))
                    .collect(),
            );
        }

        self.groups_by_name
            .as_ref()
            .and_then(|m| m.get(&name.trim().to_lowercase()))
            .cloned()
            .ok_or_else(|| ResolveError::GroupNotFound(name.to_string()))
    }

    /// Member user-id set of a group, cached per group id
    pub async fn group_member_ids(
        &mut self,
        session: &Session,
        group_id: &str,
    ) -> Result<HashSet<String>> {
        if let Some(members) = self.group_members.get(group_id) {
            return Ok(members.clone());
        }

        let members = session
            .list_group_members(group_id, &self.paginator)
            .await?;
        self.remote_walks += 1;
        let ids: HashSet<String> = members.into_iter().map(|u| u.id).collect();
        self.group_members.insert(group_id.to_string(), ids.clone());
        Ok(ids)
    }

    /// Resolve a datasource id from its name.
    ///
    /// Datasource names are not unique on the service; the first exact
    /// case-sensitive match in collection order wins.
    pub async fn datasource_id_by_name(&mut self, session: &Session, name: &str) -> Result<String> {
        let datasources = self.datasources_cached(session).await?;
        datasources
            .iter()
            .find(|ds| ds.name == name)
            .map(|ds| ds.id.clone())
            .ok_or_else(|| ResolveError::DatasourceNotFound(name.to_string()))
    }

    /// Resolve a datasource name from its id, tolerantly.
    ///
    /// Export must never fail solely because a datasource vanished, so an
    /// unresolvable id comes back as itself.
    pub async fn datasource_name_by_id(&mut self, session: &Session, id: &str) -> String {
        match self.datasources_cached(session).await {
            Ok(datasources) => datasources
                .iter()
                .find(|ds| ds.id == id)
                .map(|ds| ds.name.clone())
                .unwrap_or_else(|| id.to_string()),
            Err(_) => id.to_string(),
        }
    }

    /// Name lookup table for every known datasource id
    pub async fn datasource_name_map(&mut self, session: &Session) -> HashMap<String, String> {
        match self.datasources_cached(session).await {
            Ok(datasources) => datasources
                .iter()
                .map(|ds| (ds.id.clone(), ds.name.clone()))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Number of directory walks issued so far; memoization means this stays
    /// at most one per identifier kind (plus one per distinct group)
    pub fn remote_walks(&self) -> usize {
        self.remote_walks
    }

    async fn datasources_cached(&mut self, session: &Session) -> Result<&Vec<Datasource>> {
        let datasources = match self.datasources.take() {
            Some(cached) => cached,
            None => {
                let fetched = session.list_datasources(&self.paginator).await?;
                self.remote_walks += 1;
                debug!("cached {} datasources for resolution", fetched.len());
                fetched
            }
        };
        Ok(self.datasources.insert(datasources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseops_http::{HttpClient, HttpClientTrait, HttpConfig};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> Session {
        let client: Arc<dyn HttpClientTrait> =
            Arc::new(HttpClient::new(HttpConfig::fast()).unwrap());
        Session::from_parts(client, server.uri(), "3.24", "tok", "site-1", "user-1")
    }

    async fn mount_users(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/3.24/sites/site-1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": {"user": [
                    {"id": "u-1", "name": "ada", "email": "Ada@Example.com"},
                    {"id": "u-2", "name": "grace", "email": "grace@example.com"}
                ]},
                "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "2"}
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn email_resolution_is_case_insensitive() {
        let server = MockServer::start().await;
        mount_users(&server, 1).await;

        let session = session_for(&server);
        let mut resolver = IdentifierResolver::new(Paginator::default());

        let id = resolver
            .user_id_by_email(&session, "ada@example.com")
            .await
            .unwrap();
        assert_eq!(id, "u-1");
    }

    #[tokio::test]
    async fn repeated_resolution_issues_one_walk() {
        let server = MockServer::start().await;
        mount_users(&server, 1).await;

        let session = session_for(&server);
        let mut resolver = IdentifierResolver::new(Paginator::default());

        for _ in 0..3 {
            resolver
                .user_id_by_email(&session, "grace@example.com")
                .await
                .unwrap();
        }
        resolver
            .user_id_by_email(&session, "ada@example.com")
            .await
            .unwrap();

        assert_eq!(resolver.remote_walks(), 1);
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let server = MockServer::start().await;
        mount_users(&server, 1).await;

        let session = session_for(&server);
        let mut resolver = IdentifierResolver::new(Paginator::default());

        let result = resolver.user_id_by_email(&session, "noone@example.com").await;
        assert!(matches!(result, Err(ResolveError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn datasource_first_exact_match_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.24/sites/site-1/datasources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasources": {"datasource": [
                    {"id": "ds-1", "name": "Sales"},
                    {"id": "ds-2", "name": "Sales"},
                    {"id": "ds-3", "name": "sales"}
                ]},
                "pagination": {"totalAvailable": "3"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let mut resolver = IdentifierResolver::new(Paginator::default());

        // Case-sensitive; duplicates resolve to the first in collection order
        assert_eq!(
            resolver.datasource_id_by_name(&session, "Sales").await.unwrap(),
            "ds-1"
        );
        assert!(matches!(
            resolver.datasource_id_by_name(&session, "SALES").await,
            Err(ResolveError::DatasourceNotFound(_))
        ));

        // Reverse lookup is tolerant
        assert_eq!(resolver.datasource_name_by_id(&session, "ds-2").await, "Sales");
        assert_eq!(
            resolver.datasource_name_by_id(&session, "ds-gone").await,
            "ds-gone"
        );
        assert_eq!(resolver.remote_walks(), 1);
    }

    #[tokio::test]
    async fn group_members_cached_per_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.24/sites/site-1/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "groups": {"group": [{"id": "g-1", "name": "Certifiers"}]},
                "pagination": {"totalAvailable": "1"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/3.24/sites/site-1/groups/g-1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": {"user": [{"id": "u-1"}, {"id": "u-2"}]},
                "pagination": {"totalAvailable": "2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let mut resolver = IdentifierResolver::new(Paginator::default());

        let group_id = resolver
            .group_id_by_name(&session, "certifiers")
            .await
            .unwrap();
        let first = resolver.group_member_ids(&session, &group_id).await.unwrap();
        let second = resolver.group_member_ids(&session, &group_id).await.unwrap();

        assert_eq!(first, second);
        assert!(first.contains("u-1"));
        assert_eq!(resolver.remote_walks(), 2);
    }
}
