//! Endpoint classification.
//!
//! The core treats endpoints as opaque strings. These helpers are what the
//! validators and the remote backends use to tell local paths from
//! `[user@]host:path` addresses and HDFS paths.

use std::fmt;
use std::path::Path;

/// Scheme prefix that always marks an HDFS path.
pub const HDFS_SCHEME: &str = "hdfs://";

/// A parsed `[user@]host:path` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub user: Option<String>,
    pub host: String,
    pub path: String,
}

impl RemoteEndpoint {
    /// Parse `[user@]host:path`.
    ///
    /// The host part sits before the first `:`, must be non-empty and must not
    /// contain `/`, so `./a:b` and `/tmp/x:y` stay local.
    pub fn parse(endpoint: &str) -> Option<Self> {
        let (authority, path) = endpoint.split_once(':')?;
        if authority.is_empty() || authority.contains('/') {
            return None;
        }

        let (user, host) = match authority.rsplit_once('@') {
            Some((user, host)) => (Some(user.to_string()).filter(|u| !u.is_empty()), host),
            None => (None, authority),
        };
        if host.is_empty() {
            return None;
        }

        Some(RemoteEndpoint {
            user,
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// The `[user@]host` part, as ssh expects it.
    pub fn authority(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Same endpoint with `user` filled in when it has none.
    pub fn with_default_user(mut self, user: Option<&str>) -> Self {
        if self.user.is_none() {
            self.user = user.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority(), self.path)
    }
}

/// True when the string uses remote-address syntax.
pub fn is_remote_address(endpoint: &str) -> bool {
    RemoteEndpoint::parse(endpoint).is_some()
}

/// True when the string names an HDFS path: an explicit scheme, or an
/// absolute path that does not exist on the local filesystem.
pub fn is_hdfs_path(endpoint: &str) -> bool {
    if endpoint.starts_with(HDFS_SCHEME) {
        return true;
    }
    // HDFS paths are POSIX-style whatever the host platform
    endpoint.starts_with('/') && !Path::new(endpoint).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_host_path() {
        let endpoint = RemoteEndpoint::parse("deploy@example.com:/srv/data").unwrap();
        assert_eq!(endpoint.user.as_deref(), Some("deploy"));
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.path, "/srv/data");
        assert_eq!(endpoint.authority(), "deploy@example.com");
        assert_eq!(endpoint.to_string(), "deploy@example.com:/srv/data");
    }

    #[test]
    fn test_parse_host_only() {
        let endpoint = RemoteEndpoint::parse("example.com:backup/").unwrap();
        assert_eq!(endpoint.user, None);
        assert_eq!(endpoint.path, "backup/");
    }

    #[test]
    fn test_local_paths_are_not_remote() {
        assert!(!is_remote_address("/tmp/file.txt"));
        assert!(!is_remote_address("relative/file.txt"));
        assert!(!is_remote_address("./odd:name"));
        assert!(!is_remote_address(":/path"));
        assert!(!is_remote_address("user@:/path"));
        assert!(is_remote_address("user@host:/path/file.txt"));
    }

    #[test]
    fn test_with_default_user() {
        let endpoint = RemoteEndpoint::parse("host:/p").unwrap().with_default_user(Some("ops"));
        assert_eq!(endpoint.to_string(), "ops@host:/p");

        let endpoint = RemoteEndpoint::parse("me@host:/p").unwrap().with_default_user(Some("ops"));
        assert_eq!(endpoint.to_string(), "me@host:/p");
    }

    #[test]
    fn test_hdfs_classification() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let existing = temp_dir.path().to_string_lossy().to_string();

        assert!(is_hdfs_path("hdfs://namenode/data"));
        assert!(is_hdfs_path("/definitely/not/on/this/machine"));
        assert!(!is_hdfs_path(&existing));
        assert!(!is_hdfs_path("relative.txt"));
    }
}
