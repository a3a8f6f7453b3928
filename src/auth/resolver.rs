use once_cell::sync::OnceCell;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Credentials, ServiceAccountCredentials};
use crate::errors::{FcmError, FcmResult};

/// Where the client's signing identity comes from
#[derive(Clone)]
pub enum CredentialSource {
    /// A credential object built by the caller
    Provided(Arc<dyn Credentials>),
    /// A service account key file, parsed on first use
    KeyFile(PathBuf),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided(_) => f.write_str("Provided(..)"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// Resolves the credential and the target project for one client
///
/// Both are computed at most once. The key file is not touched until a token
/// or a project id is actually needed, so an explicit project id plus a
/// provided credential never causes file I/O.
pub struct CredentialResolver {
    source: CredentialSource,
    explicit_project_id: Option<String>,
    http_client: reqwest::Client,
    credentials: OnceCell<Arc<dyn Credentials>>,
    project_id: OnceCell<String>,
}

impl CredentialResolver {
    /// Pick a credential source; a provided credential wins over a key file
    pub fn new(
        credentials: Option<Arc<dyn Credentials>>,
        service_account_file: Option<PathBuf>,
        project_id: Option<String>,
        http_client: reqwest::Client,
    ) -> FcmResult<Self> {
        let source = match (credentials, service_account_file) {
            (Some(credentials), _) => CredentialSource::Provided(credentials),
            (None, Some(path)) => CredentialSource::KeyFile(path),
            (None, None) => {
                return Err(FcmError::authentication(
                    "Please provide a service account file path or credentials in the constructor",
                ))
            }
        };

        Ok(Self {
            source,
            explicit_project_id: project_id,
            http_client,
            credentials: OnceCell::new(),
            project_id: OnceCell::new(),
        })
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// The resolved credential, loading the key file on first call
    pub fn credentials(&self) -> FcmResult<&Arc<dyn Credentials>> {
        self.credentials.get_or_try_init(|| match &self.source {
            CredentialSource::Provided(credentials) => Ok(Arc::clone(credentials)),
            CredentialSource::KeyFile(path) => {
                debug!(path = %path.display(), "Loading service account key file");
                let credentials =
                    ServiceAccountCredentials::from_file(path, self.http_client.clone())
                        .map_err(|e| FcmError::Authentication {
                            message: format!(
                                "Failed to load service account file {}",
                                path.display()
                            ),
                            source: Some(e.into()),
                        })?;
                Ok(Arc::new(credentials) as Arc<dyn Credentials>)
            }
        })
    }

    /// Explicit project id, else the one embedded in the credential
    pub fn project_id(&self) -> FcmResult<&str> {
        self.project_id
            .get_or_try_init(|| {
                if let Some(project_id) = &self.explicit_project_id {
                    return Ok(project_id.clone());
                }
                self.credentials()?.project_id().ok_or_else(|| {
                    FcmError::configuration(
                        "Please provide a project_id either explicitly or through Google credentials.",
                    )
                })
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessToken;
    use crate::errors::ErrorKind;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct FixedCredentials {
        project_id: Option<String>,
    }

    #[async_trait]
    impl Credentials for FixedCredentials {
        fn project_id(&self) -> Option<String> {
            self.project_id.clone()
        }

        async fn fetch_token(&self) -> anyhow::Result<AccessToken> {
            Ok(AccessToken::new("fixed", None))
        }
    }

    fn provided(project_id: Option<&str>) -> Option<Arc<dyn Credentials>> {
        let credentials: Arc<dyn Credentials> = Arc::new(FixedCredentials {
            project_id: project_id.map(str::to_string),
        });
        Some(credentials)
    }

    #[test]
    fn test_no_source_is_authentication_error() {
        let err = CredentialResolver::new(None, None, None, reqwest::Client::new())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_explicit_project_id_wins() {
        let resolver = CredentialResolver::new(
            provided(Some("from-credential")),
            None,
            Some("explicit".to_string()),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(resolver.project_id().unwrap(), "explicit");
    }

    #[test]
    fn test_project_id_from_credential() {
        let resolver =
            CredentialResolver::new(provided(Some("from-credential")), None, None, reqwest::Client::new())
                .unwrap();
        assert_eq!(resolver.project_id().unwrap(), "from-credential");
    }

    #[test]
    fn test_missing_project_id_is_configuration_error() {
        let resolver =
            CredentialResolver::new(provided(None), None, None, reqwest::Client::new()).unwrap();
        let err = resolver.project_id().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_key_file_is_loaded_lazily() {
        let resolver = CredentialResolver::new(
            None,
            Some(PathBuf::from("/nonexistent/service-account.json")),
            Some("explicit".to_string()),
            reqwest::Client::new(),
        )
        .unwrap();

        // project id is explicit, so the missing file is never read
        assert_eq!(resolver.project_id().unwrap(), "explicit");

        let err = resolver.credentials().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_project_id_from_key_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type": "service_account", "project_id": "file-project",
                "private_key": "k", "client_email": "a@file-project.iam.gserviceaccount.com"}}"#
        )
        .unwrap();

        let resolver = CredentialResolver::new(
            None,
            Some(file.path().to_path_buf()),
            None,
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(resolver.project_id().unwrap(), "file-project");
        assert!(matches!(resolver.source(), CredentialSource::KeyFile(_)));
    }
}
