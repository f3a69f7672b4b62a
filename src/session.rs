use anyhow::{Context as _, Result};
use kube::config::{
    AuthInfo, Cluster, Kubeconfig, KubeConfigOptions, NamedAuthInfo, NamedCluster,
};
use kube::{Client, Config};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::cluster::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    LoggingIn,
    Authenticated,
}

/// The bundle of credentials, endpoint and trust settings used to reach the
/// cluster. Created once at startup from ambient configuration; mutated only
/// by explicit user action (login, namespace switch, insecure confirm),
/// never by the poll path.
#[derive(Debug, Clone)]
pub struct Session {
    pub server: String,
    pub username: String,
    pub password: Option<String>,
    pub token: Option<String>,
    pub namespace: String,
    pub trust_certs: bool,
    pub phase: AuthPhase,
}

/// Process-wide current-session cell. Replaced wholesale on re-login; worker
/// jobs read it exactly once at job start and never cache the handle across
/// suspension points.
pub type SharedSession = Arc<RwLock<SessionCell>>;

#[derive(Clone)]
pub struct SessionCell {
    pub session: Session,
    pub gateway: Gateway,
}

pub fn snapshot(shared: &SharedSession) -> SessionCell {
    shared.read().expect("session cell poisoned").clone()
}

pub fn publish(shared: &SharedSession, cell: SessionCell) {
    *shared.write().expect("session cell poisoned") = cell;
}

/// Bootstrap from kubeconfig / in-cluster inference, the same resolution the
/// plain kube tooling uses.
pub async fn bootstrap(namespace_override: Option<String>) -> Result<SessionCell> {
    let kubeconfig = Kubeconfig::read().ok();
    let config = if let Some(kubeconfig) = kubeconfig.clone() {
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("failed to load kubeconfig")?
    } else {
        Config::infer()
            .await
            .context("failed to infer cluster configuration")?
    };

    let username = config
        .auth_info
        .username
        .clone()
        .or_else(|| {
            let kubeconfig = kubeconfig.as_ref()?;
            let current = kubeconfig.current_context.as_ref()?;
            kubeconfig
                .contexts
                .iter()
                .find(|context| &context.name == current)?
                .context
                .as_ref()?
                .user
                .clone()
        })
        .unwrap_or_default();

    let mut namespace = namespace_override.unwrap_or_else(|| config.default_namespace.clone());
    if namespace.is_empty() {
        namespace = "default".to_string();
    }

    let token = config
        .auth_info
        .token
        .as_ref()
        .map(|token| token.expose_secret().to_string());
    let has_ambient_auth = token.is_some()
        || config.auth_info.client_certificate.is_some()
        || config.auth_info.client_certificate_data.is_some()
        || config.auth_info.exec.is_some()
        || config.auth_info.username.is_some();
    let session = Session {
        server: config.cluster_url.to_string(),
        username,
        password: None,
        token,
        namespace,
        trust_certs: config.accept_invalid_certs,
        phase: if has_ambient_auth {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        },
    };

    let client = Client::try_from(config).context("failed to build cluster client")?;
    Ok(SessionCell {
        session,
        gateway: Gateway::new(client),
    })
}

/// Rebuild the client from the session's current credentials. Called on the
/// worker after a login submit or an insecure-connection confirmation; the
/// result is published into the shared cell as a whole.
pub fn rebuild_client(session: &Session) -> Result<Client> {
    let url = session
        .server
        .parse()
        .with_context(|| format!("invalid server url {}", session.server))?;
    let mut config = Config::new(url);
    config.default_namespace = session.namespace.clone();
    config.accept_invalid_certs = session.trust_certs;
    config.auth_info = AuthInfo {
        username: (!session.username.is_empty()).then(|| session.username.clone()),
        password: session
            .password
            .clone()
            .map(|password| SecretString::from(password)),
        token: session
            .token
            .clone()
            .map(|token| SecretString::from(token)),
        ..AuthInfo::default()
    };
    Client::try_from(config).context("failed to rebuild cluster client")
}

/// Rebuild with the trust flag honored. Sessions that still run on ambient
/// kubeconfig auth (client certs, exec plugins) are rebuilt from there so
/// confirming an insecure connection does not drop their credentials.
pub async fn rebuild_trusted(session: &Session) -> Result<Client> {
    if session.password.is_some() || session.token.is_some() {
        return rebuild_client(session);
    }
    let mut config = if let Ok(kubeconfig) = Kubeconfig::read() {
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("failed to load kubeconfig")?
    } else {
        Config::infer()
            .await
            .context("failed to infer cluster configuration")?
    };
    config.accept_invalid_certs = true;
    config.default_namespace = session.namespace.clone();
    Client::try_from(config).context("failed to rebuild cluster client")
}

/// Ask the OpenShift OAuth server for a bearer token using the challenging
/// client, the same exchange `oc login` performs. The token comes back in
/// the redirect fragment; the redirect itself must not be followed.
pub async fn request_token(
    server: &str,
    username: &str,
    password: &str,
    trust_certs: bool,
) -> Result<String> {
    let endpoint = format!(
        "{}/oauth/authorize?response_type=token&client_id=openshift-challenging-client",
        server.trim_end_matches('/')
    );
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(trust_certs)
        .build()
        .context("failed to build token request client")?;
    let response = client
        .get(&endpoint)
        .basic_auth(username, Some(password))
        .header("X-CSRF-Token", "1")
        .send()
        .await
        .context("token request failed")?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        anyhow::bail!("credentials were rejected by the OAuth server");
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .context("OAuth server returned no redirect")?;
    extract_access_token(location).context("OAuth redirect carried no access token")
}

fn extract_access_token(location: &str) -> Option<String> {
    let fragment = location.split('#').nth(1)?;
    fragment
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn kubeconfig_path() -> Option<PathBuf> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    std::env::var("KUBECONFIG")
        .ok()
        .and_then(|value| {
            value
                .split(sep)
                .next()
                .map(|path| PathBuf::from(path.trim()))
        })
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| dirs::home_dir().map(|home| home.join(".kube").join("config")))
}

static KUBECONFIG_BACKED_UP: AtomicBool = AtomicBool::new(false);

/// Write the freshly issued bearer token back into the credential store,
/// creating the cluster/context/user entries when the store has never seen
/// this cluster. Best-effort by contract: the caller surfaces a non-fatal
/// report on error and keeps using the in-memory client.
pub fn persist_token(session: &Session) -> Result<()> {
    let Some(token) = session.token.as_deref().filter(|token| !token.is_empty()) else {
        return Ok(());
    };
    let path = kubeconfig_path().context("no kubeconfig path could be resolved")?;
    let mut config = if path.exists() {
        Kubeconfig::read_from(&path)
            .with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        Kubeconfig::default()
    };

    upsert_token(
        &mut config,
        &session.server,
        &session.username,
        session.trust_certs,
        token,
    );

    backup_once(&path)?;
    let rendered = serde_yaml::to_string(&config).context("failed to serialize kubeconfig")?;
    std::fs::write(&path, rendered)
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!("persisted token to {}", path.display());
    Ok(())
}

/// Record the namespace choice in the current context so the next run starts
/// where this one left off.
pub fn persist_namespace(namespace: &str) -> Result<()> {
    let path = kubeconfig_path().context("no kubeconfig path could be resolved")?;
    let mut config = Kubeconfig::read_from(&path)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let Some(current) = config.current_context.clone() else {
        return Ok(());
    };

    if let Some(named) = config
        .contexts
        .iter_mut()
        .find(|context| context.name == current)
    {
        if let Some(context) = named.context.as_mut() {
            context.namespace = Some(namespace.to_string());
        }
    } else if current.matches('/').count() == 2 {
        // Login-style context names carry the namespace as their first
        // segment; rewrite it when no named entry exists to update.
        let mut parts = current.splitn(2, '/');
        let _ = parts.next();
        if let Some(rest) = parts.next() {
            config.current_context = Some(format!("{namespace}/{rest}"));
        }
    }

    backup_once(&path)?;
    let rendered = serde_yaml::to_string(&config).context("failed to serialize kubeconfig")?;
    std::fs::write(&path, rendered)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// One sibling backup per process lifetime, taken before the first write and
/// only if none survives from an earlier run.
fn backup_once(path: &std::path::Path) -> Result<()> {
    if KUBECONFIG_BACKED_UP.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    if !path.exists() {
        return Ok(());
    }
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let backup = parent.join("config.backup");
    if !backup.exists() {
        std::fs::copy(path, &backup)
            .with_context(|| format!("failed to back up {}", path.display()))?;
    }
    Ok(())
}

fn upsert_token(
    config: &mut Kubeconfig,
    server: &str,
    username: &str,
    trust_certs: bool,
    token: &str,
) {
    let context_name = match config.current_context.clone() {
        Some(context) => context,
        None => {
            let trimmed = trim_server(server);
            let cluster_name = config
                .clusters
                .iter()
                .find(|cluster| {
                    cluster
                        .cluster
                        .as_ref()
                        .and_then(|cluster| cluster.server.as_deref())
                        == Some(trimmed.as_str())
                })
                .map(|cluster| cluster.name.clone())
                .unwrap_or_else(|| {
                    let name = host_of(&trimmed).replace('.', "-");
                    config.clusters.push(NamedCluster {
                        name: name.clone(),
                        cluster: Some(Cluster {
                            server: Some(trimmed.clone()),
                            insecure_skip_tls_verify: trust_certs.then_some(true),
                            ..Cluster::default()
                        }),
                    });
                    name
                });
            let context = format!("default/{cluster_name}/{username}");
            config.current_context = Some(context.clone());
            context
        }
    };

    let parts = context_name.split('/').collect::<Vec<_>>();
    let config_username = format!(
        "{}/{}",
        parts.get(2).copied().unwrap_or(""),
        parts.get(1).copied().unwrap_or("")
    );

    match config
        .auth_infos
        .iter_mut()
        .find(|auth| auth.name == config_username)
    {
        Some(named) => {
            named
                .auth_info
                .get_or_insert_with(AuthInfo::default)
                .token = Some(SecretString::from(token.to_string()));
        }
        None => {
            config.auth_infos.push(NamedAuthInfo {
                name: config_username,
                auth_info: Some(AuthInfo {
                    token: Some(SecretString::from(token.to_string())),
                    ..AuthInfo::default()
                }),
            });
        }
    }
}

/// Server URL cut back to scheme://host[:port].
fn trim_server(server: &str) -> String {
    let Some(scheme_end) = server.find("://") else {
        return server.trim_end_matches('/').to_string();
    };
    let host_start = scheme_end + 3;
    match server[host_start..].find('/') {
        Some(path_start) => server[..host_start + path_start].to_string(),
        None => server.to_string(),
    }
}

fn host_of(server: &str) -> String {
    match server.find("://") {
        Some(scheme_end) => server[scheme_end + 3..].to_string(),
        None => server.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_access_token, trim_server, upsert_token};
    use kube::config::Kubeconfig;
    use secrecy::ExposeSecret;

    fn stored_token(config: &Kubeconfig, user: &str) -> Option<String> {
        config
            .auth_infos
            .iter()
            .find(|auth| auth.name == user)?
            .auth_info
            .as_ref()?
            .token
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }

    #[test]
    fn existing_user_entry_is_updated_in_place() {
        let mut config: Kubeconfig = serde_yaml::from_str(
            r#"
apiVersion: v1
kind: Config
current-context: default/api-example-com:6443/alice
clusters: []
contexts:
  - name: default/api-example-com:6443/alice
    context:
      cluster: api-example-com:6443
      user: alice/api-example-com:6443
users:
  - name: alice/api-example-com:6443
    user:
      token: sha256~old
"#,
        )
        .expect("kubeconfig parses");

        upsert_token(
            &mut config,
            "https://api.example.com:6443",
            "alice",
            false,
            "sha256~fresh",
        );

        assert_eq!(
            stored_token(&config, "alice/api-example-com:6443").as_deref(),
            Some("sha256~fresh")
        );
        assert_eq!(config.auth_infos.len(), 1);
        // Unrelated entries survive the write untouched.
        assert_eq!(
            config.current_context.as_deref(),
            Some("default/api-example-com:6443/alice")
        );
    }

    #[test]
    fn missing_entries_are_created_from_the_server_url() {
        let mut config = Kubeconfig::default();

        upsert_token(
            &mut config,
            "https://api.example.com:6443/some/path",
            "bob",
            true,
            "sha256~minted",
        );

        assert_eq!(
            config.current_context.as_deref(),
            Some("default/api-example-com:6443/bob")
        );
        let cluster = &config.clusters[0];
        assert_eq!(cluster.name, "api-example-com:6443");
        assert_eq!(
            cluster.cluster.as_ref().and_then(|c| c.server.as_deref()),
            Some("https://api.example.com:6443")
        );
        assert_eq!(
            cluster
                .cluster
                .as_ref()
                .and_then(|c| c.insecure_skip_tls_verify),
            Some(true)
        );
        assert_eq!(
            stored_token(&config, "bob/api-example-com:6443").as_deref(),
            Some("sha256~minted")
        );
    }

    #[test]
    fn access_token_is_read_from_the_redirect_fragment() {
        assert_eq!(
            extract_access_token(
                "https://api.example.com:6443/oauth/token/implicit#access_token=sha256~abc&expires_in=86400"
            )
            .as_deref(),
            Some("sha256~abc")
        );
        assert_eq!(extract_access_token("https://example.com/no-fragment"), None);
        assert_eq!(
            extract_access_token("https://example.com/cb#expires_in=86400"),
            None
        );
    }

    #[test]
    fn server_url_trims_to_host_port() {
        assert_eq!(
            trim_server("https://api.example.com:6443/long/path"),
            "https://api.example.com:6443"
        );
        assert_eq!(
            trim_server("https://api.example.com:6443"),
            "https://api.example.com:6443"
        );
    }
}
