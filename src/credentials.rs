use std::path::Path;

use tracing::{info, warn};

/// One wallet secret paired with its assigned egress proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub secret: String,
    pub proxy: Option<String>,
}

/// Read a line-oriented text source, dropping blank lines and comments.
fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Load secrets and pair each with a proxy, round-robin by line index.
///
/// An unreadable secrets file yields an empty list; the caller decides
/// whether that is fatal. A missing or empty proxy source means every
/// session runs without egress isolation, which is degraded but valid.
pub fn load_credentials(secrets_path: &Path, proxies_path: Option<&Path>) -> Vec<CredentialEntry> {
    let secrets = match read_lines(secrets_path) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(
                "Failed to read secrets file {}: {}",
                secrets_path.display(),
                e
            );
            return Vec::new();
        }
    };

    let proxies = match proxies_path {
        Some(path) => match read_lines(path) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Failed to read proxy file {}: {}", path.display(), e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    if proxies.is_empty() {
        info!("No proxies configured; all sessions will share the host address");
    } else {
        info!("Loaded {} proxies for rotation", proxies.len());
    }

    secrets
        .into_iter()
        .enumerate()
        .map(|(index, secret)| CredentialEntry {
            proxy: (!proxies.is_empty()).then(|| proxies[index % proxies.len()].clone()),
            secret,
        })
        .collect()
}
