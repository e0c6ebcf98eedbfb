use anyhow::Context;
use reqwest::Url;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetLink {
    pub url: String,
    /// false when the continuation URL was dropped because its host is not
    /// allow-listed (or it did not parse)
    pub continue_url_applied: bool,
}

fn host_allowed(candidate: &str, allowed_hosts: &[String]) -> bool {
    Url::parse(candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|host| allowed_hosts.iter().any(|h| *h == host))
}

/// `{base}?token=...[&continueUrl=...]`
pub fn build_reset_link(
    base: &str,
    token: &str,
    continue_url: Option<&str>,
    allowed_hosts: &[String],
) -> anyhow::Result<ResetLink> {
    let mut url = Url::parse(base).with_context(|| format!("invalid reset link base {base:?}"))?;
    url.query_pairs_mut().append_pair("token", token);

    let mut continue_url_applied = false;
    if let Some(next) = continue_url {
        if host_allowed(next, allowed_hosts) {
            url.query_pairs_mut().append_pair("continueUrl", next);
            continue_url_applied = true;
        } else {
            warn!(continue_url = next, "continuation URL not allow-listed, sending plain reset link");
        }
    }

    Ok(ResetLink {
        url: url.into(),
        continue_url_applied,
    })
}
