//! LinkedIn URL normalization. Idempotent: `normalize(normalize(x)) ==
//! normalize(x)` (P6).

/// The shape a normalized LinkedIn URL takes, used by the validator to
/// award the "LinkedIn normalized" signal only for person profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedinKind {
    Person,
    Company,
}

/// Strip scheme, host case, `www.`/locale subdomains, query, fragment, and
/// trailing slash; validate the remaining path is `/in/<slug>` or
/// `/company/<slug>`. Returns `None` for anything else.
pub fn normalize(raw: &str) -> Option<(String, LinkedinKind)> {
    let mut s = raw.trim().to_lowercase();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    if let Some(idx) = s.find(['?', '#']) {
        s.truncate(idx);
    }

    // A bare path (e.g. "/in/john-smith", no scheme or host) splits to an
    // empty host here; assume linkedin.com rather than reject it, since the
    // caller only ever feeds this function linkedin-shaped references.
    let path = match s.split_once('/') {
        Some(("", p)) => p,
        Some((h, p)) => {
            let host = h.strip_prefix("www.").unwrap_or(h).split('.').collect::<Vec<_>>();
            let is_linkedin_host = host.len() >= 2
                && host[host.len() - 2] == "linkedin"
                && matches!(host[host.len() - 1], "com" | "co" | "net");
            if !is_linkedin_host {
                return None;
            }
            p
        }
        None => return None,
    };

    let path = path.trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (kind_str, slug) = match segments.as_slice() {
        [kind @ ("in" | "company"), slug, ..] => (*kind, *slug),
        _ => return None,
    };
    if slug.is_empty() {
        return None;
    }

    let kind = if kind_str == "in" {
        LinkedinKind::Person
    } else {
        LinkedinKind::Company
    };
    Some((format!("linkedin.com/{kind_str}/{slug}"), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_person_profile() {
        let (url, kind) = normalize("https://www.LinkedIn.com/in/Jane-Doe-123/?trk=abc#x").unwrap();
        assert_eq!(url, "linkedin.com/in/jane-doe-123");
        assert_eq!(kind, LinkedinKind::Person);
    }

    #[test]
    fn normalizes_company_profile() {
        let (url, kind) = normalize("linkedin.com/company/acme-inc/").unwrap();
        assert_eq!(url, "linkedin.com/company/acme-inc");
        assert_eq!(kind, LinkedinKind::Company);
    }

    #[test]
    fn normalizes_bare_path() {
        let (url, kind) = normalize("/in/john-smith").unwrap();
        assert_eq!(url, "linkedin.com/in/john-smith");
        assert_eq!(kind, LinkedinKind::Person);
    }

    #[test]
    fn rejects_non_linkedin_host() {
        assert!(normalize("https://www.facebook.com/in/jane").is_none());
    }

    #[test]
    fn rejects_bare_host() {
        assert!(normalize("https://linkedin.com/").is_none());
    }

    #[test]
    fn is_idempotent() {
        let raw = "HTTPS://WWW.LINKEDIN.COM/in/Jane-Doe/?x=1";
        let once = normalize(raw).unwrap();
        let twice = normalize(&once.0).unwrap();
        assert_eq!(once, twice);
    }
}
