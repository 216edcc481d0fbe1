use crate::error::{Result, ScanError};
use crate::model::RepositoryReference;

/// 从仓库 URL 中解析出 owner/name。
///
/// URL 必须包含主机标识（如 `github.com`），其后恰好两段非空路径。
/// 查询串、片段和末尾的斜杠会先被去掉。
pub fn parse_reference(url: &str, host_marker: &str) -> Result<RepositoryReference> {
    let trimmed = url.trim();
    let path = trimmed
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(trimmed);
    let clean = path.trim_end_matches('/');
    let parts: Vec<&str> = clean.split('/').collect();

    let Some(host_index) = parts.iter().position(|part| part.eq_ignore_ascii_case(host_marker)) else {
        return Err(ScanError::InvalidReference(format!(
            "{} (expected https://{}/owner/repository)",
            url, host_marker
        )));
    };

    match &parts[host_index + 1..] {
        [owner, name] if is_segment(owner) && is_segment(name) => Ok(RepositoryReference {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => Err(ScanError::InvalidReference(format!(
            "{} (expected https://{}/owner/repository)",
            url, host_marker
        ))),
    }
}

fn is_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Result<RepositoryReference> {
        parse_reference(url, "github.com")
    }

    #[test]
    fn parses_owner_and_name() {
        let reference = parse("https://github.com/octocat/Hello-World").unwrap();
        assert_eq!(reference.owner, "octocat");
        assert_eq!(reference.name, "Hello-World");
        assert_eq!(reference.to_string(), "octocat/Hello-World");
    }

    #[test]
    fn strips_trailing_slash_and_whitespace() {
        let reference = parse("  https://github.com/octocat/Hello-World/  ").unwrap();
        assert_eq!(reference.name, "Hello-World");
    }

    #[test]
    fn accepts_url_without_scheme() {
        let reference = parse("github.com/rust-lang/rust").unwrap();
        assert_eq!(reference.owner, "rust-lang");
    }

    #[test]
    fn drops_query_and_fragment() {
        for url in [
            "https://github.com/octocat/demo?tab=readme-ov-file",
            "https://github.com/octocat/demo#readme",
            "https://github.com/octocat/demo/?tab=readme-ov-file#installation",
        ] {
            let reference = parse(url).unwrap();
            assert_eq!(reference.owner, "octocat", "{}", url);
            assert_eq!(reference.name, "demo", "{}", url);
        }
    }

    #[test]
    fn rejects_malformed_references() {
        for url in [
            "",
            "https://gitlab.com/octocat/Hello-World",
            "https://github.com/octocat",
            "https://github.com//Hello-World",
            "https://github.com/octocat/Hello-World/tree/main",
            "octocat/Hello-World",
            "https://github.com/octocat/Hello World",
            "https://github.com/octocat/demo/tree/main?tab=readme",
            "https://github.com?owner=octocat/demo",
        ] {
            assert!(
                matches!(parse(url), Err(ScanError::InvalidReference(_))),
                "expected InvalidReference for {:?}",
                url
            );
        }
    }
}
