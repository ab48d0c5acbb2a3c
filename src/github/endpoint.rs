// src/github/endpoint.rs
// =============================================================================
// Maps github.com repository and file URLs onto the GitHub REST API.
//
// Why go through the API at all?
// - github.com answers HEAD requests for private or deleted repos with
//   redirects to a login page, which looks "alive"
// - The API answers 404 for those, and its rate limits are explicit
//   (X-RateLimit-Remaining), so the throttle can budget for them
//
// Supported formats:
//   https://github.com/owner/repo                      -> /repos/owner/repo
//   https://github.com/owner/repo.git                  -> /repos/owner/repo
//   https://github.com/owner/repo/blob/main/src/lib.rs -> /repos/owner/repo/contents/src/lib.rs?ref=main
//   https://github.com/owner/repo/tree/feat/x/docs     -> /repos/owner/repo/contents/docs?ref=feat%2Fx
//
// Anything else on github.com (issues, gists, profiles) is probed as a plain
// web page and returns None here.
// =============================================================================

use url::Url;

/// Base of the code-hosting REST API.
pub const API_BASE: &str = "https://api.github.com";

// Directory names that almost always start the file path, not the branch.
const PATH_ROOTS: &[&str] = &["src", "lib", "bin", "scripts", "docs", "test", "tests"];

/// A parsed github.com link, before it is turned into an API URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLink {
    pub owner: String,
    pub repo: String,
    /// (branch, path inside the repository) for blob/tree links
    pub content: Option<(String, String)>,
}

/// True if checking `url` costs a code-hosting API request.
pub fn is_code_host(url: &Url) -> bool {
    url.host_str() == Some("api.github.com") || parse_repo_link(url).is_some()
}

/// Returns the API URL to probe instead of `url`, if it is a repo/file link.
pub fn api_endpoint(url: &Url) -> Option<Url> {
    let link = parse_repo_link(url)?;

    let mut api = Url::parse(API_BASE).ok()?;
    {
        let mut segments = api.path_segments_mut().ok()?;
        segments.push("repos").push(&link.owner).push(&link.repo);
        if let Some((_, path)) = &link.content {
            segments.push("contents");
            segments.extend(path.split('/').filter(|part| !part.is_empty()));
        }
    }

    if let Some((branch, _)) = &link.content {
        api.query_pairs_mut().append_pair("ref", branch);
    }

    Some(api)
}

/// Parses owner/repo (and branch/path for blob and tree links).
pub fn parse_repo_link(url: &Url) -> Option<RepoLink> {
    if !matches!(url.host_str(), Some("github.com") | Some("www.github.com")) {
        return None;
    }

    // Segments come back percent-encoded; the API URL builder encodes again
    let parts: Vec<String> = url
        .path_segments()?
        .filter(|part| !part.is_empty())
        .map(decode_segment)
        .collect();

    if parts.len() < 2 {
        return None;
    }

    let owner = parts[0].clone();
    let repo = parts[1].trim_end_matches(".git").to_string();

    match parts.len() {
        2 => Some(RepoLink {
            owner,
            repo,
            content: None,
        }),
        n if n >= 4 && (parts[2] == "blob" || parts[2] == "tree") => {
            let (branch, path) = split_branch_and_path(&parts[3..]);
            Some(RepoLink {
                owner,
                repo,
                content: Some((branch, path)),
            })
        }
        // issues, pulls, wiki, releases... are ordinary pages
        _ => None,
    }
}

// Branch names may contain slashes, so "feat/x/docs/guide.md" is ambiguous.
// The path starts at the first segment that looks like a file, a dotted
// directory, or a common source directory. Failing that, the last segment is
// the path and everything before it the branch.
fn split_branch_and_path(parts: &[String]) -> (String, String) {
    let start = parts
        .iter()
        .position(|part| part.starts_with('.') || part.contains('.') || PATH_ROOTS.contains(&part.as_str()));

    let (branch_parts, path_parts) = match start {
        Some(index) => (&parts[..index], &parts[index..]),
        None if parts.len() > 1 => (&parts[..parts.len() - 1], &parts[parts.len() - 1..]),
        None => (parts, &parts[parts.len()..]),
    };

    let branch = if branch_parts.is_empty() {
        "main".to_string()
    } else {
        branch_parts.join("/")
    };

    (branch, path_parts.join("/"))
}

// A segment that isn't valid UTF-8 once decoded is kept as written
fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
