//! Minimal robots.txt evaluation.
//!
//! Supports `User-agent`, `Allow` and `Disallow` lines, `*` wildcards and the
//! `$` end anchor. The most specific (longest) matching rule wins; `Allow`
//! wins a tie.

/// Product token matched against `User-agent` lines.
pub const ROBOTS_TOKEN: &str = "agent-web-search";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// The rules that apply to this crawler for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
}

impl RobotsRules {
    /// Rules that allow every path (used when robots.txt is missing).
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses a robots.txt body for the given product token.
    ///
    /// Groups naming the token take precedence over the `*` group.
    pub fn parse(body: &str, token: &str) -> Self {
        let token = token.to_lowercase();
        let mut specific = Vec::new();
        let mut wildcard = Vec::new();

        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    // An empty Disallow allows everything and adds no rule.
                    if value.is_empty() {
                        continue;
                    }
                    let rule = Rule {
                        allow: field == "allow",
                        pattern: value.to_string(),
                    };
                    if group_agents.iter().any(|a| a != "*" && token.contains(a.as_str())) {
                        specific.push(rule.clone());
                    }
                    if group_agents.iter().any(|a| a == "*") {
                        wildcard.push(rule);
                    }
                }
                _ => {}
            }
        }

        let targets_token = body.lines().any(|line| {
            let line = line.split('#').next().unwrap_or_default().trim().to_lowercase();
            line.strip_prefix("user-agent:")
                .map(|agent| {
                    let agent = agent.trim();
                    agent != "*" && !agent.is_empty() && token.contains(agent)
                })
                .unwrap_or(false)
        });

        Self {
            rules: if targets_token { specific } else { wildcard },
        }
    }

    /// Whether `path` (including any query string) may be fetched.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, best_allow)) if best_len > len => Some((best_len, best_allow)),
                Some((best_len, best_allow)) if best_len == len => {
                    Some((len, best_allow || rule.allow))
                }
                _ => Some((len, rule.allow)),
            };
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Prefix match with `*` wildcards and an optional trailing `$` anchor.
///
/// Greedy two-pointer matching: each `*` only remembers the latest restart
/// point, so the cost stays within `pattern.len() * path.len()` steps.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let pattern = pattern.as_bytes();
    let path = path.as_bytes();

    let (mut p, mut s) = (0, 0);
    let mut restart: Option<(usize, usize)> = None;
    while s < path.len() {
        if p == pattern.len() && !anchored {
            return true;
        }
        match pattern.get(p) {
            Some(b'*') => {
                restart = Some((p, s));
                p += 1;
            }
            Some(&c) if c == path[s] => {
                p += 1;
                s += 1;
            }
            _ => match restart {
                Some((star, from)) => {
                    restart = Some((star, from + 1));
                    p = star + 1;
                    s = from + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "
        # comment
        User-agent: *
        Disallow: /private/
        Allow: /private/public-page
        Disallow: /*.pdf$

        User-agent: badbot
        Disallow: /
    ";

    #[test]
    fn test_allow_all() {
        assert!(RobotsRules::allow_all().is_allowed("/anything"));
    }

    #[test]
    fn test_wildcard_group_applies() {
        let rules = RobotsRules::parse(ROBOTS, ROBOTS_TOKEN);
        assert!(rules.is_allowed("/"));
        assert!(rules.is_allowed("/docs/intro"));
        assert!(!rules.is_allowed("/private/secret"));
    }

    #[test]
    fn test_longest_match_wins() {
        let rules = RobotsRules::parse(ROBOTS, ROBOTS_TOKEN);
        assert!(rules.is_allowed("/private/public-page"));
    }

    #[test]
    fn test_wildcard_and_anchor() {
        let rules = RobotsRules::parse(ROBOTS, ROBOTS_TOKEN);
        assert!(!rules.is_allowed("/files/report.pdf"));
        assert!(rules.is_allowed("/files/report.pdf?download=1"));
    }

    #[test]
    fn test_specific_group_overrides_wildcard() {
        let rules = RobotsRules::parse(ROBOTS, "badbot");
        assert!(!rules.is_allowed("/docs/intro"));
    }

    #[test]
    fn test_named_group_for_our_token() {
        let body = "User-agent: agent-web-search\nDisallow: /search\n\nUser-agent: *\nDisallow: /";
        let rules = RobotsRules::parse(body, ROBOTS_TOKEN);
        assert!(rules.is_allowed("/docs"));
        assert!(!rules.is_allowed("/search?q=x"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", ROBOTS_TOKEN);
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_shared_group_agents() {
        let body = "User-agent: otherbot\nUser-agent: *\nDisallow: /tmp\n";
        let rules = RobotsRules::parse(body, ROBOTS_TOKEN);
        assert!(!rules.is_allowed("/tmp/file"));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("/a", "/abc"));
        assert!(pattern_matches("/a*c", "/abbbc"));
        assert!(!pattern_matches("/a*c$", "/abcd"));
        assert!(pattern_matches("/abc$", "/abc"));
        assert!(!pattern_matches("/b", "/abc"));
        assert!(pattern_matches("/*", "/"));
        assert!(pattern_matches("/a*b*c$", "/axxbyyc"));
        assert!(!pattern_matches("/a*b*c$", "/axxbyycd"));
        assert!(pattern_matches("/abc", "/abc"));
        assert!(!pattern_matches("/abcd", "/abc"));
        assert!(pattern_matches("/*.php$", "/x/index.php"));
    }

    #[test]
    fn test_many_wildcards_match_in_linear_time() {
        let pattern = format!("/{}b", "*a".repeat(40));
        let path = format!("/{}", "a".repeat(4_000));
        let started = std::time::Instant::now();
        assert!(!pattern_matches(&pattern, &path));
        assert!(pattern_matches(&pattern, &format!("{path}b")));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        let body = format!("User-agent: *\nDisallow: {pattern}\n");
        let rules = RobotsRules::parse(&body, ROBOTS_TOKEN);
        assert!(rules.is_allowed(&path));
    }
}
