use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ghpr", version, about = "Pull Request Checks Viewer TUI")]
pub struct Cli {
    /// Pull request number or URL, optionally preceded by OWNER/REPO
    #[arg(value_name = "TARGET", required = true, num_args = 1..=2)]
    pub target: Vec<String>,

    /// Repository in owner/repo format (auto-detected from cwd)
    #[arg(short = 'R', long)]
    pub repo: Option<String>,

    /// List every job of every workflow in one pane
    #[arg(long)]
    pub flat: bool,

    /// Append debug logging to ./debug.log
    #[arg(long)]
    pub debug: bool,
}

/// Pull request to watch. `repo` is `None` when it has to come from the
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub repo: Option<String>,
    pub number: u64,
}

/// Validates that `repo` is exactly `owner/name`.
pub fn validate_repo_format(repo: &str) -> Result<(), String> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) || repo.contains(char::is_whitespace) {
        return Err(format!(
            "Invalid repository format '{repo}'. Expected 'owner/repo' (e.g. 'cli/cli')."
        ));
    }
    Ok(())
}

fn parse_number(s: &str) -> Result<u64, String> {
    match s.trim_start_matches('#').parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Invalid pull request number '{s}'.")),
    }
}

/// Extracts `owner/repo` and the number from `https://HOST/OWNER/REPO/pull/N[/...]`.
pub fn parse_pr_url(s: &str) -> Result<Target, String> {
    let invalid = || format!("Invalid pull request URL '{s}'. Expected https://github.com/OWNER/REPO/pull/NUMBER.");
    let url = url::Url::parse(s).map_err(|_| invalid())?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid());
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [owner, name, "pull", number, ..] => Ok(Target {
            repo: Some(format!("{owner}/{name}")),
            number: parse_number(number).map_err(|_| invalid())?,
        }),
        _ => Err(invalid()),
    }
}

/// Resolves the positional arguments plus `--repo` into a target.
///
/// Accepted forms: `NUMBER`, `URL`, `OWNER/REPO NUMBER`.
pub fn resolve_target(args: &[String], repo_flag: Option<&str>) -> Result<Target, String> {
    if let Some(repo) = repo_flag {
        validate_repo_format(repo)?;
    }
    match args {
        [single] if single.contains("://") => parse_pr_url(single),
        [single] => Ok(Target {
            repo: repo_flag.map(str::to_string),
            number: parse_number(single)?,
        }),
        [repo, number] => {
            validate_repo_format(repo)?;
            if repo_flag.is_some_and(|flag| flag != repo.as_str()) {
                return Err(format!(
                    "Repository '{repo}' conflicts with --repo {}.",
                    repo_flag.unwrap_or_default()
                ));
            }
            Ok(Target {
                repo: Some(repo.clone()),
                number: parse_number(number)?,
            })
        }
        _ => Err("Expected a pull request number or URL.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn valid_repo_format() {
        assert!(validate_repo_format("cli/cli").is_ok());
        assert!(validate_repo_format("my-org/my.repo").is_ok());
    }

    #[test]
    fn invalid_repo_format() {
        assert!(validate_repo_format("noslash").is_err());
        assert!(validate_repo_format("a/b/c").is_err());
        assert!(validate_repo_format("/repo").is_err());
        assert!(validate_repo_format("owner/").is_err());
        assert!(validate_repo_format("own er/repo").is_err());
    }

    #[test]
    fn number_with_repo_flag() {
        assert_eq!(
            resolve_target(&args(&["42"]), Some("o/r")),
            Ok(Target {
                repo: Some("o/r".to_string()),
                number: 42
            })
        );
    }

    #[test]
    fn number_alone_leaves_repo_to_cwd() {
        assert_eq!(
            resolve_target(&args(&["#7"]), None),
            Ok(Target { repo: None, number: 7 })
        );
    }

    #[test]
    fn url_supplies_repo_and_number() {
        assert_eq!(
            resolve_target(&args(&["https://github.com/octo/widgets/pull/123/checks"]), None),
            Ok(Target {
                repo: Some("octo/widgets".to_string()),
                number: 123
            })
        );
    }

    #[test]
    fn enterprise_host_url_is_accepted() {
        let t = parse_pr_url("https://git.example.com/team/app/pull/9").unwrap();
        assert_eq!(t.repo.as_deref(), Some("team/app"));
        assert_eq!(t.number, 9);
    }

    #[test]
    fn non_pull_url_is_rejected() {
        assert!(parse_pr_url("https://github.com/octo/widgets/issues/3").is_err());
        assert!(parse_pr_url("https://github.com/octo").is_err());
        assert!(parse_pr_url("ftp://github.com/octo/widgets/pull/3").is_err());
    }

    #[test]
    fn owner_repo_then_number() {
        assert_eq!(
            resolve_target(&args(&["octo/widgets", "5"]), None),
            Ok(Target {
                repo: Some("octo/widgets".to_string()),
                number: 5
            })
        );
    }

    #[test]
    fn conflicting_repo_flag_is_rejected() {
        assert!(resolve_target(&args(&["octo/widgets", "5"]), Some("other/repo")).is_err());
    }

    #[test]
    fn zero_and_garbage_numbers_are_rejected() {
        assert!(resolve_target(&args(&["0"]), None).is_err());
        assert!(resolve_target(&args(&["abc"]), None).is_err());
        assert!(resolve_target(&args(&["octo/widgets", "x"]), None).is_err());
    }

    #[test]
    fn bad_repo_flag_is_rejected() {
        assert!(resolve_target(&args(&["5"]), Some("nope")).is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from(["ghpr", "-R", "o/r", "--flat", "--debug", "12"]).unwrap();
        assert_eq!(cli.target, vec!["12".to_string()]);
        assert_eq!(cli.repo.as_deref(), Some("o/r"));
        assert!(cli.flat);
        assert!(cli.debug);
    }

    #[test]
    fn cli_requires_a_target() {
        assert!(Cli::try_parse_from(["ghpr"]).is_err());
    }
}
