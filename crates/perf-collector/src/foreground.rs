/// Foreground application discovery, used when a session has no explicit
/// target: the focused window on current builds, the resumed activity as the
/// fallback for older ones.

use tracing::info;

use crate::shell::{ShellChannel, ShellError};

/// Package out of `dumpsys window | grep mCurrentFocus` output.
/// The focused window reads `... u0 <package>/<activity>}`.
pub fn parse_current_focus(output: &str) -> Option<String> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    for pair in tokens.windows(2) {
        if pair[0] != "u0" {
            continue;
        }
        let Some(slash) = pair[1].find('/') else {
            continue;
        };
        let package = &pair[1][..slash];
        if !package.is_empty()
            && package
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
        {
            return Some(package.to_string());
        }
    }
    None
}

/// Package out of `dumpsys activity activities | grep mResumedActivity`
/// output, for builds where the window dump is unhelpful. Only user-0
/// activities count.
pub fn parse_resumed_activity(output: &str) -> Option<String> {
    if !output.contains("u0") {
        return None;
    }
    for token in output.split_whitespace() {
        let Some(slash) = token.find('/') else {
            continue;
        };
        let package = &token[..slash];
        if package.contains('.') {
            return Some(package.to_string());
        }
    }
    None
}

/// Discover the foreground package, trying the window dump first.
/// Unparsable output is a None, not an error; only a lost transport
/// propagates.
pub async fn discover<S: ShellChannel>(shell: &S) -> Result<Option<String>, ShellError> {
    match shell.run("dumpsys window | grep mCurrentFocus").await {
        Ok(out) => {
            if let Some(package) = parse_current_focus(&out) {
                info!(package = %package, "foreground application from window focus");
                return Ok(Some(package));
            }
        }
        Err(e) if e.is_transport_lost() => return Err(e),
        Err(_) => {}
    }

    match shell
        .run("dumpsys activity activities | grep mResumedActivity")
        .await
    {
        Ok(out) => {
            if let Some(package) = parse_resumed_activity(&out) {
                info!(package = %package, "foreground application from resumed activity");
                return Ok(Some(package));
            }
        }
        Err(e) if e.is_transport_lost() => return Err(e),
        Err(_) => {}
    }

    Ok(None)
}
