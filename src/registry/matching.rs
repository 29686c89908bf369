//! Hook event to session matching

use std::path::Path;

use crate::HookEvent;

/// A registered session as seen by the matcher
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub id: &'a str,
    pub working_directory: &'a Path,
    pub sub_session_id: Option<&'a str>,
}

/// Find the session a hook event belongs to.
///
/// Fallback chain, first match wins:
/// 1. exact sub-session id
/// 2. exact working directory
/// 3. same final path component (symlinked or relative paths on either side)
///
/// Within steps 2 and 3, sessions not bound to a *different* sub-session id
/// are preferred, so two CLIs in the same directory keep their own events
/// apart. A bound session still matches when nothing else does: a CLI that
/// starts a new conversation reports a fresh id from the same directory.
/// `candidates` must be in registration order.
pub(crate) fn match_session<'a>(candidates: &[Candidate<'a>], event: &HookEvent) -> Option<&'a str> {
    let event_sub = event.sub_session_id.as_deref();

    if let Some(sub) = event_sub {
        if let Some(c) = candidates.iter().find(|c| c.sub_session_id == Some(sub)) {
            return Some(c.id);
        }
    }

    let by_path = |c: &&Candidate<'a>| c.working_directory == event.working_directory;
    if let Some(id) = prefer_compatible(candidates, event_sub, by_path) {
        return Some(id);
    }

    let leaf = event.working_directory.file_name()?;
    prefer_compatible(candidates, event_sub, |c| c.working_directory.file_name() == Some(leaf))
}

fn prefer_compatible<'a>(
    candidates: &[Candidate<'a>],
    event_sub: Option<&str>,
    matches: impl Fn(&&Candidate<'a>) -> bool,
) -> Option<&'a str> {
    let compatible = |c: &&Candidate<'a>| match (c.sub_session_id, event_sub) {
        (Some(known), Some(incoming)) => known == incoming,
        _ => true,
    };
    candidates
        .iter()
        .filter(|c| matches(c))
        .find(compatible)
        .or_else(|| candidates.iter().find(|c| matches(c)))
        .map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HookEventKind;
    use std::path::PathBuf;

    fn candidate<'a>(id: &'a str, path: &'a Path, sub: Option<&'a str>) -> Candidate<'a> {
        Candidate {
            id,
            working_directory: path,
            sub_session_id: sub,
        }
    }

    #[test]
    fn test_sub_session_id_wins_over_path() {
        let a = PathBuf::from("/work/alpha");
        let b = PathBuf::from("/work/beta");
        let candidates = [candidate("a", &a, None), candidate("b", &b, Some("sub-b"))];

        let event = HookEvent::new(HookEventKind::Stop, "/work/alpha").with_sub_session("sub-b");
        assert_eq!(match_session(&candidates, &event), Some("b"));
    }

    #[test]
    fn test_exact_path_before_leaf() {
        let a = PathBuf::from("/other/proj");
        let b = PathBuf::from("/work/proj");
        let candidates = [candidate("a", &a, None), candidate("b", &b, None)];

        let event = HookEvent::new(HookEventKind::Stop, "/work/proj");
        assert_eq!(match_session(&candidates, &event), Some("b"));
    }

    #[test]
    fn test_leaf_fallback() {
        let a = PathBuf::from("/Users/me/code/proj");
        let candidates = [candidate("a", &a, None)];

        let event = HookEvent::new(HookEventKind::SessionStart, "/private/var/links/proj");
        assert_eq!(match_session(&candidates, &event), Some("a"));
    }

    #[test]
    fn test_no_match() {
        let a = PathBuf::from("/work/alpha");
        let candidates = [candidate("a", &a, None)];

        let event = HookEvent::new(HookEventKind::Stop, "/work/gamma");
        assert_eq!(match_session(&candidates, &event), None);
        let root = HookEvent::new(HookEventKind::Stop, "/");
        assert_eq!(match_session(&candidates, &root), None);
    }

    #[test]
    fn test_bound_session_is_skipped_for_foreign_sub_id() {
        let dir = PathBuf::from("/work/proj");
        let candidates = [
            candidate("first", &dir, Some("sub-1")),
            candidate("second", &dir, None),
        ];

        let event = HookEvent::new(HookEventKind::SessionStart, "/work/proj").with_sub_session("sub-2");
        assert_eq!(match_session(&candidates, &event), Some("second"));

        let anonymous = HookEvent::new(HookEventKind::Stop, "/work/proj");
        assert_eq!(match_session(&candidates, &anonymous), Some("first"));
    }

    #[test]
    fn test_bound_session_accepts_new_sub_id_when_alone() {
        let dir = PathBuf::from("/work/proj");
        let candidates = [candidate("only", &dir, Some("sub-1"))];

        let restarted = HookEvent::new(HookEventKind::SessionStart, "/work/proj").with_sub_session("sub-2");
        assert_eq!(match_session(&candidates, &restarted), Some("only"));

        let linked = HookEvent::new(HookEventKind::Stop, "/private/work/proj").with_sub_session("sub-2");
        assert_eq!(match_session(&candidates, &linked), Some("only"));
    }
}
