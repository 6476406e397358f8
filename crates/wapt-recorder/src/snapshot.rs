use regex::Regex;
use wapt_common::error::SnapshotError;

/// Locates the recorder's own `<script>` element inside serialized markup.
#[derive(Debug, Clone)]
pub struct ScriptMatcher {
    description: String,
    pattern: Regex,
}

impl ScriptMatcher {
    /// Match `<script id="...">`.
    pub fn by_id(id: &str) -> Result<Self, SnapshotError> {
        let description = format!("id={}", id);
        let id = regex::escape(id);
        Self::build(
            description,
            &format!(
                r#"(?is)<script\b[^>]*?\sid\s*=\s*(?:"{id}"|'{id}'|{id}\b)[^>]*>.*?</script\s*>"#
            ),
        )
    }

    /// Match a script whose `src` contains the given fragment.
    pub fn by_src(fragment: &str) -> Result<Self, SnapshotError> {
        let description = format!("src~={}", fragment);
        let fragment = regex::escape(fragment);
        Self::build(
            description,
            &format!(
                r#"(?is)<script\b[^>]*?\ssrc\s*=\s*["']?[^"'>\s]*{fragment}[^>]*>.*?</script\s*>"#
            ),
        )
    }

    fn build(description: String, pattern: &str) -> Result<Self, SnapshotError> {
        let pattern =
            Regex::new(pattern).map_err(|e| SnapshotError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            description,
            pattern,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Document markup with the recorder's script element removed.
///
/// A document without the script is an error: recording it unstripped would
/// leak the instrumentation into the trace.
pub fn snapshot(markup: &str, exclude: &ScriptMatcher) -> Result<String, SnapshotError> {
    if !exclude.pattern.is_match(markup) {
        return Err(SnapshotError::ScriptNotFound(exclude.description.clone()));
    }
    Ok(exclude.pattern.replace_all(markup, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Login</title></head><body>
<form id="login"><input name="user"></form>
<script id="wapt-recorder" type="text/javascript">
  var recorder = {}; if (a < b) { recorder.go("</div>"); }
</script>
</body></html>"#;

    #[test]
    fn strips_script_by_id() {
        let matcher = ScriptMatcher::by_id("wapt-recorder").unwrap();
        let dom = snapshot(PAGE, &matcher).unwrap();
        assert!(!dom.contains("recorder"));
        assert!(dom.contains(r#"<form id="login">"#));
        assert!(dom.ends_with("</body></html>"));
    }

    #[test]
    fn leaves_application_scripts_alone() {
        let markup = r#"<script src="/app.js"></script><SCRIPT ID='wapt-recorder'>x()</SCRIPT>"#;
        let matcher = ScriptMatcher::by_id("wapt-recorder").unwrap();
        assert_eq!(
            snapshot(markup, &matcher).unwrap(),
            r#"<script src="/app.js"></script>"#
        );
    }

    #[test]
    fn strips_script_by_src() {
        let markup = r#"<body><script type="text/javascript" src="/static/action_recording.js"></script><p>hi</p></body>"#;
        let matcher = ScriptMatcher::by_src("action_recording.js").unwrap();
        assert_eq!(snapshot(markup, &matcher).unwrap(), "<body><p>hi</p></body>");
    }

    #[test]
    fn missing_script_is_an_error() {
        let matcher = ScriptMatcher::by_id("wapt-recorder").unwrap();
        let err = snapshot("<html><body></body></html>", &matcher).unwrap_err();
        assert!(matches!(err, SnapshotError::ScriptNotFound(ref m) if m == "id=wapt-recorder"));
    }

    #[test]
    fn similar_ids_do_not_match() {
        let matcher = ScriptMatcher::by_id("wapt-recorder").unwrap();
        let markup = r#"<script id="wapt-recorder-old">x()</script>"#;
        assert!(snapshot(markup, &matcher).is_err());
    }
}
