//! Comment thread embed
//!
//! Each post page carries one utterances thread bound to the post. The page
//! owns a [`CommentSlot`]; mounting a different post tears the previous
//! widget down before the new one is inserted, so at most one thread exists.

use html_escape::encode_double_quoted_attribute;

use crate::config::CommentsConfig;

const CLIENT_SCRIPT: &str = "https://utteranc.es/client.js";

/// Static description of the embed
#[derive(Debug, Clone)]
pub struct CommentWidget {
    repo: String,
    issue_term: String,
    theme: String,
}

impl CommentWidget {
    pub fn new(config: &CommentsConfig) -> Option<Self> {
        if !config.enable {
            return None;
        }
        Some(Self {
            repo: config.repo.clone(),
            issue_term: config.issue_term.clone(),
            theme: config.theme.clone(),
        })
    }

    /// Markup for the thread attached to post `uid`
    pub fn markup(&self, uid: &str) -> String {
        format!(
            concat!(
                "<style>.utterances {{ max-width: 100%; }}</style>",
                r#"<script src="{src}" crossorigin="anonymous" async "#,
                r#"repo="{repo}" issue-term="{term}" theme="{theme}" data-post="{uid}"></script>"#,
            ),
            src = CLIENT_SCRIPT,
            repo = encode_double_quoted_attribute(&self.repo),
            term = encode_double_quoted_attribute(&self.issue_term),
            theme = encode_double_quoted_attribute(&self.theme),
            uid = encode_double_quoted_attribute(uid),
        )
    }
}

/// A mounted widget
#[derive(Debug, Clone, PartialEq)]
struct Mounted {
    uid: String,
    markup: String,
}

/// Holder for the single comment thread of a page
#[derive(Debug)]
pub struct CommentSlot {
    widget: Option<CommentWidget>,
    mounted: Option<Mounted>,
    teardowns: usize,
}

impl CommentSlot {
    pub fn new(widget: Option<CommentWidget>) -> Self {
        Self {
            widget,
            mounted: None,
            teardowns: 0,
        }
    }

    /// Bind the slot to post `uid`, replacing any widget of another post
    pub fn mount(&mut self, uid: &str) {
        if self.mounted.as_ref().is_some_and(|m| m.uid == uid) {
            return;
        }
        self.teardown();

        if let Some(widget) = &self.widget {
            self.mounted = Some(Mounted {
                uid: uid.to_string(),
                markup: widget.markup(uid),
            });
        }
    }

    /// Remove the current widget, if any
    pub fn teardown(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            tracing::debug!("Removed comment thread of `{}`", mounted.uid);
            self.teardowns += 1;
        }
    }

    /// Markup of the mounted widget; empty when nothing is mounted
    pub fn render(&self) -> &str {
        self.mounted.as_ref().map(|m| m.markup.as_str()).unwrap_or_default()
    }

    pub fn mounted_uid(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.uid.as_str())
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns
    }
}

impl Drop for CommentSlot {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> CommentSlot {
        CommentSlot::new(CommentWidget::new(&CommentsConfig::default()))
    }

    #[test]
    fn test_markup() {
        let widget = CommentWidget::new(&CommentsConfig::default()).unwrap();
        let html = widget.markup("como-utilizar-hooks");
        assert!(html.contains(r#"src="https://utteranc.es/client.js""#));
        assert!(html.contains(r#"crossorigin="anonymous""#));
        assert!(html.contains(r#"repo="monteiro-alexandre/ignite-reactjs-spacetraveling""#));
        assert!(html.contains(r#"issue-term="pathname""#));
        assert!(html.contains(r#"theme="github-dark""#));
        assert!(html.contains(r#"data-post="como-utilizar-hooks""#));
        assert_eq!(html.matches("<script").count(), 1);
    }

    #[test]
    fn test_switching_posts_tears_down_once() {
        let mut slot = slot();
        slot.mount("a");
        assert_eq!(slot.mounted_uid(), Some("a"));
        assert_eq!(slot.teardowns(), 0);

        slot.mount("b");
        assert_eq!(slot.teardowns(), 1);
        assert_eq!(slot.mounted_uid(), Some("b"));
        assert_eq!(slot.render().matches("<script").count(), 1);
        assert!(slot.render().contains(r#"data-post="b""#));
    }

    #[test]
    fn test_remount_same_post_keeps_widget() {
        let mut slot = slot();
        slot.mount("a");
        slot.mount("a");
        assert_eq!(slot.teardowns(), 0);
    }

    #[test]
    fn test_teardown_clears_markup() {
        let mut slot = slot();
        slot.mount("a");
        slot.teardown();
        slot.teardown();
        assert_eq!(slot.teardowns(), 1);
        assert_eq!(slot.render(), "");
    }

    #[test]
    fn test_disabled() {
        let config = CommentsConfig {
            enable: false,
            ..CommentsConfig::default()
        };
        let mut slot = CommentSlot::new(CommentWidget::new(&config));
        slot.mount("a");
        assert_eq!(slot.render(), "");
        assert_eq!(slot.mounted_uid(), None);
    }
}
