//! Structured rich text to HTML and plain text
//!
//! Bodies arrive as a list of nodes (`paragraph`, `heading1`..`heading6`,
//! `preformatted`, list items, `image`, `embed`), each carrying text plus
//! character-offset spans for inline formatting.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One rich text node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Image source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Embed>,
}

/// Inline formatting over `[start, end)` character offsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

/// Turns rich text bodies into markup and searchable text
pub trait RichTextTransformer: Send + Sync {
    fn as_html(&self, nodes: &[RichTextNode]) -> Result<String>;

    fn as_text(&self, nodes: &[RichTextNode]) -> String;
}

/// Default HTML transformer
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRichText;

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }
}

impl RichTextTransformer for HtmlRichText {
    fn as_html(&self, nodes: &[RichTextNode]) -> Result<String> {
        let mut html = String::new();
        let mut open_list: Option<ListKind> = None;

        for node in nodes {
            let list = match node.kind.as_str() {
                "list-item" => Some(ListKind::Unordered),
                "o-list-item" => Some(ListKind::Ordered),
                _ => None,
            };

            // Consecutive items of the same kind share one list element
            if open_list != list {
                if let Some(kind) = open_list {
                    html.push_str(&format!("</{}>", kind.tag()));
                }
                if let Some(kind) = list {
                    html.push_str(&format!("<{}>", kind.tag()));
                }
                open_list = list;
            }

            html.push_str(&render_node(node)?);
        }

        if let Some(kind) = open_list {
            html.push_str(&format!("</{}>", kind.tag()));
        }

        Ok(html)
    }

    fn as_text(&self, nodes: &[RichTextNode]) -> String {
        nodes
            .iter()
            .map(|n| n.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn render_node(node: &RichTextNode) -> Result<String> {
    let html = match node.kind.as_str() {
        "paragraph" => format!("<p>{}</p>", render_spans(&node.text, &node.spans)?),
        "preformatted" => format!("<pre>{}</pre>", encode_text(&node.text)),
        "list-item" | "o-list-item" => format!("<li>{}</li>", render_spans(&node.text, &node.spans)?),
        "image" => {
            let url = node
                .url
                .as_deref()
                .ok_or_else(|| Error::Transform("image node without url".to_string()))?;
            format!(
                r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                encode_double_quoted_attribute(url),
                encode_double_quoted_attribute(node.alt.as_deref().unwrap_or_default())
            )
        }
        "embed" => {
            let embed = node
                .oembed
                .as_ref()
                .ok_or_else(|| Error::Transform("embed node without oembed".to_string()))?;
            format!(
                r#"<div data-oembed="{}">{}</div>"#,
                encode_double_quoted_attribute(embed.embed_url.as_deref().unwrap_or_default()),
                embed.html.as_deref().unwrap_or_default()
            )
        }
        kind => match heading_level(kind) {
            Some(level) => format!(
                "<h{level}>{}</h{level}>",
                render_spans(&node.text, &node.spans)?,
                level = level
            ),
            None => return Err(Error::Transform(format!("unknown node type `{}`", kind))),
        },
    };
    Ok(html)
}

fn heading_level(kind: &str) -> Option<u8> {
    kind.strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=6).contains(n))
}

/// Apply spans to text; every boundary closes and reopens active tags so
/// overlapping spans still produce well-formed markup
fn render_spans(text: &str, spans: &[Span]) -> Result<String> {
    let chars: Vec<char> = text.chars().collect();

    for span in spans {
        if span.start > span.end || span.end > chars.len() {
            return Err(Error::Transform(format!(
                "span {}..{} outside text of {} characters",
                span.start,
                span.end,
                chars.len()
            )));
        }
    }

    let mut boundaries: Vec<usize> = spans
        .iter()
        .flat_map(|s| [s.start, s.end])
        .chain([0, chars.len()])
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut html = String::new();
    for window in boundaries.windows(2) {
        let (from, to) = (window[0], window[1]);
        let segment: String = chars[from..to].iter().collect();
        let mut piece = encode_text(&segment).replace('\n', "<br />");

        let active: Vec<&Span> = spans
            .iter()
            .filter(|s| s.start <= from && s.end >= to && s.start < s.end)
            .collect();
        for span in active.iter().rev() {
            piece = wrap(span, &piece);
        }

        html.push_str(&piece);
    }

    Ok(html)
}

fn wrap(span: &Span, inner: &str) -> String {
    match span.kind.as_str() {
        "strong" => format!("<strong>{}</strong>", inner),
        "em" => format!("<em>{}</em>", inner),
        "hyperlink" => {
            let url = span
                .data
                .as_ref()
                .and_then(|d| d.url.as_deref())
                .unwrap_or("#");
            format!(
                r#"<a href="{}">{}</a>"#,
                encode_double_quoted_attribute(url),
                inner
            )
        }
        label => format!(
            r#"<span class="{}">{}</span>"#,
            encode_double_quoted_attribute(label),
            inner
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: &str, text: &str) -> RichTextNode {
        RichTextNode {
            kind: kind.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn span(start: usize, end: usize, kind: &str) -> Span {
        Span {
            start,
            end,
            kind: kind.to_string(),
            data: None,
        }
    }

    #[test]
    fn test_paragraph_with_spans() {
        let mut p = node("paragraph", "Hello world");
        p.spans = vec![span(0, 5, "strong")];
        assert_eq!(
            HtmlRichText.as_html(&[p]).unwrap(),
            "<p><strong>Hello</strong> world</p>"
        );
    }

    #[test]
    fn test_hyperlink_and_nesting() {
        let mut p = node("paragraph", "read the docs");
        p.spans = vec![
            Span {
                start: 5,
                end: 13,
                kind: "hyperlink".to_string(),
                data: Some(SpanData {
                    url: Some("https://example.com".to_string()),
                }),
            },
            span(9, 13, "em"),
        ];
        assert_eq!(
            HtmlRichText.as_html(&[p]).unwrap(),
            r#"<p>read <a href="https://example.com">the </a><a href="https://example.com"><em>docs</em></a></p>"#
        );
    }

    #[test]
    fn test_escapes_text() {
        let p = node("paragraph", "1 < 2 & <script>");
        assert_eq!(
            HtmlRichText.as_html(&[p]).unwrap(),
            "<p>1 &lt; 2 &amp; &lt;script&gt;</p>"
        );
    }

    #[test]
    fn test_groups_list_items() {
        let nodes = vec![
            node("list-item", "one"),
            node("list-item", "two"),
            node("o-list-item", "first"),
            node("paragraph", "after"),
        ];
        assert_eq!(
            HtmlRichText.as_html(&nodes).unwrap(),
            "<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol><p>after</p>"
        );
    }

    #[test]
    fn test_headings() {
        assert_eq!(
            HtmlRichText.as_html(&[node("heading2", "Title")]).unwrap(),
            "<h2>Title</h2>"
        );
        assert!(HtmlRichText.as_html(&[node("heading7", "x")]).is_err());
    }

    #[test]
    fn test_malformed_nodes() {
        assert!(matches!(
            HtmlRichText.as_html(&[node("carousel", "x")]),
            Err(Error::Transform(..))
        ));

        let mut p = node("paragraph", "short");
        p.spans = vec![span(2, 40, "strong")];
        assert!(matches!(
            HtmlRichText.as_html(&[p]),
            Err(Error::Transform(..))
        ));

        assert!(HtmlRichText.as_html(&[node("image", "")]).is_err());
    }

    #[test]
    fn test_as_text() {
        let nodes = vec![
            node("heading2", "A title"),
            node("image", ""),
            node("paragraph", "some body text"),
        ];
        assert_eq!(HtmlRichText.as_text(&nodes), "A title some body text");
    }

    #[test]
    fn test_decode_api_node() {
        let json = r#"{
            "type": "paragraph",
            "text": "Ignite",
            "spans": [{ "start": 0, "end": 6, "type": "hyperlink", "data": { "link_type": "Web", "url": "https://rocketseat.com.br" } }]
        }"#;
        let node: RichTextNode = serde_json::from_str(json).unwrap();
        assert_eq!(
            HtmlRichText.as_html(&[node]).unwrap(),
            r#"<p><a href="https://rocketseat.com.br">Ignite</a></p>"#
        );
    }
}
