//! Post summary formatting and display helpers

use chrono::{DateTime, Locale, Utc};

use super::post::{PostFields, PostSummary};
use crate::source::RawDocument;
use crate::{Error, Result};

/// Reading speed used for the read-time estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Turn a raw document into a listing entry
///
/// A missing publication date is carried through as `None`.
pub fn summarize(doc: &RawDocument) -> Result<PostSummary> {
    let fields = PostFields::from_document(doc)?;

    Ok(PostSummary {
        uid: doc.uid.clone().unwrap_or_else(|| doc.id.clone()),
        first_publication_date: doc.first_publication_date,
        title: fields.title,
        subtitle: fields.subtitle,
        author: fields.author,
    })
}

/// Estimated minutes to read the given texts, rounded up
pub fn estimate_read_time<'a, I>(texts: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let words: usize = texts
        .into_iter()
        .map(|text| text.split_whitespace().count())
        .sum();
    (words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE
}

/// Locale-aware date formatting, applied when a page is rendered
#[derive(Debug, Clone)]
pub struct DateFormatter {
    locale: Locale,
    format: String,
}

impl DateFormatter {
    /// Create a formatter for a locale name such as `pt_BR` or `en-US`
    pub fn new(language: &str, format: &str) -> Result<Self> {
        let name = language.replace('-', "_");
        let locale = Locale::try_from(name.as_str())
            .map_err(|_| Error::InvalidConfiguration(format!("unknown locale `{}`", language)))?;

        Ok(Self {
            locale,
            format: format.to_string(),
        })
    }

    /// Format with the default pattern; `None` when there is no date
    pub fn display(&self, instant: Option<&DateTime<Utc>>) -> Option<String> {
        self.display_with(instant, &self.format)
    }

    pub fn display_with(&self, instant: Option<&DateTime<Utc>>, format: &str) -> Option<String> {
        instant.map(|dt| dt.format_localized(format, self.locale).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn document(first_publication_date: Option<DateTime<Utc>>) -> RawDocument {
        RawDocument {
            id: "YF0Ebh".to_string(),
            uid: Some("como-utilizar-hooks".to_string()),
            doc_type: "posts".to_string(),
            first_publication_date,
            last_publication_date: None,
            data: json!({
                "title": "Como utilizar Hooks",
                "subtitle": "Pensando em sincronização em vez de ciclos de vida.",
                "author": "Joseph Oliveira"
            }),
        }
    }

    #[test]
    fn test_summarize() {
        let date = Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap();
        let summary = summarize(&document(Some(date))).unwrap();
        assert_eq!(summary.uid, "como-utilizar-hooks");
        assert_eq!(summary.title, "Como utilizar Hooks");
        assert_eq!(summary.author, "Joseph Oliveira");
        assert_eq!(summary.first_publication_date, Some(date));
    }

    #[test]
    fn test_summarize_without_publication_date() {
        let summary = summarize(&document(None)).unwrap();
        assert_eq!(summary.first_publication_date, None);

        let formatter = DateFormatter::new("pt_BR", "%d %b %Y").unwrap();
        assert_eq!(formatter.display(summary.first_publication_date.as_ref()), None);
    }

    #[test]
    fn test_summarize_falls_back_to_id() {
        let mut doc = document(None);
        doc.uid = None;
        assert_eq!(summarize(&doc).unwrap().uid, "YF0Ebh");
    }

    #[test]
    fn test_display_date() {
        let date = Utc.with_ymd_and_hms(2021, 3, 15, 12, 0, 0).unwrap();
        let formatter = DateFormatter::new("en-US", "%d %b %Y").unwrap();
        assert_eq!(formatter.display(Some(&date)).as_deref(), Some("15 Mar 2021"));

        let date = Utc.with_ymd_and_hms(2021, 4, 15, 12, 0, 0).unwrap();
        let formatter = DateFormatter::new("pt_BR", "%d %b %Y").unwrap();
        assert_eq!(formatter.display(Some(&date)).as_deref(), Some("15 abr 2021"));
    }

    #[test]
    fn test_unknown_locale() {
        assert!(DateFormatter::new("xx_YY", "%d").is_err());
    }

    #[test]
    fn test_read_time_rounds_up() {
        let two_hundred = vec!["word"; 200].join(" ");
        let block = format!("{}\n{}", two_hundred, two_hundred);

        // 400 words split across blocks
        assert_eq!(estimate_read_time([two_hundred.as_str(), two_hundred.as_str()]), 2);
        assert_eq!(estimate_read_time([block.as_str()]), 2);
        assert_eq!(estimate_read_time([block.as_str(), "one more"]), 3);
        assert_eq!(estimate_read_time([block.as_str(), "more"]), 3);
        assert_eq!(estimate_read_time(std::iter::empty::<&str>()), 0);
    }
}
