//! Markup extraction for item and listing pages.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::error::DownloadError;

static STREAM_SOURCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<source\s+src="(https?://[^"]+)"\s+type="application/x-mpegURL""#).unwrap()
});

static ESCAPED_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"document\.write\(unescape\('([^']+)'\)\);"#).unwrap());

static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// "Given raw markup, extract X" for one kind of page.
pub trait PageParser {
    type Output;

    fn parse(&self, page_url: &Url, html: &str) -> Result<Self::Output, DownloadError>;
}

/// What an item (movie or episode) page yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPage {
    pub manifest_url: String,
    /// Display title; `None` when the page carries no usable title.
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoPageParser;

impl VideoPageParser {
    fn find_stream(text: &str) -> Option<String> {
        STREAM_SOURCE_REGEX
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| percent_decode(m.as_str()))
    }

    /// Pages hide the player markup inside `document.write(unescape('...'))`.
    fn escaped_blocks(html: &str) -> impl Iterator<Item = String> + '_ {
        ESCAPED_BLOCK_REGEX
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| percent_decode(m.as_str()))
    }

    fn find_title(document: &Html) -> Option<String> {
        let og_title = document
            .select(&OG_TITLE_SELECTOR)
            .filter_map(|el| el.value().attr("content"))
            .map(normalize_whitespace)
            .find(|t| !t.is_empty());

        og_title.or_else(|| {
            document
                .select(&TITLE_SELECTOR)
                .map(|el| normalize_whitespace(&el.text().collect::<String>()))
                .find(|t| !t.is_empty())
        })
    }
}

impl PageParser for VideoPageParser {
    type Output = VideoPage;

    fn parse(&self, page_url: &Url, html: &str) -> Result<VideoPage, DownloadError> {
        let manifest_url = Self::find_stream(html)
            .or_else(|| Self::escaped_blocks(html).find_map(|block| Self::find_stream(&block)))
            .ok_or_else(|| DownloadError::not_found("stream source", page_url.as_str()))?;

        let title = Self::find_title(&Html::parse_document(html));
        Ok(VideoPage {
            manifest_url,
            title,
        })
    }
}

/// Episode links of a series listing, in page order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingPageParser;

impl PageParser for ListingPageParser {
    type Output = Vec<String>;

    fn parse(&self, page_url: &Url, html: &str) -> Result<Vec<String>, DownloadError> {
        let document = Html::parse_document(html);
        let table = document
            .select(&TABLE_SELECTOR)
            .next()
            .ok_or_else(|| DownloadError::not_found("episode table", page_url.as_str()))?;

        table
            .select(&CELL_SELECTOR)
            .filter_map(|cell| cell.select(&LINK_SELECTOR).next())
            .filter_map(|link| link.value().attr("href"))
            .map(|href| {
                page_url
                    .join(href.trim())
                    .map(String::from)
                    .map_err(|e| DownloadError::invalid_url(href, e))
            })
            .collect()
    }
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("http://www.arabic-toons.com/legend-tarzan-1405895019-24796.html").unwrap()
    }

    #[test]
    fn test_stream_source_in_plain_markup() {
        let html = r#"<html><head>
            <meta property="og:title" content="اسطورة طرزان الحلقة 5" />
            <title>ignored</title></head>
            <body><video><source src="http://stream.example.com/legend_tarzan_05.mp4/playlist.m3u8" type="application/x-mpegURL"></video></body></html>"#;

        let parsed = VideoPageParser.parse(&page(), html).unwrap();
        assert_eq!(
            parsed.manifest_url,
            "http://stream.example.com/legend_tarzan_05.mp4/playlist.m3u8"
        );
        assert_eq!(parsed.title.as_deref(), Some("اسطورة طرزان الحلقة 5"));
    }

    #[test]
    fn test_stream_source_inside_escaped_block() {
        let inner = r#"<source src="http://stream.example.com/dai_39.mp4/playlist.m3u8?token=a%26b" type="application/x-mpegURL">"#;
        let html = format!(
            "<html><head><title>  داي الشجاع\n الحلقة 39 </title></head><body><script>document.write(unescape('{}'));</script></body></html>",
            urlencoding::encode(inner)
        );

        let parsed = VideoPageParser.parse(&page(), &html).unwrap();
        assert_eq!(
            parsed.manifest_url,
            "http://stream.example.com/dai_39.mp4/playlist.m3u8?token=a&b"
        );
        assert_eq!(parsed.title.as_deref(), Some("داي الشجاع الحلقة 39"));
    }

    #[test]
    fn test_missing_stream_is_not_found() {
        let err = VideoPageParser
            .parse(&page(), "<html><title>x</title></html>")
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Resolution {
                what: "stream source",
                ..
            }
        ));
    }

    #[test]
    fn test_page_without_title() {
        let html = r#"<source src="http://s.example.com/a/playlist.m3u8" type="application/x-mpegURL">"#;
        let parsed = VideoPageParser.parse(&page(), html).unwrap();
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_listing_takes_first_link_of_each_cell_of_first_table() {
        let html = r#"<html><body>
            <table>
              <tr><td><a href="/ep-1.html">1</a><a href="/other.html">x</a></td>
                  <td><a href="http://www.arabic-toons.com/ep-2.html">2</a></td></tr>
              <tr><td>no link</td><td><a href="ep-3.html">3</a></td></tr>
            </table>
            <table><tr><td><a href="/not-an-episode.html">n</a></td></tr></table>
            </body></html>"#;

        let episodes = ListingPageParser.parse(&page(), html).unwrap();
        assert_eq!(
            episodes,
            vec![
                "http://www.arabic-toons.com/ep-1.html",
                "http://www.arabic-toons.com/ep-2.html",
                "http://www.arabic-toons.com/ep-3.html",
            ]
        );
    }

    #[test]
    fn test_listing_without_table_is_not_found() {
        let err = ListingPageParser
            .parse(&page(), "<html><body><p>nothing</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, DownloadError::Resolution { .. }));
    }

    #[test]
    fn test_empty_table_is_an_empty_listing() {
        let episodes = ListingPageParser
            .parse(&page(), "<table><tr><td>soon</td></tr></table>")
            .unwrap();
        assert!(episodes.is_empty());
    }
}
