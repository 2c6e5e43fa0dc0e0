//! Extraction of raw activity fields from rendered history pages.
//!
//! Each platform's page snapshot is parsed with fixed selectors into
//! [`RawItem`]s. An item without a title is dropped and counted; the rest of
//! the page is still extracted.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::error::ItemError;

/// Text fields of one rendered history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    /// Episode name listed under a show, where the page nests them.
    pub episode: Option<String>,
    /// Date text, or the date header the item sits under.
    pub date_text: Option<String>,
    pub time_text: Option<String>,
    /// Per-item platform label in feeds shared by several platforms.
    pub label: Option<String>,
}

/// Items extracted from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub items: Vec<RawItem>,
    /// Item nodes on the page, including dropped ones.
    pub rendered: usize,
    pub dropped: usize,
}

impl Extraction {
    pub fn last(&self) -> Option<&RawItem> {
        self.items.last()
    }

    fn drop_item(&mut self, err: ItemError) {
        warn!("{}", err);
        self.dropped += 1;
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn child_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

static NETFLIX_ROW: LazyLock<Selector> = LazyLock::new(|| selector(".retableRow"));
static NETFLIX_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".title"));
static NETFLIX_DATE: LazyLock<Selector> = LazyLock::new(|| selector(".date"));

/// Netflix viewing activity: `.retableRow` with `.title` and `.date`.
pub fn netflix_rows(html: &str) -> Extraction {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();

    for (index, row) in doc.select(&NETFLIX_ROW).enumerate() {
        out.rendered += 1;
        let Some(title) = child_text(row, &NETFLIX_TITLE) else {
            out.drop_item(ItemError::Extraction(format!("row {} has no title", index)));
            continue;
        };
        out.items.push(RawItem {
            title,
            date_text: child_text(row, &NETFLIX_DATE),
            ..Default::default()
        });
    }

    out
}

static AMAZON_SECTION: LazyLock<Selector> = LazyLock::new(|| selector("div.RdNoU_.j98KWz"));
static AMAZON_DATE: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static AMAZON_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div._6YbHut"));
static AMAZON_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("a._1NNx6V.ZrYV9r"));
static AMAZON_EPISODE: LazyLock<Selector> = LazyLock::new(|| selector("p.vTfuZU"));

/// Amazon watch history: date sections holding show containers, each with
/// a title and zero or more episode lines. Each episode becomes an item.
pub fn amazon_sections(html: &str) -> Extraction {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();

    for section in doc.select(&AMAZON_SECTION) {
        let date_text = child_text(section, &AMAZON_DATE);

        for container in section.select(&AMAZON_CONTAINER) {
            out.rendered += 1;
            let Some(title) = child_text(container, &AMAZON_TITLE) else {
                out.drop_item(ItemError::Extraction(format!(
                    "entry under {} has no title",
                    date_text.as_deref().unwrap_or("unknown date")
                )));
                continue;
            };

            let episodes: Vec<String> = container
                .select(&AMAZON_EPISODE)
                .map(text_of)
                .filter(|e| !e.is_empty())
                .collect();

            if episodes.is_empty() {
                out.items.push(RawItem {
                    title,
                    date_text: date_text.clone(),
                    ..Default::default()
                });
            } else {
                for episode in episodes {
                    out.items.push(RawItem {
                        title: title.clone(),
                        episode: Some(episode),
                        date_text: date_text.clone(),
                        ..Default::default()
                    });
                }
            }
        }
    }

    out
}

const ACTIVITY_ITEM: &str = r#"div[jsname="MFYZYe"]"#;
const ACTIVITY_DATE_HEADER: &str = ".rp10kf";

static ACTIVITY_ITEM_OR_HEADER: LazyLock<Selector> =
    LazyLock::new(|| selector(&format!("{}, {}", ACTIVITY_ITEM, ACTIVITY_DATE_HEADER)));
static ACTIVITY_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("a.l8sGWb"));
static ACTIVITY_LABEL: LazyLock<Selector> = LazyLock::new(|| selector("span.hJ7x8b"));
static ACTIVITY_TIME: LazyLock<Selector> = LazyLock::new(|| selector("div.wlgrwd"));

/// Google My Activity feed. Items carry a title, a platform label and a
/// clock time; the date comes from the closest preceding date header.
pub fn activity_feed(html: &str) -> Extraction {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();
    let mut header: Option<String> = None;

    // Selection is in document order, so headers are seen before the items
    // they govern.
    for el in doc.select(&ACTIVITY_ITEM_OR_HEADER) {
        if el.value().attr("jsname") != Some("MFYZYe") {
            header = Some(text_of(el)).filter(|h| !h.is_empty());
            continue;
        }

        out.rendered += 1;
        let Some(title) = child_text(el, &ACTIVITY_TITLE) else {
            out.drop_item(ItemError::Extraction(format!(
                "activity item {} has no title",
                out.rendered - 1
            )));
            continue;
        };

        out.items.push(RawItem {
            title,
            date_text: header.clone(),
            time_text: child_text(el, &ACTIVITY_TIME),
            label: child_text(el, &ACTIVITY_LABEL),
            ..Default::default()
        });
    }

    out
}
