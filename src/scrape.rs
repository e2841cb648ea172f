// Page scraping module
// Pulls comic metadata out of xkcd HTML using fixed textual anchors

/// Precedes the direct image URL on every comic page
pub const HOTLINK_ANCHOR: &str = "Image URL (for hotlinking/embedding):";

/// Precedes the comic's permalink, whose last segment is the comic number
pub const PERMALINK_ANCHOR: &str = "Permanent link to this comic:";

/// Container of the comic image; its `title` attribute is the caption
pub const COMIC_DIV_ANCHOR: &str = "<div id=\"comic\">";

const TITLE_ATTR: &str = "title=\"";

/// Everything the page anchors yielded; missing anchors stay `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub number: Option<u32>,
    pub hotlink_url: Option<String>,
    pub caption: Option<String>,
}

/// Extract every known field from a comic page
pub fn extract_metadata(page: &str) -> PageMetadata {
    PageMetadata {
        number: extract_comic_number(page),
        hotlink_url: extract_hotlink_url(page),
        caption: extract_caption(page),
    }
}

/// Direct image URL following the hotlink anchor
pub fn extract_hotlink_url(page: &str) -> Option<String> {
    let url = link_after(page, HOTLINK_ANCHOR)?;
    url.starts_with("http").then(|| url.to_string())
}

/// Comic number taken from the permalink, e.g. `https://xkcd.com/353/` → 353
pub fn extract_comic_number(page: &str) -> Option<u32> {
    let link = link_after(page, PERMALINK_ANCHOR)?;
    let number: u32 = link.trim_end_matches('/').rsplit('/').next()?.parse().ok()?;
    (number > 0).then_some(number)
}

/// Title text of the comic image, with HTML entities decoded
pub fn extract_caption(page: &str) -> Option<String> {
    let comic = &page[page.find(COMIC_DIV_ANCHOR)? + COMIC_DIV_ANCHOR.len()..];
    // Only look inside the comic div, not at later title attributes
    let comic = match comic.find("</div>") {
        Some(end) => &comic[..end],
        None => comic,
    };
    let start = comic.find(TITLE_ATTR)? + TITLE_ATTR.len();
    let end = comic[start..].find('"')?;
    Some(decode_entities(&comic[start..start + end]))
}

/// The link text after `anchor`, cut at the first markup delimiter.
///
/// Handles both the bare form (`anchor: http://...<`) and the form where
/// the link is wrapped in an `<a href=...>` tag.
fn link_after<'a>(page: &'a str, anchor: &str) -> Option<&'a str> {
    let mut rest = page[page.find(anchor)? + anchor.len()..].trim_start();
    if rest.starts_with("<a") {
        rest = rest[rest.find('>')? + 1..].trim_start();
    }
    let end = rest
        .find(|c: char| c == '<' || c == '"' || c.is_whitespace())
        .unwrap_or(rest.len());
    let link = &rest[..end];
    (!link.is_empty()).then_some(link)
}

/// Decode the handful of entities xkcd uses in title attributes
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
