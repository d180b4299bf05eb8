use url::Url;

use crate::types::PageNumber;

/// Page numbers announced by an RFC 8288 `Link` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkPages {
    pub first: Option<PageNumber>,
    pub prev: Option<PageNumber>,
    pub next: Option<PageNumber>,
    pub last: Option<PageNumber>,
    /// Target of a `next` link that carries no numeric `page` parameter,
    /// such as an opaque `after=` cursor.
    pub next_cursor: Option<String>,
}

impl LinkPages {
    pub fn has_next(&self) -> bool {
        self.next.is_some() || self.next_cursor.is_some()
    }
}

/// Parse a header such as
/// `<https://api.example.com/items?page=2>; rel="next", <...?page=5>; rel="last"`.
///
/// Only `next` is kept when its target has no numeric `page` parameter;
/// other relations without one are ignored.
pub fn parse_link_header(value: &str) -> LinkPages {
    let mut pages = LinkPages::default();
    for entry in split_entries(value) {
        let mut parts = entry.split(';');
        let Some(target) = parts.next().map(str::trim) else {
            continue;
        };
        let Some(target) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
            continue;
        };
        let page = page_param(target);

        for param in parts {
            let Some((key, rel)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            for rel in rel.trim().trim_matches('"').split_whitespace() {
                match (rel, page) {
                    ("first", Some(page)) => pages.first = Some(page),
                    ("prev", Some(page)) => pages.prev = Some(page),
                    ("next", Some(page)) => pages.next = Some(page),
                    ("next", None) => pages.next_cursor = Some(target.to_string()),
                    ("last", Some(page)) => pages.last = Some(page),
                    _ => {}
                }
            }
        }
    }
    pages
}

/// Split on commas between entries; commas inside `<...>` belong to the target.
fn split_entries(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in value.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    entries.push(&value[start..]);
    entries
}

fn page_param(target: &str) -> Option<PageNumber> {
    let url = Url::parse(target).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}
