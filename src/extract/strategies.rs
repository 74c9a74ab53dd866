//! Row readers for each listing layout.

use super::dates::{parse_dotted, parse_iso, parse_ymd};
use super::{Item, RowError, SiteRules};
use crate::page::Element;

pub(super) const DOTTED_ROWS: &str = "section.subpage__contentsData dl.contentsData__list";
const DOTTED_DATE: &str = "dt.date";
const DOTTED_LINK: &str = "dd.title a";

pub(super) const TIME_TABLE_ROWS: &str = "tr";
pub(super) const TIME_TABLE_DATE: &str = "th time";
const TIME_TABLE_BODY: &str = "td";

pub(super) const POST_BOX_ROWS: &str = "div.box";
const POST_BOX_ANCHOR: &str = "a";
const POST_BOX_DATE: &str = "time.post_date";
const POST_BOX_CATEGORY: &str = "span.others";
const POST_BOX_TITLE: &str = "dd";

/// Separator between category and title in composed descriptions.
const CATEGORY_SEPARATOR: char = '：';

fn required_title(el: &Element<'_>) -> Result<String, RowError> {
    let title = el.text();
    if title.is_empty() {
        return Err(RowError::EmptyTitle);
    }
    Ok(title)
}

fn required_attribute(el: &Element<'_>, selector: &str, name: &'static str) -> Result<String, RowError> {
    el.attribute(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RowError::MissingAttribute {
            element: selector.to_owned(),
            attribute: name,
        })
}

pub(super) fn dotted_date_list(row: Element<'_>, rules: &SiteRules) -> Result<Item, RowError> {
    let pub_date = parse_dotted(&row.query_one(DOTTED_DATE)?.text())?;

    let anchor = row.query_one(DOTTED_LINK)?;
    let title = required_title(&anchor)?;
    let link = rules.resolve_href(DOTTED_LINK, anchor.attribute("href"))?;

    Ok(Item {
        description: title.clone(),
        title,
        link,
        pub_date,
    })
}

pub(super) fn time_table(
    row: Element<'_>,
    link_selector: &str,
    rules: &SiteRules,
) -> Result<Item, RowError> {
    let time = row.query_one(TIME_TABLE_DATE)?;
    let pub_date = parse_iso(&required_attribute(&time, TIME_TABLE_DATE, "datetime")?)?;

    let anchor = row.query_one(link_selector)?;
    let title = required_title(&anchor)?;
    let link = rules.resolve_href(link_selector, anchor.attribute("href"))?;

    let description = row.query_one(TIME_TABLE_BODY)?.text();

    Ok(Item {
        title,
        link,
        description,
        pub_date,
    })
}

pub(super) fn post_date_box(row: Element<'_>, rules: &SiteRules) -> Result<Item, RowError> {
    let anchor = row.query_one(POST_BOX_ANCHOR)?;
    let link = rules.resolve_href(POST_BOX_ANCHOR, anchor.attribute("href"))?;

    let time = anchor.query_one(POST_BOX_DATE)?;
    let pub_date = parse_ymd(&required_attribute(&time, POST_BOX_DATE, "postdate")?)?;

    let category = anchor
        .find(POST_BOX_CATEGORY)?
        .map(|el| el.text())
        .filter(|c| !c.is_empty());

    let title = required_title(&anchor.query_one(POST_BOX_TITLE)?)?;
    let description = match category {
        Some(category) => format!("{category}{CATEGORY_SEPARATOR}{title}"),
        None => title.clone(),
    };

    Ok(Item {
        title,
        link,
        description,
        pub_date,
    })
}
