use crate::extract::Item;

/// Merge per-page item lists into one feed order.
///
/// Lists are concatenated in the order given, then stably sorted by
/// `pub_date`, newest first. Items sharing a date keep their concatenation
/// order. Duplicates are kept.
pub fn aggregate<I>(batches: I) -> Vec<Item>
where
    I: IntoIterator<Item = Vec<Item>>,
{
    let mut items: Vec<Item> = batches.into_iter().flatten().collect();
    items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    items
}
