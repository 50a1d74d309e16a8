use crate::cursor::Cursor;
use tracked_core::{PlaceId, SortOrder};

pub fn build_listing_url(
    base_url: &str,
    place_id: &PlaceId,
    sort_order: SortOrder,
    limit: u32,
    cursor: Option<&Cursor>,
) -> String {
    let mut url = format!(
        "{}/v1/games/{}/servers/Public?sortOrder={}&limit={}",
        base_url.trim_end_matches('/'),
        place_id,
        sort_order,
        limit
    );

    if let Some(cursor) = cursor {
        url.push_str("&cursor=");
        url.push_str(&urlencoding::encode(cursor.as_str()));
    }

    url
}
