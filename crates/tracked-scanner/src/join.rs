//! Links that launch the client into a specific instance.

use std::fmt;
use tracked_core::PlaceId;

const DEEP_LINK_BASE: &str = "roblox://experiences/start";
const WEB_LAUNCH_BASE: &str = "https://www.roblox.com/games/start";

/// Target of a join: a place and one of its instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    place_id: PlaceId,
    instance_id: String,
}

impl JoinLink {
    /// Link to `instance_id` within `place_id`.
    #[must_use]
    pub fn new(place_id: &PlaceId, instance_id: impl Into<String>) -> Self {
        Self {
            place_id: place_id.clone(),
            instance_id: instance_id.into(),
        }
    }

    /// Protocol link handled by the installed client.
    #[must_use]
    pub fn deep_link(&self) -> String {
        format!("{DEEP_LINK_BASE}?{}", self.query())
    }

    /// Browser fallback that hands off to the client.
    #[must_use]
    pub fn web_url(&self) -> String {
        format!("{WEB_LAUNCH_BASE}?{}", self.query())
    }

    fn query(&self) -> String {
        format!(
            "placeId={}&gameInstanceId={}",
            self.place_id,
            urlencoding::encode(&self.instance_id)
        )
    }
}

impl fmt::Display for JoinLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.deep_link())
    }
}
