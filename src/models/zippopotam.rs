//! Response shape of `https://api.zippopotam.us/us/{zip}`.
//!
//! Coordinates arrive as decimal strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ZipLookup {
    #[serde(rename = "post code")]
    pub post_code: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Place {
    #[serde(rename = "place name")]
    pub place_name: Option<String>,
    pub state: Option<String>,
    pub latitude: String,
    pub longitude: String,
}
