//! Outbound events emitted by the wildlife view.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// One-way message from the wildlife view to other parts of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WildlifeEvent {
    /// Open the detail view for a record.
    ShowDetail { record: Record },

    /// Append a resolved name to the exclusion list.
    Exclude { name: String },

    /// Append a resolved name to the wishlist.
    WishList { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let event = WildlifeEvent::Exclude {
            name: "Dodo".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Exclude");
        assert_eq!(json["name"], "Dodo");
    }
}
