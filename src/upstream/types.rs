//! Share API wire types.

use serde::{Deserialize, Deserializer, Serialize};

use super::ListingEntry;

// ==================== Request Bodies ====================

/// Body of `POST /p2/browser/file/list`.
#[derive(Debug, Serialize)]
pub(crate) struct ListRequest<'a> {
    pub xtlink: &'a str,
    pub token: &'a str,
    pub reload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<&'a str>,
}

/// Body of `POST /p2/browser/file/fetch_url`.
#[derive(Debug, Serialize)]
pub(crate) struct FetchUrlRequest<'a> {
    pub xtlink: &'a str,
    pub file_id: &'a str,
    pub token: &'a str,
}

// ==================== Response Bodies ====================

/// Listing response. Only `results` is consumed.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub results: Vec<RawEntry>,
}

/// One row of a listing response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    /// File or folder id. Some responses encode it as a number.
    #[serde(deserialize_with = "string_or_number")]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub icon: Option<String>,
    pub is_dir: Option<bool>,
}

impl RawEntry {
    /// Folder detection: explicit `is_dir` wins, then the folder icon, then
    /// the `d` id prefix the share API uses for directories.
    fn is_container(&self) -> bool {
        match self.is_dir {
            Some(is_dir) => is_dir,
            None => {
                self.icon.as_deref() == Some("folder") || self.key.starts_with('d')
            }
        }
    }
}

impl From<RawEntry> for ListingEntry {
    fn from(raw: RawEntry) -> Self {
        let is_container = raw.is_container();
        Self {
            id: raw.key,
            display_name: raw.name,
            is_container,
        }
    }
}

/// Resolve response. `download_url` is absent when the share API refuses.
#[derive(Debug, Deserialize)]
pub(crate) struct FetchUrlResponse {
    pub download_url: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_deserialize_mixed_entries() {
        let json = serde_json::json!({
            "code": 200,
            "results": [
                {"key": "d100", "name": "Season 1", "icon": "folder"},
                {"key": "f200", "name": "readme.txt", "icon": "txt", "size": 12},
                {"key": 300, "name": "numeric.bin"}
            ]
        });

        let resp: ListResponse = serde_json::from_value(json).unwrap();
        let entries: Vec<ListingEntry> = resp.results.into_iter().map(Into::into).collect();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_container);
        assert!(!entries[1].is_container);
        assert_eq!(entries[2].id, "300");
        assert!(!entries[2].is_container);
    }

    #[test]
    fn test_list_response_without_results_is_empty() {
        let resp: ListResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_explicit_is_dir_overrides_heuristics() {
        let json = serde_json::json!({"key": "d1", "name": "x", "icon": "folder", "is_dir": false});
        let entry: ListingEntry = serde_json::from_value::<RawEntry>(json).unwrap().into();
        assert!(!entry.is_container);
    }

    #[test]
    fn test_fetch_url_response_missing_field() {
        let resp: FetchUrlResponse = serde_json::from_value(serde_json::json!({"code": 404})).unwrap();
        assert!(resp.download_url.is_none());
    }

    #[test]
    fn test_list_request_omits_absent_folder() {
        let body = ListRequest {
            xtlink: "ctfile://abc",
            token: "t",
            reload: false,
            folder_id: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"xtlink": "ctfile://abc", "token": "t", "reload": false})
        );
    }
}
