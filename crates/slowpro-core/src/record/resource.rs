use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a request, used for grouping in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Script,
    Image,
    Font,
    Media,
    #[serde(rename = "XHR", alias = "Xhr")]
    Xhr,
    Fetch,
    WebSocket,
    Manifest,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "Document",
            ResourceType::Stylesheet => "Stylesheet",
            ResourceType::Script => "Script",
            ResourceType::Image => "Image",
            ResourceType::Font => "Font",
            ResourceType::Media => "Media",
            ResourceType::Xhr => "XHR",
            ResourceType::Fetch => "Fetch",
            ResourceType::WebSocket => "WebSocket",
            ResourceType::Manifest => "Manifest",
            ResourceType::Other => "Other",
        }
    }

    /// Map a DevTools resource type (or a Resource Timing initiator type)
    /// onto a resource type. Unrecognized names map to `Other`.
    pub fn from_devtools(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "document" | "navigation" => ResourceType::Document,
            "stylesheet" | "link" | "css" => ResourceType::Stylesheet,
            "script" => ResourceType::Script,
            "image" | "img" => ResourceType::Image,
            "font" => ResourceType::Font,
            "media" | "audio" | "video" => ResourceType::Media,
            "xhr" | "xmlhttprequest" => ResourceType::Xhr,
            "fetch" | "beacon" => ResourceType::Fetch,
            "websocket" => ResourceType::WebSocket,
            "manifest" => ResourceType::Manifest,
            _ => ResourceType::Other,
        }
    }

    /// Infer a resource type from a response MIME type.
    ///
    /// Returns `None` when the MIME type does not unambiguously identify
    /// a resource class (e.g. `application/octet-stream`).
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let parsed: mime::Mime = mime_type.trim().parse().ok()?;

        if parsed.type_() == mime::IMAGE {
            return Some(ResourceType::Image);
        }
        if parsed.type_() == mime::FONT {
            return Some(ResourceType::Font);
        }
        if parsed.type_() == mime::AUDIO || parsed.type_() == mime::VIDEO {
            return Some(ResourceType::Media);
        }

        let subtype = parsed.subtype().as_str().to_ascii_lowercase();
        let suffix = parsed.suffix().map(|s| s.as_str().to_ascii_lowercase());

        if parsed.type_() == mime::TEXT {
            return match subtype.as_str() {
                "html" => Some(ResourceType::Document),
                "css" => Some(ResourceType::Stylesheet),
                "javascript" | "ecmascript" => Some(ResourceType::Script),
                _ => None,
            };
        }

        if parsed.type_() == mime::APPLICATION {
            return match subtype.as_str() {
                "javascript" | "x-javascript" | "ecmascript" => Some(ResourceType::Script),
                "json" => Some(ResourceType::Xhr),
                "manifest" => Some(ResourceType::Manifest),
                "xhtml" => Some(ResourceType::Document),
                "font-woff" | "font-woff2" | "x-font-ttf" | "vnd.ms-fontobject" => {
                    Some(ResourceType::Font)
                }
                _ if suffix.as_deref() == Some("json") => Some(ResourceType::Xhr),
                _ => None,
            };
        }

        None
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
