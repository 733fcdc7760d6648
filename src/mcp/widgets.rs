// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rmcp::model::{Content, ResourceContents};
use rmcp::ErrorData;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Characters `encodeURIComponent` leaves alone, so widgets can decode with the browser's
/// `decodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const UI_RESOURCE_MIME_TYPE: &str = "text/uri-list";

/// The closed tool catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WishTool {
    MakeWish,
    ViewWishes,
    GrantWish,
    ReleaseWish,
}

impl WishTool {
    pub const ALL: [WishTool; 4] =
        [WishTool::MakeWish, WishTool::ViewWishes, WishTool::GrantWish, WishTool::ReleaseWish];

    pub fn name(self) -> &'static str {
        match self {
            Self::MakeWish => "make_wish",
            Self::ViewWishes => "view_wishes",
            Self::GrantWish => "grant_wish",
            Self::ReleaseWish => "release_wish",
        }
    }

    pub fn widget(self) -> Widget {
        match self {
            Self::MakeWish | Self::GrantWish => Widget::WishBox,
            Self::ViewWishes | Self::ReleaseWish => Widget::WishList,
        }
    }
}

impl fmt::Display for WishTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for WishTool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| UnknownTool(s.to_owned()))
    }
}

/// Widget lookup by tool name. An unknown name is a server bug, not a client error.
pub fn widget_for_tool(name: &str) -> Result<Widget, ErrorData> {
    name.parse::<WishTool>()
        .map(WishTool::widget)
        .map_err(|err| ErrorData::internal_error(format!("no widget for tool: {err}"), None))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Widget {
    WishBox,
    WishList,
}

impl Widget {
    pub fn name(self) -> &'static str {
        match self {
            Self::WishBox => "wish-box",
            Self::WishList => "wish-list",
        }
    }
}

/// Where the widget HTML files are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetUrls {
    base_url: String,
}

impl WidgetUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_url(&self, widget: Widget) -> String {
        format!("{}/{}.html", self.base_url, widget.name())
    }

    /// `<base>/<widget>.html?data=<url-encoded JSON>`.
    pub fn iframe_url(
        &self,
        widget: Widget,
        payload: &impl Serialize,
    ) -> Result<String, ErrorData> {
        let json = serde_json::to_string(payload).map_err(|err| {
            ErrorData::internal_error(format!("failed to encode widget payload: {err}"), None)
        })?;
        Ok(format!("{}?data={}", self.page_url(widget), utf8_percent_encode(&json, URI_COMPONENT)))
    }
}

/// A renderable widget reference: `ui://...` plus the iframe URL that shows the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiResource {
    uri: String,
    iframe_url: String,
}

impl UiResource {
    pub fn for_tool(
        tool: WishTool,
        urls: &WidgetUrls,
        payload: &impl Serialize,
    ) -> Result<Self, ErrorData> {
        Self::new(format!("ui://{}", tool.name()), tool.widget(), urls, payload)
    }

    pub fn new(
        uri: impl Into<String>,
        widget: Widget,
        urls: &WidgetUrls,
        payload: &impl Serialize,
    ) -> Result<Self, ErrorData> {
        Ok(Self {
            uri: uri.into(),
            iframe_url: urls.iframe_url(widget, payload)?,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn iframe_url(&self) -> &str {
        &self.iframe_url
    }

    fn resource_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uri": self.uri,
            "mimeType": UI_RESOURCE_MIME_TYPE,
            "text": self.iframe_url,
        })
    }

    /// Embedded-resource content block for tool results.
    pub fn to_content(&self) -> Result<Content, ErrorData> {
        protocol_value(serde_json::json!({ "type": "resource", "resource": self.resource_json() }))
    }

    /// Resource contents for `resources/read`.
    pub fn to_resource_contents(&self) -> Result<ResourceContents, ErrorData> {
        protocol_value(self.resource_json())
    }
}

/// Builds an rmcp model value from its wire JSON.
pub(crate) fn protocol_value<T: DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, ErrorData> {
    serde_json::from_value(value).map_err(|err| {
        ErrorData::internal_error(format!("failed to build protocol value: {err}"), None)
    })
}
