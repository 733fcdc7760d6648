// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use axum::http::request::Parts;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use regex::Regex;
use rmcp::handler::server::tool::{Extension, ToolRouter};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, ListResourceTemplatesResult, PaginatedRequestParams,
    ReadResourceRequestParams, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData, RoleServer, ServerHandler};
use serde::Serialize;

use crate::model::{SessionId, Wish, WishQuery};
use crate::session::SESSION_HEADER;
use crate::store::WishStore;

use super::types::{
    GrantWishParams, MakeWishParams, ReleaseWishParams, WishBoxPayload, WishListPayload,
};
use super::widgets::{
    protocol_value, widget_for_tool, UiResource, WidgetUrls, WishTool, UI_RESOURCE_MIME_TYPE,
};

pub const WISH_BOX_TEMPLATE: &str = "ui://wish-box/{message}";

fn wish_box_template_regex() -> Result<&'static Regex, ErrorData> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ui://wish-box/(.+)$"))
        .as_ref()
        .map_err(|err| ErrorData::internal_error(format!("invalid template pattern: {err}"), None))
}

/// Session id of the request that carries `parts`. The HTTP layer only forwards requests for
/// live sessions, so the header names the partition the call belongs to.
fn session_of(parts: &Parts) -> Result<SessionId, ErrorData> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| SessionId::new(value).ok())
        .ok_or_else(|| {
            ErrorData::invalid_request(format!("tool calls need a {SESSION_HEADER} header"), None)
        })
}

/// Tool dispatcher over the per-session wish partitions. rmcp runs one instance per session.
#[derive(Clone)]
pub struct WishboxMcp {
    store: Arc<WishStore>,
    widgets: WidgetUrls,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WishboxMcp {
    pub fn new(store: Arc<WishStore>, widgets: WidgetUrls) -> Self {
        Self {
            store,
            widgets,
            tool_router: Self::tool_router(),
        }
    }

    fn widget_result(
        &self,
        tool: WishTool,
        summary: String,
        payload: &impl Serialize,
    ) -> Result<CallToolResult, ErrorData> {
        let ui = UiResource::for_tool(tool, &self.widgets, payload)?;
        let structured = serde_json::to_value(payload).map_err(|err| {
            ErrorData::internal_error(format!("failed to encode tool result: {err}"), None)
        })?;

        let mut result = CallToolResult::success(vec![Content::text(summary), ui.to_content()?]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Adds a wish to the Winter Fairy's Wishbox and shows it in the wish-box widget. Each wish
    /// has a category (toy/experience/kindness/magic) and a priority (dream wish/hopeful
    /// wish/small wish).
    #[tool(
        name = "make_wish",
        annotations(read_only_hint = false, destructive_hint = false, open_world_hint = true)
    )]
    async fn make_wish(
        &self,
        parts: Extension<Parts>,
        params: Parameters<MakeWishParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let session = session_of(&parts.0)?;
        log_invocation(&session, WishTool::MakeWish);
        let MakeWishParams {
            message,
            category,
            priority,
        } = params.0;

        let wish = Wish::new(message, category, priority, Utc::now()).map_err(|err| {
            let field = serde_json::json!({ "field": "message" });
            ErrorData::invalid_params(err.to_string(), Some(field))
        })?;
        let payload = WishBoxPayload::from(&wish);
        let summary = format!(
            "Wish added to the Winter Fairy's Wishbox!\nWish: {}\nCategory: {}\nPriority: {}",
            wish.text(),
            wish.category(),
            wish.priority()
        );
        self.store.append(&session, wish);

        self.widget_result(WishTool::MakeWish, summary, &payload)
    }

    /// Shows every wish in this session's Wishbox in the wish-list widget. Use when the user
    /// asks to see their wishes.
    #[tool(name = "view_wishes", annotations(read_only_hint = true, open_world_hint = true))]
    async fn view_wishes(&self, parts: Extension<Parts>) -> Result<CallToolResult, ErrorData> {
        let session = session_of(&parts.0)?;
        log_invocation(&session, WishTool::ViewWishes);
        let wishes = self.store.list(&session);
        let summary = format!("Your Winter Fairy Wishbox contains {}!", wish_count(wishes.len()));

        self.widget_result(WishTool::ViewWishes, summary, &WishListPayload::from_wishes(&wishes))
    }

    /// Grants the first wish whose text contains `wish_text` (case-insensitive) and shows it in
    /// the wish-box widget.
    #[tool(
        name = "grant_wish",
        annotations(read_only_hint = false, destructive_hint = false, open_world_hint = true)
    )]
    async fn grant_wish(
        &self,
        parts: Extension<Parts>,
        params: Parameters<GrantWishParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let session = session_of(&parts.0)?;
        log_invocation(&session, WishTool::GrantWish);
        let query = parse_query(&params.0.wish_text)?;

        let now = Utc::now();
        let Some(wish) =
            self.store.update_first_match(&session, |wish| query.matches(wish), |wish| {
                wish.grant(now)
            })
        else {
            return Ok(no_match(&params.0.wish_text));
        };

        let summary = format!("The Winter Fairy granted your wish: {}", wish.text());
        self.widget_result(WishTool::GrantWish, summary, &WishBoxPayload::from(&wish))
    }

    /// Removes the first wish whose text contains `wish_text` (case-insensitive) and shows the
    /// remaining wishes in the wish-list widget.
    #[tool(
        name = "release_wish",
        annotations(read_only_hint = false, destructive_hint = true, open_world_hint = true)
    )]
    async fn release_wish(
        &self,
        parts: Extension<Parts>,
        params: Parameters<ReleaseWishParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let session = session_of(&parts.0)?;
        log_invocation(&session, WishTool::ReleaseWish);
        let query = parse_query(&params.0.wish_text)?;

        let Some(released) = self.store.remove(&session, |wish| query.matches(wish)) else {
            return Ok(no_match(&params.0.wish_text));
        };

        let remaining = self.store.list(&session);
        let summary = format!(
            "Released \"{}\" from the Wishbox. {} remaining.",
            released.text(),
            wish_count(remaining.len())
        );
        self.widget_result(
            WishTool::ReleaseWish,
            summary,
            &WishListPayload::from_wishes(&remaining),
        )
    }

    pub fn resource_templates(&self) -> Result<ListResourceTemplatesResult, ErrorData> {
        protocol_value(serde_json::json!({
            "resourceTemplates": [{
                "uriTemplate": WISH_BOX_TEMPLATE,
                "name": "Wish Box Message",
                "description": "Displays a custom wish in the Winter Fairy's Wishbox widget",
                "mimeType": UI_RESOURCE_MIME_TYPE,
            }]
        }))
    }

    /// Renders `ui://wish-box/<message>` as a preview. Nothing is stored.
    pub fn read_wish_box_template(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        let Some(encoded) = wish_box_template_regex()?.captures(uri).and_then(|caps| caps.get(1))
        else {
            return Err(ErrorData::resource_not_found(
                format!("Resource not found: {uri}"),
                Some(serde_json::json!({ "uri": uri })),
            ));
        };
        let message = percent_decode_str(encoded.as_str()).decode_utf8().map_err(|err| {
            ErrorData::invalid_params(
                format!("resource uri is not valid UTF-8 after decoding: {err}"),
                Some(serde_json::json!({ "uri": uri })),
            )
        })?;

        let widget = widget_for_tool(WishTool::MakeWish.name())?;
        let payload = WishBoxPayload::preview(message, Utc::now());
        let ui = UiResource::new(uri, widget, &self.widgets, &payload)?;
        protocol_value(serde_json::json!({ "contents": [ui.to_resource_contents()?] }))
    }
}

fn log_invocation(session: &SessionId, tool: WishTool) {
    tracing::info!(session_id = %session, tool = tool.name(), "tool invoked");
}

fn parse_query(wish_text: &str) -> Result<WishQuery, ErrorData> {
    WishQuery::new(wish_text).map_err(|err| {
        let field = serde_json::json!({ "field": "wish_text" });
        ErrorData::invalid_params(err.to_string(), Some(field))
    })
}

fn no_match(wish_text: &str) -> CallToolResult {
    CallToolResult::success(vec![Content::text(format!(
        "No wish matching \"{wish_text}\" was found in the Wishbox. \
         Try different words or call view_wishes."
    ))])
}

fn wish_count(count: usize) -> String {
    if count == 1 {
        "1 wish".to_owned()
    } else {
        format!("{count} wishes")
    }
}

#[tool_handler]
impl ServerHandler for WishboxMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Winter Fairy Wishbox (tools: make_wish, view_wishes, grant_wish, release_wish; \
                 resource template: ui://wish-box/{message}). Results carry a ui:// resource that \
                 renders the wish widgets."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            ..Default::default()
        }
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourceTemplatesResult, ErrorData>> + Send + '_ {
        std::future::ready(self.resource_templates())
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, ErrorData>> + Send + '_ {
        std::future::ready(self.read_wish_box_template(&request.uri))
    }
}
