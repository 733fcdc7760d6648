// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Model Context Protocol (MCP) server surface.
//!
//! One [`WishboxMcp`] is created per session; it exposes the wish tools and the wish-box
//! resource template, and answers with text plus a `ui://` widget resource.

mod server;
pub mod types;
pub mod widgets;

pub use server::{WishboxMcp, WISH_BOX_TEMPLATE};
pub use widgets::{widget_for_tool, UiResource, Widget, WidgetUrls, WishTool};
