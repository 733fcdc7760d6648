// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::streamable_http_server::session::local::{
    LocalSessionManagerError, SessionTransport,
};
use rmcp::transport::streamable_http_server::session::{ServerSseMessage, SessionId as WireId};
use rmcp::transport::streamable_http_server::SessionManager;

use crate::model::SessionId;

use super::table::SessionTable;

fn parse_id(id: &WireId) -> Option<SessionId> {
    SessionId::new(&**id).ok()
}

/// Session bookkeeping lives in the table; message routing is delegated to rmcp's local
/// session handles. Closing a session from the protocol side (client `DELETE` or the service
/// ending) drops its wishes as well.
impl SessionManager for SessionTable {
    type Error = LocalSessionManagerError;
    type Transport = SessionTransport;

    async fn create_session(&self) -> Result<(WireId, Self::Transport), Self::Error> {
        let (session, transport) = self.create().await;
        Ok((WireId::from(session.id().as_str()), transport))
    }

    async fn initialize_session(
        &self,
        id: &WireId,
        message: ClientJsonRpcMessage,
    ) -> Result<ServerJsonRpcMessage, Self::Error> {
        self.local.initialize_session(id, message).await
    }

    async fn has_session(&self, id: &WireId) -> Result<bool, Self::Error> {
        Ok(parse_id(id).is_some_and(|id| self.contains(&id)))
    }

    async fn close_session(&self, id: &WireId) -> Result<(), Self::Error> {
        if let Some(id) = parse_id(id) {
            self.delete(&id, |id| {
                self.store.drop_session(id);
            })
            .await;
        }
        Ok(())
    }

    async fn create_stream(
        &self,
        id: &WireId,
        message: ClientJsonRpcMessage,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.local.create_stream(id, message).await
    }

    async fn accept_message(
        &self,
        id: &WireId,
        message: ClientJsonRpcMessage,
    ) -> Result<(), Self::Error> {
        self.local.accept_message(id, message).await
    }

    async fn create_standalone_stream(
        &self,
        id: &WireId,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.local.create_standalone_stream(id).await
    }

    async fn resume(
        &self,
        id: &WireId,
        last_event_id: String,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.local.resume(id, last_event_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::model::{Wish, WishCategory, WishPriority};
    use crate::store::WishStore;

    #[tokio::test]
    async fn protocol_close_drops_session_and_wishes() {
        let store = Arc::new(WishStore::in_memory());
        let table = SessionTable::new(Arc::clone(&store));
        let (wire_id, _transport) = table.create_session().await.expect("create session");
        let id = SessionId::new(&*wire_id).expect("session id");
        let wish = Wish::new("Sled", WishCategory::Toy, WishPriority::Small, Utc::now())
            .expect("wish");
        store.append(&id, wish);

        assert!(table.has_session(&wire_id).await.expect("has session"));
        table.close_session(&wire_id).await.expect("close session");

        assert!(!table.has_session(&wire_id).await.expect("has session"));
        assert_eq!(store.count(&id), 0);
        assert!(table.local.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_absent() {
        let table = SessionTable::new(Arc::new(WishStore::in_memory()));
        assert!(!table.has_session(&WireId::from("missing")).await.expect("has session"));
        assert!(!table.has_session(&WireId::from("a b")).await.expect("has session"));
        table.close_session(&WireId::from("missing")).await.expect("close is a no-op");
    }
}
