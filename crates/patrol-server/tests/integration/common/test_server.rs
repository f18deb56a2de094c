//! In-process server for integration tests.
//!
//! Boots the real router on an ephemeral port with one token per role.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use patrol_core::{Identity, Role};
use patrol_hub::{BroadcastHub, HubConfig};
use patrol_registry::PatrolRegistry;
use patrol_server::{serve, AppState, TokenAuthorizer};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const VIEWER: &str = "viewer-token";
pub const MEMBER: &str = "member-token";
pub const COMMAND: &str = "comd-token";
pub const HQ: &str = "hq-token";

pub struct TestServer {
    addr: SocketAddr,
    state: AppState,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_hub(HubConfig::default()).await
    }

    pub async fn start_with_hub(hub_config: HubConfig) -> Self {
        let authorizer = TokenAuthorizer::new([
            (VIEWER.to_string(), Identity::new("viewer", Role::ViewOnly)),
            (MEMBER.to_string(), Identity::new("member", Role::PatrolMember)),
            (COMMAND.to_string(), Identity::new("comd", Role::PatrolComd)),
            (HQ.to_string(), Identity::new("hq", Role::HqOps)),
        ]);
        let state = AppState::new(
            Arc::new(PatrolRegistry::new()),
            Arc::new(BroadcastHub::new(hub_config)),
            Arc::new(authorizer),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = state.clone();
        let handle = tokio::spawn(async move {
            let _ = serve(listener, served).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Poll until the hub holds `expected` observers, or give up after 2s.
    pub async fn wait_for_observers(&self, expected: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.state.hub().observer_count() != expected {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
