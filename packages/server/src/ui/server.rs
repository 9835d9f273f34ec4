//! Server execution logic.

use std::{future::Future, io::ErrorKind, net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use parley_shared::time::{Clock, SystemClock};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    infrastructure::{
        message_pusher::WebSocketMessagePusher, repository::InMemoryConnectionRegistry,
    },
    usecase::{
        ConnectClientUseCase, DisconnectClientUseCase, GetRoomDetailUseCase, GetRoomsUseCase,
        RouteMessageUseCase,
    },
};

use super::{
    error::ServerError,
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Port the server and discovery agree on
pub const DEFAULT_PORT: u16 = 8887;

/// Number of consecutive ports tried, starting at the configured one
pub const DEFAULT_PORT_ATTEMPTS: u16 = 9;

/// Bind settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// First port to try. `0` asks the OS for an ephemeral port.
    pub port: u16,
    pub port_attempts: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            port_attempts: DEFAULT_PORT_ATTEMPTS,
        }
    }
}

/// Signaling server
///
/// # Example
///
/// ```ignore
/// let bound = Server::in_memory().bind(&ServerConfig::default()).await?;
/// tracing::info!("listening on {}", bound.local_addr());
/// bound.run().await?;
/// ```
pub struct Server {
    /// ConnectClientUseCase（接続受付のユースケース）
    connect_client_usecase: Arc<ConnectClientUseCase>,
    /// RouteMessageUseCase（フレーム中継のユースケース）
    route_message_usecase: Arc<RouteMessageUseCase>,
    /// DisconnectClientUseCase（切断のユースケース）
    disconnect_client_usecase: Arc<DisconnectClientUseCase>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

impl Server {
    pub fn new(
        connect_client_usecase: Arc<ConnectClientUseCase>,
        route_message_usecase: Arc<RouteMessageUseCase>,
        disconnect_client_usecase: Arc<DisconnectClientUseCase>,
        get_rooms_usecase: Arc<GetRoomsUseCase>,
        get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    ) -> Self {
        Self {
            connect_client_usecase,
            route_message_usecase,
            disconnect_client_usecase,
            get_rooms_usecase,
            get_room_detail_usecase,
        }
    }

    /// Wire every use case against the in-memory registry and the WebSocket pusher
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        // 1. Repository
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        // 2. MessagePusher
        let message_pusher = Arc::new(WebSocketMessagePusher::new());

        // 3. UseCases
        Self::new(
            Arc::new(ConnectClientUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                clock,
            )),
            Arc::new(RouteMessageUseCase::new(
                registry.clone(),
                message_pusher.clone(),
            )),
            Arc::new(DisconnectClientUseCase::new(
                registry.clone(),
                message_pusher.clone(),
            )),
            Arc::new(GetRoomsUseCase::new(registry.clone())),
            Arc::new(GetRoomDetailUseCase::new(registry)),
        )
    }

    /// Build the axum router
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            connect_client_usecase: self.connect_client_usecase,
            route_message_usecase: self.route_message_usecase,
            disconnect_client_usecase: self.disconnect_client_usecase,
            get_rooms_usecase: self.get_rooms_usecase,
            get_room_detail_usecase: self.get_room_detail_usecase,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            .route("/", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind a listener, walking forward through ports that are already in use
    pub async fn bind(self, config: &ServerConfig) -> Result<BoundServer, ServerError> {
        let listener = bind_with_fallback(&config.host, config.port, config.port_attempts).await?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            router: self.router(),
        })
    }
}

/// A server whose listener is bound but not yet serving
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Signaling server listening on {}", self.local_addr);
        tracing::info!("Connect to: ws://{}/ws", self.local_addr);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Try `port`, `port + 1`, ... for up to `attempts` ports.
///
/// Only "address in use" moves on to the next port; any other bind error is returned.
async fn bind_with_fallback(
    host: &str,
    port: u16,
    attempts: u16,
) -> Result<TcpListener, ServerError> {
    let attempts = if port == 0 { 1 } else { attempts.max(1) };
    let mut last_tried = port;

    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        last_tried = candidate;

        let addr = format!("{}:{}", host, candidate);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::info!("Port {} was busy, bound {} instead", port, candidate);
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                tracing::warn!("Port {} is already in use, trying the next one", candidate);
            }
            Err(source) => return Err(ServerError::Bind { addr, source }),
        }
    }

    Err(ServerError::NoAvailablePort {
        host: host.to_string(),
        first: port,
        last: last_tried,
    })
}
