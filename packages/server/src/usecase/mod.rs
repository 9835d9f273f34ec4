//! UseCase 層
//!
//! ドメイン層の trait（ConnectionRegistry, MessagePusher）だけに依存して
//! シグナリングサーバーの振る舞いを組み立てます。

mod connect_client;
mod disconnect_client;
mod error;
mod get_room_detail;
mod get_rooms;
mod route_message;

#[cfg(test)]
mod test_support;

pub use connect_client::ConnectClientUseCase;
pub use disconnect_client::DisconnectClientUseCase;
pub use error::{ConnectError, DisconnectError, GetRoomDetailError, RouteError};
pub use get_room_detail::GetRoomDetailUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use route_message::{RouteMessageUseCase, RouteOutcome};
