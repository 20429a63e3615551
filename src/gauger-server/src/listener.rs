// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON-over-TCP listener for gauger-server.
//!
//! Accepts client connections speaking the `ClientEnvelope`/`ClientResponse`
//! protocol defined in `gauger-core::client`, one object per line.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info};

use gauger_core::client::parse_envelope;
use gauger_core::{ClientCommand, ClientResponse};

use crate::auth::TokenAuth;
use crate::handle::GaugerHandle;

/// Run the JSON TCP listener until shutdown is signalled.
pub async fn run_listener(
    addr: SocketAddr,
    handle: GaugerHandle,
    auth: TokenAuth,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    serve(listener, handle, auth, &mut shutdown_rx).await
}

async fn serve(
    listener: TcpListener,
    handle: GaugerHandle,
    auth: TokenAuth,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> std::io::Result<()> {
    let auth = Arc::new(auth);

    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Listener shutting down");
                    return Ok(());
                }
                continue;
            }
        };
        info!("Client connected: {}", peer);

        let handle = handle.clone();
        let auth = Arc::clone(&auth);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, peer, handle, auth).await {
                error!("Client {} error: {:?}", peer, e);
            }
        });
    }
}

async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    handle: GaugerHandle,
    auth: Arc<TokenAuth>,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Client {} disconnected", addr);
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope = match parse_envelope(trimmed) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Invalid JSON from {}: {} / {:?}", addr, trimmed, e);
                let resp = ClientResponse::error(format!("Invalid JSON: {}", e));
                send_response(&mut writer, &resp).await?;
                continue;
            }
        };

        if let Err(err) = auth.check(envelope.token.as_deref()) {
            send_response(&mut writer, &ClientResponse::error(err)).await?;
            continue;
        }

        let resp = execute(&handle, envelope.cmd).await;
        send_response(&mut writer, &resp).await?;
    }

    Ok(())
}

async fn send_response<W>(writer: &mut W, resp: &ClientResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let resp_line = serde_json::to_string(resp)? + "\n";
    writer.write_all(resp_line.as_bytes()).await?;
    writer.flush().await
}

/// Run one client command against the service.
pub async fn execute(handle: &GaugerHandle, cmd: ClientCommand) -> ClientResponse {
    match cmd {
        ClientCommand::GetStatus => ClientResponse {
            status: Some(handle.status().await),
            ..ClientResponse::ok()
        },
        ClientCommand::GaugerCommand { command } => {
            if command.is_empty() {
                return ClientResponse::error("missing command");
            }
            command_response(handle.command(command).await)
        }
        ClientCommand::ControllerCommand { command } => {
            if command.is_empty() {
                return ClientResponse::error("missing command");
            }
            command_response(handle.controller_command(command).await)
        }
        ClientCommand::Connect => match handle.connect().await {
            Ok(status) => ClientResponse {
                status: Some(status),
                message: Some("Device connected".to_string()),
                ..ClientResponse::ok()
            },
            Err(e) => ClientResponse::error(e.to_string()),
        },
        ClientCommand::Disconnect => ClientResponse {
            status: Some(handle.disconnect().await),
            message: Some("Device disconnected".to_string()),
            ..ClientResponse::ok()
        },
        ClientCommand::GetControllerState => match handle.controller_state().await {
            Ok(state) => ClientResponse {
                controller_state: Some(state),
                ..ClientResponse::ok()
            },
            Err(e) => ClientResponse::error(e.to_string()),
        },
        ClientCommand::ControllerReset => {
            message_response(handle.controller_reset().await, "reset sent")
        }
        ClientCommand::ControllerStop => {
            message_response(handle.controller_stop().await, "stop sent")
        }
    }
}

fn command_response(result: gauger_core::CommandResult) -> ClientResponse {
    match result {
        Ok(response) => ClientResponse {
            response: Some(response),
            ..ClientResponse::ok()
        },
        Err(e) => ClientResponse::error(e.to_string()),
    }
}

fn message_response<E>(result: Result<(), E>, message: &str) -> ClientResponse
where
    E: std::fmt::Display,
{
    match result {
        Ok(()) => ClientResponse {
            message: Some(message.to_string()),
            ..ClientResponse::ok()
        },
        Err(e) => ClientResponse::error(e.to_string()),
    }
}
