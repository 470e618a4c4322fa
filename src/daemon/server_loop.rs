// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Server lifecycle
//!
//! [`ServerLoop`] owns the two tasks of a running simulator:
//!
//! - the `tokio-modbus` accept loop, serving every client connection from the
//!   shared [`RegisterStore`];
//! - the cadence loop, which waits one interval, ticks the telemetry model and
//!   replaces the whole register table with the encoded fields.
//!
//! Shutdown goes through a `watch` channel: the cadence loop leaves its
//! interval wait immediately (a tick in progress always completes first),
//! open connections see end of stream, then the accept task is aborted so
//! the listening socket is closed before [`ServerLoop::stop`] returns.

use std::fmt::Display;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::Local;
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::config::Config;
use crate::error::{SimulatorError, StoreError};
use crate::modbus::{ConnectionStream, InverterModbusServer, RegisterStore};
use crate::telemetry::TelemetryModel;

/// Time allowed for the accept task to wind down after being aborted.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Startup options of a [`ServerLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// `host:port` to listen on. Port 0 picks a free port.
    pub bind_address: String,
    /// Interval between two register refreshes.
    pub cadence: Duration,
    /// Request timeout applied to every client connection.
    pub connection_timeout: Option<Duration>,
    /// Print the field values to stdout after each refresh.
    pub print_status: bool,
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_address: config.modbus.bind_address(),
            cadence: config.simulation.cadence(),
            connection_timeout: config.connection_timeout(),
            print_status: config.simulation.print_status,
        }
    }
}

/// A running simulator: Modbus listener plus cadence loop.
pub struct ServerLoop {
    local_addr: SocketAddr,
    store: RegisterStore,
    running: bool,
    shutdown: watch::Sender<bool>,
    cadence_task: Option<JoinHandle<Result<(), SimulatorError>>>,
    server_task: Option<JoinHandle<()>>,
}

impl ServerLoop {
    /// Seed the register store from the model's baseline, bind the listener
    /// and spawn the accept and cadence tasks.
    ///
    /// # Errors
    ///
    /// * [`SimulatorError::Bind`] when the listening address is unavailable.
    ///   No task is spawned in that case.
    /// * [`SimulatorError::Store`] when the model encodes a register count
    ///   different from the one it declares.
    pub async fn start<M: TelemetryModel>(
        settings: ServerSettings,
        model: M,
    ) -> Result<Self, SimulatorError> {
        let initial = model.initial();
        let store = RegisterStore::new(model.encode(&initial));
        if store.len() != model.register_count() {
            return Err(StoreError::LengthMismatch {
                expected: model.register_count(),
                actual: store.len(),
            }
            .into());
        }

        info!("Starting Modbus server on {}", settings.bind_address);
        let bind_error = |source: io::Error| SimulatorError::Bind {
            address: settings.bind_address.clone(),
            source,
        };
        let listener = TcpListener::bind(&settings.bind_address)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!(
            "Modbus server listening on {} ({} holding registers)",
            local_addr,
            store.len()
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let server_task = spawn_modbus_server(
            listener,
            store.clone(),
            settings.connection_timeout,
            shutdown_rx.clone(),
        );

        if settings.print_status {
            print_report("Initial values", &initial);
        }

        let cadence_task = tokio::spawn(run_cadence(
            model,
            store.clone(),
            settings.cadence,
            settings.print_status,
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            store,
            running: true,
            shutdown,
            cadence_task: Some(cadence_task),
            server_task: Some(server_task),
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &RegisterStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Resolves when the cadence loop ends on its own, which only happens
    /// after a store error. Cancel safe, so it can sit in a `select!` next
    /// to the shutdown signals.
    pub async fn stopped(&mut self) -> Result<(), SimulatorError> {
        let Some(handle) = self.cadence_task.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        self.cadence_task = None;
        result?
    }

    /// Stop the cadence loop, close every client connection and the listener.
    ///
    /// Calling it again is a no-op. Returns the cadence loop's error, if it
    /// failed before being stopped.
    pub async fn stop(&mut self) -> Result<(), SimulatorError> {
        if !self.running {
            debug!("Server on {} already stopped", self.local_addr);
            return Ok(());
        }
        self.running = false;

        info!("Shutting down Modbus server...");
        self.shutdown.send_replace(true);

        let cadence_result = match self.cadence_task.take() {
            Some(handle) => handle.await.map_err(SimulatorError::from).and_then(|r| r),
            None => Ok(()),
        };

        if let Some(handle) = self.server_task.take() {
            handle.abort();
            match time::timeout(SERVER_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("Modbus server task completed"),
                Ok(Err(e)) if e.is_cancelled() => debug!("Modbus server task cancelled"),
                Ok(Err(e)) => error!("Modbus server task failed: {}", e),
                Err(_) => warn!("Timeout waiting for Modbus server task to shut down"),
            }
        }

        info!("Modbus server on {} stopped", self.local_addr);
        println!("Server stopped, listener on {} closed", self.local_addr);
        cadence_result
    }
}

impl Drop for ServerLoop {
    fn drop(&mut self) {
        if self.running {
            self.shutdown.send_replace(true);
            if let Some(handle) = self.server_task.take() {
                handle.abort();
            }
        }
    }
}

fn spawn_modbus_server(
    listener: TcpListener,
    store: RegisterStore,
    connection_timeout: Option<Duration>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let server = Server::new(listener);

    let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
        let store = store.clone();
        let shutdown = shutdown.clone();
        async move {
            debug!("Client connected from {}", socket_addr);
            let accepted = accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(InverterModbusServer::new(store.clone())))
            })?;
            Ok(accepted.map(|(service, stream)| {
                (
                    service,
                    ConnectionStream::new(stream, connection_timeout, shutdown),
                )
            }))
        }
    };

    let on_process_error = |err: io::Error| {
        warn!("Modbus connection error: {err}");
    };

    tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            error!("Modbus server error: {}", e);
        }
    })
}

async fn run_cadence<M: TelemetryModel>(
    mut model: M,
    store: RegisterStore,
    cadence: Duration,
    print_status: bool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SimulatorError> {
    let mut interval = time::interval_at(Instant::now() + cadence, cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let report_ticks = print_status && !model.is_static();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let fields = model.tick();
                if let Err(err) = store.set_all(&model.encode(&fields)) {
                    error!("Failed to update registers: {}", err);
                    return Err(err.into());
                }
                debug!("Registers updated: {:?}", fields);
                if report_ticks {
                    print_report("Updated values", &fields);
                }
            }
        }
    }

    debug!("Cadence loop stopped");
    Ok(())
}

fn print_report<F: Display>(title: &str, fields: &F) {
    println!("\n[{}] {}:", Local::now().format("%H:%M:%S"), title);
    println!("{}", fields);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MinimalModel;

    fn settings(cadence: Duration) -> ServerSettings {
        ServerSettings {
            bind_address: "127.0.0.1:0".to_string(),
            cadence,
            connection_timeout: None,
            print_status: false,
        }
    }

    #[test]
    fn settings_from_default_config() {
        let settings = ServerSettings::from_config(&Config::default());
        assert_eq!(settings.bind_address, "127.0.0.1:502");
        assert_eq!(settings.cadence, Duration::from_secs(1));
        assert_eq!(settings.connection_timeout, Some(Duration::from_secs(1)));
        assert!(settings.print_status);
    }

    #[tokio::test]
    async fn start_seeds_the_store() {
        let mut server =
            ServerLoop::start(settings(Duration::from_secs(60)), MinimalModel::new())
                .await
                .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.store().snapshot(), vec![1000, 2200, 50]);
        assert!(server.is_running());

        server.stop().await.unwrap();
        assert!(!server.is_running());
        server.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_overwrites_client_writes() {
        let mut server =
            ServerLoop::start(settings(Duration::from_millis(100)), MinimalModel::new())
                .await
                .unwrap();
        server.store().write_range(0, &[1]).unwrap();
        assert_eq!(server.store().get(0).unwrap(), 1);

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(server.store().get(0).unwrap(), 1000);

        server.stop().await.unwrap();
    }
}
