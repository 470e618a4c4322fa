// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Polling Modbus client reading a simulator's holding registers

use std::net::SocketAddr;

use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::time::{self, Duration};
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use inverter_simulator::modbus::register_map::{decode, DecodedRegister};
use inverter_simulator::telemetry::ModelKind;

/// Modbus client reading the holding registers of an inverter simulator
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Modbus unit identifier
    #[clap(long, default_value = "1")]
    unit: u8,

    /// Register map used to decode the values
    #[clap(long, value_enum, default_value_t = ModelKind::Inverter)]
    model: ModelKind,

    /// Print one JSON document per poll instead of a table
    #[clap(long)]
    json: bool,

    /// Delay between two polls in milliseconds
    #[clap(long, default_value = "1000")]
    interval_ms: u64,

    /// Number of polls, 0 polls until interrupted
    #[clap(long, default_value = "1")]
    count: u64,

    /// Timeout of each request in milliseconds
    #[clap(long, default_value = "2000")]
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct Poll<'a> {
    timestamp: DateTime<Local>,
    server: SocketAddr,
    model: ModelKind,
    registers: &'a [DecodedRegister],
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let request_timeout = Duration::from_millis(args.timeout_ms);
    let map = args.model.register_map();
    let quantity = u16::try_from(map.len()).context("Register map too large")?;

    let socket_addr = tokio::net::lookup_host(format!("{}:{}", args.address, args.port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", args.address, args.port))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}", args.address))?;
    info!("Polling Modbus server at {}", socket_addr);

    let mut ctx: Option<Context> = None;
    let mut poll = 0u64;
    loop {
        poll += 1;

        match read_registers(&mut ctx, socket_addr, args.unit, quantity, request_timeout).await {
            Ok(raw) => {
                let registers = decode(map, 0, &raw);
                if args.json {
                    let document = Poll {
                        timestamp: Local::now(),
                        server: socket_addr,
                        model: args.model,
                        registers: &registers,
                    };
                    println!("{}", serde_json::to_string(&document)?);
                } else {
                    print_table(&registers);
                }
            }
            Err(err) => {
                error!("Poll {} failed: {:#}", poll, err);
                // Start from a fresh connection on the next poll
                ctx = None;
            }
        }

        if args.count != 0 && poll >= args.count {
            break;
        }
        time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    if let Some(mut ctx) = ctx {
        if let Err(err) = ctx.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", err);
        }
    }
    Ok(())
}

async fn read_registers(
    ctx: &mut Option<Context>,
    socket_addr: SocketAddr,
    unit: u8,
    quantity: u16,
    request_timeout: Duration,
) -> Result<Vec<u16>> {
    if ctx.is_none() {
        debug!("Connecting to {}", socket_addr);
        let connected = time::timeout(
            request_timeout,
            tcp::connect_slave(socket_addr, Slave(unit)),
        )
        .await
        .map_err(|_| anyhow!("Timed out connecting to {}", socket_addr))?
        .with_context(|| format!("Failed to connect to {}", socket_addr))?;
        *ctx = Some(connected);
    }
    let Some(ctx) = ctx.as_mut() else {
        return Err(anyhow!("Not connected to {}", socket_addr));
    };

    let response = time::timeout(request_timeout, ctx.read_holding_registers(0, quantity))
        .await
        .map_err(|_| anyhow!("Request timed out after {:?}", request_timeout))?
        .context("Modbus transport error")?
        .map_err(|code| anyhow!("Modbus exception: {:?}", code))?;
    Ok(response)
}

fn print_table(registers: &[DecodedRegister]) {
    println!("[{}]", Local::now().format("%H:%M:%S"));
    println!("{:>4}  {:<18} {:>6}  {:>10}", "addr", "name", "raw", "value");
    for register in registers {
        println!(
            "{:>4}  {:<18} {:>6}  {:>10.3} {}",
            register.address, register.name, register.raw, register.value, register.unit
        );
    }
}
