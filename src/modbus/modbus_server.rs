// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus service exposing the simulated inverter
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the simulated inverter
//! (the Modbus slave), the client is the SCADA or monitoring tool polling it
//! (the Modbus master).
//!
//! Only the holding register space exists. Reads and writes go through the
//! shared [`RegisterStore`], each request under a single lock, so a client
//! never sees registers from two different ticks in one response.
//!
//! | Function code | Request | Handling |
//! |---------------|---------|----------|
//! | 0x03 | Read Holding Registers | served from the store |
//! | 0x06 | Write Single Register | written to the store until the next tick |
//! | 0x10 | Write Multiple Registers | written to the store until the next tick |
//! | other | - | `IllegalFunction` |
//!
//! Quantities outside 1..=125 registers (read) or 1..=123 registers (write
//! multiple) are answered with `IllegalDataValue`.

use std::future;

use log::{debug, error, warn};
use tokio_modbus::prelude::*;

use crate::error::StoreError;
use crate::modbus::RegisterStore;

/// Largest register count of a Read Holding Registers request.
pub const MAX_READ_QUANTITY: u16 = 125;
/// Largest register count of a Write Multiple Registers request.
pub const MAX_WRITE_QUANTITY: usize = 123;

/// Modbus TCP service bound to a simulator's register store.
///
/// One instance is created per client connection; all of them share the same
/// store through cheap clones.
#[derive(Debug, Clone)]
pub struct InverterModbusServer {
    store: RegisterStore,
}

impl tokio_modbus::server::Service for InverterModbusServer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadHoldingRegisters(_, cnt) if cnt == 0 || cnt > MAX_READ_QUANTITY => {
                warn!("Exception::IllegalDataValue - Invalid read quantity {cnt}");
                Err(ExceptionCode::IllegalDataValue)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                self.store
                    .read_range(addr.into(), cnt.into())
                    .map(Response::ReadHoldingRegisters)
                    .map_err(exception_for)
            }
            Request::WriteMultipleRegisters(_, ref values)
                if values.is_empty() || values.len() > MAX_WRITE_QUANTITY =>
            {
                warn!(
                    "Exception::IllegalDataValue - Invalid write quantity {}",
                    values.len()
                );
                Err(ExceptionCode::IllegalDataValue)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                debug!(
                    "Writing {} values to holding registers starting from address {}",
                    values.len(),
                    addr
                );
                self.store
                    .write_range(addr.into(), &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
                    .map_err(exception_for)
            }
            Request::WriteSingleRegister(addr, value) => {
                debug!("Writing value {} to holding register {}", value, addr);
                self.store
                    .write_range(addr.into(), std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleRegister(addr, value))
                    .map_err(exception_for)
            }
            _ => {
                warn!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        future::ready(res)
    }
}

impl InverterModbusServer {
    pub fn new(store: RegisterStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RegisterStore {
        &self.store
    }
}

fn exception_for(err: StoreError) -> ExceptionCode {
    match err {
        StoreError::OutOfRange { .. } => {
            warn!("Exception::IllegalDataAddress - {err}");
            ExceptionCode::IllegalDataAddress
        }
        StoreError::LengthMismatch { .. } => {
            error!("Exception::ServerDeviceFailure - {err}");
            ExceptionCode::ServerDeviceFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_modbus::server::Service;

    fn server() -> InverterModbusServer {
        InverterModbusServer::new(RegisterStore::new(vec![1000, 2200, 50]))
    }

    #[tokio::test]
    async fn reads_holding_registers() {
        let rsp = server()
            .call(Request::ReadHoldingRegisters(0, 3))
            .await
            .unwrap();
        assert_eq!(rsp, Response::ReadHoldingRegisters(vec![1000, 2200, 50]));
    }

    #[tokio::test]
    async fn read_past_the_end_is_illegal_data_address() {
        let err = server()
            .call(Request::ReadHoldingRegisters(2, 2))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataAddress);
    }

    #[tokio::test]
    async fn writes_land_in_the_store() {
        let server = server();
        server
            .call(Request::WriteSingleRegister(1, 2300))
            .await
            .unwrap();
        server
            .call(Request::WriteMultipleRegisters(0, vec![1, 2].into()))
            .await
            .unwrap();
        assert_eq!(server.store().snapshot(), vec![1, 2, 50]);
    }

    #[tokio::test]
    async fn invalid_quantities_are_illegal_data_value() {
        let server = InverterModbusServer::new(RegisterStore::new(vec![0; 200]));
        for cnt in [0, MAX_READ_QUANTITY + 1] {
            let err = server
                .call(Request::ReadHoldingRegisters(0, cnt))
                .await
                .unwrap_err();
            assert_eq!(err, ExceptionCode::IllegalDataValue);
        }
        assert!(server
            .call(Request::ReadHoldingRegisters(0, MAX_READ_QUANTITY))
            .await
            .is_ok());

        for len in [0, MAX_WRITE_QUANTITY + 1] {
            let err = server
                .call(Request::WriteMultipleRegisters(0, vec![1; len].into()))
                .await
                .unwrap_err();
            assert_eq!(err, ExceptionCode::IllegalDataValue);
        }
        assert_eq!(server.store().snapshot(), vec![0; 200]);
    }

    #[tokio::test]
    async fn other_function_codes_are_rejected() {
        let server = server();
        let err = server
            .call(Request::ReadInputRegisters(0, 1))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalFunction);
        let err = server.call(Request::ReadCoils(0, 1)).await.unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalFunction);
    }
}
