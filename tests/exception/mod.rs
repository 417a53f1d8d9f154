// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use modbus_poll::{
    bytes::BytesMut,
    client::{Client, Reader as _, Writer as _},
    mapping::{Mapping, MappingRequest},
    ExceptionCode, ExceptionResponse, FunctionCode, ProtocolError,
};

pub struct TestMapping;

impl Mapping for TestMapping {
    fn handle(
        &mut self,
        req: &MappingRequest<'_>,
        _rsp: &mut BytesMut,
    ) -> Result<(), ExceptionCode> {
        use FunctionCode::*;

        Err(match req.function {
            ReadCoils => ExceptionCode::Acknowledge,
            ReadDiscreteInputs => ExceptionCode::GatewayPathUnavailable,
            WriteSingleCoil => ExceptionCode::GatewayTargetDevice,
            WriteMultipleCoils => ExceptionCode::IllegalDataAddress,
            ReadInputRegisters => ExceptionCode::IllegalDataValue,
            WriteSingleRegister => ExceptionCode::MemoryParityError,
            WriteMultipleRegisters => ExceptionCode::ServerDeviceBusy,
            MaskWriteRegister => ExceptionCode::ServerDeviceFailure,
            _ => ExceptionCode::IllegalFunction,
        })
    }
}

fn assert_exception<T: std::fmt::Debug>(
    res: Result<T, ProtocolError>,
    function: FunctionCode,
    exception: ExceptionCode,
) {
    match res {
        Err(ProtocolError::Exception(rsp)) => {
            assert_eq!(
                rsp,
                ExceptionResponse {
                    function,
                    exception
                }
            );
        }
        other => panic!("expected {exception} for function {function}, got {other:?}"),
    }
}

pub fn check_client(client: &mut Client) {
    assert_exception(
        client.read_coils(0x00, 2),
        FunctionCode::ReadCoils,
        ExceptionCode::Acknowledge,
    );
    assert_exception(
        client.read_discrete_inputs(0x00, 2),
        FunctionCode::ReadDiscreteInputs,
        ExceptionCode::GatewayPathUnavailable,
    );
    assert_exception(
        client.write_single_coil(0x00, true),
        FunctionCode::WriteSingleCoil,
        ExceptionCode::GatewayTargetDevice,
    );
    assert_exception(
        client.write_multiple_coils(0x00, &[true]),
        FunctionCode::WriteMultipleCoils,
        ExceptionCode::IllegalDataAddress,
    );
    assert_exception(
        client.read_input_registers(0x00, 2),
        FunctionCode::ReadInputRegisters,
        ExceptionCode::IllegalDataValue,
    );
    assert_exception(
        client.read_holding_registers(0x00, 2),
        FunctionCode::ReadHoldingRegisters,
        ExceptionCode::IllegalFunction,
    );
    assert_exception(
        client.write_single_register(0x00, 42),
        FunctionCode::WriteSingleRegister,
        ExceptionCode::MemoryParityError,
    );
    assert_exception(
        client.write_multiple_registers(0x00, &[42]),
        FunctionCode::WriteMultipleRegisters,
        ExceptionCode::ServerDeviceBusy,
    );
    assert_exception(
        client.masked_write_register(0x00, 0, 0),
        FunctionCode::MaskWriteRegister,
        ExceptionCode::ServerDeviceFailure,
    );
    assert_exception(
        client.read_write_multiple_registers(0x00, 1, 0x00, &[42]),
        FunctionCode::ReadWriteMultipleRegisters,
        ExceptionCode::IllegalFunction,
    );
}
