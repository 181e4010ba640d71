//! Modbus 点位地址与寄存器解码

use crate::error::SessionError;
use std::str::FromStr;

/// Modbus 寄存器数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModbusDataType {
    /// 线圈 / 离散输入（0 或 1）
    Bool,
    /// 16位有符号整数
    #[default]
    Int16,
    /// 16位无符号整数
    Uint16,
    /// 32位有符号整数（2个寄存器）
    Int32,
    /// 32位无符号整数（2个寄存器）
    Uint32,
    /// 32位浮点数（2个寄存器）
    Float32,
    /// 64位浮点数（4个寄存器）
    Float64,
}

impl ModbusDataType {
    /// 占用的寄存器（或线圈）数量
    pub fn width(self) -> u16 {
        match self {
            ModbusDataType::Bool | ModbusDataType::Int16 | ModbusDataType::Uint16 => 1,
            ModbusDataType::Int32 | ModbusDataType::Uint32 | ModbusDataType::Float32 => 2,
            ModbusDataType::Float64 => 4,
        }
    }
}

impl FromStr for ModbusDataType {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Ok(Self::Bool),
            "int16" => Ok(Self::Int16),
            "uint16" => Ok(Self::Uint16),
            "int32" => Ok(Self::Int32),
            "uint32" => Ok(Self::Uint32),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(SessionError::InvalidNodeId(format!(
                "unknown data type: {}",
                other
            ))),
        }
    }
}

/// Modbus 功能码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModbusFunctionCode {
    /// 读线圈状态 (0x01)
    ReadCoils = 1,
    /// 读离散输入 (0x02)
    ReadDiscreteInputs = 2,
    /// 读保持寄存器 (0x03)
    #[default]
    ReadHoldingRegisters = 3,
    /// 读输入寄存器 (0x04)
    ReadInputRegisters = 4,
}

impl ModbusFunctionCode {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::ReadCoils),
            2 => Some(Self::ReadDiscreteInputs),
            3 => Some(Self::ReadHoldingRegisters),
            4 => Some(Self::ReadInputRegisters),
            _ => None,
        }
    }

    /// 是否读取位（线圈 / 离散输入）
    pub fn is_bit(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }
}

/// 解析后的 Modbus 点位地址
///
/// 文本形式：`unit=1;fc=3;addr=100;type=float32;scale=0.1`
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusNodeId {
    /// 从站 ID
    pub unit: u8,
    pub function: ModbusFunctionCode,
    /// 起始地址
    pub address: u16,
    /// 读取数量
    pub count: u16,
    pub data_type: ModbusDataType,
    /// 缩放系数
    pub scale: Option<f64>,
    /// 偏移量
    pub offset: Option<f64>,
}

impl FromStr for ModbusNodeId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| SessionError::InvalidNodeId(format!("{} ({})", s, reason));

        let mut unit = 1u8;
        let mut function = ModbusFunctionCode::default();
        let mut address = None;
        let mut count = None;
        let mut data_type = None;
        let mut scale = None;
        let mut offset = None;

        for part in s.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected key=value, got '{}'", part)))?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "unit" | "slave" => {
                    unit = value
                        .parse()
                        .map_err(|_| invalid(format!("bad unit '{}'", value)))?
                }
                "fc" => {
                    function = value
                        .parse::<u8>()
                        .ok()
                        .and_then(ModbusFunctionCode::from_code)
                        .ok_or_else(|| invalid(format!("unsupported function code '{}'", value)))?
                }
                "addr" => {
                    address = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| invalid(format!("bad address '{}'", value)))?,
                    )
                }
                "count" => {
                    count = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| invalid(format!("bad count '{}'", value)))?,
                    )
                }
                "type" => data_type = Some(value.parse::<ModbusDataType>()?),
                "scale" => {
                    scale = Some(
                        value
                            .parse::<f64>()
                            .map_err(|_| invalid(format!("bad scale '{}'", value)))?,
                    )
                }
                "offset" => {
                    offset = Some(
                        value
                            .parse::<f64>()
                            .map_err(|_| invalid(format!("bad offset '{}'", value)))?,
                    )
                }
                other => return Err(invalid(format!("unknown key '{}'", other))),
            }
        }

        let address = address.ok_or_else(|| invalid("missing addr".to_string()))?;
        let data_type = match (function.is_bit(), data_type) {
            (true, None | Some(ModbusDataType::Bool)) => ModbusDataType::Bool,
            (true, Some(other)) => {
                return Err(invalid(format!("{:?} not readable as bits", other)));
            }
            (false, Some(ModbusDataType::Bool)) => {
                return Err(invalid("bool needs fc=1 or fc=2".to_string()));
            }
            (false, data_type) => data_type.unwrap_or_default(),
        };
        let count = count.unwrap_or_else(|| data_type.width());
        if count < data_type.width() {
            return Err(invalid(format!(
                "count {} too small for {:?}",
                count, data_type
            )));
        }

        Ok(Self {
            unit,
            function,
            address,
            count,
            data_type,
            scale,
            offset,
        })
    }
}

impl ModbusNodeId {
    /// 应用缩放和偏移
    pub fn apply_scaling(&self, raw_value: f64) -> f64 {
        match (self.scale, self.offset) {
            (Some(scale), Some(offset)) => raw_value * scale + offset,
            (Some(scale), None) => raw_value * scale,
            (None, Some(offset)) => raw_value + offset,
            (None, None) => raw_value,
        }
    }
}

/// 解析寄存器数据为浮点值（大端字序）
pub fn decode_registers(registers: &[u16], data_type: ModbusDataType) -> Result<f64, String> {
    if registers.len() < data_type.width() as usize {
        return Err(format!(
            "need {} registers for {:?}, got {}",
            data_type.width(),
            data_type,
            registers.len()
        ));
    }

    let value = match data_type {
        ModbusDataType::Bool => {
            if registers[0] != 0 {
                1.0
            } else {
                0.0
            }
        }
        ModbusDataType::Int16 => registers[0] as i16 as f64,
        ModbusDataType::Uint16 => registers[0] as f64,
        ModbusDataType::Int32 => join_u32(registers) as i32 as f64,
        ModbusDataType::Uint32 => join_u32(registers) as f64,
        ModbusDataType::Float32 => f32::from_bits(join_u32(registers)) as f64,
        ModbusDataType::Float64 => {
            let bits = registers[..4]
                .iter()
                .fold(0u64, |acc, register| (acc << 16) | *register as u64);
            f64::from_bits(bits)
        }
    };

    Ok(value)
}

fn join_u32(registers: &[u16]) -> u32 {
    ((registers[0] as u32) << 16) | registers[1] as u32
}
