use std::{fmt, path::Path};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod ram_config {
    pub const BASE_ADDR: u64 = 0x8000_0000;
    pub const DEFAULT_PC_VALUE: u64 = BASE_ADDR;

    pub const SIZE: usize = 0x800_0000;
}

pub mod arch_config {
    use std::fmt;

    use crate::gen_name_list;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Xlen {
        Rv32,
        Rv64,
    }

    impl Xlen {
        pub const fn bits(self) -> u32 {
            match self {
                Xlen::Rv32 => 32,
                Xlen::Rv64 => 64,
            }
        }

        /// Value of `misa.mxl` / `mstatus.uxl` for this width.
        pub const fn mxl(self) -> u64 {
            match self {
                Xlen::Rv32 => 1,
                Xlen::Rv64 => 2,
            }
        }

        pub const fn mask(self) -> u64 {
            match self {
                Xlen::Rv32 => u32::MAX as u64,
                Xlen::Rv64 => u64::MAX,
            }
        }
    }

    impl fmt::Display for Xlen {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "RV{}", self.bits())
        }
    }

    pub const INT_REG_CNT: usize = 32;
    pub const FP_REG_CNT: usize = 32;
    pub const VEC_REG_CNT: usize = 32;

    /// Vector register length in bits.
    pub const VLEN: usize = 128;
    pub const VLENB: usize = VLEN / 8;

    pub const INT_REG_NAME: [&str; INT_REG_CNT] = gen_name_list!("x"; 0, 31);
    pub const FP_REG_NAME: [&str; FP_REG_CNT] = gen_name_list!("f"; 0, 31);
    pub const VEC_REG_NAME: [&str; VEC_REG_CNT] = gen_name_list!("v"; 0, 31);

    #[rustfmt::skip]
    pub const ABI_REG_NAME: [&str; INT_REG_CNT] = [
        "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
        "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
        "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
        "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
    ];
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed CSR value list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed ISA string {isa:?}: {reason}")]
    Isa { isa: String, reason: String },
    #[error("invalid workload image: {0}")]
    Workload(String),
}

/// One `{name, value}` pair of the CSR initial value list.
///
/// `value` is accepted either as a hex string (`"0x8000_0000"`) or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrInitValue {
    pub name: String,
    #[serde(
        serialize_with = "serialize_hex",
        deserialize_with = "deserialize_hex"
    )]
    pub value: u64,
}

impl CsrInitValue {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

fn serialize_hex<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:#x}"))
}

fn deserialize_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrNumber {
        Text(String),
        Number(u64),
    }

    match HexOrNumber::deserialize(deserializer)? {
        HexOrNumber::Number(n) => Ok(n),
        HexOrNumber::Text(text) => {
            let digits = text.trim().replace('_', "");
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(&digits);
            u64::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
        }
    }
}

pub fn parse_csr_values(json: &str) -> Result<Vec<CsrInitValue>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_csr_values(path: &Path) -> Result<Vec<CsrInitValue>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_csr_values(&text)
}

/// Construction parameters of one hart.
#[derive(Debug, Clone)]
pub struct HartConfig {
    pub hart_id: u64,
    pub isa: String,
    pub reset_pc: u64,
    /// Treat `wfi` as the end of the workload.
    pub stop_on_wfi: bool,
    pub csr_values: Vec<CsrInitValue>,
}

impl Default for HartConfig {
    fn default() -> Self {
        Self {
            hart_id: 0,
            isa: "rv64imafdc_zicsr_zifencei".to_string(),
            reset_pc: ram_config::DEFAULT_PC_VALUE,
            stop_on_wfi: true,
            csr_values: vec![],
        }
    }
}

impl HartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isa(mut self, isa: impl Into<String>) -> Self {
        self.isa = isa.into();
        self
    }

    pub fn with_hart_id(mut self, hart_id: u64) -> Self {
        self.hart_id = hart_id;
        self
    }

    pub fn with_reset_pc(mut self, pc: u64) -> Self {
        self.reset_pc = pc;
        self
    }

    pub fn with_stop_on_wfi(mut self, stop: bool) -> Self {
        self.stop_on_wfi = stop;
        self
    }

    pub fn with_csr_values(mut self, values: Vec<CsrInitValue>) -> Self {
        self.csr_values = values;
        self
    }
}

impl fmt::Display for HartConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hart{} isa={} reset_pc={:#x}",
            self.hart_id, self.isa, self.reset_pc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csr_values() {
        let json = r#"[
            {"name": "mtvec", "value": "0x8000_0100"},
            {"name": "medeleg", "value": "B109"},
            {"name": "mscratch", "value": 16}
        ]"#;
        let values = parse_csr_values(json).unwrap();
        assert_eq!(
            values,
            vec![
                CsrInitValue::new("mtvec", 0x8000_0100),
                CsrInitValue::new("medeleg", 0xb109),
                CsrInitValue::new("mscratch", 16),
            ]
        );
    }

    #[test]
    fn test_parse_csr_values_rejects_garbage() {
        assert!(matches!(
            parse_csr_values(r#"[{"name": "mtvec", "value": "0xzz"}]"#),
            Err(ConfigError::Json(_))
        ));
        assert!(parse_csr_values("{").is_err());
    }

    #[test]
    fn test_csr_value_serializes_as_hex() {
        let text = serde_json::to_string(&CsrInitValue::new("satp", 0x8000)).unwrap();
        assert_eq!(text, r#"{"name":"satp","value":"0x8000"}"#);
    }

    #[test]
    fn test_builder() {
        let config = HartConfig::new()
            .with_isa("rv32imac")
            .with_hart_id(3)
            .with_reset_pc(0x1000)
            .with_stop_on_wfi(false);
        assert_eq!(config.hart_id, 3);
        assert_eq!(config.isa, "rv32imac");
        assert_eq!(config.reset_pc, 0x1000);
        assert!(!config.stop_on_wfi);
    }
}
