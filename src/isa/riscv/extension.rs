use std::fmt;

use bitflags::bitflags;

use crate::config::{ConfigError, arch_config::Xlen};

bitflags! {
    /// Enabled ISA extensions. Single-letter extensions use their `misa` bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Extensions: u32 {
        const A = 1 << 0;
        const B = 1 << 1;
        const C = 1 << 2;
        const D = 1 << 3;
        const F = 1 << 5;
        const I = 1 << 8;
        const M = 1 << 12;
        const S = 1 << 18;
        const U = 1 << 20;
        const V = 1 << 21;
        const ZICSR = 1 << 26;
        const ZIFENCEI = 1 << 27;

        const G = Self::I.bits() | Self::M.bits() | Self::A.bits() | Self::F.bits()
            | Self::D.bits() | Self::ZICSR.bits() | Self::ZIFENCEI.bits();
    }
}

impl Extensions {
    const MISA_MASK: u32 = (1 << 26) - 1;

    pub fn from_letter(letter: char) -> Option<Extensions> {
        if !letter.is_ascii_lowercase() {
            return None;
        }
        let bit = 1u32 << (letter as u8 - b'a');
        Extensions::from_bits(bit).filter(|ext| !ext.is_empty())
    }

    /// Bits for `misa.extensions`.
    pub fn misa_bits(self) -> u64 {
        (self.bits() & Self::MISA_MASK) as u64
    }

    /// Letter extensions named by `misa.extensions`; multi-letter ones are not encoded there.
    pub fn from_misa(bits: u64) -> Extensions {
        Extensions::from_bits_truncate(bits as u32 & Self::MISA_MASK)
    }

    /// Extensions that are not visible in `misa`.
    pub fn non_misa(self) -> Extensions {
        Extensions::from_bits_truncate(self.bits() & !Self::MISA_MASK)
    }
}

impl fmt::Display for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in 'a'..='z' {
            if let Some(ext) = Extensions::from_letter(letter) {
                if self.contains(ext) {
                    write!(f, "{letter}")?;
                }
            }
        }
        if self.contains(Extensions::ZICSR) {
            write!(f, "_zicsr")?;
        }
        if self.contains(Extensions::ZIFENCEI) {
            write!(f, "_zifencei")?;
        }
        Ok(())
    }
}

/// Parse `rv64imafdc_zicsr_zifencei` style strings.
pub fn parse_isa(isa: &str) -> Result<(Xlen, Extensions), ConfigError> {
    let malformed = |reason: String| ConfigError::Isa {
        isa: isa.to_string(),
        reason,
    };

    let lower = isa.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("rv")
        .ok_or_else(|| malformed("missing `rv` prefix".into()))?;
    let (xlen, rest) = if let Some(rest) = rest.strip_prefix("32") {
        (Xlen::Rv32, rest)
    } else if let Some(rest) = rest.strip_prefix("64") {
        (Xlen::Rv64, rest)
    } else {
        return Err(malformed("XLEN must be 32 or 64".into()));
    };

    let mut parts = rest.split('_');
    let mut extensions = Extensions::empty();
    for letter in parts.next().unwrap_or_default().chars() {
        let ext = match letter {
            'g' => Extensions::G,
            'h' => return Err(malformed("hypervisor extension is not supported".into())),
            _ => Extensions::from_letter(letter)
                .ok_or_else(|| malformed(format!("unsupported extension `{letter}`")))?,
        };
        extensions |= ext;
    }
    for name in parts.filter(|p| !p.is_empty()) {
        extensions |= match name {
            "zicsr" => Extensions::ZICSR,
            "zifencei" => Extensions::ZIFENCEI,
            _ => return Err(malformed(format!("unsupported extension `{name}`"))),
        };
    }

    if !extensions.contains(Extensions::I) {
        return Err(malformed("base integer ISA `i` is required".into()));
    }
    if extensions.contains(Extensions::D) && !extensions.contains(Extensions::F) {
        return Err(malformed("`d` requires `f`".into()));
    }
    Ok((xlen, extensions))
}
