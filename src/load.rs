use crate::{config::ConfigError, ram::Ram};

/// Copy every `PT_LOAD` segment into `ram` and return the entry point.
pub fn load_elf(ram: &mut Ram, elf_data: &[u8]) -> Result<u64, ConfigError> {
    let workload_err = |msg: &str| ConfigError::Workload(msg.to_string());

    let elf = xmas_elf::ElfFile::new(elf_data).map_err(workload_err)?;
    let ph_count = elf.header.pt2.ph_count();
    for i in 0..ph_count {
        let ph = elf.program_header(i).map_err(workload_err)?;

        if ph.get_type().map_err(workload_err)? != xmas_elf::program::Type::Load {
            continue;
        }

        let start = ph.offset() as usize;
        let end = start + ph.file_size() as usize;
        let bytes = elf
            .input
            .get(start..end)
            .ok_or_else(|| workload_err("segment exceeds file size"))?;
        ram.insert_section(bytes, ph.physical_addr())
            .map_err(|e| ConfigError::Workload(e.to_string()))?;
        log::debug!(
            "loaded segment {:#x}..{:#x}",
            ph.physical_addr(),
            ph.physical_addr() + ph.mem_size()
        );
    }

    Ok(elf.header.pt2.entry_point())
}

/// Place a raw image at the start of `ram` and return its address.
pub fn load_bin(ram: &mut Ram, raw_data: &[u8]) -> Result<u64, ConfigError> {
    let base = ram.base();
    ram.insert_section(raw_data, base)
        .map_err(|e| ConfigError::Workload(e.to_string()))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_bin() {
        let mut ram = Ram::new(0x8000_0000, 0x100);
        let entry = load_bin(&mut ram, &[0x13, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(entry, 0x8000_0000);
        assert_eq!(ram.read_uint(entry, 4).unwrap(), 0x13);
    }

    #[test]
    fn test_load_bin_too_large() {
        let mut ram = Ram::new(0x8000_0000, 2);
        assert!(matches!(
            load_bin(&mut ram, &[0; 4]),
            Err(ConfigError::Workload(_))
        ));
    }

    #[test]
    fn test_load_elf_rejects_garbage() {
        let mut ram = Ram::new(0x8000_0000, 0x100);
        assert!(load_elf(&mut ram, b"not an elf").is_err());
    }
}
