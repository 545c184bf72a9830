//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

use std::io::{self, Write};

use crate::image::KernelInfo;
use crate::util::{comma_sep_u64, human_size};

pub fn write_report<W: Write>(info: &KernelInfo, image_len: u64, out: &mut W) -> io::Result<()> {
    out.write_all(b"# Kernel Image Details\n")?;
    out.write_all(
        format!(
            "\t- Image size: {} bytes ({})\n",
            comma_sep_u64(image_len),
            human_size(image_len)
        )
        .as_bytes(),
    )?;
    out.write_all(format!("\t- UEFI stub: {}\n", info.uefi).as_bytes())?;
    if let Some(pe_offset) = info.pe_offset {
        out.write_all(format!("\t\t* PE header offset: {pe_offset:#x}\n").as_bytes())?;
    }
    out.write_all(format!("\t- Load offset: {:#010x}\n", info.load_offset).as_bytes())?;
    out.write_all(
        format!(
            "\t- Kernel size: {:#010x} ({})\n",
            info.kernel_size,
            human_size(info.kernel_size)
        )
        .as_bytes(),
    )?;
    out.write_all(
        format!(
            "\t- Page size: {} (shift {})\n",
            human_size(info.page_size()),
            info.page_shift
        )
        .as_bytes(),
    )?;
    out.write_all(
        format!(
            "\t- Primary entry: {:#x} (branch at {:#x})\n",
            info.primary_entry_offset, info.b_stext_insn_offset
        )
        .as_bytes(),
    )?;

    if let Some(container) = &info.container {
        out.write_all(b"\n# UNCOMPRESSED_IMG Container\n")?;
        out.write_all(format!("\t- DTB offset field: {:#x}\n", container.dtb_offset).as_bytes())?;
        out.write_all(format!("\t- Kernel offset: {:#x}\n", container.kimg_offset).as_bytes())?;
        out.write_all(
            format!(
                "\t- Kernel real size: {} bytes\n",
                comma_sep_u64(container.kimg_real_size)
            )
            .as_bytes(),
        )?;
    }

    Ok(())
}

pub fn json_report(info: &KernelInfo) -> serde_json::Result<String> {
    serde_json::to_string_pretty(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{split, wrap, DTB_OFFSET};
    use crate::image::tests::build_header;

    fn wrapped_info() -> KernelInfo {
        let img = wrap(
            DTB_OFFSET,
            &build_header(true, 0x1400_0010, 0x20_0000, 0b110),
            false,
        )
        .unwrap();
        let (container, kimg) = split(&img);
        let mut info = KernelInfo::parse(kimg, kimg.len()).unwrap();
        info.container = container;
        info
    }

    #[test]
    fn test_text_report() {
        let info = wrapped_info();
        let mut out = Vec::new();
        write_report(&info, 0x114, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("UEFI stub: true"));
        assert!(text.contains("PE header offset: 0x40"));
        assert!(text.contains("Kernel size: 0x00200000 (2 MiB)"));
        assert!(text.contains("Page size: 64 KiB (shift 16)"));
        assert!(text.contains("Primary entry: 0x44 (branch at 0x4)"));
        assert!(text.contains("# UNCOMPRESSED_IMG Container"));
        assert!(text.contains("Kernel real size: 256 bytes"));
    }

    #[test]
    fn test_json_report() {
        let info = wrapped_info();
        let json: serde_json::Value = serde_json::from_str(&json_report(&info).unwrap()).unwrap();

        assert_eq!(json["arch"], "aarch64");
        assert_eq!(json["uefi"], true);
        assert_eq!(json["page_shift"], 16);
        assert_eq!(json["primary_entry_offset"], 0x44);
        assert_eq!(json["container"]["kimg_offset"], 20);

        let mut info = info;
        info.container = None;
        let json: serde_json::Value = serde_json::from_str(&json_report(&info).unwrap()).unwrap();
        assert!(json["container"].is_null());
    }
}
