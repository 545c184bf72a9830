use kimg_tool::container::{self, DTB_OFFSET, KIMG_OFFSET};
use kimg_tool::image::{kernel_resize, KERNEL_MAGIC};
use kimg_tool::insn::{decode_branch_target, encode_branch, relocate_branch_func};
use kimg_tool::io::{FileIo, LogConfig};
use kimg_tool::{load_kernel, Error, FormatError, KernelInfo};
use std::path::PathBuf;
use tempfile::TempDir;

const PRIMARY_ENTRY: u64 = 0x1_0000;
const KERNEL_LEN: usize = 0x1_2000;

/// A kernel Image with a plain or EFI lead-in branching to `PRIMARY_ENTRY`,
/// where a relocating thunk jumps further into the image.
fn kernel_image(uefi: bool) -> Vec<u8> {
    let mut img = vec![0u8; KERNEL_LEN];
    let b_offset = if uefi { 4 } else { 0 };
    if uefi {
        img[0..2].copy_from_slice(b"MZ");
    }
    let b_insn = encode_branch(b_offset, PRIMARY_ENTRY).unwrap();
    img[b_offset as usize..b_offset as usize + 4].copy_from_slice(&b_insn.to_le_bytes());
    img[8..16].copy_from_slice(&0u64.to_le_bytes());
    img[16..24].copy_from_slice(&(KERNEL_LEN as u64).to_le_bytes());
    // 4K pages, little endian
    img[24..32].copy_from_slice(&0b0010u64.to_le_bytes());
    img[56..60].copy_from_slice(KERNEL_MAGIC);

    let thunk = encode_branch(PRIMARY_ENTRY, PRIMARY_ENTRY + 0x800).unwrap();
    let entry = PRIMARY_ENTRY as usize;
    img[entry..entry + 4].copy_from_slice(&thunk.to_le_bytes());

    img
}

fn write_temp(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    FileIo::default().write_whole(&path, data, false).unwrap();
    path
}

#[cfg(test)]
mod parse {
    use super::*;

    #[test]
    fn test_plain_image() {
        let img = kernel_image(false);
        let info = KernelInfo::parse(&img, img.len()).unwrap();
        assert!(!info.uefi);
        assert_eq!(info.primary_entry_offset as u64, PRIMARY_ENTRY);
        assert_eq!(info.kernel_size, KERNEL_LEN as u64);
        assert_eq!(info.page_shift, 12);
    }

    #[test]
    fn test_efi_image() {
        let img = kernel_image(true);
        let info = KernelInfo::parse(&img, img.len()).unwrap();
        assert!(info.uefi);
        assert_eq!(info.b_stext_insn_offset, 4);
        assert_eq!(info.primary_entry_offset as u64, PRIMARY_ENTRY);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let img = kernel_image(true);
        assert_eq!(
            KernelInfo::parse(&img, img.len()).unwrap(),
            KernelInfo::parse(&img, img.len()).unwrap()
        );
    }

    #[test]
    fn test_corrupt_magic_never_yields_info() {
        for i in 56..60 {
            let mut img = kernel_image(false);
            img[i] ^= 0xff;
            let err = KernelInfo::parse(&img, img.len()).unwrap_err();
            assert!(err.is_format());
            assert!(matches!(err, Error::Format(FormatError::BadMagic { .. })));
        }
    }

    #[test]
    fn test_entry_thunk_resolution() {
        let img = kernel_image(false);
        let info = KernelInfo::parse(&img, img.len()).unwrap();
        let entry = info.primary_entry_offset as u64;
        assert_eq!(relocate_branch_func(&img, entry).unwrap(), entry + 0x800);
        // The target of the thunk is zeroed, not a branch.
        assert_eq!(
            relocate_branch_func(&img, entry + 0x800).unwrap(),
            entry + 0x800
        );
    }
}

#[cfg(test)]
mod branch {
    use super::*;

    #[test]
    fn test_boundary() {
        let from = 0x4000_0000;
        assert!(encode_branch(from, from + 0x0800_0000).is_some());
        assert!(encode_branch(from, from + 0x0800_0004).is_none());
    }

    #[test]
    fn test_inverse_over_word_aligned_range() {
        let from = 0xffff_8000_1000_0000u64;
        let mut delta: i64 = -0x0800_0000;
        while delta < 0x0800_0000 {
            let to = from.wrapping_add_signed(delta);
            let insn = encode_branch(from, to).unwrap();
            assert_eq!(decode_branch_target(insn, from), to);
            delta += 0x0012_3454;
        }
    }
}

#[cfg(test)]
mod files {
    use super::*;

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let dir = TempDir::new().unwrap();
        let io = FileIo::new(LogConfig {
            enabled: true,
            ..Default::default()
        });
        let kimg = kernel_image(true);

        for is_be in [false, true] {
            let wrapped = container::wrap(DTB_OFFSET, &kimg, is_be).unwrap();
            let path = write_temp(&dir, "Image.wrapped", &wrapped);

            let (info, payload) = load_kernel(&io, &path).unwrap();
            assert_eq!(payload, kimg);
            assert!(info.is_uncompressed_img());
            let c = info.container.unwrap();
            assert_eq!(c.dtb_offset, DTB_OFFSET);
            assert_eq!(c.kimg_offset, KIMG_OFFSET);
            assert_eq!(c.kimg_real_size, kimg.len() as u64);
        }
    }

    #[test]
    fn test_append_image_header_then_load() {
        let dir = TempDir::new().unwrap();
        let io = FileIo::default();
        let kimg = kernel_image(false);
        let path = write_temp(&dir, "Image", &kimg);

        container::append_image_header(&io, &path, false).unwrap();
        assert_eq!(
            io.file_size(&path).unwrap(),
            (kimg.len() + KIMG_OFFSET as usize) as u64
        );

        let (info, payload) = load_kernel(&io, &path).unwrap();
        assert!(info.is_uncompressed_img());
        assert_eq!(info.primary_entry_offset as u64, PRIMARY_ENTRY);
        assert_eq!(payload, kimg);
    }

    #[test]
    fn test_resize_and_write_back() {
        let dir = TempDir::new().unwrap();
        let io = FileIo::default();
        let path = write_temp(&dir, "Image", &kernel_image(false));

        let (mut info, mut kimg) = load_kernel(&io, &path).unwrap();
        kimg.extend_from_slice(&[0xcc; 0x1000]);
        let new_len = kimg.len() as u64;
        kernel_resize(&mut info, &mut kimg, new_len).unwrap();
        io.write_whole(&path, &kimg, false).unwrap();

        let (reloaded, payload) = load_kernel(&io, &path).unwrap();
        assert_eq!(reloaded.kernel_size, new_len);
        assert_eq!(payload.len() as u64, new_len);
        assert_eq!(reloaded, info);
    }

    #[test]
    fn test_truncated_image_is_format_error() {
        let dir = TempDir::new().unwrap();
        let io = FileIo::default();
        let path = write_temp(&dir, "Image", &kernel_image(false)[..40]);

        let err = load_kernel(&io, &path).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::TooShort { len: 40, .. })
        ));
    }

    #[test]
    fn test_missing_image_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_kernel(&FileIo::default(), &dir.path().join("Image")).unwrap_err();
        assert!(err.is_io());
    }
}
